pub mod affordances;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod validate;

pub use client::TavernClient;
pub use config::ClientConfig;
pub use error::{ClientError, ErrorKind};
