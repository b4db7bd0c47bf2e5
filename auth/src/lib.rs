pub mod session;
pub mod types;

pub use session::{Anonymous, Session};
pub use types::{require_caller, IdentityResolver};
