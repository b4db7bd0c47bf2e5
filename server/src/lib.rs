pub mod roles;
pub mod server;
pub mod types;
