pub mod ids;
pub mod limits;
pub mod principal;
pub mod types;

pub use principal::Principal;
pub use types::ErrorCode;
