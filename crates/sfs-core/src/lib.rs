pub mod config;
pub mod error;
pub mod types;

pub use error::{ErrorKind, SfsError, SfsResult};
pub use types::{unix_now, FileId, GrantId, UserId};
