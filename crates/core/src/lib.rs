pub mod data;
pub mod error;
pub mod genetics;
pub mod prob;
pub mod types;

pub use error::{ErrorKind, MpError, Result};
