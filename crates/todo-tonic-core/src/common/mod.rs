pub mod error;
pub mod proto;
pub mod types;

pub use error::{Error, Result};
