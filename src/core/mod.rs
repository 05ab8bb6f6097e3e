/// Core Module for rowgate
///
/// Shared infrastructure the table gateway is built on: the connection
/// layer, the value model and the error type.

pub mod db;
pub mod error;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{Result, RowgateError};
pub use value::{Attributes, Value};
