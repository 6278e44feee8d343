pub mod error;
pub mod utils;

pub use error::{DeskError, Field, Result};
