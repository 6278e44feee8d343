pub mod api;
pub mod config;
#[cfg(feature = "directory")]
pub mod directory;
pub mod feed;
pub mod notifications;
pub mod session;
pub mod shared;
pub mod shell;
pub mod tickets;

pub use shared::utils::init_logging;
pub use shared::{DeskError, Result};
