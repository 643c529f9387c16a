pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use config::{AppConfig, FetchConfig, MatchingConfig};
pub use error::{ChroniqueError, Result};
pub use models::*;

pub use storage::database::Database;
