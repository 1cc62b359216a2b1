//! # Webring Checker
//!
//! 环站成员站点的可用性检查服务

pub mod checker;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod notify;
pub mod storage;
pub mod testing;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{CheckerError, Result};
