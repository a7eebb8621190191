pub mod config;
pub mod error;
pub mod event;
pub mod kernel;
pub mod planner;
pub mod services;

// Re-export specific items for convenient access
pub use config::Settings;
pub use error::{Error, ErrorKind, Result};
pub use kernel::orchestrator::Orchestrator;
