//! Core utilities: configuration, errors, logging, money and export

pub mod amount;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;

// Re-exports for convenience
pub use config::Settings;
pub use error::{AppError, AppResult, DeliveryError};
pub use logging::init_logger;
