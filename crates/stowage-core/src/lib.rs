//! Stowage Core Library
//!
//! This crate provides the deployment mode, configuration and error types
//! that are shared across all Stowage components.

pub mod config;
pub mod error;
pub mod mode;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use mode::{DeploymentMode, EnvironmentMode, FixedMode, ModeSelection, ModeSource};
