//! Configuration module for powerscope.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (port, bind address)
//! - Sampler settings (facility command, sudo, metric namespace)
//! - Shutdown timeout

mod app;
mod validation;

pub use app::{AppConfig, ServerConfig};
pub use validation::{ConfigError, is_valid_metric_name};
