//! Configuration loading and management.
//!
//! - [`types`]: config struct definitions and TOML loading
//! - [`validation`]: startup checks that report every problem at once

mod types;
pub mod validation;

pub use types::{
    AuthorityConfig, BackendConfig, Config, ConfigError, LogFormat, LoggingConfig, RolesConfig,
    ServiceConfig, StatusConfig,
};
pub use validation::{ValidationError, validate};
