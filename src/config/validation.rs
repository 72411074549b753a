//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use crate::grants::Plan;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("service.name is required")]
    MissingServiceName,
    #[error("authority.admins is empty; nobody could grant or revoke")]
    NoAdmins,
    #[error("backend.timeout_secs must be greater than 0")]
    ZeroBackendTimeout,
    #[error("status.interval_secs must be greater than 0")]
    ZeroStatusInterval,
    #[error("status.path parent directory does not exist: {0}")]
    StatusPathInvalid(String),
    #[error("roles.essential and roles.prime both use role {0}")]
    DuplicateRoleId(u64),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::MissingServiceName);
    }
    if config.authority.admins.is_empty() {
        errors.push(ValidationError::NoAdmins);
    }
    if config.backend.timeout_secs == 0 {
        errors.push(ValidationError::ZeroBackendTimeout);
    }
    if config.status.interval_secs == 0 {
        errors.push(ValidationError::ZeroStatusInterval);
    }

    // Plans sharing a role would let revoking one strip the other
    if let (Some(essential), Some(prime)) = (
        config.roles.role_for(Plan::Essential),
        config.roles.role_for(Plan::Prime),
    ) && essential == prime
    {
        errors.push(ValidationError::DuplicateRoleId(essential.0));
    }

    if let Some(parent) = config.status.path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        errors.push(ValidationError::StatusPathInvalid(
            config.status.path.display().to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
