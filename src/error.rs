//! Unified error handling for grantd.
//!
//! Every caller-facing grant or revoke failure is a [`GrantError`], with a
//! static code for metrics and JSON and a human message for the notifier.

use crate::backend::BackendError;
use crate::grants::{Capability, DurationError, Principal};
use thiserror::Error;

// ============================================================================
// Grant Errors (caller-facing operations)
// ============================================================================

/// Errors returned from grant and revoke requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrantError {
    #[error("caller is not authorized")]
    Unauthorized,

    #[error(transparent)]
    InvalidDuration(#[from] DurationError),

    #[error("capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("backend refused to change {0}: insufficient privilege")]
    BackendForbidden(Capability),

    #[error("backend error: {0}")]
    BackendUnknown(String),

    #[error("{target} does not hold {capability}")]
    NotGranted {
        target: Principal,
        capability: Capability,
    },
}

impl GrantError {
    /// Map a failed `apply` call into the caller-facing taxonomy.
    pub fn from_apply(err: BackendError, capability: Capability) -> Self {
        match err {
            BackendError::Forbidden => Self::BackendForbidden(capability),
            BackendError::NotFound => Self::CapabilityNotFound(capability.to_string()),
            BackendError::Timeout(_) | BackendError::Unknown(_) => {
                Self::BackendUnknown(err.to_string())
            }
        }
    }

    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::InvalidDuration(_) => "invalid_duration",
            Self::CapabilityNotFound(_) => "capability_not_found",
            Self::BackendForbidden(_) => "backend_forbidden",
            Self::BackendUnknown(_) => "backend_unknown",
            Self::NotGranted { .. } => "not_granted",
        }
    }

    /// Message suitable for showing to the caller.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized => "You don't have permission to use this command.".to_string(),
            Self::InvalidDuration(_) => "Invalid duration. Use format: 5m, 2h, 1d, or inf".to_string(),
            Self::CapabilityNotFound(name) => format!("Could not find the {} role", name),
            Self::BackendForbidden(_) => "Bot doesn't have permission to assign roles".to_string(),
            Self::BackendUnknown(_) => "The role service failed; try again later".to_string(),
            Self::NotGranted { target, capability } => {
                format!("{} does not currently hold {}", target, capability)
            }
        }
    }
}
