//! Role-assignment backends.
//!
//! A [`RoleBackend`] performs the external side effect of a grant: adding or
//! removing a resolved [`Assignment`] on a principal. Calls are fallible and
//! the grant service bounds each one with a timeout.

pub mod memory;

pub use memory::MemoryBackend;

use crate::grants::{Assignment, Principal};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Backend failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The service account lacks rights to change this assignment.
    #[error("insufficient privilege")]
    Forbidden,
    /// The role or the principal does not exist. On removal this means the
    /// principal already lacks the capability.
    #[error("not found")]
    NotFound,
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Unknown(String),
}

impl BackendError {
    /// Static label for metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Timeout(_) => "timeout",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Which backend call is being made, for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOp {
    Apply,
    Remove,
}

impl BackendOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendOp::Apply => "apply",
            BackendOp::Remove => "remove",
        }
    }
}

/// External system that actually holds role assignments.
#[async_trait]
pub trait RoleBackend: Send + Sync {
    /// Give `assignment` to `principal`. Applying an assignment the principal
    /// already holds succeeds.
    async fn apply(&self, principal: Principal, assignment: &Assignment)
    -> Result<(), BackendError>;

    /// Take `assignment` away from `principal`. Returns
    /// [`BackendError::NotFound`] if the principal did not hold it.
    async fn remove(
        &self,
        principal: Principal,
        assignment: &Assignment,
    ) -> Result<(), BackendError>;
}
