//! grantd - temporary role and permission grants with scheduled expiry.
//!
//! Grants a principal a capability (a plan role or the bare command
//! permission) for a bounded or unbounded duration, revokes it when the
//! duration elapses, and lets administrators revoke early, cancelling the
//! pending expiry.

pub mod authority;
pub mod backend;
pub mod config;
pub mod error;
pub mod grants;
pub mod http;
pub mod metrics;
pub mod notify;
pub mod status;
pub mod telemetry;

pub use authority::{Action, AuthorizationCheck, ConfigAuthority};
pub use backend::{BackendError, MemoryBackend, RoleBackend};
pub use error::GrantError;
pub use grants::{Capability, GrantService, GrantServiceParams, Granted, Plan, Principal, Revoked};
pub use notify::{Notifier, Report, TracingNotifier};
