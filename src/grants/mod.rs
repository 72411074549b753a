//! Temporary grants.
//!
//! - [`duration`]: `5m` / `2h` / `1d` / `inf` parsing
//! - [`types`]: principals, capabilities and grant records
//! - [`store`]: the authoritative grant map with key-scoped locks
//! - [`scheduler`]: cancellable expiry timers
//! - [`service`]: the grant/revoke orchestration on top of all of the above

pub mod duration;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod types;

pub use duration::{DurationError, GrantDuration};
pub use scheduler::{CancelOutcome, ExpiryHandle, ExpiryScheduler, TimerState};
pub use service::{GrantService, GrantServiceParams, Granted, Revoked};
pub use store::GrantStore;
pub use types::{
    Assignment, Capability, CapabilityParseError, Expiry, Grant, GrantId, GrantKey, Plan,
    Principal, PrincipalParseError, RoleId,
};
