//! Authorization checks.
//!
//! [`AuthorizationCheck`] is the single place that decides whether a caller
//! may grant, revoke, or invoke commands. The grant service never inspects
//! role membership itself.

use crate::grants::{Capability, Principal};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, trace};

/// Something a caller is attempting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Grant(Capability),
    Revoke(Capability),
    /// Use the bot's general commands.
    Invoke,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Grant(c) => write!(f, "grant:{}", c),
            Action::Revoke(c) => write!(f, "revoke:{}", c),
            Action::Invoke => f.write_str("invoke"),
        }
    }
}

/// Decides whether a caller may perform an action. Must be side-effect free.
pub trait AuthorizationCheck: Send + Sync {
    fn is_authorized(&self, caller: Principal, action: Action) -> bool;
}

/// Authorization from the configured administrator list.
///
/// Administrators may do everything; nobody else may grant or revoke.
#[derive(Debug, Clone, Default)]
pub struct ConfigAuthority {
    admins: HashSet<Principal>,
}

impl ConfigAuthority {
    pub fn new(admins: impl IntoIterator<Item = Principal>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    pub fn is_admin(&self, principal: Principal) -> bool {
        self.admins.contains(&principal)
    }
}

impl AuthorizationCheck for ConfigAuthority {
    fn is_authorized(&self, caller: Principal, action: Action) -> bool {
        let allowed = self.is_admin(caller);
        if allowed {
            debug!(caller = %caller, action = %action, "Action authorized");
        } else {
            trace!(caller = %caller, action = %action, "Action denied");
        }
        allowed
    }
}
