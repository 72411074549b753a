//! In-process role backend.
//!
//! Keeps assignments in a `DashMap` keyed by principal. The daemon uses it as
//! the authoritative set of permitted principals and plan holders; tests use
//! it as the fake external system.

use super::{BackendError, RoleBackend};
use crate::grants::{Assignment, Principal, RoleId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    /// Roles that exist. `None` accepts any role id.
    known_roles: Option<HashSet<RoleId>>,
    assignments: DashMap<Principal, HashSet<Assignment>>,
}

impl MemoryBackend {
    /// A backend that accepts any role id.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that only knows the given roles; applying any other role
    /// fails with [`BackendError::NotFound`].
    pub fn with_roles(roles: impl IntoIterator<Item = RoleId>) -> Self {
        Self {
            known_roles: Some(roles.into_iter().collect()),
            assignments: DashMap::new(),
        }
    }

    pub fn holds(&self, principal: Principal, assignment: &Assignment) -> bool {
        self.assignments
            .get(&principal)
            .is_some_and(|set| set.contains(assignment))
    }

    /// Number of principals holding at least one assignment.
    pub fn principal_count(&self) -> usize {
        self.assignments.len()
    }
}

#[async_trait]
impl RoleBackend for MemoryBackend {
    async fn apply(
        &self,
        principal: Principal,
        assignment: &Assignment,
    ) -> Result<(), BackendError> {
        if let (Assignment::Role(role), Some(known)) = (assignment, &self.known_roles)
            && !known.contains(role)
        {
            return Err(BackendError::NotFound);
        }
        self.assignments
            .entry(principal)
            .or_default()
            .insert(*assignment);
        debug!(principal = %principal, assignment = %assignment, "Assignment applied");
        Ok(())
    }

    async fn remove(
        &self,
        principal: Principal,
        assignment: &Assignment,
    ) -> Result<(), BackendError> {
        let mut removed = false;
        self.assignments.remove_if_mut(&principal, |_, set| {
            removed = set.remove(assignment);
            set.is_empty()
        });
        if !removed {
            return Err(BackendError::NotFound);
        }
        debug!(principal = %principal, assignment = %assignment, "Assignment removed");
        Ok(())
    }
}
