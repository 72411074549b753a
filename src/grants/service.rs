//! Grant orchestration.
//!
//! [`GrantService`] runs authorize → parse → resolve → backend apply →
//! record/arm for grants, and the inverse for revokes. Every sequence that
//! touches a key runs under that key's lock from [`GrantStore::lock`], and
//! timer callbacks only act on the grant id they were armed for, so:
//!
//! - a regrant can never be revoked by the timer of the grant it replaced
//! - a manual revoke racing an expiry removes the grant (and calls the
//!   backend) exactly once

use super::duration::{self, GrantDuration};
use super::scheduler::{CancelOutcome, ExpiryHandle, ExpiryScheduler};
use super::store::GrantStore;
use super::types::{Assignment, Capability, Expiry, Grant, GrantId, GrantKey, Principal};
use crate::authority::{Action, AuthorizationCheck};
use crate::backend::{BackendError, BackendOp, RoleBackend};
use crate::config::RolesConfig;
use crate::error::GrantError;
use crate::metrics;
use crate::status::StatusSnapshot;
use crate::telemetry::spans;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, error, info, warn};

/// Successful grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Granted {
    pub target: Principal,
    pub capability: Capability,
    /// Human description of the duration (`5m`, `permanent`).
    pub duration: String,
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether an earlier grant for the same key was replaced.
    pub replaced: bool,
}

/// Successful revoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Revoked {
    Clean {
        target: Principal,
        capability: Capability,
    },
    /// The grant is gone but the backend removal failed.
    WithWarning {
        target: Principal,
        capability: Capability,
        warning: String,
    },
}

impl Revoked {
    pub fn is_clean(&self) -> bool {
        matches!(self, Revoked::Clean { .. })
    }
}

/// Collaborators and settings for a [`GrantService`].
pub struct GrantServiceParams {
    pub authority: Arc<dyn AuthorizationCheck>,
    pub backend: Arc<dyn RoleBackend>,
    pub roles: RolesConfig,
    /// Upper bound for each backend call.
    pub backend_timeout: Duration,
}

/// Grants and revokes capabilities with scheduled expiry.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct GrantService {
    inner: Arc<Inner>,
}

struct Inner {
    store: GrantStore,
    scheduler: ExpiryScheduler,
    authority: Arc<dyn AuthorizationCheck>,
    backend: Arc<dyn RoleBackend>,
    roles: RolesConfig,
    backend_timeout: Duration,
    next_grant_id: AtomicU64,
}

impl GrantService {
    pub fn new(params: GrantServiceParams) -> Self {
        let GrantServiceParams {
            authority,
            backend,
            roles,
            backend_timeout,
        } = params;

        Self {
            inner: Arc::new(Inner {
                store: GrantStore::new(),
                scheduler: ExpiryScheduler::new(),
                authority,
                backend,
                roles,
                backend_timeout,
                next_grant_id: AtomicU64::new(1),
            }),
        }
    }

    /// Grant `capability` to `target` for `duration_text`.
    pub async fn grant(
        &self,
        caller: Principal,
        target: Principal,
        duration_text: &str,
        capability: Capability,
    ) -> Result<Granted, GrantError> {
        let span = spans::request("grant", caller, target, capability);
        let result = self
            .grant_inner(caller, target, duration_text, capability)
            .instrument(span)
            .await;
        if let Err(e) = &result {
            metrics::record_error("grant", e.error_code());
        }
        result
    }

    async fn grant_inner(
        &self,
        caller: Principal,
        target: Principal,
        duration_text: &str,
        capability: Capability,
    ) -> Result<Granted, GrantError> {
        let inner = &self.inner;

        if !inner.authority.is_authorized(caller, Action::Grant(capability)) {
            return Err(GrantError::Unauthorized);
        }
        let duration = duration::parse(duration_text)?;
        let assignment = inner
            .resolve(capability)
            .ok_or_else(|| GrantError::CapabilityNotFound(capability.to_string()))?;

        let key = GrantKey::new(target, capability);
        let _guard = inner.store.lock(key).await;

        inner
            .call_backend(BackendOp::Apply, inner.backend.apply(target, &assignment))
            .await
            .map_err(|e| GrantError::from_apply(e, capability))?;

        // Cancel the old timer before arming the new one. If it already fired,
        // its callback is blocked on our lock and will find a different id.
        let prior = inner.store.remove(&key);
        if let Some(timer) = prior.as_ref().and_then(|g| g.timer.as_ref()) {
            let outcome = inner.scheduler.cancel(timer);
            debug!(outcome = ?outcome, "Prior expiry timer cancelled");
        }

        let id = GrantId(inner.next_grant_id.fetch_add(1, Ordering::Relaxed));
        let granted_at = Utc::now();
        let (expiry, timer) = match duration {
            GrantDuration::Infinite => (Expiry::Never, None),
            GrantDuration::Finite(after) => {
                let at = chrono::Duration::from_std(after)
                    .ok()
                    .and_then(|d| granted_at.checked_add_signed(d))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                (Expiry::At(at), Some(self.arm_expiry(key, id, after)))
            }
        };

        let grant = Grant {
            id,
            key,
            assignment,
            granted_at,
            expiry,
            timer,
        };
        let expires_at = grant.expires_at();
        inner.store.put(grant);

        metrics::record_grant(capability.name());
        metrics::set_active_grants(inner.store.count());
        info!(
            duration = %duration,
            replaced = prior.is_some(),
            "Capability granted"
        );

        Ok(Granted {
            target,
            capability,
            duration: duration.to_string(),
            expires_at,
            replaced: prior.is_some(),
        })
    }

    /// Revoke `target`'s grant of `capability` ahead of its expiry.
    pub async fn revoke(
        &self,
        caller: Principal,
        target: Principal,
        capability: Capability,
    ) -> Result<Revoked, GrantError> {
        let span = spans::request("revoke", caller, target, capability);
        let result = self
            .revoke_inner(caller, target, capability)
            .instrument(span)
            .await;
        if let Err(e) = &result {
            metrics::record_error("revoke", e.error_code());
        }
        result
    }

    async fn revoke_inner(
        &self,
        caller: Principal,
        target: Principal,
        capability: Capability,
    ) -> Result<Revoked, GrantError> {
        let inner = &self.inner;

        if !inner.authority.is_authorized(caller, Action::Revoke(capability)) {
            return Err(GrantError::Unauthorized);
        }

        let key = GrantKey::new(target, capability);
        let _guard = inner.store.lock(key).await;

        let grant = inner
            .store
            .remove(&key)
            .ok_or(GrantError::NotGranted { target, capability })?;
        if let Some(timer) = &grant.timer
            && inner.scheduler.cancel(timer) == CancelOutcome::AlreadyFired
        {
            // Fired but blocked on our lock; it will find the key empty
            debug!("Expiry already fired, revoking manually");
        }

        metrics::record_revocation(capability.name(), "manual");
        metrics::set_active_grants(inner.store.count());

        match inner.remove_assignment(target, &grant.assignment).await {
            Ok(()) => {
                info!("Capability revoked");
                Ok(Revoked::Clean { target, capability })
            }
            Err(e) => {
                warn!(error = %e, "Capability revoked but backend removal failed");
                metrics::record_error("revoke", e.error_code());
                Ok(Revoked::WithWarning {
                    target,
                    capability,
                    warning: e.to_string(),
                })
            }
        }
    }

    /// Whether `principal` may use general commands: administrators and
    /// anyone currently holding a grant.
    pub fn may_invoke(&self, principal: Principal) -> bool {
        self.inner.authority.is_authorized(principal, Action::Invoke)
            || self.inner.store.holds_any(principal)
    }

    /// Inspect the active grant for a key.
    pub fn get(&self, target: Principal, capability: Capability) -> Option<Grant> {
        self.inner.store.get(&GrantKey::new(target, capability))
    }

    pub fn active_grants(&self) -> usize {
        self.inner.store.count()
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.scheduler.pending()
    }

    /// Read-only status for external reporting.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            active_grants: self.inner.store.count(),
            by_capability: self
                .inner
                .store
                .count_by_kind()
                .into_iter()
                .map(|(c, n)| (c.name().to_string(), n))
                .collect(),
            pending_timers: self.inner.scheduler.pending(),
            generated_at: Utc::now(),
        }
    }

    /// Reclaim per-key lock entries nobody holds.
    pub fn prune_idle_locks(&self) -> usize {
        self.inner.store.prune_idle_locks()
    }

    /// Cancel all pending expiry timers. Grants stay recorded.
    pub fn shutdown(&self) -> usize {
        self.inner.scheduler.shutdown()
    }

    fn arm_expiry(&self, key: GrantKey, id: GrantId, after: Duration) -> ExpiryHandle {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.scheduler.arm(after, move || async move {
            if let Some(inner) = weak.upgrade() {
                inner
                    .expire(key, id)
                    .instrument(spans::expiry(key.principal, key.capability))
                    .await;
            }
        })
    }
}

impl Inner {
    fn resolve(&self, capability: Capability) -> Option<Assignment> {
        match capability {
            Capability::Plan(plan) => self.roles.role_for(plan).map(Assignment::Role),
            Capability::CommandAccess => Some(Assignment::CommandAccess),
        }
    }

    /// Revoke-on-expiry. Never surfaces errors; there is no caller waiting.
    async fn expire(&self, key: GrantKey, id: GrantId) {
        let _guard = self.store.lock(key).await;

        let Some(grant) = self.store.remove_if_current(&key, id) else {
            debug!("Expired grant already replaced or revoked");
            return;
        };
        metrics::record_revocation(key.capability.name(), "expired");
        metrics::set_active_grants(self.store.count());

        match self.remove_assignment(key.principal, &grant.assignment).await {
            Ok(()) => info!("Capability removed after timeout"),
            Err(e) => {
                metrics::record_error("expire", e.error_code());
                error!(error = %e, "Failed to remove capability after timeout");
            }
        }
    }

    /// Backend removal where "already absent" counts as success.
    async fn remove_assignment(
        &self,
        principal: Principal,
        assignment: &Assignment,
    ) -> Result<(), BackendError> {
        match self
            .call_backend(BackendOp::Remove, self.backend.remove(principal, assignment))
            .await
        {
            Err(BackendError::NotFound) => {
                debug!("Principal already lacked the capability");
                Ok(())
            }
            other => other,
        }
    }

    async fn call_backend<F>(&self, op: BackendOp, call: F) -> Result<(), BackendError>
    where
        F: Future<Output = Result<(), BackendError>>,
    {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.backend_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.backend_timeout)),
        };
        metrics::observe_backend(op.as_str(), start.elapsed().as_secs_f64());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::ConfigAuthority;
    use crate::backend::MemoryBackend;
    use crate::grants::{Plan, RoleId};

    const ADMIN: Principal = Principal(1);
    const USER: Principal = Principal(42);

    fn service(backend: Arc<MemoryBackend>) -> GrantService {
        GrantService::new(GrantServiceParams {
            authority: Arc::new(ConfigAuthority::new([ADMIN])),
            backend,
            roles: RolesConfig {
                essential: Some(10),
                prime: None,
            },
            backend_timeout: Duration::from_secs(5),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn timed_grant_expires() {
        let backend = Arc::new(MemoryBackend::new());
        let svc = service(Arc::clone(&backend));
        let essential = Capability::Plan(Plan::Essential);

        let granted = svc.grant(ADMIN, USER, "5m", essential).await.expect("grant");
        assert_eq!(granted.duration, "5m");
        assert!(granted.expires_at.is_some());
        assert!(backend.holds(USER, &Assignment::Role(RoleId(10))));
        assert!(svc.get(USER, essential).is_some_and(|g| g.has_timer()));
        assert!(svc.may_invoke(USER));

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(svc.get(USER, essential).is_none());
        assert!(!backend.holds(USER, &Assignment::Role(RoleId(10))));
        assert_eq!(svc.pending_timers(), 0);
        assert!(!svc.may_invoke(USER));
    }

    #[tokio::test]
    async fn unconfigured_plan_is_not_found() {
        let backend = Arc::new(MemoryBackend::new());
        let svc = service(Arc::clone(&backend));
        let err = svc
            .grant(ADMIN, USER, "1h", Capability::Plan(Plan::Prime))
            .await
            .expect_err("prime is not configured");
        assert_eq!(err, GrantError::CapabilityNotFound("prime".to_string()));
        assert_eq!(backend.principal_count(), 0);
    }

    #[tokio::test]
    async fn invalid_duration_has_no_side_effects() {
        let backend = Arc::new(MemoryBackend::new());
        let svc = service(Arc::clone(&backend));
        let err = svc
            .grant(ADMIN, USER, "soon", Capability::CommandAccess)
            .await
            .expect_err("bad duration");
        assert_eq!(err.error_code(), "invalid_duration");
        assert_eq!(svc.active_grants(), 0);
        assert_eq!(backend.principal_count(), 0);
    }

    #[tokio::test]
    async fn admins_may_always_invoke() {
        let svc = service(Arc::new(MemoryBackend::new()));
        assert!(svc.may_invoke(ADMIN));
        assert!(!svc.may_invoke(USER));
    }

    #[tokio::test]
    async fn snapshot_counts_by_capability() {
        let svc = service(Arc::new(MemoryBackend::new()));
        svc.grant(ADMIN, USER, "inf", Capability::CommandAccess).await.expect("grant");
        svc.grant(ADMIN, USER, "1d", Capability::Plan(Plan::Essential)).await.expect("grant");

        let snap = svc.snapshot();
        assert_eq!(snap.active_grants, 2);
        assert_eq!(snap.pending_timers, 1);
        assert_eq!(snap.by_capability["command-access"], 1);
        assert_eq!(snap.by_capability["essential"], 1);
        assert_eq!(snap.by_capability["prime"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_expires_immediately() {
        let backend = Arc::new(MemoryBackend::new());
        let svc = service(Arc::clone(&backend));
        svc.grant(ADMIN, USER, "0", Capability::CommandAccess).await.expect("grant");

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(svc.get(USER, Capability::CommandAccess).is_none());
        assert_eq!(backend.principal_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_timers_but_keeps_grants() {
        let backend = Arc::new(MemoryBackend::new());
        let svc = service(Arc::clone(&backend));
        svc.grant(ADMIN, USER, "1h", Capability::CommandAccess).await.expect("grant");

        assert_eq!(svc.shutdown(), 1);
        assert_eq!(svc.pending_timers(), 0);

        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert!(svc.get(USER, Capability::CommandAccess).is_some());
        assert!(backend.holds(USER, &Assignment::CommandAccess));
    }
}
