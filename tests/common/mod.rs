//! Integration test common infrastructure.
//!
//! Provides a recording role backend with call counters and fault injection,
//! and a helper for building a grant service around it.

#![allow(dead_code)]

use async_trait::async_trait;
use grantd::config::RolesConfig;
use grantd::grants::Assignment;
use grantd::{
    BackendError, ConfigAuthority, GrantService, GrantServiceParams, MemoryBackend, Principal,
    RoleBackend,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const ADMIN: Principal = Principal(1);
pub const ESSENTIAL_ROLE: u64 = 100;
pub const PRIME_ROLE: u64 = 200;

/// Backend that records every call and can be told to fail or stall.
#[derive(Default)]
pub struct RecordingBackend {
    inner: MemoryBackend,
    applies: AtomicUsize,
    removes: AtomicUsize,
    apply_failure: Mutex<Option<BackendError>>,
    remove_failure: Mutex<Option<BackendError>>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn applies(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.applies() + self.removes()
    }

    pub fn holds(&self, principal: Principal, assignment: &Assignment) -> bool {
        self.inner.holds(principal, assignment)
    }

    pub fn fail_applies(&self, err: Option<BackendError>) {
        *self.apply_failure.lock() = err;
    }

    pub fn fail_removes(&self, err: Option<BackendError>) {
        *self.remove_failure.lock() = err;
    }

    /// Make every call sleep first.
    pub fn stall(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    async fn maybe_stall(&self) {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RoleBackend for RecordingBackend {
    async fn apply(&self, principal: Principal, assignment: &Assignment) -> Result<(), BackendError> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        self.maybe_stall().await;
        let failure = self.apply_failure.lock().clone();
        if let Some(err) = failure {
            return Err(err);
        }
        self.inner.apply(principal, assignment).await
    }

    async fn remove(&self, principal: Principal, assignment: &Assignment) -> Result<(), BackendError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.maybe_stall().await;
        let failure = self.remove_failure.lock().clone();
        if let Some(err) = failure {
            return Err(err);
        }
        self.inner.remove(principal, assignment).await
    }
}

/// Grant service with [`ADMIN`] as the only administrator and both plans configured.
pub fn service(backend: Arc<RecordingBackend>) -> GrantService {
    service_with_timeout(backend, Duration::from_secs(10))
}

pub fn service_with_timeout(backend: Arc<RecordingBackend>, timeout: Duration) -> GrantService {
    GrantService::new(GrantServiceParams {
        authority: Arc::new(ConfigAuthority::new([ADMIN])),
        backend,
        roles: RolesConfig {
            essential: Some(ESSENTIAL_ROLE),
            prime: Some(PRIME_ROLE),
        },
        backend_timeout: timeout,
    })
}
