//! Outcome reporting.
//!
//! The caller-facing layer reports the result of every grant and revoke
//! request through a [`Notifier`] before rendering it.

use crate::error::GrantError;
use crate::grants::{Granted, Principal, Revoked};
use async_trait::async_trait;
use tracing::{info, warn};

/// The result of a caller's request.
#[derive(Debug, Clone, Copy)]
pub enum Report<'a> {
    Granted(&'a Granted),
    Revoked(&'a Revoked),
    Failed(&'a GrantError),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn report(&self, caller: Principal, report: Report<'_>);
}

/// Notifier that writes outcomes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn report(&self, caller: Principal, report: Report<'_>) {
        match report {
            Report::Granted(g) => info!(
                caller = %caller,
                target = %g.target,
                capability = %g.capability,
                duration = %g.duration,
                replaced = g.replaced,
                "Grant issued"
            ),
            Report::Revoked(Revoked::Clean { target, capability }) => info!(
                caller = %caller,
                target = %target,
                capability = %capability,
                "Grant revoked"
            ),
            Report::Revoked(Revoked::WithWarning {
                target,
                capability,
                warning,
            }) => warn!(
                caller = %caller,
                target = %target,
                capability = %capability,
                warning = %warning,
                "Grant revoked, backend removal failed"
            ),
            Report::Failed(err) => info!(
                caller = %caller,
                code = err.error_code(),
                error = %err,
                "Request rejected"
            ),
        }
    }
}
