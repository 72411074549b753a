//! Logging setup and span helpers.

use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default `info` filter.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().flatten_event(true).init(),
    }
}

/// Standardized span constructors for grant operations.
pub mod spans {
    use crate::grants::{Capability, Principal};
    use tracing::{Span, info_span};

    /// Span for a caller-initiated grant or revoke.
    pub fn request(operation: &'static str, caller: Principal, target: Principal, capability: Capability) -> Span {
        info_span!(
            "request",
            op = operation,
            caller = %caller,
            target = %target,
            capability = %capability
        )
    }

    /// Span for a timer-driven revocation.
    pub fn expiry(target: Principal, capability: Capability) -> Span {
        info_span!("expiry", target = %target, capability = %capability)
    }
}
