//! Prometheus metrics for grantd.
//!
//! - `grantd_grants_total{capability}` - grants issued
//! - `grantd_revocations_total{capability,reason}` - grants ended (manual/expired)
//! - `grantd_operation_errors_total{operation,error}` - rejected requests and backend failures
//! - `grantd_active_grants` - grants currently held
//! - `grantd_backend_duration_seconds{operation}` - backend call latency
//!
//! Recording before [`init`] is a no-op.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

pub static GRANTS_ISSUED: OnceLock<IntCounterVec> = OnceLock::new();

pub static REVOCATIONS: OnceLock<IntCounterVec> = OnceLock::new();

pub static OPERATION_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges and histograms
// ========================================================================

pub static ACTIVE_GRANTS: OnceLock<IntGauge> = OnceLock::new();

pub static BACKEND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before metrics are scraped.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(GRANTS_ISSUED, IntCounterVec::new(Opts::new("grantd_grants_total", "Grants issued"), &["capability"]));
    register!(REVOCATIONS, IntCounterVec::new(Opts::new("grantd_revocations_total", "Grants ended"), &["capability", "reason"]));
    register!(OPERATION_ERRORS, IntCounterVec::new(Opts::new("grantd_operation_errors_total", "Failed grant operations"), &["operation", "error"]));
    register!(ACTIVE_GRANTS, IntGauge::new("grantd_active_grants", "Grants currently held"));
    register!(BACKEND_LATENCY, HistogramVec::new(
        HistogramOpts::new("grantd_backend_duration_seconds", "Role backend call latency")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        &["operation"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

#[inline]
pub fn record_grant(capability: &str) {
    if let Some(c) = GRANTS_ISSUED.get() {
        c.with_label_values(&[capability]).inc();
    }
}

#[inline]
pub fn record_revocation(capability: &str, reason: &str) {
    if let Some(c) = REVOCATIONS.get() {
        c.with_label_values(&[capability, reason]).inc();
    }
}

#[inline]
pub fn record_error(operation: &str, error: &str) {
    if let Some(c) = OPERATION_ERRORS.get() {
        c.with_label_values(&[operation, error]).inc();
    }
}

#[inline]
pub fn set_active_grants(count: usize) {
    if let Some(g) = ACTIVE_GRANTS.get() {
        g.set(count as i64);
    }
}

#[inline]
pub fn observe_backend(operation: &str, duration_secs: f64) {
    if let Some(h) = BACKEND_LATENCY.get() {
        h.with_label_values(&[operation]).observe(duration_secs);
    }
}
