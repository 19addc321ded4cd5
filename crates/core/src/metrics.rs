//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Conversion jobs (results, error categories, durations)
//! - Engine processes currently running
//! - Workspace cleanup

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

use crate::converter::{ConversionResult, EbookFormat};

/// Conversions total by result and error kind.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("inkpress_conversions_total", "Total ebook conversions"),
        &["result", "error_kind"], // "success"/"failed", "none"/"engine"/...
    )
    .unwrap()
});

/// Conversion duration in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "inkpress_conversion_duration_seconds",
            "Duration of ebook conversions",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["format", "result"],
    )
    .unwrap()
});

/// Engine processes currently running.
pub static ENGINE_PROCESSES_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "inkpress_engine_processes_active",
        "Number of conversion engine processes currently running",
    )
    .unwrap()
});

/// Engine processes killed after exceeding their timeout.
pub static ENGINE_TIMEOUTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "inkpress_engine_timeouts_total",
        "Engine processes killed after timing out",
    )
    .unwrap()
});

/// Stale workspaces removed by the start-up sweep.
pub static WORKSPACES_SWEPT: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "inkpress_workspaces_swept_total",
        "Stale workspaces removed at start-up",
    )
    .unwrap()
});

/// Records the outcome of a finished job.
pub fn record_conversion(format: EbookFormat, result: &ConversionResult) {
    let outcome = if result.success { "success" } else { "failed" };
    let kind = result.error_kind.map(|k| k.as_str()).unwrap_or("none");
    CONVERSIONS_TOTAL.with_label_values(&[outcome, kind]).inc();
    CONVERSION_DURATION
        .with_label_values(&[format.extension(), outcome])
        .observe(result.duration_ms as f64 / 1000.0);
}

/// Keeps [`ENGINE_PROCESSES_ACTIVE`] accurate even when the owning future is dropped.
pub(crate) struct ActiveEngineGuard;

impl ActiveEngineGuard {
    pub(crate) fn new() -> Self {
        ENGINE_PROCESSES_ACTIVE.inc();
        Self
    }
}

impl Drop for ActiveEngineGuard {
    fn drop(&mut self) {
        ENGINE_PROCESSES_ACTIVE.dec();
    }
}

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(ENGINE_PROCESSES_ACTIVE.clone()),
        Box::new(ENGINE_TIMEOUTS.clone()),
        Box::new(WORKSPACES_SWEPT.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_registrable() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
    }
}
