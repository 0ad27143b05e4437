//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters relevant to scanning and download orchestration.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{TelemetryError, TelemetryResult};

/// Outcome label values for the download counter.
pub const DOWNLOAD_OUTCOMES: [&str; 4] = ["started", "declined", "rejected", "cancelled"];

/// Prometheus-backed metrics registry shared across the session.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    scans_total: IntCounter,
    references_discovered_total: IntCounter,
    downloads_total: IntCounterVec,
    events_applied_total: IntCounterVec,
    cache_fallbacks_total: IntCounterVec,
}

/// Snapshot of the counters for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Completed graph scans.
    pub scans_total: u64,
    /// References reported across all scans.
    pub references_discovered_total: u64,
    /// Downloads accepted by the server.
    pub downloads_started: u64,
    /// Downloads abandoned at the override prompt.
    pub downloads_declined: u64,
    /// Downloads refused by the server or transport.
    pub downloads_rejected: u64,
    /// Downloads cancelled on request.
    pub downloads_cancelled: u64,
}

fn counter(name: &'static str, help: &str) -> TelemetryResult<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::CreateMetric { metric: name, source })
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> TelemetryResult<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::CreateMetric { metric: name, source })
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();

        let scans_total = counter("modelsync_scans_total", "Completed workflow graph scans")?;
        let references_discovered_total = counter(
            "modelsync_references_discovered_total",
            "Model references reported by scans",
        )?;
        let downloads_total = counter_vec(
            "modelsync_downloads_total",
            "Download start and cancel outcomes",
            &["outcome"],
        )?;
        let events_applied_total = counter_vec(
            "modelsync_events_applied_total",
            "Push events that changed tracked state, by kind",
            &["kind"],
        )?;
        let cache_fallbacks_total = counter_vec(
            "modelsync_cache_fallbacks_total",
            "Lookups that fell back to a default or unknown value",
            &["cache"],
        )?;

        let register = |name: &'static str, collector: Box<dyn prometheus::core::Collector>| {
            registry
                .register(collector)
                .map_err(|source| TelemetryError::RegisterMetric { metric: name, source })
        };
        register("modelsync_scans_total", Box::new(scans_total.clone()))?;
        register(
            "modelsync_references_discovered_total",
            Box::new(references_discovered_total.clone()),
        )?;
        register("modelsync_downloads_total", Box::new(downloads_total.clone()))?;
        register(
            "modelsync_events_applied_total",
            Box::new(events_applied_total.clone()),
        )?;
        register(
            "modelsync_cache_fallbacks_total",
            Box::new(cache_fallbacks_total.clone()),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                scans_total,
                references_discovered_total,
                downloads_total,
                events_applied_total,
                cache_fallbacks_total,
            }),
        })
    }

    /// Record a completed scan and the number of references it reported.
    pub fn record_scan(&self, references: usize) {
        self.inner.scans_total.inc();
        self.inner
            .references_discovered_total
            .inc_by(u64::try_from(references).unwrap_or(u64::MAX));
    }

    /// Increment the download counter for `outcome`.
    pub fn inc_download(&self, outcome: &str) {
        self.inner
            .downloads_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Increment the applied event counter for `kind`.
    pub fn inc_event(&self, kind: &str) {
        self.inner
            .events_applied_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Increment the fallback counter for the named cache.
    pub fn inc_cache_fallback(&self, cache: &str) {
        self.inner
            .cache_fallbacks_total
            .with_label_values(&[cache])
            .inc();
    }

    /// Fallback count recorded for the named cache.
    #[must_use]
    pub fn cache_fallbacks(&self, cache: &str) -> u64 {
        self.inner
            .cache_fallbacks_total
            .with_label_values(&[cache])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::RenderedText { source })
    }

    /// Take a point-in-time snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let downloads = |outcome: &str| {
            self.inner
                .downloads_total
                .with_label_values(&[outcome])
                .get()
        };
        MetricsSnapshot {
            scans_total: self.inner.scans_total.get(),
            references_discovered_total: self.inner.references_discovered_total.get(),
            downloads_started: downloads(DOWNLOAD_OUTCOMES[0]),
            downloads_declined: downloads(DOWNLOAD_OUTCOMES[1]),
            downloads_rejected: downloads(DOWNLOAD_OUTCOMES[2]),
            downloads_cancelled: downloads(DOWNLOAD_OUTCOMES[3]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> TelemetryResult<()> {
        let metrics = Metrics::new()?;
        metrics.record_scan(3);
        metrics.record_scan(2);
        metrics.inc_download("started");
        metrics.inc_download("declined");
        metrics.inc_download("cancelled");
        metrics.inc_event("progress");
        metrics.inc_cache_fallback("catalog");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.scans_total, 2);
        assert_eq!(snapshot.references_discovered_total, 5);
        assert_eq!(snapshot.downloads_started, 1);
        assert_eq!(snapshot.downloads_declined, 1);
        assert_eq!(snapshot.downloads_rejected, 0);
        assert_eq!(snapshot.downloads_cancelled, 1);
        assert_eq!(metrics.cache_fallbacks("catalog"), 1);

        let json = serde_json::to_value(&snapshot).expect("serialize snapshot");
        assert_eq!(json["scans_total"], 2);
        Ok(())
    }

    #[test]
    fn render_emits_text_exposition() -> TelemetryResult<()> {
        let metrics = Metrics::new()?;
        metrics.inc_event("completed");
        let rendered = metrics.render()?;
        assert!(rendered.contains("modelsync_events_applied_total"));
        assert!(rendered.contains("kind=\"completed\""));
        Ok(())
    }
}
