//! Metrics collection and export module

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub batches_built: IntCounter,
    pub txs_submitted: IntCounter,
    pub txs_confirmed: IntCounter,
    pub txs_retried: IntCounter,
    pub txs_skipped: IntCounter,
    pub txs_resent: IntCounter,

    // Histograms
    pub broadcast_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let batches_built = IntCounter::with_opts(Opts::new(
            "batches_built_total",
            "Number of batch transactions built",
        ))?;
        let txs_submitted = IntCounter::with_opts(Opts::new(
            "txs_submitted_total",
            "Number of transactions accepted into the mempool",
        ))?;
        let txs_confirmed = IntCounter::with_opts(Opts::new(
            "txs_confirmed_total",
            "Number of transactions confirmed in a block",
        ))?;
        let txs_retried = IntCounter::with_opts(Opts::new(
            "txs_retried_total",
            "Number of transient submission errors retried",
        ))?;
        let txs_skipped = IntCounter::with_opts(Opts::new(
            "txs_skipped_total",
            "Number of transactions skipped as already pending in the mempool",
        ))?;
        let txs_resent = IntCounter::with_opts(Opts::new(
            "txs_resent_total",
            "Number of batches rebuilt and resent after missing inclusion",
        ))?;

        let broadcast_latency = Histogram::with_opts(
            HistogramOpts::new(
                "broadcast_latency_seconds",
                "Submit-to-confirmation latency per transaction",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 35.0, 60.0]),
        )?;

        registry.register(Box::new(batches_built.clone()))?;
        registry.register(Box::new(txs_submitted.clone()))?;
        registry.register(Box::new(txs_confirmed.clone()))?;
        registry.register(Box::new(txs_retried.clone()))?;
        registry.register(Box::new(txs_skipped.clone()))?;
        registry.register(Box::new(txs_resent.clone()))?;
        registry.register(Box::new(broadcast_latency.clone()))?;

        Ok(Self {
            registry,
            batches_built,
            txs_submitted,
            txs_confirmed,
            txs_retried,
            txs_skipped,
            txs_resent,
            broadcast_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("failed to initialize metrics"));
    &METRICS
}
