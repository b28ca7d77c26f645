pub mod stream;

use std::time::Duration;

use chrono::{DateTime, Utc};
use fast_summary::{Dispatcher, Snapshot, Summary, SummaryOptions, SummaryResult};
use serde::Serialize;

use crate::AppState;

// ─── Configuration ───────────────────────────────────────────────

/// Quantiles reported for every summary, with their allowed rank error.
const QUANTILES: &[(f64, f64)] = &[(0.5, 0.05), (0.9, 0.01), (0.99, 0.001)];

/// Staggered sketches per window; rotation every `max_age / AGE_BUCKETS`.
const AGE_BUCKETS: u32 = 6;

// ─── Public types ────────────────────────────────────────────────

/// The summaries this server maintains.
/// The timing middleware and the load generator call `observe()`,
/// the metrics endpoints call `snapshot()`.
pub struct AppMetrics {
    /// Wall time of every HTTP request handled, in μs
    pub http: Summary,
    /// Samples produced by the synthetic load generator, in μs
    pub synthetic: Summary,
}

/// Complete snapshot shipped to the dashboard on every SSE tick.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub captured_at: DateTime<Utc>,
    pub http_request_duration_us: Snapshot,
    pub synthetic_latency_us: Snapshot,

    // Dispatcher health
    pub dispatcher_running: bool,
    pub pending_requests: usize,
}

impl AppMetrics {
    pub fn register(dispatcher: &Dispatcher, max_age: Duration) -> SummaryResult<Self> {
        let options = QUANTILES.iter().fold(
            SummaryOptions::default()
                .with_max_age(max_age)
                .with_age_buckets(AGE_BUCKETS),
            |options, &(q, err)| options.with_quantile(q, err),
        );

        Ok(Self {
            http: dispatcher.register(options.clone())?,
            synthetic: dispatcher.register(options)?,
        })
    }
}

impl MetricsSnapshot {
    /// Blocks on two dispatcher round trips; call through `block_in_place`
    /// from async code.
    pub fn capture(state: &AppState) -> Self {
        Self {
            captured_at: Utc::now(),
            http_request_duration_us: state.metrics.http.snapshot(),
            synthetic_latency_us: state.metrics.synthetic.snapshot(),
            dispatcher_running: state.dispatcher.is_running(),
            pending_requests: state.dispatcher.pending_requests(),
        }
    }
}
