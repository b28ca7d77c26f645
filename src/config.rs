use std::time::Duration;

use crossbeam::utils::Backoff;
use serde::{Deserialize, Serialize};

use crate::error::{SummaryError, SummaryResult};

// ─── Summary options ─────────────────────────────────────────────

/// A target quantile and the rank error the sketch may make for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantileSpec {
    /// e.g. 0.99 for the 99th percentile
    pub quantile: f64,
    /// e.g. 0.001 for ±0.1% rank error
    pub error: f64,
}

impl QuantileSpec {
    pub fn new(quantile: f64, error: f64) -> Self {
        Self { quantile, error }
    }

    pub fn validate(&self) -> SummaryResult<()> {
        if !in_unit_interval(self.quantile) {
            return Err(SummaryError::InvalidQuantile(self.quantile));
        }
        if !in_unit_interval(self.error) {
            return Err(SummaryError::InvalidError {
                quantile: self.quantile,
                error: self.error,
            });
        }
        Ok(())
    }
}

fn in_unit_interval(x: f64) -> bool {
    x > 0.0 && x < 1.0
}

/// Which sketch backs each age bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SketchKind {
    /// Targeted-quantile CKMS; honours each quantile's allowed error.
    #[default]
    Ckms,
    /// HdrHistogram; values are multiplied by `scale` and stored as integers.
    Hdr {
        #[serde(default = "default_scale")]
        scale: f64,
    },
}

fn default_scale() -> f64 {
    1.0
}

/// Everything needed to create one summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryOptions {
    /// Quantiles to track. Empty means count and sum only.
    #[serde(default)]
    pub quantiles: Vec<QuantileSpec>,

    /// Length of the trailing window quantiles are computed over
    #[serde(default = "default_max_age_ms")]
    pub max_age_ms: u64,

    /// Number of staggered sketches the window is split into
    #[serde(default = "default_age_buckets")]
    pub age_buckets: u32,

    #[serde(default)]
    pub sketch: SketchKind,
}

fn default_max_age_ms() -> u64 {
    10 * 60 * 1_000
}
fn default_age_buckets() -> u32 {
    5
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            quantiles: Vec::new(),
            max_age_ms: default_max_age_ms(),
            age_buckets: default_age_buckets(),
            sketch: SketchKind::default(),
        }
    }
}

impl SummaryOptions {
    pub fn with_quantile(mut self, quantile: f64, error: f64) -> Self {
        self.quantiles.push(QuantileSpec::new(quantile, error));
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age_ms = max_age.as_millis() as u64;
        self
    }

    pub fn with_age_buckets(mut self, age_buckets: u32) -> Self {
        self.age_buckets = age_buckets;
        self
    }

    pub fn with_sketch(mut self, sketch: SketchKind) -> Self {
        self.sketch = sketch;
        self
    }

    /// Time between two bucket rotations.
    pub fn rotate_interval_ms(&self) -> u64 {
        if self.age_buckets == 0 {
            return 0;
        }
        self.max_age_ms / u64::from(self.age_buckets)
    }

    /// Rejects options that could never produce a working summary.
    pub fn validate(&self) -> SummaryResult<()> {
        for spec in &self.quantiles {
            spec.validate()?;
        }
        if self.max_age_ms == 0 {
            return Err(SummaryError::ZeroMaxAge);
        }
        if self.age_buckets == 0 {
            return Err(SummaryError::ZeroAgeBuckets);
        }
        if self.rotate_interval_ms() == 0 {
            return Err(SummaryError::RotateIntervalTooShort {
                max_age_ms: self.max_age_ms,
                age_buckets: self.age_buckets,
            });
        }
        if let SketchKind::Hdr { scale } = self.sketch {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(SummaryError::InvalidScale(scale));
            }
        }
        Ok(())
    }
}

// ─── Dispatcher options ──────────────────────────────────────────

/// What a thread does while it has nothing to do but wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Pure CPU spin hint. Lowest latency, burns a core.
    Spin,
    /// Give the rest of the time slice back to the scheduler.
    #[default]
    Yield,
    /// Spin briefly, then yield with exponential backoff.
    Backoff,
}

impl WaitStrategy {
    /// Waits once. `backoff` must be reset by the caller after progress.
    pub(crate) fn pause(self, backoff: &Backoff) {
        match self {
            Self::Spin => std::hint::spin_loop(),
            Self::Yield => std::thread::yield_now(),
            Self::Backoff => backoff.snooze(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Name of the worker thread, visible in debuggers and `top -H`
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Stack size of the worker thread; platform default when unset
    #[serde(default)]
    pub stack_size: Option<usize>,

    /// Used by the worker when the request queue is empty
    #[serde(default)]
    pub idle: WaitStrategy,

    /// Used by `snapshot` callers while their response is not at the head
    #[serde(default)]
    pub claim: WaitStrategy,
}

fn default_thread_name() -> String {
    "fast-summary".into()
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
            stack_size: None,
            idle: WaitStrategy::default(),
            claim: WaitStrategy::default(),
        }
    }
}
