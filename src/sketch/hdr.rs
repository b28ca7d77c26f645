use hdrhistogram::Histogram;

use super::QuantileSketch;
use crate::config::QuantileSpec;
use crate::error::{SummaryError, SummaryResult};

/// Significant figures kept by the histogram, bounded to what HdrHistogram
/// supports without exploding its bucket count.
const MIN_SIGFIG: u8 = 1;
const MAX_SIGFIG: u8 = 5;

/// Largest unit count the histogram is allowed to grow to. Anything above,
/// including `+inf`, is recorded at the histogram's current ceiling.
const MAX_UNITS: f64 = (1u64 << 53) as f64;

/// Quantile sketch backed by an auto-resizing HdrHistogram.
///
/// Best suited to non-negative measurements such as latencies. Values are
/// multiplied by `scale` and rounded to integer units before recording, so a
/// scale of 1000 keeps three decimal places. Negative values clamp to zero
/// and `NaN` is ignored.
#[derive(Debug, Clone)]
pub struct HdrSketch {
    hist: Histogram<u64>,
    scale: f64,
}

impl HdrSketch {
    pub fn new(significant_figures: u8, scale: f64) -> SummaryResult<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(SummaryError::InvalidScale(scale));
        }
        Ok(Self {
            hist: Histogram::<u64>::new(significant_figures)?,
            scale,
        })
    }

    /// Picks the precision from the tightest allowed error: 1% → 2 figures,
    /// 0.1% → 3 figures.
    pub fn for_targets(targets: &[QuantileSpec], scale: f64) -> SummaryResult<Self> {
        let tightest = targets.iter().map(|t| t.error).fold(1.0, f64::min);
        let sigfig = (-tightest.log10())
            .ceil()
            .clamp(f64::from(MIN_SIGFIG), f64::from(MAX_SIGFIG)) as u8;
        Self::new(sigfig, scale)
    }

    pub fn significant_figures(&self) -> u8 {
        self.hist.sigfig()
    }
}

impl QuantileSketch for HdrSketch {
    fn insert(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        let units = (value * self.scale).round().max(0.0);
        if units <= MAX_UNITS && self.hist.record(units as u64).is_ok() {
            return;
        }
        self.hist.saturating_record(units as u64);
    }

    fn query(&mut self, q: f64) -> f64 {
        if self.hist.len() == 0 {
            return f64::NAN;
        }
        self.hist.value_at_quantile(q) as f64 / self.scale
    }

    fn len(&self) -> u64 {
        self.hist.len()
    }
}
