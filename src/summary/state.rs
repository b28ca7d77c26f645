use std::time::Duration;

use super::snapshot::{QuantileValue, Snapshot};
use crate::config::{QuantileSpec, SummaryOptions};
use crate::error::SummaryResult;
use crate::sketch::Sketch;
use crate::window::WindowedQuantiles;

/// Mutable state behind one summary.
///
/// Owned by the dispatcher thread once registered; nothing else touches it,
/// which is why none of it is atomic or locked.
#[derive(Debug, Clone)]
pub struct SummaryState {
    count: f64,
    sum: f64,
    quantiles: Vec<QuantileSpec>,
    /// present iff `quantiles` is non-empty
    window: Option<WindowedQuantiles<Sketch>>,
}

impl SummaryState {
    /// Validates `options` and builds an empty state whose first bucket
    /// rotation is measured from `now_ms`.
    pub fn new(options: &SummaryOptions, now_ms: u64) -> SummaryResult<Self> {
        options.validate()?;

        let window = if options.quantiles.is_empty() {
            None
        } else {
            let template = Sketch::build(options.sketch, &options.quantiles)?;
            Some(WindowedQuantiles::new(
                template,
                Duration::from_millis(options.max_age_ms),
                options.age_buckets as usize,
                now_ms,
            )?)
        };

        Ok(Self {
            count: 0.0,
            sum: 0.0,
            quantiles: options.quantiles.clone(),
            window,
        })
    }

    pub fn observe(&mut self, now_ms: u64, amount: f64) {
        self.count += 1.0;
        self.sum += amount;
        if let Some(window) = &mut self.window {
            window.insert(now_ms, amount);
        }
    }

    /// Count, sum and windowed quantiles as of `now_ms`. Reading may rotate
    /// the window.
    pub fn snapshot(&mut self, now_ms: u64) -> Snapshot {
        let mut quantiles: Vec<QuantileValue> = match &mut self.window {
            Some(window) => self
                .quantiles
                .iter()
                .map(|spec| QuantileValue {
                    quantile: spec.quantile,
                    value: window.query(now_ms, spec.quantile),
                })
                .collect(),
            None => Vec::new(),
        };
        quantiles.sort_by(|a, b| a.quantile.total_cmp(&b.quantile));
        quantiles.dedup_by(|a, b| a.quantile == b.quantile);

        Snapshot {
            timestamp_ms: now_ms,
            count: self.count,
            sum: self.sum,
            quantiles,
        }
    }

    pub fn count(&self) -> f64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn window(&self) -> Option<&WindowedQuantiles<Sketch>> {
        self.window.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SketchKind;
    use crate::error::SummaryError;

    fn median_options() -> SummaryOptions {
        SummaryOptions::default()
            .with_quantile(0.5, 0.01)
            .with_max_age(Duration::from_secs(10))
            .with_age_buckets(5)
    }

    #[test]
    fn counts_and_sums_every_observation() {
        let mut state = SummaryState::new(&median_options(), 0).unwrap();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            state.observe(0, v);
        }

        let snapshot = state.snapshot(0);
        assert_eq!(snapshot.count, 5.0);
        assert_eq!(snapshot.sum, 15.0);
        assert_eq!(snapshot.quantile(0.5), Some(3.0));
        assert_eq!(
            state.window().unwrap().rotate_interval(),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn no_quantiles_means_no_window() {
        let mut state = SummaryState::new(&SummaryOptions::default(), 0).unwrap();
        state.observe(0, 2.5);
        assert!(state.window().is_none());

        let snapshot = state.snapshot(0);
        assert_eq!(snapshot.count, 1.0);
        assert_eq!(snapshot.sum, 2.5);
        assert!(snapshot.quantiles.is_empty());
    }

    #[test]
    fn quantiles_come_back_sorted_and_unique() {
        let options = SummaryOptions::default()
            .with_quantile(0.99, 0.001)
            .with_quantile(0.5, 0.05)
            .with_quantile(0.9, 0.01)
            .with_quantile(0.5, 0.01);
        let mut state = SummaryState::new(&options, 0).unwrap();
        for v in 1..=100 {
            state.observe(0, v as f64);
        }

        let targets: Vec<f64> = state
            .snapshot(0)
            .quantiles
            .iter()
            .map(|v| v.quantile)
            .collect();
        assert_eq!(targets, vec![0.5, 0.9, 0.99]);
    }

    #[test]
    fn count_and_sum_outlive_the_window() {
        let mut state = SummaryState::new(&median_options(), 0).unwrap();
        state.observe(0, 42.0);

        let snapshot = state.snapshot(60_000);
        assert_eq!(snapshot.count, 1.0);
        assert_eq!(snapshot.sum, 42.0);
        assert!(snapshot.quantile(0.5).unwrap().is_nan());
    }

    #[test]
    fn hdr_backed_state() {
        let options = median_options().with_sketch(SketchKind::Hdr { scale: 1.0 });
        let mut state = SummaryState::new(&options, 0).unwrap();
        for v in 1..=1_000 {
            state.observe(0, v as f64);
        }
        let p50 = state.snapshot(0).quantile(0.5).unwrap();
        assert!((p50 - 500.0).abs() <= 5.0, "p50 = {p50}");
    }

    #[test]
    fn invalid_options_create_nothing() {
        let options = SummaryOptions::default().with_quantile(1.0, 0.01);
        assert!(matches!(
            SummaryState::new(&options, 0),
            Err(SummaryError::InvalidQuantile(_))
        ));
    }
}
