use serde::Serialize;

/// Approximate value of one target quantile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantileValue {
    pub quantile: f64,
    /// `NaN` (serialized as `null`) when the window holds no values
    pub value: f64,
}

/// Point-in-time view of one summary.
/// Serialized straight into the metrics JSON and SSE payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Caller-side timestamp the snapshot was computed for
    pub timestamp_ms: u64,
    /// Observations since creation (not windowed)
    pub count: f64,
    /// Sum of observations since creation (not windowed)
    pub sum: f64,
    /// Windowed quantiles, ascending by target quantile
    pub quantiles: Vec<QuantileValue>,
}

impl Snapshot {
    /// All-zero placeholder with no quantiles.
    pub fn empty(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            count: 0.0,
            sum: 0.0,
            quantiles: Vec::new(),
        }
    }

    /// Value recorded for exactly this target quantile, if tracked.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        self.quantiles
            .iter()
            .find(|v| v.quantile == q)
            .map(|v| v.value)
    }

    /// Lifetime mean, `NaN` before the first observation.
    pub fn mean(&self) -> f64 {
        if self.count == 0.0 {
            return f64::NAN;
        }
        self.sum / self.count
    }

    pub fn has_data(&self) -> bool {
        self.count > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_quantiles_and_mean() {
        let snapshot = Snapshot {
            timestamp_ms: 7,
            count: 4.0,
            sum: 10.0,
            quantiles: vec![
                QuantileValue { quantile: 0.5, value: 2.0 },
                QuantileValue { quantile: 0.9, value: 4.0 },
            ],
        };
        assert_eq!(snapshot.quantile(0.9), Some(4.0));
        assert_eq!(snapshot.quantile(0.99), None);
        assert_eq!(snapshot.mean(), 2.5);
        assert!(snapshot.has_data());
    }

    #[test]
    fn empty_snapshot_serializes_nan_as_null() {
        let mut snapshot = Snapshot::empty(1);
        assert!(snapshot.mean().is_nan());
        snapshot.quantiles.push(QuantileValue {
            quantile: 0.5,
            value: f64::NAN,
        });
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["quantiles"][0]["value"], serde_json::Value::Null);
        assert_eq!(json["count"], 0.0);
    }
}
