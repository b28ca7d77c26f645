pub mod ckms;
pub mod hdr;

pub use ckms::Ckms;
pub use hdr::HdrSketch;

use crate::config::{QuantileSpec, SketchKind};
use crate::error::SummaryResult;

/// Bounded-memory streaming quantile estimator.
///
/// Implementations are cloned from an empty template whenever an age bucket
/// is reset, so `Clone` must produce an independent sketch.
pub trait QuantileSketch: Clone + Send + 'static {
    fn insert(&mut self, value: f64);

    /// Approximate value at quantile `q`. Returns `NaN` when empty.
    fn query(&mut self, q: f64) -> f64;

    /// Number of values inserted since the sketch was created.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The sketch selected by [`SketchKind`].
#[derive(Debug, Clone)]
pub enum Sketch {
    Ckms(Ckms),
    Hdr(HdrSketch),
}

impl Sketch {
    /// Builds an empty sketch for the given targets.
    pub fn build(kind: SketchKind, targets: &[QuantileSpec]) -> SummaryResult<Self> {
        Ok(match kind {
            SketchKind::Ckms => Self::Ckms(Ckms::new(targets)),
            SketchKind::Hdr { scale } => Self::Hdr(HdrSketch::for_targets(targets, scale)?),
        })
    }
}

impl QuantileSketch for Sketch {
    fn insert(&mut self, value: f64) {
        match self {
            Self::Ckms(s) => s.insert(value),
            Self::Hdr(s) => s.insert(value),
        }
    }

    fn query(&mut self, q: f64) -> f64 {
        match self {
            Self::Ckms(s) => s.query(q),
            Self::Hdr(s) => s.query(q),
        }
    }

    fn len(&self) -> u64 {
        match self {
            Self::Ckms(s) => s.len(),
            Self::Hdr(s) => s.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_selected_kind() {
        let targets = [QuantileSpec::new(0.5, 0.01)];
        assert!(matches!(
            Sketch::build(SketchKind::Ckms, &targets).unwrap(),
            Sketch::Ckms(_)
        ));
        assert!(matches!(
            Sketch::build(SketchKind::Hdr { scale: 1.0 }, &targets).unwrap(),
            Sketch::Hdr(_)
        ));
    }

    #[test]
    fn clones_are_independent() {
        let template = Sketch::build(SketchKind::Ckms, &[QuantileSpec::new(0.5, 0.01)]).unwrap();
        let mut a = template.clone();
        a.insert(1.0);
        assert_eq!(a.len(), 1);
        assert!(template.is_empty());
    }
}
