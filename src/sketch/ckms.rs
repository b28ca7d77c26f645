//! Targeted-quantile CKMS sketch.
//!
//! Cormode, Korn, Muthukrishnan and Srivastava, "Effective Computation of
//! Biased Quantiles over Data Streams". Each tracked entry stores a value,
//! `g` (rank distance to the previous entry) and `delta` (uncertainty of its
//! rank). Incoming values are buffered and merged in sorted batches, after
//! which adjacent entries are compressed while the per-target error function
//! still allows it.

use super::QuantileSketch;
use crate::config::QuantileSpec;

/// Values buffered before a merge into the sample list.
const BUFFER_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: f64,
    g: u64,
    delta: u64,
}

/// Precomputed error slopes for one target quantile.
#[derive(Debug, Clone, Copy)]
struct Target {
    quantile: f64,
    /// slope below the target rank: 2ε / (1 - φ)
    u: f64,
    /// slope above the target rank: 2ε / φ
    v: f64,
}

#[derive(Debug, Clone)]
pub struct Ckms {
    targets: Vec<Target>,
    samples: Vec<Entry>,
    buffer: Vec<f64>,
    /// values merged into `samples` (excludes `buffer`)
    count: u64,
}

impl Ckms {
    /// Creates an empty sketch. Targets are expected to be validated.
    pub fn new(specs: &[QuantileSpec]) -> Self {
        let targets = specs
            .iter()
            .map(|s| Target {
                quantile: s.quantile,
                u: 2.0 * s.error / (1.0 - s.quantile),
                v: 2.0 * s.error / s.quantile,
            })
            .collect();

        Self {
            targets,
            samples: Vec::new(),
            buffer: Vec::with_capacity(BUFFER_CAPACITY),
            count: 0,
        }
    }

    /// Number of entries currently retained, for memory inspection.
    pub fn retained(&self) -> usize {
        self.samples.len() + self.buffer.len()
    }

    /// Sorts the buffer and merges it into `samples`, then compresses.
    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.sort_unstable_by(f64::total_cmp);

        let old = std::mem::take(&mut self.samples);
        let mut merged = Vec::with_capacity(old.len() + buffer.len());
        let mut old = old.into_iter().peekable();
        let mut rank = 0u64;

        for &value in &buffer {
            while let Some(entry) = old.next_if(|e| e.value < value) {
                rank += entry.g;
                merged.push(entry);
            }
            self.count += 1;

            // New minimum or maximum: its rank is known exactly.
            let delta = if merged.is_empty() || old.peek().is_none() {
                0
            } else {
                let f = allowable_error(&self.targets, rank as f64, self.count as f64);
                (f.floor() as u64).saturating_sub(1)
            };
            merged.push(Entry { value, g: 1, delta });
            rank += 1;
        }
        merged.extend(old);

        self.samples = merged;
        buffer.clear();
        self.buffer = buffer;
        self.compress();
    }

    /// Folds entries into their successor while the error bound allows it.
    /// The first entry is never folded so the minimum stays exact.
    fn compress(&mut self) {
        if self.samples.len() < 3 {
            return;
        }

        let n = self.count as f64;
        let samples = std::mem::take(&mut self.samples);
        let mut out: Vec<Entry> = Vec::with_capacity(samples.len());
        // sum of g over `out` excluding its last entry
        let mut rank_before_last = 0u64;

        for mut entry in samples {
            if out.len() >= 2 {
                let prev = out[out.len() - 1];
                let prev_rank = (rank_before_last + prev.g) as f64;
                let band = (prev.g + entry.g + entry.delta) as f64;
                if band <= allowable_error(&self.targets, prev_rank, n) {
                    out.pop();
                    entry.g += prev.g;
                    out.push(entry);
                    continue;
                }
            }
            if let Some(last) = out.last() {
                rank_before_last += last.g;
            }
            out.push(entry);
        }

        self.samples = out;
    }
}

/// f(r, n): the rank error tolerated at rank `r` after `n` values, taken as
/// the tightest bound over all targets.
fn allowable_error(targets: &[Target], rank: f64, n: f64) -> f64 {
    targets.iter().fold(n + 1.0, |min, t| {
        let error = if rank <= t.quantile * n {
            t.u * (n - rank)
        } else {
            t.v * rank
        };
        min.min(error)
    })
}

impl QuantileSketch for Ckms {
    fn insert(&mut self, value: f64) {
        self.buffer.push(value);
        if self.buffer.len() >= BUFFER_CAPACITY {
            self.flush();
        }
    }

    /// Nearest-rank query: targets rank `ceil(q * n)`.
    fn query(&mut self, q: f64) -> f64 {
        self.flush();

        let Some(last) = self.samples.last() else {
            return f64::NAN;
        };

        let n = self.count as f64;
        let desired = (q * n).ceil();
        let threshold = desired + allowable_error(&self.targets, desired, n) / 2.0;

        let mut rank = 0u64;
        for pair in self.samples.windows(2) {
            rank += pair[0].g;
            if (rank + pair[1].g + pair[1].delta) as f64 > threshold {
                return pair[0].value;
            }
        }
        last.value
    }

    fn len(&self) -> u64 {
        self.count + self.buffer.len() as u64
    }
}
