//! Quantiles over a trailing time window, approximated with a ring of
//! staggered sketches.
//!
//! Every insert goes into every bucket, but buckets are reset one at a time,
//! once per `max_age / age_buckets`. The bucket at `current` is always the
//! one that has accumulated longest, so queries read it. Rotation happens
//! lazily, on the next insert or query, and catches up after idle gaps by
//! advancing the rotation timestamp in exact multiples of the interval.

use std::time::Duration;

use tracing::trace;

use crate::error::{SummaryError, SummaryResult};
use crate::sketch::QuantileSketch;

#[derive(Debug, Clone)]
pub struct WindowedQuantiles<S> {
    /// empty sketch cloned into a bucket on reset
    template: S,
    buckets: Vec<S>,
    current: usize,
    last_rotate_ms: u64,
    rotate_interval_ms: u64,
}

impl<S: QuantileSketch> WindowedQuantiles<S> {
    /// Creates `age_buckets` empty copies of `template`, with the first
    /// rotation due `max_age / age_buckets` after `now_ms`.
    pub fn new(template: S, max_age: Duration, age_buckets: usize, now_ms: u64) -> SummaryResult<Self> {
        if max_age.is_zero() {
            return Err(SummaryError::ZeroMaxAge);
        }
        if age_buckets == 0 {
            return Err(SummaryError::ZeroAgeBuckets);
        }
        let max_age_ms = max_age.as_millis() as u64;
        let rotate_interval_ms = max_age_ms / age_buckets as u64;
        if rotate_interval_ms == 0 {
            return Err(SummaryError::RotateIntervalTooShort {
                max_age_ms,
                age_buckets: age_buckets.try_into().unwrap_or(u32::MAX),
            });
        }

        Ok(Self {
            buckets: vec![template.clone(); age_buckets],
            template,
            current: 0,
            last_rotate_ms: now_ms,
            rotate_interval_ms,
        })
    }

    /// Records `value` in every bucket after applying pending rotations.
    pub fn insert(&mut self, now_ms: u64, value: f64) {
        self.rotate(now_ms);
        for bucket in &mut self.buckets {
            bucket.insert(value);
        }
    }

    /// Approximate value at quantile `q` over the trailing window.
    pub fn query(&mut self, now_ms: u64, q: f64) -> f64 {
        self.rotate(now_ms);
        self.buckets[self.current].query(q)
    }

    /// Applies every rotation due by `now_ms` and returns how many there
    /// were. Timestamps earlier than the last rotation never rotate.
    pub fn rotate(&mut self, now_ms: u64) -> u64 {
        let elapsed = now_ms.saturating_sub(self.last_rotate_ms);
        let due = elapsed / self.rotate_interval_ms;
        if due == 0 {
            return 0;
        }

        // Resetting a bucket twice is the same as resetting it once, so a
        // gap longer than the whole ring only clears each bucket once.
        let n = self.buckets.len();
        let resets = due.min(n as u64) as usize;
        for i in 0..resets {
            self.buckets[(self.current + i) % n] = self.template.clone();
        }
        self.current = ((self.current as u64 + due) % n as u64) as usize;
        self.last_rotate_ms += due * self.rotate_interval_ms;

        trace!(due, current = self.current, "rotated age buckets");
        due
    }

    pub fn rotate_interval(&self) -> Duration {
        Duration::from_millis(self.rotate_interval_ms)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn last_rotate_ms(&self) -> u64 {
        self.last_rotate_ms
    }

    pub fn age_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Values held by each bucket, in ring order.
    pub fn bucket_lens(&self) -> Vec<u64> {
        self.buckets.iter().map(QuantileSketch::len).collect()
    }
}
