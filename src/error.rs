use thiserror::Error;

/// Result type used across the crate.
pub type SummaryResult<T> = Result<T, SummaryError>;

/// Everything that can go wrong before a request reaches the dispatcher.
///
/// Configuration problems are reported synchronously at construction time;
/// once a summary is registered, `observe` and `snapshot` cannot fail.
/// Protocol violations inside the dispatcher are not represented here, they
/// panic.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("quantile {0} invalid: expected a number strictly between 0.0 and 1.0")]
    InvalidQuantile(f64),

    #[error("allowed error {error} for quantile {quantile} invalid: expected a number strictly between 0.0 and 1.0")]
    InvalidError { quantile: f64, error: f64 },

    #[error("max age must be positive")]
    ZeroMaxAge,

    #[error("age buckets must be positive")]
    ZeroAgeBuckets,

    #[error("max age of {max_age_ms}ms split into {age_buckets} buckets leaves no time between rotations")]
    RotateIntervalTooShort { max_age_ms: u64, age_buckets: u32 },

    #[error("histogram scale {0} invalid: expected a finite positive number")]
    InvalidScale(f64),

    #[error("histogram creation failed: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),

    #[error("failed to spawn dispatcher thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("dispatcher has been shut down")]
    Stopped,
}

impl SummaryError {
    /// Returns true for errors caused by invalid summary options.
    pub fn is_config(&self) -> bool {
        !matches!(self, Self::Spawn(_) | Self::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::SummaryError;

    #[test]
    fn classifies_config_errors() {
        assert!(SummaryError::InvalidQuantile(1.5).is_config());
        assert!(SummaryError::ZeroAgeBuckets.is_config());
        assert!(!SummaryError::Stopped.is_config());
    }

    #[test]
    fn renders_messages() {
        let err = SummaryError::RotateIntervalTooShort {
            max_age_ms: 3,
            age_buckets: 5,
        };
        assert_eq!(
            err.to_string(),
            "max age of 3ms split into 5 buckets leaves no time between rotations"
        );
    }
}
