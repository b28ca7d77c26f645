//! Low-overhead streaming summaries.
//!
//! A [`Summary`] reports an observation count, a running sum and approximate
//! quantiles over a trailing time window. Every mutation is funnelled through
//! a single [`Dispatcher`] thread, so `observe` is a lock-free enqueue and the
//! quantile state never needs a lock.
//!
//! ```no_run
//! use fast_summary::{Dispatcher, DispatcherConfig, SummaryOptions};
//! use std::time::Duration;
//!
//! let dispatcher = Dispatcher::start(DispatcherConfig::default())?;
//! let latency = dispatcher.register(
//!     SummaryOptions::default()
//!         .with_quantile(0.5, 0.01)
//!         .with_quantile(0.99, 0.001)
//!         .with_max_age(Duration::from_secs(60)),
//! )?;
//!
//! latency.observe(12.5);
//! let snapshot = latency.snapshot();
//! println!("count={} p99={:?}", snapshot.count, snapshot.quantile(0.99));
//! # Ok::<(), fast_summary::SummaryError>(())
//! ```

pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod sketch;
pub mod summary;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DispatcherConfig, QuantileSpec, SketchKind, SummaryOptions, WaitStrategy};
pub use dispatcher::request::{RequestId, SummaryId};
pub use dispatcher::Dispatcher;
pub use error::{SummaryError, SummaryResult};
pub use sketch::{Ckms, HdrSketch, QuantileSketch, Sketch};
pub use summary::{QuantileValue, Snapshot, Summary, SummaryState};
pub use window::WindowedQuantiles;
