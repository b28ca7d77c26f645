pub mod snapshot;
pub mod state;

pub use snapshot::{QuantileValue, Snapshot};
pub use state::SummaryState;

use std::fmt;
use std::sync::Arc;

use crate::dispatcher::request::{Request, SummaryId};
use crate::dispatcher::Shared;

/// Caller-facing handle to one registered summary.
///
/// Handles never touch the summary's state. `observe` enqueues a request and
/// returns; `snapshot` enqueues a query and spins until the dispatcher's
/// answer reaches the head of the response queue. Share a handle between
/// threads with `Arc<Summary>`.
pub struct Summary {
    id: SummaryId,
    shared: Arc<Shared>,
}

impl Summary {
    pub(crate) fn new(id: SummaryId, shared: Arc<Shared>) -> Self {
        Self { id, shared }
    }

    pub fn id(&self) -> SummaryId {
        self.id
    }

    /// Records one observation. Fire-and-forget: the dispatcher applies it
    /// some time later, in submission order. Dropped silently once the
    /// dispatcher has been shut down or its worker has died.
    pub fn observe(&self, amount: f64) {
        if !self.shared.accepting() {
            return;
        }
        self.shared.submit(Request::Put {
            timestamp_ms: self.shared.now_millis(),
            amount,
            target: self.id,
        });
    }

    /// Synchronous read of count, sum and windowed quantiles.
    ///
    /// Every observation submitted before this call (from any thread that
    /// happens-before it) is included. There is no timeout: if the
    /// dispatcher is stopped, or an earlier snapshot caller stops polling,
    /// this spins forever.
    pub fn snapshot(&self) -> Snapshot {
        let timestamp_ms = self.shared.now_millis();
        self.shared.round_trip(timestamp_ms, self.id)
    }
}

impl Drop for Summary {
    fn drop(&mut self) {
        if self.shared.accepting() {
            self.shared.submit(Request::Remove { target: self.id });
        }
    }
}

impl fmt::Debug for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Summary").field("id", &self.id).finish()
    }
}
