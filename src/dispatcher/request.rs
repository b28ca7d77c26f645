use std::fmt;

use crate::summary::{Snapshot, SummaryState};

/// Identity of one `Get` request, unique per dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);

/// Identity of one registered summary, unique per dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SummaryId(pub(crate) u64);

impl fmt::Display for SummaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "summary#{}", self.0)
    }
}

/// Work item moved from a caller to the dispatcher and consumed once.
/// Timestamps are captured by the caller.
pub(crate) enum Request {
    /// Hands a freshly built state over to the dispatcher.
    Register {
        id: SummaryId,
        state: Box<SummaryState>,
    },
    Put {
        timestamp_ms: u64,
        amount: f64,
        target: SummaryId,
    },
    Get {
        timestamp_ms: u64,
        target: SummaryId,
        request_id: RequestId,
    },
    Remove {
        target: SummaryId,
    },
}

/// Answer to a `Get`, matched back to its caller by `request_id`.
#[derive(Debug, Clone)]
pub(crate) struct Response {
    pub request_id: RequestId,
    pub snapshot: Snapshot,
}
