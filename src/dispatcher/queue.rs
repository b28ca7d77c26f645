use std::collections::VecDeque;

use parking_lot::Mutex;
#[cfg(test)]
use parking_lot::MutexGuard;

use super::request::{RequestId, Response};
use crate::summary::Snapshot;

/// Shared FIFO of published snapshot responses.
///
/// The dispatcher appends; callers may only remove the head, and only when
/// it carries their own request id. A caller whose response sits behind
/// someone else's waits until that one is claimed.
///
/// The dispatcher never blocks on this lock. Responses it cannot publish
/// yet stay in its own outbox and are flushed, in order, on a later pass.
#[derive(Debug, Default)]
pub(crate) struct ResponseQueue {
    inner: Mutex<VecDeque<Response>>,
}

impl ResponseQueue {
    /// Moves everything in `outbox` onto the tail, preserving order.
    /// Returns false without moving anything if a caller holds the lock.
    pub fn flush(&self, outbox: &mut VecDeque<Response>) -> bool {
        match self.inner.try_lock() {
            Some(mut queue) => {
                queue.extend(outbox.drain(..));
                true
            }
            None => false,
        }
    }

    /// Request id at the head. Never blocks: a contended lock reads as
    /// "nothing yet".
    pub fn head_id(&self) -> Option<RequestId> {
        self.inner.try_lock()?.front().map(|r| r.request_id)
    }

    /// Removes the head, which the caller has just seen carrying `expected`.
    ///
    /// # Panics
    ///
    /// If the head is anything else. Only the owner of a request id ever
    /// removes it, so a mismatch means the protocol is broken.
    pub fn claim(&self, expected: RequestId) -> Snapshot {
        let head = self.inner.lock().pop_front();
        match head {
            Some(response) if response.request_id == expected => response.snapshot,
            other => panic!(
                "response queue ordering violated: expected {:?}, found {:?}",
                expected,
                other.map(|r| r.request_id)
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn hold(&self) -> MutexGuard<'_, VecDeque<Response>> {
        self.inner.lock()
    }
}
