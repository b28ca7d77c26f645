//! Single-writer dispatcher.
//!
//! One dedicated thread owns every [`SummaryState`] and applies requests in
//! the order they were submitted, across all callers and all summaries.
//! Callers talk to it through two unbounded queues: a lock-free request
//! queue they push to, and a response queue whose head they poll.

pub(crate) mod queue;
pub mod request;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::queue::SegQueue;
use crossbeam::utils::Backoff;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{DispatcherConfig, SummaryOptions, WaitStrategy};
use crate::error::{SummaryError, SummaryResult};
use crate::summary::{Snapshot, Summary, SummaryState};

use queue::ResponseQueue;
use request::{Request, RequestId, Response, SummaryId};

// ─── Shared between callers and the worker ───────────────────────

pub(crate) struct Shared {
    requests: SegQueue<Request>,
    responses: ResponseQueue,
    /// cooperative cancellation, checked once per worker iteration
    cancelled: AtomicBool,
    /// cleared when the worker exits for any reason
    alive: AtomicBool,
    next_request: AtomicU64,
    next_summary: AtomicU64,
    clock: Arc<dyn Clock>,
    claim: WaitStrategy,
}

impl Shared {
    fn new(clock: Arc<dyn Clock>, claim: WaitStrategy) -> Self {
        Self {
            requests: SegQueue::new(),
            responses: ResponseQueue::default(),
            cancelled: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            next_request: AtomicU64::new(0),
            next_summary: AtomicU64::new(0),
            clock,
            claim,
        }
    }

    pub(crate) fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// True while a live worker will eventually drain new requests.
    pub(crate) fn accepting(&self) -> bool {
        !self.is_cancelled() && self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn submit(&self, request: Request) {
        self.requests.push(request);
    }

    /// Submits a `Get` and spins until its response is at the head of the
    /// response queue.
    pub(crate) fn round_trip(&self, timestamp_ms: u64, target: SummaryId) -> Snapshot {
        let request_id = RequestId(self.next_request.fetch_add(1, Ordering::Relaxed));
        self.submit(Request::Get {
            timestamp_ms,
            target,
            request_id,
        });

        let backoff = Backoff::new();
        loop {
            if self.responses.head_id() == Some(request_id) {
                return self.responses.claim(request_id);
            }
            self.claim.pause(&backoff);
        }
    }
}

// ─── Public handle ───────────────────────────────────────────────

/// Owns the worker thread. Dropping it stops the worker.
///
/// Summaries registered here keep the request queues alive after the
/// dispatcher is gone, but nothing will answer them.
pub struct Dispatcher {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Starts the worker using wall-clock time.
    pub fn start(config: DispatcherConfig) -> SummaryResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Starts the worker with an injected clock. Callers read it to
    /// timestamp their own requests.
    pub fn with_clock(config: DispatcherConfig, clock: Arc<dyn Clock>) -> SummaryResult<Self> {
        let shared = Arc::new(Shared::new(clock, config.claim));

        let mut builder = thread::Builder::new().name(config.thread_name.clone());
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }

        let worker_shared = Arc::clone(&shared);
        let idle = config.idle;
        let handle = builder.spawn(move || run(&worker_shared, idle))?;

        info!(
            thread = %config.thread_name,
            idle = ?config.idle,
            claim = ?config.claim,
            "summary dispatcher started"
        );

        Ok(Self {
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Validates `options`, builds the summary's state on the calling thread
    /// and hands it to the worker. Invalid options are rejected before
    /// anything is enqueued.
    pub fn register(&self, options: SummaryOptions) -> SummaryResult<Summary> {
        if !self.shared.accepting() {
            return Err(SummaryError::Stopped);
        }

        let state = SummaryState::new(&options, self.shared.now_millis())?;
        let id = SummaryId(self.shared.next_summary.fetch_add(1, Ordering::Relaxed));
        self.shared.submit(Request::Register {
            id,
            state: Box::new(state),
        });

        debug!(summary = %id, quantiles = options.quantiles.len(), "registered summary");
        Ok(Summary::new(id, Arc::clone(&self.shared)))
    }

    /// False once shut down, or if the worker died.
    pub fn is_running(&self) -> bool {
        self.shared.accepting()
    }

    /// Requests submitted but not yet taken by the worker.
    pub fn pending_requests(&self) -> usize {
        self.shared.requests.len()
    }

    /// Responses published but not yet claimed.
    pub fn pending_responses(&self) -> usize {
        self.shared.responses.len()
    }

    /// Stops the worker and waits for it. Requests still queued are
    /// abandoned. Idempotent.
    pub fn shutdown(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
        if let Some(handle) = self.worker.lock().take() {
            // A panicked worker has already logged through its guard.
            let _ = handle.join();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ─── Worker loop ─────────────────────────────────────────────────

/// Clears `alive` however the worker exits.
struct AliveGuard<'a>(&'a AtomicBool);

impl Drop for AliveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
        if thread::panicking() {
            error!("summary dispatcher died; quantile processing has stopped for this process");
        }
    }
}

fn run(shared: &Shared, idle: WaitStrategy) {
    let _guard = AliveGuard(&shared.alive);
    let mut states: HashMap<SummaryId, SummaryState> = HashMap::new();
    // answers not yet published because a caller held the response lock
    let mut outbox: VecDeque<Response> = VecDeque::new();
    let backoff = Backoff::new();

    while !shared.cancelled.load(Ordering::Acquire) {
        if !outbox.is_empty() {
            shared.responses.flush(&mut outbox);
        }
        match shared.requests.pop() {
            Some(request) => {
                apply(&mut states, &mut outbox, request);
                backoff.reset();
            }
            None => idle.pause(&backoff),
        }
    }

    info!(
        abandoned = shared.requests.len(),
        unpublished = outbox.len(),
        summaries = states.len(),
        "summary dispatcher stopped"
    );
}

/// Applies one request. Answers to `Get` are appended to `outbox`.
fn apply(
    states: &mut HashMap<SummaryId, SummaryState>,
    outbox: &mut VecDeque<Response>,
    request: Request,
) {
    match request {
        Request::Register { id, state } => {
            states.insert(id, *state);
        }
        Request::Put {
            timestamp_ms,
            amount,
            target,
        } => match states.get_mut(&target) {
            Some(state) => state.observe(timestamp_ms, amount),
            None => warn!(summary = %target, "observation for unknown summary dropped"),
        },
        Request::Get {
            timestamp_ms,
            target,
            request_id,
        } => {
            let snapshot = match states.get_mut(&target) {
                Some(state) => state.snapshot(timestamp_ms),
                None => {
                    warn!(summary = %target, "snapshot of unknown summary");
                    Snapshot::empty(timestamp_ms)
                }
            };
            outbox.push_back(Response {
                request_id,
                snapshot,
            });
        }
        Request::Remove { target } => {
            if states.remove(&target).is_some() {
                debug!(summary = %target, "removed summary");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::{Duration, Instant};

    fn dispatcher() -> Dispatcher {
        Dispatcher::with_clock(DispatcherConfig::default(), Arc::new(ManualClock::new(0)))
            .unwrap()
    }

    fn register(states: &mut HashMap<SummaryId, SummaryState>, id: SummaryId) {
        let state = SummaryState::new(&SummaryOptions::default(), 0).unwrap();
        let mut outbox = VecDeque::new();
        apply(states, &mut outbox, Request::Register { id, state: Box::new(state) });
    }

    fn put(target: SummaryId, amount: f64) -> Request {
        Request::Put {
            timestamp_ms: 0,
            amount,
            target,
        }
    }

    fn get(target: SummaryId, request_id: u64) -> Request {
        Request::Get {
            timestamp_ms: 9,
            target,
            request_id: RequestId(request_id),
        }
    }

    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        done()
    }

    #[test]
    fn apply_answers_every_get_in_order() {
        let mut states = HashMap::new();
        let mut outbox = VecDeque::new();
        let id = SummaryId(0);
        register(&mut states, id);

        for request in [put(id, 2.0), get(id, 7), put(id, 3.0), get(id, 8)] {
            apply(&mut states, &mut outbox, request);
        }

        let answers: Vec<_> = outbox.iter().map(|r| (r.request_id, r.snapshot.sum)).collect();
        assert_eq!(answers, vec![(RequestId(7), 2.0), (RequestId(8), 5.0)]);
    }

    #[test]
    fn unknown_summary_gets_an_empty_answer() {
        let mut states = HashMap::new();
        let mut outbox = VecDeque::new();
        apply(&mut states, &mut outbox, get(SummaryId(3), 1));

        let answer = outbox.pop_front().unwrap();
        assert_eq!(answer.request_id, RequestId(1));
        assert_eq!(answer.snapshot, Snapshot::empty(9));
    }

    #[test]
    fn removed_summary_is_forgotten() {
        let mut states = HashMap::new();
        let mut outbox = VecDeque::new();
        register(&mut states, SummaryId(1));
        apply(&mut states, &mut outbox, Request::Remove { target: SummaryId(1) });
        assert!(states.is_empty());

        // late observations for it are dropped rather than resurrecting it
        apply(&mut states, &mut outbox, put(SummaryId(1), 1.0));
        assert!(states.is_empty());
    }

    #[test]
    fn held_response_lock_does_not_stall_observations() {
        let dispatcher = dispatcher();
        let summary = dispatcher.register(SummaryOptions::default()).unwrap();
        let parked = RequestId(u64::MAX);

        let held = dispatcher.shared.responses.hold();
        dispatcher.shared.submit(Request::Get {
            timestamp_ms: 0,
            target: summary.id(),
            request_id: parked,
        });
        for _ in 0..100 {
            summary.observe(1.0);
        }

        assert!(wait_until(|| dispatcher.pending_requests() == 0));
        assert!(held.is_empty());
        drop(held);

        // the parked answer is published once the lock is free
        assert!(wait_until(|| dispatcher.shared.responses.head_id() == Some(parked)));
        assert_eq!(dispatcher.shared.responses.claim(parked).count, 0.0);
        assert_eq!(summary.snapshot().count, 100.0);
    }

    #[test]
    fn panicking_worker_is_marked_dead() {
        let alive = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&alive);
        let outcome = thread::spawn(move || {
            let _guard = AliveGuard(&flag);
            panic!("worker failure");
        })
        .join();

        assert!(outcome.is_err());
        assert!(!alive.load(Ordering::Acquire));

        let dispatcher = dispatcher();
        dispatcher.shared.alive.store(false, Ordering::Release);
        assert!(!dispatcher.is_running());
        assert!(matches!(
            dispatcher.register(SummaryOptions::default()),
            Err(SummaryError::Stopped)
        ));
    }

    #[test]
    fn dead_worker_stops_accepting_requests() {
        let shared = Arc::new(Shared::new(Arc::new(ManualClock::new(0)), WaitStrategy::Yield));
        let summary = Summary::new(SummaryId(0), Arc::clone(&shared));

        summary.observe(1.0);
        assert_eq!(shared.requests.len(), 1);

        shared.alive.store(false, Ordering::Release);
        summary.observe(2.0);
        drop(summary);
        assert_eq!(shared.requests.len(), 1);
    }

    #[test]
    fn worker_names_its_thread() {
        let config = DispatcherConfig {
            thread_name: "summary-test-worker".into(),
            ..DispatcherConfig::default()
        };
        let dispatcher = Dispatcher::with_clock(config, Arc::new(ManualClock::new(0))).unwrap();
        let name = dispatcher
            .worker
            .lock()
            .as_ref()
            .and_then(|h| h.thread().name().map(str::to_owned));
        assert_eq!(name.as_deref(), Some("summary-test-worker"));
    }

    #[test]
    fn shutdown_is_idempotent_and_stops_registration() {
        let dispatcher = dispatcher();
        assert!(dispatcher.is_running());

        dispatcher.shutdown();
        dispatcher.shutdown();
        assert!(!dispatcher.is_running());
        assert!(matches!(
            dispatcher.register(SummaryOptions::default()),
            Err(SummaryError::Stopped)
        ));
    }

    #[test]
    fn observe_after_shutdown_is_dropped() {
        let dispatcher = dispatcher();
        let summary = dispatcher.register(SummaryOptions::default()).unwrap();
        dispatcher.shutdown();

        let before = dispatcher.pending_requests();
        summary.observe(1.0);
        assert_eq!(dispatcher.pending_requests(), before);
    }
}
