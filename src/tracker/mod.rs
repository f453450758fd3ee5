pub mod source;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use source::{JobRecord, JobState, StatusStore};
use state::{step, BackendStatus, Event, Phase, TrackerState};

pub const ELAPSED_TICK: Duration = Duration::from_secs(1);
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

pub type CompleteFn = Box<dyn FnOnce(i64) + Send>;
pub type ErrorFn = Box<dyn FnOnce(String) + Send>;

/// Polls a [`StatusStore`] for one search job and publishes live
/// [`TrackerState`] snapshots. The polling task owns its three timers
/// (elapsed ticker, poll ticker, soft-limit guard); dropping the tracker
/// cancels the task, and no callback fires after that.
pub struct SearchTracker {
    handle: JoinHandle<()>,
    status_rx: watch::Receiver<TrackerState>,
    guard: DropGuard,
}

impl SearchTracker {
    pub fn spawn<S>(
        store: Arc<S>,
        keyword: impl Into<String>,
        on_complete: CompleteFn,
        on_error: ErrorFn,
    ) -> Self
    where
        S: StatusStore + ?Sized + 'static,
    {
        let keyword = keyword.into();
        let cancel = CancellationToken::new();
        let (tx, status_rx) = watch::channel(TrackerState::new());
        let handle = tokio::spawn(run_loop(
            store,
            keyword,
            tx,
            cancel.clone(),
            on_complete,
            on_error,
        ));
        SearchTracker {
            handle,
            status_rx,
            guard: cancel.drop_guard(),
        }
    }

    pub fn status(&self) -> TrackerState {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerState> {
        self.status_rx.clone()
    }

    /// Run until the job reaches a terminal state, then return it.
    pub async fn wait(self) -> TrackerState {
        let SearchTracker { handle, status_rx, guard } = self;
        let _ = handle.await;
        drop(guard);
        let state = status_rx.borrow().clone();
        state
    }

    /// Cancel all timers and wait for the polling task to exit. No callback
    /// fires after this returns.
    pub async fn shutdown(self) -> TrackerState {
        let SearchTracker { handle, status_rx, guard } = self;
        drop(guard);
        let _ = handle.await;
        let state = status_rx.borrow().clone();
        state
    }
}

async fn run_loop<S>(
    store: Arc<S>,
    keyword: String,
    tx: watch::Sender<TrackerState>,
    cancel: CancellationToken,
    on_complete: CompleteFn,
    on_error: ErrorFn,
) where
    S: StatusStore + ?Sized,
{
    let mut state = TrackerState::new();
    let mut on_complete = Some(on_complete);
    let mut on_error = Some(on_error);

    let start = Instant::now();
    let mut elapsed_ticker = interval_at(start + ELAPSED_TICK, ELAPSED_TICK);
    elapsed_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut poll_ticker = interval_at(start + POLL_INTERVAL, POLL_INTERVAL);
    poll_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let soft_limit = tokio::time::sleep(Duration::from_secs(state::SOFT_LIMIT_SECS));
    tokio::pin!(soft_limit);
    let mut soft_limit_fired = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(%keyword, "tracker disposed");
                break;
            }
            _ = elapsed_ticker.tick() => {
                state = step(state, Event::Tick);
                let _ = tx.send(state.clone());
            }
            _ = poll_ticker.tick() => {
                // Awaiting the fetch here sequences polls: a new request
                // never starts before the previous response lands.
                match store.fetch(&keyword).await {
                    Ok(Some(record)) => {
                        state = step(state, Event::Backend(backend_status(record)));
                        let _ = tx.send(state.clone());
                        if state.phase.is_terminal() {
                            fire_terminal(&state, &mut on_complete, &mut on_error);
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(%keyword, "no job record yet");
                    }
                    Err(e) => {
                        warn!(%keyword, "status fetch failed, retrying next cycle: {e:#}");
                    }
                }
            }
            _ = &mut soft_limit, if !soft_limit_fired => {
                soft_limit_fired = true;
                state = step(state, Event::SoftLimit);
                let _ = tx.send(state.clone());
                debug!(%keyword, "soft limit reached, elapsed counter frozen");
            }
        }
    }
}

fn backend_status(record: JobRecord) -> BackendStatus {
    match record.status {
        JobState::Processing => BackendStatus::Processing,
        JobState::Completed => BackendStatus::Completed {
            result_count: record.result_count,
        },
        JobState::Failed => BackendStatus::Failed {
            message: record.error,
        },
    }
}

fn fire_terminal(
    state: &TrackerState,
    on_complete: &mut Option<CompleteFn>,
    on_error: &mut Option<ErrorFn>,
) {
    match state.phase {
        Phase::Completed => {
            if let Some(cb) = on_complete.take() {
                cb(state.result_count.unwrap_or(0));
            }
        }
        Phase::Error => {
            if let Some(cb) = on_error.take() {
                cb(state
                    .error
                    .clone()
                    .unwrap_or_else(|| state::DEFAULT_ERROR_MESSAGE.to_string()));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::*;

    struct FakeStore {
        started: Instant,
        complete_after: Option<Duration>,
        fail_message: Option<Option<String>>,
        fetch_errors: AtomicU32,
        calls: AtomicU32,
    }

    impl FakeStore {
        fn processing_forever() -> Self {
            FakeStore {
                started: Instant::now(),
                complete_after: None,
                fail_message: None,
                fetch_errors: AtomicU32::new(0),
                calls: AtomicU32::new(0),
            }
        }

        fn completing_after(d: Duration) -> Self {
            FakeStore { complete_after: Some(d), ..Self::processing_forever() }
        }

        fn failing_with(message: Option<&str>) -> Self {
            FakeStore {
                fail_message: Some(message.map(String::from)),
                ..Self::processing_forever()
            }
        }

        fn erroring_first(n: u32) -> Self {
            FakeStore {
                complete_after: Some(Duration::ZERO),
                fetch_errors: AtomicU32::new(n),
                ..Self::processing_forever()
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusStore for FakeStore {
        async fn fetch(&self, keyword: &str) -> anyhow::Result<Option<JobRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self
                .fetch_errors
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(anyhow!("transient store error"));
            }

            if let Some(message) = &self.fail_message {
                return Ok(Some(JobRecord {
                    keyword: keyword.to_string(),
                    status: JobState::Failed,
                    result_count: 0,
                    error: message.clone(),
                }));
            }

            let status = match self.complete_after {
                Some(d) if self.started.elapsed() >= d => JobState::Completed,
                _ => JobState::Processing,
            };
            Ok(Some(JobRecord {
                keyword: keyword.to_string(),
                status,
                result_count: if status == JobState::Completed { 12 } else { 0 },
                error: None,
            }))
        }
    }

    fn counting_complete(hits: &Arc<AtomicU32>, last: &Arc<Mutex<Option<i64>>>) -> CompleteFn {
        let hits = Arc::clone(hits);
        let last = Arc::clone(last);
        Box::new(move |n| {
            hits.fetch_add(1, Ordering::SeqCst);
            *last.lock().unwrap() = Some(n);
        })
    }

    fn no_error() -> ErrorFn {
        Box::new(|message| panic!("unexpected error callback: {message}"))
    }

    fn no_complete() -> CompleteFn {
        Box::new(|n| panic!("unexpected completion callback: {n}"))
    }

    #[tokio::test(start_paused = true)]
    async fn walks_phases_and_completes_exactly_once() {
        let store = Arc::new(FakeStore::completing_after(Duration::from_secs(40)));
        let hits = Arc::new(AtomicU32::new(0));
        let last = Arc::new(Mutex::new(None));
        let tracker = SearchTracker::spawn(
            Arc::clone(&store),
            "tenis corrida",
            counting_complete(&hits, &last),
            no_error(),
        );

        assert_eq!(tracker.status().phase, Phase::Initiating);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(tracker.status().phase, Phase::Searching);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(tracker.status().phase, Phase::Processing);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(tracker.status().phase, Phase::Caching);

        let end = tracker.wait().await;
        assert_eq!(end.phase, Phase::Completed);
        assert_eq!(end.progress, 100);
        assert_eq!(end.result_count, Some(12));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(*last.lock().unwrap(), Some(12));

        // Terminal means terminal: no polls keep running afterwards.
        let calls = store.calls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_failure_fires_on_error_once_and_stops_timers() {
        let store = Arc::new(FakeStore::failing_with(Some("X")));
        let hits = Arc::new(AtomicU32::new(0));
        let messages = Arc::new(Mutex::new(Vec::new()));
        let on_error: ErrorFn = Box::new({
            let hits = Arc::clone(&hits);
            let messages = Arc::clone(&messages);
            move |message| {
                hits.fetch_add(1, Ordering::SeqCst);
                messages.lock().unwrap().push(message);
            }
        });
        let tracker = SearchTracker::spawn(Arc::clone(&store), "tenis", no_complete(), on_error);

        let end = tracker.wait().await;
        assert_eq!(end.phase, Phase::Error);
        assert_eq!(end.error.as_deref(), Some("X"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(messages.lock().unwrap().as_slice(), ["X"]);

        let calls = store.calls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failures_are_retried_next_cycle() {
        let store = Arc::new(FakeStore::erroring_first(2));
        let hits = Arc::new(AtomicU32::new(0));
        let last = Arc::new(Mutex::new(None));
        let tracker = SearchTracker::spawn(
            Arc::clone(&store),
            "tenis",
            counting_complete(&hits, &last),
            no_error(),
        );

        let end = tracker.wait().await;
        assert_eq!(end.phase, Phase::Completed);
        assert_eq!(store.calls(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disposal_stops_polling_and_suppresses_callbacks() {
        let store = Arc::new(FakeStore::processing_forever());
        let tracker =
            SearchTracker::spawn(Arc::clone(&store), "tenis", no_complete(), no_error());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let end = tracker.shutdown().await;
        assert!(!end.phase.is_terminal());

        let calls = store.calls();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(store.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn soft_limit_freezes_elapsed_but_keeps_polling() {
        let store = Arc::new(FakeStore::processing_forever());
        let tracker =
            SearchTracker::spawn(Arc::clone(&store), "tenis", no_complete(), no_error());

        tokio::time::sleep(Duration::from_secs(120)).await;
        let s = tracker.status();
        assert!(s.soft_limited);
        assert!(s.elapsed_secs <= state::SOFT_LIMIT_SECS);
        assert_eq!(s.phase, Phase::Caching);

        let frozen = s.elapsed_secs;
        let calls_at_two_minutes = store.calls();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(tracker.status().elapsed_secs, frozen);
        assert!(store.calls() > calls_at_two_minutes);

        tracker.shutdown().await;
    }
}
