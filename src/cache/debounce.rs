//! Turns bursts of change events into single, serialized reloads.
//!
//! Every event restarts a quiet window. When the window elapses without a new
//! event, one load is dispatched to the blocking pool. At most one load runs
//! at a time: events that arrive while a load is running are remembered and
//! schedule exactly one follow-up load, `window` after the last of them.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::{self, JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::events::ChangeEvent;
use super::loader::{LoadError, LoadOutcome, SnapshotSource, record_load};
use super::store::PostCache;

const SOURCE: &str = "cache::debounce";

type LoadResult = (Result<LoadOutcome, LoadError>, Duration);

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// Nothing has changed since the last load.
    Idle,
    /// Changes seen; a load starts at `deadline` unless another event arrives.
    Pending { deadline: Instant },
    /// A load is running. `rerun_after` is set once an event arrives meanwhile.
    Loading { rerun_after: Option<Instant> },
}

impl DebounceState {
    pub fn on_event(self, now: Instant, window: Duration) -> Self {
        match self {
            Self::Idle | Self::Pending { .. } => Self::Pending {
                deadline: now + window,
            },
            Self::Loading { .. } => Self::Loading {
                rerun_after: Some(now + window),
            },
        }
    }

    pub fn on_deadline(self) -> Self {
        match self {
            Self::Pending { .. } => Self::Loading { rerun_after: None },
            other => other,
        }
    }

    pub fn on_load_complete(self) -> Self {
        match self {
            Self::Loading {
                rerun_after: Some(deadline),
            } => Self::Pending { deadline },
            Self::Loading { rerun_after: None } => Self::Idle,
            other => other,
        }
    }

    /// When the next load should start, if one is scheduled.
    pub fn deadline(&self) -> Option<Instant> {
        match self {
            Self::Pending { deadline } => Some(*deadline),
            _ => None,
        }
    }
}

pub struct DebounceCoordinator {
    source: Arc<dyn SnapshotSource>,
    store: Arc<PostCache>,
    window: Duration,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    cancel: CancellationToken,
}

impl DebounceCoordinator {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        store: Arc<PostCache>,
        window: Duration,
        events: mpsc::UnboundedReceiver<ChangeEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            store,
            window,
            events,
            cancel,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until cancelled, or until the event stream closes and no work is left.
    ///
    /// Cancellation abandons a running load; its result is never published.
    pub async fn run(mut self) {
        let mut state = DebounceState::Idle;
        let mut in_flight: Option<JoinHandle<LoadResult>> = None;
        let mut events_open = true;

        info!(target = SOURCE, window_ms = self.window.as_millis() as u64, "Debounce coordinator started");

        loop {
            if !events_open && state == DebounceState::Idle {
                info!(target = SOURCE, "Change stream closed; debounce coordinator stopping");
                break;
            }

            let deadline = state.deadline();
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    info!(target = SOURCE, "Debounce coordinator cancelled");
                    break;
                }

                joined = join_in_flight(&mut in_flight) => {
                    in_flight = None;
                    self.complete(joined);
                    state = state.on_load_complete();
                    if let Some(deadline) = state.deadline() {
                        debug!(
                            target = SOURCE,
                            delay_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
                            "Changes arrived during reload; follow-up reload scheduled"
                        );
                    }
                }

                received = self.events.recv(), if events_open => match received {
                    Some(event) => {
                        trace!(target = SOURCE, kind = event.kind.as_str(), "Quiet window restarted");
                        state = state.on_event(Instant::now(), self.window);
                    }
                    None => events_open = false,
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    state = state.on_deadline();
                    in_flight = Some(self.dispatch());
                }
            }
        }
    }

    fn dispatch(&self) -> JoinHandle<LoadResult> {
        info!(target = SOURCE, "Quiet window elapsed; reloading content");
        let source = Arc::clone(&self.source);
        task::spawn_blocking(move || {
            let started = std::time::Instant::now();
            let result = source.load();
            (result, started.elapsed())
        })
    }

    fn complete(&self, joined: Result<LoadResult, JoinError>) {
        let (result, elapsed) = match joined {
            Ok(loaded) => loaded,
            Err(err) => {
                counter!("folio_cache_reload_total", "result" => "error").increment(1);
                error!(target = SOURCE, error = %err, "Content reload task failed; previous snapshot retained");
                return;
            }
        };

        record_load(result.as_ref(), elapsed);
        match result {
            Ok(outcome) => {
                let generation = self.store.publish(outcome.snapshot);
                counter!("folio_cache_reload_total", "result" => "ok").increment(1);
                info!(target = SOURCE, generation, "Content reloaded");
            }
            Err(err) => {
                counter!("folio_cache_reload_total", "result" => "error").increment(1);
                error!(target = SOURCE, error = %err, "Content reload failed; previous snapshot retained");
            }
        }
    }
}

async fn join_in_flight(
    in_flight: &mut Option<JoinHandle<LoadResult>>,
) -> Result<LoadResult, JoinError> {
    match in_flight {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc as std_mpsc;

    use time::OffsetDateTime;
    use tokio::sync::Notify;
    use tokio::time::{advance, sleep};

    use super::*;
    use crate::cache::snapshot::Snapshot;
    use crate::domain::posts::Post;

    const WINDOW: Duration = Duration::from_millis(100);

    fn snapshot_with(title: &str) -> Snapshot {
        let mut builder = Snapshot::builder();
        builder.insert(Post::new(title, OffsetDateTime::UNIX_EPOCH).with_file_name("1.json"));
        builder.finish()
    }

    fn empty_outcome() -> Result<LoadOutcome, LoadError> {
        Ok(LoadOutcome {
            snapshot: Snapshot::default(),
            skipped: Vec::new(),
        })
    }

    #[derive(Default)]
    struct CountingSource {
        dispatched: Mutex<Vec<Instant>>,
    }

    impl CountingSource {
        fn dispatched(&self) -> Vec<Instant> {
            self.dispatched.lock().unwrap().clone()
        }
    }

    impl SnapshotSource for CountingSource {
        fn load(&self) -> Result<LoadOutcome, LoadError> {
            self.dispatched.lock().unwrap().push(Instant::now());
            empty_outcome()
        }
    }

    struct GatedSource {
        started: Notify,
        gate: Mutex<std_mpsc::Receiver<()>>,
        dispatched: Mutex<Vec<Instant>>,
    }

    impl SnapshotSource for GatedSource {
        fn load(&self) -> Result<LoadOutcome, LoadError> {
            self.dispatched.lock().unwrap().push(Instant::now());
            self.started.notify_one();
            let _ = self.gate.lock().unwrap().recv();
            empty_outcome()
        }
    }

    #[derive(Default)]
    struct FlakySource {
        attempts: AtomicUsize,
        finished: Notify,
    }

    impl SnapshotSource for FlakySource {
        fn load(&self) -> Result<LoadOutcome, LoadError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            let result = if attempt == 0 {
                Err(LoadError::ReadDir {
                    path: PathBuf::from("posts"),
                    source: io::Error::other("directory vanished"),
                })
            } else {
                Ok(LoadOutcome {
                    snapshot: snapshot_with("Fresh"),
                    skipped: Vec::new(),
                })
            };
            self.finished.notify_one();
            result
        }
    }

    struct Harness {
        events: mpsc::UnboundedSender<ChangeEvent>,
        store: Arc<PostCache>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    }

    impl Harness {
        fn start(source: Arc<dyn SnapshotSource>, initial: Snapshot) -> Self {
            let (events, rx) = mpsc::unbounded_channel();
            let store = Arc::new(PostCache::new(initial));
            let cancel = CancellationToken::new();
            let task =
                DebounceCoordinator::new(source, Arc::clone(&store), WINDOW, rx, cancel.clone())
                    .spawn();
            Self {
                events,
                store,
                cancel,
                task,
            }
        }

        fn touch(&self) -> Instant {
            let now = Instant::now();
            self.events.send(ChangeEvent::rescan()).unwrap();
            now
        }

        async fn stop(self) {
            self.cancel.cancel();
            self.task.await.unwrap();
        }
    }

    #[test]
    fn state_transitions() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(30);

        let pending = DebounceState::Idle.on_event(t0, WINDOW);
        assert_eq!(pending, DebounceState::Pending { deadline: t0 + WINDOW });
        assert_eq!(
            pending.on_event(t1, WINDOW),
            DebounceState::Pending { deadline: t1 + WINDOW }
        );

        let loading = pending.on_deadline();
        assert_eq!(loading, DebounceState::Loading { rerun_after: None });
        assert_eq!(loading.deadline(), None);
        assert_eq!(loading.on_load_complete(), DebounceState::Idle);

        let rerun = loading.on_event(t1, WINDOW);
        assert_eq!(rerun, DebounceState::Loading { rerun_after: Some(t1 + WINDOW) });
        assert_eq!(rerun.on_load_complete(), DebounceState::Pending { deadline: t1 + WINDOW });

        assert_eq!(DebounceState::Idle.on_deadline(), DebounceState::Idle);
        assert_eq!(DebounceState::Idle.on_load_complete(), DebounceState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_events_triggers_one_reload_after_quiet_window() {
        let source = Arc::new(CountingSource::default());
        let harness = Harness::start(source.clone(), Snapshot::default());
        let mut published = harness.store.subscribe();

        let mut last = Instant::now();
        for _ in 0..5 {
            last = harness.touch();
            sleep(Duration::from_millis(20)).await;
        }
        assert!(source.dispatched().is_empty());

        published.changed().await.unwrap();
        let dispatched = source.dispatched();
        assert_eq!(dispatched.len(), 1);
        assert!(dispatched[0] >= last + WINDOW);

        sleep(WINDOW * 5).await;
        assert_eq!(source.dispatched().len(), 1);
        assert_eq!(harness.store.generation(), 1);
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn separated_changes_reload_separately() {
        let source = Arc::new(CountingSource::default());
        let harness = Harness::start(source.clone(), Snapshot::default());
        let mut published = harness.store.subscribe();

        harness.touch();
        published.wait_for(|generation| *generation >= 1).await.unwrap();
        sleep(WINDOW * 3).await;

        harness.touch();
        published.wait_for(|generation| *generation >= 2).await.unwrap();

        assert_eq!(source.dispatched().len(), 2);
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn events_during_a_load_schedule_exactly_one_follow_up() {
        let (gate, gate_rx) = std_mpsc::channel();
        let source = Arc::new(GatedSource {
            started: Notify::new(),
            gate: Mutex::new(gate_rx),
            dispatched: Mutex::new(Vec::new()),
        });
        let harness = Harness::start(source.clone(), Snapshot::default());
        let mut published = harness.store.subscribe();

        harness.touch();
        source.started.notified().await;

        // Auto-advance is suspended while a blocking load runs, so move the clock by hand.
        let mut last = Instant::now();
        for _ in 0..3 {
            last = harness.touch();
            advance(Duration::from_millis(10)).await;
        }
        advance(WINDOW * 3).await;
        assert_eq!(source.dispatched.lock().unwrap().len(), 1, "loads must not overlap");

        gate.send(()).unwrap();
        gate.send(()).unwrap();
        published.wait_for(|generation| *generation >= 2).await.unwrap();

        sleep(WINDOW * 5).await;
        let dispatched = source.dispatched.lock().unwrap().clone();
        assert_eq!(dispatched.len(), 2);
        assert!(dispatched[1] >= last + WINDOW);
        assert_eq!(harness.store.generation(), 2);
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reload_keeps_previous_snapshot() {
        let source = Arc::new(FlakySource::default());
        let harness = Harness::start(source.clone(), snapshot_with("Original"));
        let mut published = harness.store.subscribe();

        harness.touch();
        source.finished.notified().await;
        sleep(WINDOW).await;

        assert_eq!(harness.store.generation(), 0);
        assert!(harness.store.get("original").is_some());

        harness.touch();
        published.wait_for(|generation| *generation >= 1).await.unwrap();

        assert!(harness.store.get("original").is_none());
        assert!(harness.store.get("fresh").is_some());
        assert_eq!(source.attempts.load(Ordering::SeqCst), 2);
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn closed_stream_flushes_pending_reload_then_stops() {
        let source = Arc::new(CountingSource::default());
        let harness = Harness::start(source.clone(), Snapshot::default());

        harness.touch();
        drop(harness.events);
        harness.task.await.unwrap();

        assert_eq!(source.dispatched().len(), 1);
        assert_eq!(harness.store.generation(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_an_idle_coordinator() {
        let source = Arc::new(CountingSource::default());
        let harness = Harness::start(source.clone(), Snapshot::default());

        harness.stop().await;
        assert!(source.dispatched().is_empty());
    }
}
