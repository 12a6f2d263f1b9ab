//! FIFO command queue with a single drain task.
//!
//! ```text
//! Idle ──start()──► Active ──pop──► Active+running ──done──► Active ─┐
//!  ▲                   │                                            │
//!  └──── group empty ──┴────────────── next entry ◄─────────────────┘
//! ```
//!
//! All state sits behind one `parking_lot::Mutex`. The lock is never held
//! across an `.await` or while a user closure runs. A `worker_alive` flag
//! guarantees at most one drain task exists, so at most one entry is running
//! even when `stop()` and `start()` are called while an entry is in flight.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use robolink_metrics::metric_defs;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::entry::{CompletionFn, EntryError, StackEntry};

/// Name of the group the drain task consumes.
pub const DEFAULT_GROUP: &str = "default";

/// Queue settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Start draining automatically whenever an entry is enqueued.
    pub auto_start: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { auto_start: true }
    }
}

#[derive(Default)]
struct State {
    groups: HashMap<String, VecDeque<StackEntry>>,
    active: bool,
    running: bool,
    auto_start: bool,
    worker_alive: bool,
}

impl State {
    fn default_depth(&self) -> usize {
        self.groups.get(DEFAULT_GROUP).map_or(0, VecDeque::len)
    }
}

struct Shared {
    state: Mutex<State>,
    /// `true` while no drain task exists.
    idle: watch::Sender<bool>,
    runtime: Option<Handle>,
}

/// Ordered execution queue for transport operations.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct StackQueue {
    shared: Arc<Shared>,
}

impl StackQueue {
    /// Creates an idle queue with default settings.
    ///
    /// The drain task is spawned on the runtime current at construction, or
    /// on the runtime current at `start()` if there was none.
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Creates an idle queue.
    pub fn with_config(config: QueueConfig) -> Self {
        let (idle, _) = watch::channel(true);
        StackQueue {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    auto_start: config.auto_start,
                    ..State::default()
                }),
                idle,
                runtime: Handle::try_current().ok(),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Enqueueing
    // ------------------------------------------------------------------------

    /// Appends an entry to the default group.
    pub fn enqueue(&self, entry: StackEntry) {
        self.enqueue_in(DEFAULT_GROUP, entry);
    }

    /// Appends an entry to `group`.
    ///
    /// Only the default group is drained; other groups are read with
    /// [`StackQueue::next`].
    pub fn enqueue_in(&self, group: &str, entry: StackEntry) {
        log::trace!("enqueue {} entry in group '{}'", entry.kind(), group);
        metrics::counter!(metric_defs::STACK_ENTRIES.name, "kind" => entry.kind()).increment(1);

        let auto_start = {
            let mut state = self.shared.state.lock();
            state
                .groups
                .entry(group.to_string())
                .or_default()
                .push_back(entry);
            metrics::gauge!(metric_defs::STACK_DEPTH.name).set(state.default_depth() as f64);
            state.auto_start
        };

        if auto_start {
            self.start();
        }
    }

    /// Appends a synchronous command.
    pub fn enqueue_command<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(StackEntry::command(f));
    }

    /// Appends a delay.
    pub fn enqueue_delay(&self, duration: Duration) {
        self.enqueue(StackEntry::delay(duration));
    }

    /// Appends an asynchronous command, with an optional completion callback.
    pub fn enqueue_async<F, Fut, E>(&self, f: F, on_done: Option<CompletionFn>)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<EntryError> + 'static,
    {
        self.enqueue_async_in(DEFAULT_GROUP, f, on_done);
    }

    /// Appends an asynchronous command to `group`.
    pub fn enqueue_async_in<F, Fut, E>(
        &self,
        group: &str,
        f: F,
        on_done: Option<CompletionFn>,
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<EntryError> + 'static,
    {
        let entry = match on_done {
            Some(on_done) => StackEntry::async_command_with(f, on_done),
            None => StackEntry::async_command(f),
        };
        self.enqueue_in(group, entry);
    }

    // ------------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------------

    /// Starts draining the default group if the queue is not already active.
    ///
    /// Also re-enables auto start.
    pub fn start(&self) {
        let spawn = {
            let mut state = self.shared.state.lock();
            if state.active {
                return;
            }
            state.active = true;
            state.auto_start = true;
            state.running = false;
            if state.worker_alive {
                // The previous drain task picks up again after its in-flight entry.
                false
            } else {
                state.worker_alive = true;
                self.shared.idle.send_replace(false);
                true
            }
        };

        if spawn {
            self.spawn_worker();
        }
    }

    /// Stops dequeuing. An in-flight entry still completes.
    ///
    /// Has no effect on an inactive queue.
    pub fn stop(&self) {
        self.stop_with(|| {});
    }

    /// Stops dequeuing and invokes `on_stopped` if the queue was active.
    pub fn stop_with<F>(&self, on_stopped: F)
    where
        F: FnOnce(),
    {
        let was_active = {
            let mut state = self.shared.state.lock();
            let was_active = state.active;
            if was_active {
                state.active = false;
                state.auto_start = false;
                state.running = false;
            }
            was_active
        };

        if was_active {
            log::debug!("stack queue stopped");
            on_stopped();
        }
    }

    /// Drops every pending entry in the default group.
    ///
    /// An in-flight entry is not cancelled.
    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        let dropped = state
            .groups
            .get_mut(DEFAULT_GROUP)
            .map(|group| std::mem::take(group).len())
            .unwrap_or(0);
        state.running = false;
        metrics::gauge!(metric_defs::STACK_DEPTH.name).set(0.0);
        if dropped > 0 {
            log::debug!("cleared {} pending entries", dropped);
        }
    }

    /// Pops the head of `group` without running it.
    pub fn next(&self, group: &str) -> Option<StackEntry> {
        let mut state = self.shared.state.lock();
        state.groups.get_mut(group)?.pop_front()
    }

    /// Waits until no drain task exists.
    ///
    /// Returns immediately on an idle queue, including one that holds
    /// entries but was never started.
    pub async fn drained(&self) {
        let mut idle = self.shared.idle.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = idle.wait_for(|idle| *idle).await;
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// Number of pending entries in `group`.
    pub fn len(&self, group: &str) -> usize {
        let state = self.shared.state.lock();
        state.groups.get(group).map_or(0, VecDeque::len)
    }

    /// Whether the default group has no pending entries.
    pub fn is_empty(&self) -> bool {
        self.len(DEFAULT_GROUP) == 0
    }

    /// Whether the queue is draining.
    pub fn is_active(&self) -> bool {
        self.shared.state.lock().active
    }

    /// Whether an entry is executing.
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Whether entries restart the queue when enqueued.
    pub fn auto_start(&self) -> bool {
        self.shared.state.lock().auto_start
    }

    // ------------------------------------------------------------------------
    // Drain task
    // ------------------------------------------------------------------------

    fn spawn_worker(&self) {
        let runtime = match self.shared.runtime.clone().or_else(|| Handle::try_current().ok()) {
            Some(runtime) => runtime,
            None => {
                log::warn!("no tokio runtime available, stack queue cannot drain");
                let mut state = self.shared.state.lock();
                state.active = false;
                state.worker_alive = false;
                self.shared.idle.send_replace(true);
                return;
            }
        };

        let shared = Arc::clone(&self.shared);
        runtime.spawn(drain(shared));
    }
}

impl Default for StackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StackQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("StackQueue")
            .field("depth", &state.default_depth())
            .field("groups", &state.groups.len())
            .field("active", &state.active)
            .field("running", &state.running)
            .field("auto_start", &state.auto_start)
            .finish()
    }
}

/// Restores worker bookkeeping if an entry panics inside the drain task.
struct WorkerGuard {
    shared: Arc<Shared>,
    armed: bool,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        log::warn!("stack queue drain task ended abnormally");
        let mut state = self.shared.state.lock();
        state.active = false;
        state.running = false;
        state.worker_alive = false;
        self.shared.idle.send_replace(true);
    }
}

async fn drain(shared: Arc<Shared>) {
    let mut guard = WorkerGuard {
        shared: Arc::clone(&shared),
        armed: true,
    };

    loop {
        let entry = {
            let mut state = shared.state.lock();
            let next = if state.active {
                state
                    .groups
                    .get_mut(DEFAULT_GROUP)
                    .and_then(VecDeque::pop_front)
            } else {
                None
            };
            match next {
                Some(entry) => {
                    state.running = true;
                    metrics::gauge!(metric_defs::STACK_DEPTH.name)
                        .set(state.default_depth() as f64);
                    entry
                }
                None => {
                    // Exit under the lock so a concurrent start() spawns a fresh task.
                    if state.active {
                        log::trace!("stack queue drained");
                    }
                    state.active = false;
                    state.running = false;
                    state.worker_alive = false;
                    shared.idle.send_replace(true);
                    guard.armed = false;
                    return;
                }
            }
        };

        match entry {
            StackEntry::Command(f) => f(),
            StackEntry::Delay(duration) => tokio::time::sleep(duration).await,
            StackEntry::Async { run, on_done } => {
                let result = run().await;
                if let Err(err) = &result {
                    log::warn!("queued async command failed: {}", err);
                    metrics::counter!(metric_defs::STACK_ASYNC_FAILURES.name).increment(1);
                }
                if let Some(on_done) = on_done {
                    on_done(result);
                }
            }
        }

        shared.state.lock().running = false;
    }
}
