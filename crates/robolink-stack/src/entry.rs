//! Queue entries.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Error produced by an asynchronous entry.
pub type EntryError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of an asynchronous entry.
pub type EntryResult = Result<(), EntryError>;

/// Boxed future driven by the drain task.
pub type EntryFuture = Pin<Box<dyn Future<Output = EntryResult> + Send>>;

/// Synchronous command body.
pub type CommandFn = Box<dyn FnOnce() + Send>;

/// Deferred operation; called once to obtain the future to await.
pub type AsyncFn = Box<dyn FnOnce() -> EntryFuture + Send>;

/// Completion callback receiving the outcome of an asynchronous entry.
pub type CompletionFn = Box<dyn FnOnce(EntryResult) + Send>;

/// One unit of queued work.
///
/// Entries are consumed exactly once by the drain task.
pub enum StackEntry {
    /// Runs a closure to completion without yielding.
    Command(CommandFn),
    /// Holds the queue for a fixed time.
    Delay(Duration),
    /// Awaits a future, then reports its outcome.
    Async {
        run: AsyncFn,
        on_done: Option<CompletionFn>,
    },
}

impl StackEntry {
    /// Creates a synchronous command entry.
    pub fn command<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        StackEntry::Command(Box::new(f))
    }

    /// Creates a delay entry.
    pub fn delay(duration: Duration) -> Self {
        StackEntry::Delay(duration)
    }

    /// Creates an asynchronous entry without a completion callback.
    pub fn async_command<F, Fut, E>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<EntryError> + 'static,
    {
        StackEntry::Async {
            run: boxed_async(f),
            on_done: None,
        }
    }

    /// Creates an asynchronous entry whose outcome is passed to `on_done`.
    ///
    /// `on_done` runs for failures as well as successes.
    pub fn async_command_with<F, Fut, E, C>(f: F, on_done: C) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<EntryError> + 'static,
        C: FnOnce(EntryResult) + Send + 'static,
    {
        StackEntry::Async {
            run: boxed_async(f),
            on_done: Some(Box::new(on_done)),
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StackEntry::Command(_) => "command",
            StackEntry::Delay(_) => "delay",
            StackEntry::Async { .. } => "async",
        }
    }
}

fn boxed_async<F, Fut, E>(f: F) -> AsyncFn
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<EntryError> + 'static,
{
    Box::new(move || -> EntryFuture {
        let fut = f();
        Box::pin(async move { fut.await.map_err(Into::into) })
    })
}

impl fmt::Debug for StackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackEntry::Command(_) => f.write_str("Command"),
            StackEntry::Delay(duration) => f.debug_tuple("Delay").field(duration).finish(),
            StackEntry::Async { on_done, .. } => f
                .debug_struct("Async")
                .field("on_done", &on_done.is_some())
                .finish(),
        }
    }
}
