//! Ordered command queue for half-duplex transports.
//!
//! A [`StackQueue`] runs queued entries one at a time, in submission order,
//! on a single Tokio task. Asynchronous entries are awaited before the next
//! entry starts, so two transport writes never overlap.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use robolink_stack::{EntryResult, StackQueue};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let queue = StackQueue::new();
//! queue.enqueue_command(|| println!("first"));
//! queue.enqueue_delay(Duration::from_millis(10));
//! queue.enqueue_async(
//!     || async { Ok::<(), std::io::Error>(()) },
//!     Some(Box::new(|result: EntryResult| assert!(result.is_ok()))),
//! );
//! queue.drained().await;
//! # }
//! ```

mod entry;
mod queue;

pub use entry::*;
pub use queue::{QueueConfig, StackQueue, DEFAULT_GROUP};
