//! Async runtime abstraction layer for the playback core.
//!
//! Every `core-*` crate reaches tokio through this crate instead of depending
//! on it directly. That keeps the executor choice in one place and gives the
//! rest of the workspace a small, stable vocabulary:
//!
//! - `task`: spawning, join handles and a panic boundary for long-lived tasks
//! - `time`: sleeps, intervals and durations
//! - `sync`: channels, locks, `OnceCell` and `CancellationToken`
//! - `runtime`: `block_on` for the rare synchronous entry points
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

// `select!` expands through `$crate`, so re-exporting it is enough for
// downstream crates to use it without naming tokio.
pub use tokio::select;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
