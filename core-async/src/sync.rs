//! Synchronization primitives.
//!
//! Re-exports tokio's async-aware channels and locks plus the
//! `tokio-util` cancellation token used for cooperative shutdown.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{mpsc, watch};
//!
//! # async fn example() {
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! tx.send(1u32).unwrap();
//! assert_eq!(rx.recv().await, Some(1));
//!
//! let (state_tx, state_rx) = watch::channel("idle");
//! state_tx.send_replace("playing");
//! assert_eq!(*state_rx.borrow(), "playing");
//! # }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, OnceCell, RwLock,
    RwLockReadGuard, RwLockWriteGuard,
};

pub use tokio_util::sync::CancellationToken;
