//! Task spawning and execution.
//!
//! Besides the tokio re-exports this module owns [`spawn_guarded`], the panic
//! boundary used for tasks that must never take the process down with them.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the tokio runtime.
///
/// # Examples
///
/// ```rust
/// use core_async::task::spawn;
///
/// # async fn example() {
/// let handle = spawn(async { 42 });
/// assert_eq!(handle.await.unwrap(), 42);
/// # }
/// ```
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Spawns `future` behind a panic boundary.
///
/// If the future panics, the panic is caught and its message handed to
/// `on_panic` instead of unwinding into the runtime. The returned handle
/// resolves once either the future or `on_panic` has finished.
pub fn spawn_guarded<F, P>(future: F, on_panic: P) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
    P: FnOnce(String) + Send + 'static,
{
    tokio::task::spawn(async move {
        if let Err(payload) = AssertUnwindSafe(future).catch_unwind().await {
            on_panic(panic_message(payload.as_ref()));
        }
    })
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked with a non-string payload".to_string()
    }
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
