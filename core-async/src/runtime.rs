//! Runtime utilities wrapping the tokio executor.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a throwaway current-thread runtime.
///
/// Only meant for synchronous call sites that sit outside any runtime, such as
/// forwarding a log entry from a non-async thread.
///
/// # Panics
///
/// Panics if the runtime cannot be built, or if called from inside a runtime.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}
