//! Runtime utilities that abstract over the underlying async executor.
//!
//! The playback coordinator is driven synchronously by host callbacks, so
//! some follow-up work (autoplay bookkeeping, event pumps) is only scheduled
//! when an executor is actually available. [`is_available`] answers that.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Returns `true` when called from inside a Tokio runtime context.
pub fn is_available() -> bool {
    Handle::try_current().is_ok()
}

/// Runs the provided future to completion on a fresh current-thread runtime.
///
/// # Panics
///
/// Panics if the runtime cannot be constructed, which only happens when the
/// process is out of OS resources.
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
