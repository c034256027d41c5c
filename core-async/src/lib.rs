//! Async primitives for the playback coordination crates.
//!
//! Every other crate in the workspace goes through this one instead of
//! reaching for Tokio directly, so the executor-facing surface stays in a
//! single place.
//!
//! # Modules
//!
//! - `runtime`: runtime detection and a blocking entry point for hosts
//! - `signal`: [`OnceSignal`](signal::OnceSignal), a single-fire completion
//!   signal with any number of subscribers
//! - `sync`: channels and locks
//! - `task`: task spawning
//! - `time`: sleeps and timeouts
//!
//! # Examples
//!
//! ```rust
//! use core_async::signal::OnceSignal;
//!
//! # core_async::runtime::block_on(async {
//! let signal = OnceSignal::new();
//! let first = signal.subscribe();
//! let second = signal.subscribe();
//!
//! assert!(signal.fire(7));
//! assert_eq!(first.await, Ok(7));
//! assert_eq!(second.await, Ok(7));
//! # });
//! ```

pub mod runtime;
pub mod signal;
pub mod sync;
pub mod task;
pub mod time;

pub use signal::{OnceReceiver, OnceSignal, SignalClosed};
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
