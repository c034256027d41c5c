//! Synchronization primitives.
//!
//! Re-exports the async-aware `tokio::sync` types used across the workspace.
//! All of them are `Send + Sync` and never block the executor.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::mpsc;
//!
//! # core_async::runtime::block_on(async {
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! tx.send("loadstart").unwrap();
//! assert_eq!(rx.recv().await, Some("loadstart"));
//! # });
//! ```

pub use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify};
