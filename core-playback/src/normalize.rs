//! # Play Result Normalization
//!
//! Backends return either a pending asynchronous result or an immediate value
//! from `play` (see [`PlayReturn`]). Callers always get the same thing back:
//! a cloneable future that settles once with the outcome.
//!
//! This module is the only place the two shapes are told apart.

use crate::error::{PlaybackError, Result};
use crate::traits::{PlayReturn, PlayValue};
use futures::future::{self, BoxFuture, FutureExt, Shared};

/// Boxed future settling with the outcome of one play execution.
pub type PlayFuture = BoxFuture<'static, Result<PlayValue>>;

/// Cloneable handle to one play execution, shared by every caller in a batch.
pub type SharedPlay = Shared<PlayFuture>;

/// What happened when a play request went through the middleware pipeline.
#[derive(Debug)]
pub enum Mediation {
    /// The backend was called and returned this.
    Executed(PlayReturn),
    /// A middleware returned the terminator; the backend was not called.
    /// Callers stay pending until a later execution.
    Terminated,
    /// A middleware hook panicked.
    Faulted(PlaybackError),
}

/// Turn whatever the backend returned into a shared future.
///
/// A pending result is adopted as-is so its resolution or rejection reaches
/// every caller unchanged. An immediate value becomes an already-resolved
/// future.
pub fn normalize(ret: PlayReturn) -> SharedPlay {
    match ret {
        PlayReturn::Thenable(future) => future.shared(),
        PlayReturn::Value(value) => settled(Ok(value)),
    }
}

/// A shared future that is already settled with `result`.
pub fn settled(result: Result<PlayValue>) -> SharedPlay {
    future::ready(result).boxed().shared()
}
