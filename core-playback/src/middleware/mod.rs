//! # Middleware
//!
//! Pluggable interceptors that sit between the player and the backend.
//!
//! A middleware can rewrite or refuse a source before the backend sees it
//! ([`Middleware::set_source`]) and veto play or pause calls
//! ([`Middleware::call_play`], [`Middleware::call_pause`]). Every hook is
//! optional; the defaults pass everything through.
//!
//! Middleware are produced by [`MiddlewareFactory`] functions registered in a
//! [`MiddlewareRegistry`] under a source type or [`WILDCARD`]. A fresh
//! [`MiddlewareChain`] is instantiated from the matching factories for every
//! source change, so middleware may keep per-source state.
//!
//! ```rust
//! use async_trait::async_trait;
//! use core_playback::middleware::{
//!     factory, Middleware, MiddlewareRegistry, PlayDirective, TERMINATOR,
//! };
//!
//! struct BlockPlay;
//!
//! #[async_trait]
//! impl Middleware for BlockPlay {
//!     fn call_play(&self) -> PlayDirective {
//!         TERMINATOR
//!     }
//! }
//!
//! let registry = MiddlewareRegistry::new();
//! registry.register("video/mp4", factory(|_tech| BlockPlay));
//! assert_eq!(registry.factories_for("video/mp4").len(), 1);
//! ```

mod pipeline;
mod registry;

pub use pipeline::{MiddlewareChain, MiddlewarePipeline};
pub use registry::{MiddlewareRegistry, WILDCARD};

use crate::error::Result;
use crate::source::SourceDescriptor;
use crate::traits::Tech;
use async_trait::async_trait;
use std::sync::Arc;

/// Verdict of a `call_*` intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayDirective {
    /// Let the call continue down the chain.
    Continue,
    /// Stop the chain; the backend is not called.
    Terminate,
}

/// Sentinel returned from [`Middleware::call_play`] to veto a play request.
pub const TERMINATOR: PlayDirective = PlayDirective::Terminate;

/// An interceptor for source assignment and play/pause calls.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Inspect, rewrite or refuse a source before it reaches the backend.
    ///
    /// Receives the descriptor produced by the previous middleware. Returning
    /// an error aborts the source change.
    async fn set_source(&self, source: SourceDescriptor) -> Result<SourceDescriptor> {
        Ok(source)
    }

    /// Called in chain order right before the backend's play.
    fn call_play(&self) -> PlayDirective {
        PlayDirective::Continue
    }

    /// Called in reverse chain order after a play call finished or was
    /// terminated.
    fn played(&self, _terminated: bool) {}

    /// Called in chain order right before the backend's pause.
    fn call_pause(&self) -> PlayDirective {
        PlayDirective::Continue
    }

    /// Called in reverse chain order after a pause call finished or was
    /// terminated.
    fn paused(&self, _terminated: bool) {}
}

/// Builds a middleware instance bound to the current backend.
pub type MiddlewareFactory = Arc<dyn Fn(&Arc<dyn Tech>) -> Arc<dyn Middleware> + Send + Sync>;

/// Wrap a closure returning a concrete middleware as a [`MiddlewareFactory`].
pub fn factory<F, M>(build: F) -> MiddlewareFactory
where
    F: Fn(&Arc<dyn Tech>) -> M + Send + Sync + 'static,
    M: Middleware + 'static,
{
    Arc::new(move |tech: &Arc<dyn Tech>| Arc::new(build(tech)) as Arc<dyn Middleware>)
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "middleware panicked".to_string()
    }
}
