//! Workspace facade crate.
//!
//! Re-exports the workspace crates so host applications can depend on
//! `playcore-workspace` alone:
//!
//! - [`playback`]: player, middleware and readiness coordination
//! - [`runtime`]: logging bootstrap and the event bus
//! - [`async_rt`]: executor-facing primitives

pub use core_async as async_rt;
pub use core_playback as playback;
pub use core_runtime as runtime;

pub use core_playback::{
    AutoplayMode, Middleware, MiddlewareRegistry, PlayHandle, PlaybackError, Player,
    PlayerConfig, SourceDescriptor, Tech, TechEvent, TERMINATOR,
};
