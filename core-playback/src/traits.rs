//! # Backend Traits
//!
//! The contract between the coordinator and the media backend ("tech") that
//! actually loads and plays sources.
//!
//! ## Result shapes
//!
//! Backends disagree on what `play` returns. Some hand back a pending
//! asynchronous result, some a plain value, some nothing at all. The
//! contract captures that as [`PlayReturn`]:
//!
//! - [`PlayReturn::Thenable`]: a future that settles later
//! - [`PlayReturn::Value`]: an immediate value, [`PlayValue::Null`] for "nothing"
//!
//! The coordinator turns either shape into the same asynchronous handle in
//! [`crate::normalize`].
//!
//! ## Notifications
//!
//! Backends report progress through [`TechEvent`]s. Deliver them with
//! [`Player::handle_tech_event`](crate::player::Player::handle_tech_event),
//! or push them into a channel pumped by
//! [`Player::spawn_event_pump`](crate::player::Player::spawn_event_pump).

use crate::error::Result;
use crate::source::SourceDescriptor;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;

/// Value produced by a backend play call.
///
/// `Null` stands for a backend that returned nothing.
pub type PlayValue = serde_json::Value;

/// What a backend's `play` returned.
pub enum PlayReturn {
    /// An asynchronous result that settles later.
    Thenable(BoxFuture<'static, Result<PlayValue>>),
    /// An immediate value.
    Value(PlayValue),
}

impl PlayReturn {
    /// Wrap a future as a pending result.
    pub fn thenable<F>(future: F) -> Self
    where
        F: Future<Output = Result<PlayValue>> + Send + 'static,
    {
        PlayReturn::Thenable(future.boxed())
    }

    /// Wrap an immediate value.
    pub fn value(value: impl Into<PlayValue>) -> Self {
        PlayReturn::Value(value.into())
    }

    /// The backend returned nothing.
    pub fn nothing() -> Self {
        PlayReturn::Value(PlayValue::Null)
    }

    pub fn is_thenable(&self) -> bool {
        matches!(self, PlayReturn::Thenable(_))
    }
}

impl fmt::Debug for PlayReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayReturn::Thenable(_) => f.write_str("PlayReturn::Thenable(..)"),
            PlayReturn::Value(value) => f.debug_tuple("PlayReturn::Value").field(value).finish(),
        }
    }
}

/// Notifications a backend raises about the source it is loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TechEvent {
    /// The newly assigned source started loading and can accept play calls.
    LoadStart,
    /// Playback actually started.
    Play,
}

/// Media backend driven by the coordinator.
///
/// Implementations must be cheap to call from the synchronous play path:
/// `play` should kick off playback and return, not wait for it.
pub trait Tech: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Begin loading `source`. Load-start is reported later as
    /// [`TechEvent::LoadStart`].
    fn set_source(&self, source: &SourceDescriptor) -> Result<()>;

    /// Start playback.
    fn play(&self) -> PlayReturn;

    fn pause(&self);

    fn muted(&self) -> bool;

    fn set_muted(&self, muted: bool);
}
