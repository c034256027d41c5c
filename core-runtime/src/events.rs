//! # Event Bus System
//!
//! Typed notifications published by the playback coordinator, delivered over
//! a broadcast channel from `core_async::sync`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: `CoreEvent` wrapping source-lifecycle and playback events
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    emit     ┌───────────┐   subscribe   ┌────────────┐
//! │ Player       ├────────────>│ EventBus  ├──────────────>│ UI / host  │
//! │ (dispatcher) │             │ (broadcast│               └────────────┘
//! └──────────────┘             │  channel) │   subscribe   ┌────────────┐
//!                              │           ├──────────────>│ Tests      │
//!                              └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::PlayTerminated { generation: 1 }))
//!     .ok();
//!
//! let event = rx.recv().await.unwrap();
//! assert!(event.is_play_terminated());
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Source Events
//! - `Changing`: a source-change pass started
//! - `Accepted`: middleware accepted the source and the backend began loading it
//! - `Rejected`: middleware or the backend refused the source
//! - `LoadStarted`: the backend reported load-start for the current source
//!
//! ### Playback Events
//! - `PlayRequested`: a caller asked for playback
//! - `PlayDeferred`: the request is waiting for readiness
//! - `PlayTerminated`: middleware vetoed a play pass (one per vetoed pass)
//! - `PlayResolved`: a play execution settled its waiting callers
//! - `PlayCancelled`: waiting callers were rejected
//! - `Playing`: the backend reported that playback started
//! - `PauseTerminated`: middleware vetoed a pause
//! - `AutoplaySucceeded` / `AutoplayFailed`: outcome of autoplay on load-start
//!
//! ## Error Handling
//!
//! `emit` fails only when nobody is subscribed; publishers treat that as a
//! no-op. Slow subscribers see `RecvError::Lagged(n)` and may continue.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published and received through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Source lifecycle events
    Source(SourceEvent),
    /// Play/pause request events
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Source(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Source(SourceEvent::Rejected { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::AutoplayFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::PlayCancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Source(SourceEvent::Accepted { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::PlayTerminated { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::Playing) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Shorthand used by subscribers that only count vetoed play passes.
    pub fn is_play_terminated(&self) -> bool {
        matches!(self, CoreEvent::Playback(PlaybackEvent::PlayTerminated { .. }))
    }
}

impl From<SourceEvent> for CoreEvent {
    fn from(event: SourceEvent) -> Self {
        CoreEvent::Source(event)
    }
}

impl From<PlaybackEvent> for CoreEvent {
    fn from(event: PlaybackEvent) -> Self {
        CoreEvent::Playback(event)
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Source Events
// ============================================================================

/// Events describing the lifecycle of the active source.
///
/// `generation` identifies the source-change pass the event belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SourceEvent {
    /// A source-change pass started.
    Changing { generation: u64, source_type: String },
    /// The source passed through middleware and was handed to the backend.
    Accepted {
        generation: u64,
        /// Source URL after redaction, when enabled.
        src: String,
        source_type: String,
    },
    /// The source was refused by middleware or by the backend.
    Rejected { generation: u64, message: String },
    /// The backend reported load-start for the current source.
    LoadStarted { generation: u64 },
}

impl SourceEvent {
    fn description(&self) -> &str {
        match self {
            SourceEvent::Changing { .. } => "Source change started",
            SourceEvent::Accepted { .. } => "Source accepted",
            SourceEvent::Rejected { .. } => "Source rejected",
            SourceEvent::LoadStarted { .. } => "Source load started",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to play and pause requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A caller requested playback.
    PlayRequested {
        /// Callers waiting on the current batch, including this one.
        pending: usize,
    },
    /// The request was queued until the source is ready.
    PlayDeferred { pending: usize },
    /// Middleware vetoed a play pass. Emitted once per vetoed pass.
    PlayTerminated { generation: u64 },
    /// A play execution settled its waiting callers.
    PlayResolved { callers: usize },
    /// Waiting callers were rejected without a play execution.
    PlayCancelled { callers: usize, reason: String },
    /// The backend reported that playback actually started.
    Playing,
    /// Middleware vetoed a pause call.
    PauseTerminated { generation: u64 },
    /// Autoplay on load-start produced a play result.
    AutoplaySucceeded { mode: String },
    /// Autoplay on load-start was rejected.
    AutoplayFailed { mode: String, message: String },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::PlayRequested { .. } => "Play requested",
            PlaybackEvent::PlayDeferred { .. } => "Play deferred until ready",
            PlaybackEvent::PlayTerminated { .. } => "Play terminated by middleware",
            PlaybackEvent::PlayResolved { .. } => "Play resolved",
            PlaybackEvent::PlayCancelled { .. } => "Play cancelled",
            PlaybackEvent::Playing => "Playback started",
            PlaybackEvent::PauseTerminated { .. } => "Pause terminated by middleware",
            PlaybackEvent::AutoplaySucceeded { .. } => "Autoplay succeeded",
            PlaybackEvent::AutoplayFailed { .. } => "Autoplay failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
///
/// Publishing never requires a running executor, so the synchronous play
/// path can emit directly.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; configuration validation rejects that
    /// before a bus is ever built from it.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if nobody is subscribed.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let terminated = EventStream::new(bus.subscribe()).filter(CoreEvent::is_play_terminated);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` if no matching events are currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every buffered matching event.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(Ok(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
