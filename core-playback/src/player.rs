//! # Player
//!
//! The dispatcher that ties source assignment, middleware, readiness and the
//! backend together.
//!
//! ## Overview
//!
//! - [`Player::set_source`] runs the set-source middleware pass and hands the
//!   resulting source to the backend.
//! - [`Player::play`] returns a [`PlayHandle`] right away. The request executes
//!   immediately when the source is ready, otherwise it waits for load-start.
//!   Every request waiting at the same time is settled by one execution.
//! - Middleware may veto a play execution with the terminator. Waiting
//!   requests then stay pending until a later execution succeeds, which a new
//!   `play()` call or a backend [`TechEvent::Play`] can trigger.
//! - Backend notifications come in through [`Player::handle_tech_event`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{Player, SourceDescriptor, TechEvent};
//!
//! let player = Player::builder(tech).registry(registry).build()?;
//! let change = player.set_source(SourceDescriptor::new("clip.mp4", "video/mp4"));
//! let handle = player.play();
//!
//! change.await?;
//! player.handle_tech_event(TechEvent::LoadStart);
//! let value = handle.await?;
//! ```
//!
//! ## Threading
//!
//! `Player` is a cheap cloneable handle. Its state lives behind a single
//! mutex that is never held while middleware or the backend run, so hooks
//! and backends may call back into the player.

use crate::config::{AutoplayMode, PlayerConfig};
use crate::error::{PlaybackError, Result};
use crate::middleware::{MiddlewareChain, MiddlewarePipeline, MiddlewareRegistry};
use crate::normalize::{normalize, settled, Mediation, SharedPlay};
use crate::readiness::{ChangeOutcome, DeferredBatch, ReadinessCoordinator, ReadinessState};
use crate::source::SourceDescriptor;
use crate::traits::{PlayValue, Tech, TechEvent};
use core_async::sync::mpsc;
use core_async::task::JoinHandle;
use core_async::OnceReceiver;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, Receiver, SourceEvent};
use core_runtime::logging::{redact_source_url, strip_path};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, info, warn};

// ============================================================================
// Handles
// ============================================================================

/// Completion of a single [`Player::play`] call.
///
/// Resolves with the backend's play value, or fails with the backend's
/// rejection, a middleware fault, or a cancellation.
#[must_use = "dropping a PlayHandle discards the play outcome"]
pub struct PlayHandle {
    inner: BoxFuture<'static, Result<PlayValue>>,
}

impl PlayHandle {
    fn new(receiver: OnceReceiver<SharedPlay>) -> Self {
        Self {
            inner: async move {
                match receiver.await {
                    Ok(outcome) => outcome.await,
                    Err(_) => Err(PlaybackError::Disposed),
                }
            }
            .boxed(),
        }
    }

    fn wrap<F>(future: F) -> Self
    where
        F: Future<Output = Result<PlayValue>> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }
}

impl Future for PlayHandle {
    type Output = Result<PlayValue>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for PlayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PlayHandle(..)")
    }
}

/// A source change in progress.
///
/// The set-source pass runs when this future is polled. It resolves with the
/// source as rewritten by middleware once the backend has it.
#[must_use = "a source change does nothing unless awaited"]
pub struct SourceChange {
    inner: BoxFuture<'static, Result<SourceDescriptor>>,
}

impl SourceChange {
    fn settled(result: Result<SourceDescriptor>) -> Self {
        Self {
            inner: futures::future::ready(result).boxed(),
        }
    }
}

impl Future for SourceChange {
    type Output = Result<SourceDescriptor>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for SourceChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SourceChange(..)")
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Player`].
pub struct PlayerBuilder {
    tech: Arc<dyn Tech>,
    config: PlayerConfig,
    registry: Option<MiddlewareRegistry>,
    events: Option<EventBus>,
}

impl PlayerBuilder {
    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Registry to look middleware up in. Defaults to an empty private one.
    pub fn registry(mut self, registry: MiddlewareRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Bus to publish events on. Defaults to a new bus sized from the config.
    pub fn event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidConfig`] when the configuration does
    /// not validate.
    pub fn build(self) -> Result<Player> {
        let config = self.config;
        config.validate()?;

        let events = self
            .events
            .unwrap_or_else(|| EventBus::new(config.event_buffer_size));
        let registry = self.registry.unwrap_or_default();

        info!(
            tech = self.tech.name(),
            autoplay = %config.autoplay,
            "Player created"
        );

        Ok(Player {
            inner: Arc::new(PlayerInner {
                tech: self.tech,
                registry,
                events,
                config,
                state: Mutex::new(PlayerState::default()),
            }),
        })
    }
}

// ============================================================================
// Player
// ============================================================================

/// Coordinates play requests for one backend.
///
/// Only one play execution runs at a time. A `play()` issued from another
/// thread while an execution is in flight joins that execution's batch
/// without starting a pass of its own; if the pass is terminated, the request
/// waits for the next `play()` or backend `Play` notification.
#[derive(Clone)]
pub struct Player {
    inner: Arc<PlayerInner>,
}

struct PlayerInner {
    tech: Arc<dyn Tech>,
    registry: MiddlewareRegistry,
    events: EventBus,
    config: PlayerConfig,
    state: Mutex<PlayerState>,
}

#[derive(Default)]
struct PlayerState {
    readiness: ReadinessCoordinator,
    pipeline: Option<Arc<MiddlewarePipeline>>,
    executing: bool,
}

/// Clears `executing` when a play execution ends, including by unwinding.
struct ExecutionGuard<'a> {
    state: &'a Mutex<PlayerState>,
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().executing = false;
    }
}

impl Player {
    pub fn builder(tech: Arc<dyn Tech>) -> PlayerBuilder {
        PlayerBuilder {
            tech,
            config: PlayerConfig::default(),
            registry: None,
            events: None,
        }
    }

    /// Player with the default configuration and a private registry.
    pub fn new(tech: Arc<dyn Tech>) -> Result<Self> {
        Self::builder(tech).build()
    }

    // ------------------------------------------------------------------------
    // Source assignment
    // ------------------------------------------------------------------------

    /// Start switching to `source`.
    ///
    /// Readiness drops to `SourceChanging` immediately, so `play()` calls made
    /// from here on wait for the new source. Requests still waiting on an
    /// earlier source are cancelled.
    ///
    /// The returned future runs the set-source middleware pass and fails with
    /// [`PlaybackError::Cancelled`] if another change started meanwhile.
    pub fn set_source(&self, source: SourceDescriptor) -> SourceChange {
        if let Err(err) = source.validate() {
            warn!(error = %err, "Ignoring invalid source");
            return SourceChange::settled(Err(err));
        }

        let (generation, stale) = self.inner.state.lock().readiness.begin_source_change();
        if let Some(batch) = stale {
            self.cancel(
                batch,
                PlaybackError::Cancelled("superseded by a newer source".to_string()),
            );
        }

        let chain = MiddlewareChain::instantiate(
            &self.inner.registry,
            &source.source_type,
            &self.inner.tech,
            generation,
        );

        info!(
            generation,
            src = %self.display_src(&source.src),
            source_type = %source.source_type,
            middleware = chain.len(),
            "Source change started"
        );
        self.emit(SourceEvent::Changing {
            generation,
            source_type: source.source_type.clone(),
        });

        let player = self.clone();
        SourceChange {
            inner: async move {
                let resolved = chain.resolve_source(source).await;
                player.complete_source_change(chain, resolved)
            }
            .boxed(),
        }
    }

    fn complete_source_change(
        &self,
        chain: MiddlewareChain,
        resolved: Result<SourceDescriptor>,
    ) -> Result<SourceDescriptor> {
        let generation = chain.generation();
        let source = match resolved {
            Ok(source) => source,
            Err(err) => return self.reject_source(generation, err),
        };

        if !self.inner.state.lock().readiness.is_current(generation) {
            debug!(generation, "Discarding superseded source change");
            return Err(superseded(generation));
        }

        if let Err(err) = self.inner.tech.set_source(&source) {
            return self.reject_source(generation, err);
        }

        let pipeline = Arc::new(chain.accept(source.clone()));
        {
            let mut state = self.inner.state.lock();
            if state.readiness.finish_source_change(generation, true) == ChangeOutcome::Stale {
                debug!(generation, "Source change superseded while backend loaded it");
                return Err(superseded(generation));
            }
            state.pipeline = Some(pipeline);
        }

        let src = self.display_src(&source.src);
        info!(generation, src = %src, source_type = %source.source_type, "Source accepted");
        self.emit(SourceEvent::Accepted {
            generation,
            src,
            source_type: source.source_type.clone(),
        });
        Ok(source)
    }

    fn reject_source(&self, generation: u64, err: PlaybackError) -> Result<SourceDescriptor> {
        let outcome = self
            .inner
            .state
            .lock()
            .readiness
            .finish_source_change(generation, false);

        match outcome {
            ChangeOutcome::Stale => {
                debug!(generation, error = %err, "Superseded source change failed");
                Err(superseded(generation))
            }
            ChangeOutcome::Applied { drain } => {
                warn!(generation, error = %err, "Source change rejected");
                self.emit(SourceEvent::Rejected {
                    generation,
                    message: err.to_string(),
                });
                if drain {
                    self.execute();
                }
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Play / pause
    // ------------------------------------------------------------------------

    /// Request playback.
    ///
    /// Never blocks. The handle settles once the request has been executed
    /// by the backend, together with every other request waiting at the same
    /// time.
    pub fn play(&self) -> PlayHandle {
        let (receiver, pending, ready) = {
            let mut state = self.inner.state.lock();
            let (receiver, pending) = state.readiness.join_batch();
            (receiver, pending, state.readiness.is_ready())
        };

        self.emit(PlaybackEvent::PlayRequested { pending });
        if ready {
            self.execute();
        } else {
            debug!(pending, "Play deferred until the source is ready");
            self.emit(PlaybackEvent::PlayDeferred { pending });
        }

        PlayHandle::new(receiver)
    }

    /// Pause through the middleware pipeline.
    ///
    /// A pause vetoed by middleware is not an error; it is reported as a
    /// `PauseTerminated` event.
    pub fn pause(&self) -> Result<()> {
        let pipeline = self.inner.state.lock().pipeline.clone();
        let Some(pipeline) = pipeline else {
            self.inner.tech.pause();
            return Ok(());
        };

        if !pipeline.mediate_pause(self.inner.tech.as_ref())? {
            debug!(generation = pipeline.generation(), "Pause terminated by middleware");
            self.emit(PlaybackEvent::PauseTerminated {
                generation: pipeline.generation(),
            });
        }
        Ok(())
    }

    /// Run one play execution for the waiting batch, if the player is ready.
    fn execute(&self) {
        let pipeline = {
            let mut state = self.inner.state.lock();
            if state.executing || !state.readiness.is_ready() || !state.readiness.has_pending() {
                return;
            }
            let Some(pipeline) = state.pipeline.clone() else {
                return;
            };
            state.executing = true;
            pipeline
        };

        let generation = pipeline.generation();
        let mediation = {
            let _guard = ExecutionGuard {
                state: &self.inner.state,
            };
            pipeline.mediate_play(self.inner.tech.as_ref())
        };

        match mediation {
            Mediation::Terminated => self.terminated(generation),
            Mediation::Executed(ret) => {
                debug!(generation, thenable = ret.is_thenable(), "Backend play called");
                self.settle(generation, normalize(ret));
            }
            Mediation::Faulted(err) => {
                warn!(generation, error = %err, "Play pass faulted");
                self.settle(generation, settled(Err(err)));
            }
        }
    }

    fn terminated(&self, generation: u64) {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if state.readiness.accepted_generation() != Some(generation) {
                return;
            }
            state.readiness.take_terminated()
        };

        debug!(
            generation,
            callbacks = callbacks.len(),
            "Play terminated by middleware"
        );
        self.emit(PlaybackEvent::PlayTerminated { generation });
        for callback in callbacks {
            callback();
        }
    }

    fn settle(&self, generation: u64, outcome: SharedPlay) {
        let batch = {
            let mut state = self.inner.state.lock();
            if state.readiness.accepted_generation() != Some(generation) {
                return;
            }
            state.readiness.clear_terminated();
            state.readiness.take_batch()
        };

        if let Some(batch) = batch {
            let callers = batch.settle(outcome);
            debug!(generation, callers, "Play requests settled");
            self.emit(PlaybackEvent::PlayResolved { callers });
        }
    }

    fn cancel(&self, batch: DeferredBatch, reason: PlaybackError) {
        let message = reason.to_string();
        let callers = batch.settle(settled(Err(reason)));
        debug!(callers, reason = %message, "Waiting play requests cancelled");
        self.emit(PlaybackEvent::PlayCancelled {
            callers,
            reason: message,
        });
    }

    // ------------------------------------------------------------------------
    // Backend notifications
    // ------------------------------------------------------------------------

    /// Feed a backend notification into the player.
    pub fn handle_tech_event(&self, event: TechEvent) {
        match event {
            TechEvent::LoadStart => self.load_started(),
            TechEvent::Play => {
                self.emit(PlaybackEvent::Playing);
                let waiting = {
                    let state = self.inner.state.lock();
                    state.readiness.is_ready() && state.readiness.has_pending()
                };
                if waiting {
                    debug!("Backend started playing; executing waiting requests");
                    self.execute();
                }
            }
        }
    }

    fn load_started(&self) {
        let (became_ready, generation) = {
            let mut state = self.inner.state.lock();
            (
                state.readiness.load_started(),
                state.readiness.accepted_generation(),
            )
        };

        let Some(generation) = generation else {
            debug!("Ignoring load-start with no accepted source");
            return;
        };
        if !became_ready {
            debug!(generation, "Load-start did not change readiness");
            return;
        }

        info!(generation, "Source load started");
        self.emit(SourceEvent::LoadStarted { generation });
        self.execute();
        self.autoplay();
    }

    /// Drive [`handle_tech_event`](Self::handle_tech_event) from a channel
    /// until every sender is dropped.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn spawn_event_pump(
        &self,
        mut events: mpsc::UnboundedReceiver<TechEvent>,
    ) -> JoinHandle<()> {
        let player = self.clone();
        core_async::spawn(async move {
            while let Some(event) = events.recv().await {
                player.handle_tech_event(event);
            }
            debug!("Backend event channel closed");
        })
    }

    // ------------------------------------------------------------------------
    // Autoplay
    // ------------------------------------------------------------------------

    fn autoplay(&self) {
        let mode = self.inner.config.autoplay;
        if !mode.is_enabled() {
            return;
        }

        // Restoring the mute state after a rejection needs a task to await
        // the result.
        let runtime = core_async::runtime::is_available();
        debug!(%mode, runtime, "Autoplaying");
        match mode {
            AutoplayMode::Off => {}
            AutoplayMode::Play => {
                let handle = self.play();
                self.report_autoplay(mode, handle);
            }
            AutoplayMode::Muted if !runtime => {
                warn!(%mode, "No runtime available; skipping muted autoplay");
            }
            AutoplayMode::Muted => {
                let handle = self.muted_play();
                self.report_autoplay(mode, handle);
            }
            AutoplayMode::Any if !runtime => {
                warn!(%mode, "No runtime available; autoplaying without the muted fallback");
                let _ = self.play();
            }
            AutoplayMode::Any => {
                let handle = self.play();
                let player = self.clone();
                self.report_autoplay(
                    mode,
                    PlayHandle::wrap(async move {
                        match handle.await {
                            Err(err) if !err.is_cancellation() => {
                                debug!(error = %err, "Autoplay rejected, retrying muted");
                                player.muted_play().await
                            }
                            outcome => outcome,
                        }
                    }),
                );
            }
        }
    }

    /// Play with the backend muted.
    ///
    /// The previous mute state comes back if the execution is terminated by
    /// middleware or the play is rejected.
    fn muted_play(&self) -> PlayHandle {
        let tech = self.inner.tech.clone();
        let previously_muted = tech.muted();
        tech.set_muted(true);

        let restore = tech.clone();
        self.inner
            .state
            .lock()
            .readiness
            .push_terminated(Box::new(move || restore.set_muted(previously_muted)));

        let handle = self.play();
        PlayHandle::wrap(async move {
            let outcome = handle.await;
            if outcome.is_err() {
                tech.set_muted(previously_muted);
            }
            outcome
        })
    }

    fn report_autoplay(&self, mode: AutoplayMode, handle: PlayHandle) {
        if !core_async::runtime::is_available() {
            debug!(%mode, "No runtime available; autoplay outcome will not be reported");
            return;
        }

        let player = self.clone();
        core_async::spawn(async move {
            match handle.await {
                Ok(_) => {
                    info!(%mode, "Autoplay succeeded");
                    player.emit(PlaybackEvent::AutoplaySucceeded {
                        mode: mode.to_string(),
                    });
                }
                Err(err) if err.is_cancellation() => {
                    debug!(%mode, error = %err, "Autoplay cancelled");
                }
                Err(err) => {
                    warn!(%mode, error = %err, "Autoplay failed");
                    player.emit(PlaybackEvent::AutoplayFailed {
                        mode: mode.to_string(),
                        message: err.to_string(),
                    });
                }
            }
        });
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn readiness(&self) -> ReadinessState {
        self.inner.state.lock().readiness.state()
    }

    /// The accepted source as rewritten by middleware.
    pub fn current_source(&self) -> Option<SourceDescriptor> {
        self.inner
            .state
            .lock()
            .pipeline
            .as_ref()
            .map(|pipeline| pipeline.source().clone())
    }

    /// Generation of the most recent source change.
    pub fn generation(&self) -> u64 {
        self.inner.state.lock().readiness.generation()
    }

    /// Number of play requests waiting on the next execution.
    pub fn pending_play_count(&self) -> usize {
        self.inner.state.lock().readiness.pending()
    }

    pub fn muted(&self) -> bool {
        self.inner.tech.muted()
    }

    pub fn set_muted(&self, muted: bool) {
        self.inner.tech.set_muted(muted);
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &MiddlewareRegistry {
        &self.inner.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Shorthand for `events().subscribe()`.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.inner.events.subscribe()
    }

    /// Drop the current source and reject every waiting request with
    /// [`PlaybackError::Disposed`]. In-flight source changes finish as
    /// cancelled.
    pub fn dispose(&self) {
        let batch = {
            let mut state = self.inner.state.lock();
            state.pipeline = None;
            state.readiness.reset()
        };
        if let Some(batch) = batch {
            self.cancel(batch, PlaybackError::Disposed);
        }
        info!(tech = self.inner.tech.name(), "Player disposed");
    }

    fn emit(&self, event: impl Into<CoreEvent>) {
        // No subscribers is fine
        let _ = self.inner.events.emit(event.into());
    }

    fn display_src(&self, src: &str) -> String {
        if !self.inner.config.redact_urls {
            src.to_string()
        } else if src.contains("://") {
            redact_source_url(src)
        } else {
            strip_path(src).to_string()
        }
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Player")
            .field("tech", &self.inner.tech.name())
            .field("readiness", &state.readiness)
            .field("source", &state.pipeline.as_ref().map(|p| p.source()))
            .finish()
    }
}

fn superseded(generation: u64) -> PlaybackError {
    PlaybackError::Cancelled(format!("source change {generation} was superseded"))
}
