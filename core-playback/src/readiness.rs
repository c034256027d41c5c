//! # Readiness Coordination
//!
//! Tracks whether the player can execute play requests right now, and holds
//! the requests that arrived too early.
//!
//! ```text
//!            begin_source_change           load_started
//!   Idle ───────────────────────▶ SourceChanging ─────────────▶ Ready
//!                                   │      ▲                     │
//!                                   │      └─────────────────────┘
//!                 change rejected   │       begin_source_change
//!          (back to previous state) ▼
//! ```
//!
//! The coordinator is a plain state machine. It never calls the backend or
//! middleware; the player drives it under its lock and performs side effects
//! after releasing the lock.
//!
//! ## Batches
//!
//! All requests waiting at the same time join one [`DeferredBatch`] and are
//! settled together by a single play execution. A batch remembers the source
//! generation it was opened for (its *epoch*); starting a newer source change
//! detaches batches bound to an older one so the player can cancel them.
//! Requests made before any source was ever requested have epoch 0 and carry
//! over to the first source.

use crate::normalize::SharedPlay;
use core_async::{OnceReceiver, OnceSignal};
use std::fmt;

/// Whether play requests execute immediately or wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    /// No source has been accepted yet.
    Idle,
    /// A source change is in flight, or the accepted source has not reported
    /// load-start yet.
    SourceChanging,
    /// The accepted source is loading; play requests execute right away.
    Ready,
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadinessState::Idle => "idle",
            ReadinessState::SourceChanging => "source_changing",
            ReadinessState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Play requests waiting on the next execution.
pub struct DeferredBatch {
    signal: OnceSignal<SharedPlay>,
    callers: usize,
    epoch: u64,
}

impl DeferredBatch {
    fn new(epoch: u64) -> Self {
        Self {
            signal: OnceSignal::new(),
            callers: 0,
            epoch,
        }
    }

    pub fn callers(&self) -> usize {
        self.callers
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Settle every caller in the batch with the same outcome.
    pub fn settle(self, outcome: SharedPlay) -> usize {
        self.signal.fire(outcome);
        self.callers
    }
}

impl fmt::Debug for DeferredBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredBatch")
            .field("callers", &self.callers)
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Callback run when a play execution is terminated by middleware.
pub type TerminatedCallback = Box<dyn FnOnce() + Send>;

/// Outcome of finishing a source change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// A newer change started meanwhile; nothing was updated.
    Stale,
    /// The state was updated. `drain` is set when waiting requests should
    /// execute now.
    Applied { drain: bool },
}

#[derive(Default)]
pub struct ReadinessCoordinator {
    generation: u64,
    changing: bool,
    accepted: Option<u64>,
    loaded: bool,
    batch: Option<DeferredBatch>,
    terminated: Vec<TerminatedCallback>,
}

impl ReadinessCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReadinessState {
        if self.changing {
            ReadinessState::SourceChanging
        } else if self.accepted.is_none() {
            ReadinessState::Idle
        } else if self.loaded {
            ReadinessState::Ready
        } else {
            ReadinessState::SourceChanging
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ReadinessState::Ready
    }

    /// Generation of the most recently requested source change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Generation of the source currently applied to the backend.
    pub fn accepted_generation(&self) -> Option<u64> {
        self.accepted
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Number of callers waiting on the next execution.
    pub fn pending(&self) -> usize {
        self.batch.as_ref().map_or(0, DeferredBatch::callers)
    }

    pub fn has_pending(&self) -> bool {
        self.pending() > 0
    }

    /// Add a caller to the waiting batch, opening one if needed.
    ///
    /// Returns the caller's receiver and the batch size including it.
    pub fn join_batch(&mut self) -> (OnceReceiver<SharedPlay>, usize) {
        let epoch = self.request_epoch();
        let batch = self.batch.get_or_insert_with(|| DeferredBatch::new(epoch));
        batch.callers += 1;
        (batch.signal.subscribe(), batch.callers)
    }

    /// Take the waiting batch for settlement.
    pub fn take_batch(&mut self) -> Option<DeferredBatch> {
        self.batch.take()
    }

    /// Start a source change and return its generation.
    ///
    /// A waiting batch bound to an earlier source is detached and returned so
    /// the caller can cancel it.
    pub fn begin_source_change(&mut self) -> (u64, Option<DeferredBatch>) {
        self.generation += 1;
        self.changing = true;
        let stale = if self.batch.as_ref().is_some_and(|batch| batch.epoch != 0) {
            self.batch.take()
        } else {
            None
        };
        (self.generation, stale)
    }

    /// Record the end of the source change `generation`.
    ///
    /// On acceptance the new source waits for load-start. On rejection the
    /// previously accepted source, if any, is current again, along with its
    /// readiness.
    pub fn finish_source_change(&mut self, generation: u64, accepted: bool) -> ChangeOutcome {
        if !self.is_current(generation) {
            return ChangeOutcome::Stale;
        }
        self.changing = false;

        if accepted {
            self.accepted = Some(generation);
            self.loaded = false;
            if let Some(batch) = self.batch.as_mut() {
                batch.epoch = generation;
            }
            return ChangeOutcome::Applied { drain: false };
        }

        let fallback = self.accepted.unwrap_or(0);
        if let Some(batch) = self.batch.as_mut() {
            if batch.epoch == generation {
                batch.epoch = fallback;
            }
        }
        ChangeOutcome::Applied {
            drain: self.is_ready() && self.has_pending(),
        }
    }

    /// Record load-start for the accepted source.
    ///
    /// Returns `true` when this transitioned the player to Ready.
    pub fn load_started(&mut self) -> bool {
        if self.accepted.is_none() || self.loaded {
            return false;
        }
        self.loaded = true;
        !self.changing
    }

    /// Queue a callback for the next terminated execution.
    pub fn push_terminated(&mut self, callback: TerminatedCallback) {
        self.terminated.push(callback);
    }

    pub fn take_terminated(&mut self) -> Vec<TerminatedCallback> {
        std::mem::take(&mut self.terminated)
    }

    pub fn clear_terminated(&mut self) {
        self.terminated.clear();
    }

    /// Forget every source and return the waiting batch, if any.
    pub fn reset(&mut self) -> Option<DeferredBatch> {
        self.generation += 1;
        self.changing = false;
        self.accepted = None;
        self.loaded = false;
        self.terminated.clear();
        self.batch.take()
    }

    fn request_epoch(&self) -> u64 {
        if self.changing {
            self.generation
        } else {
            self.accepted.unwrap_or(0)
        }
    }
}

impl fmt::Debug for ReadinessCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessCoordinator")
            .field("state", &self.state())
            .field("generation", &self.generation)
            .field("accepted", &self.accepted)
            .field("batch", &self.batch)
            .field("terminated", &self.terminated.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::settled;
    use crate::traits::PlayValue;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn ready_coordinator() -> ReadinessCoordinator {
        let mut readiness = ReadinessCoordinator::new();
        let (generation, _) = readiness.begin_source_change();
        readiness.finish_source_change(generation, true);
        assert!(readiness.load_started());
        readiness
    }

    #[test]
    fn test_lifecycle() {
        let mut readiness = ReadinessCoordinator::new();
        assert_eq!(readiness.state(), ReadinessState::Idle);

        let (generation, stale) = readiness.begin_source_change();
        assert_eq!(generation, 1);
        assert!(stale.is_none());
        assert_eq!(readiness.state(), ReadinessState::SourceChanging);

        assert_eq!(
            readiness.finish_source_change(generation, true),
            ChangeOutcome::Applied { drain: false }
        );
        assert_eq!(readiness.state(), ReadinessState::SourceChanging);

        assert!(readiness.load_started());
        assert_eq!(readiness.state(), ReadinessState::Ready);
        assert!(!readiness.load_started());
    }

    #[test]
    fn test_load_start_without_source_is_ignored() {
        let mut readiness = ReadinessCoordinator::new();
        assert!(!readiness.load_started());
        assert_eq!(readiness.state(), ReadinessState::Idle);
    }

    #[test]
    fn test_callers_share_one_batch() {
        let mut readiness = ReadinessCoordinator::new();
        let (_rx1, first) = readiness.join_batch();
        let (_rx2, second) = readiness.join_batch();
        assert_eq!((first, second), (1, 2));
        assert_eq!(readiness.pending(), 2);

        let batch = readiness.take_batch().unwrap();
        assert_eq!(batch.epoch(), 0);
        assert_eq!(batch.settle(settled(Ok(PlayValue::Null))), 2);
        assert!(!readiness.has_pending());
    }

    #[test]
    fn test_idle_requests_carry_over() {
        let mut readiness = ReadinessCoordinator::new();
        readiness.join_batch();

        let (generation, stale) = readiness.begin_source_change();
        assert!(stale.is_none());
        readiness.finish_source_change(generation, true);
        assert_eq!(readiness.pending(), 1);
    }

    #[test]
    fn test_superseded_requests_are_detached() {
        let mut readiness = ready_coordinator();
        readiness.join_batch();

        let (_, stale) = readiness.begin_source_change();
        let stale = stale.unwrap();
        assert_eq!(stale.epoch(), 1);
        assert_eq!(stale.callers(), 1);
        assert!(!readiness.has_pending());
    }

    #[test]
    fn test_stale_finish_is_ignored() {
        let mut readiness = ReadinessCoordinator::new();
        let (first, _) = readiness.begin_source_change();
        let (second, _) = readiness.begin_source_change();

        assert_eq!(readiness.finish_source_change(first, true), ChangeOutcome::Stale);
        assert_eq!(readiness.state(), ReadinessState::SourceChanging);
        assert_eq!(
            readiness.finish_source_change(second, true),
            ChangeOutcome::Applied { drain: false }
        );
        assert_eq!(readiness.accepted_generation(), Some(second));
    }

    #[test]
    fn test_rejected_change_restores_ready() {
        let mut readiness = ready_coordinator();
        let (generation, _) = readiness.begin_source_change();
        readiness.join_batch();
        assert_eq!(readiness.state(), ReadinessState::SourceChanging);

        assert_eq!(
            readiness.finish_source_change(generation, false),
            ChangeOutcome::Applied { drain: true }
        );
        assert_eq!(readiness.state(), ReadinessState::Ready);
        assert_eq!(readiness.take_batch().unwrap().epoch(), 1);
    }

    #[test]
    fn test_rejected_first_change_returns_to_idle() {
        let mut readiness = ReadinessCoordinator::new();
        let (generation, _) = readiness.begin_source_change();
        readiness.join_batch();

        assert_eq!(
            readiness.finish_source_change(generation, false),
            ChangeOutcome::Applied { drain: false }
        );
        assert_eq!(readiness.state(), ReadinessState::Idle);

        // Still bound to no source, so the next change keeps it.
        let (_, stale) = readiness.begin_source_change();
        assert!(stale.is_none());
        assert_eq!(readiness.pending(), 1);
    }

    #[test]
    fn test_terminated_queue() {
        let mut readiness = ReadinessCoordinator::new();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        readiness.push_terminated(Box::new(move || flag.store(true, Ordering::SeqCst)));

        for callback in readiness.take_terminated() {
            callback();
        }
        assert!(ran.load(Ordering::SeqCst));
        assert!(readiness.take_terminated().is_empty());
    }

    #[test]
    fn test_reset_returns_batch() {
        let mut readiness = ready_coordinator();
        readiness.join_batch();
        readiness.push_terminated(Box::new(|| {}));

        assert_eq!(readiness.reset().unwrap().callers(), 1);
        assert_eq!(readiness.state(), ReadinessState::Idle);
        assert!(readiness.take_terminated().is_empty());
    }
}
