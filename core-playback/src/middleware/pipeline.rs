use super::{panic_message, Middleware, MiddlewareRegistry, PlayDirective};
use crate::error::{PlaybackError, Result};
use crate::normalize::Mediation;
use crate::source::SourceDescriptor;
use crate::traits::Tech;
use futures::FutureExt;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Middleware instances created for one source change, before the source has
/// been accepted.
///
/// Cloning is cheap and shares the instances.
#[derive(Clone)]
pub struct MiddlewareChain {
    generation: u64,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Instantiate every factory registered for `source_type`, in order.
    pub fn instantiate(
        registry: &MiddlewareRegistry,
        source_type: &str,
        tech: &Arc<dyn Tech>,
        generation: u64,
    ) -> Self {
        let middleware: Vec<Arc<dyn Middleware>> = registry
            .factories_for(source_type)
            .iter()
            .map(|factory| factory(tech))
            .collect();

        debug!(
            generation,
            source_type,
            count = middleware.len(),
            "Instantiated middleware chain"
        );

        Self {
            generation,
            middleware,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Run the set-source pass: each middleware sees the previous one's output.
    ///
    /// The first error, or a panicking hook, aborts the pass.
    pub async fn resolve_source(&self, source: SourceDescriptor) -> Result<SourceDescriptor> {
        let mut current = source;
        for (index, middleware) in self.middleware.iter().enumerate() {
            current = match AssertUnwindSafe(middleware.set_source(current))
                .catch_unwind()
                .await
            {
                Ok(Ok(next)) => next,
                Ok(Err(err)) => {
                    debug!(
                        generation = self.generation,
                        index,
                        error = %err,
                        "Middleware refused source"
                    );
                    return Err(err);
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(
                        generation = self.generation,
                        index,
                        %message,
                        "Middleware panicked in set_source"
                    );
                    return Err(PlaybackError::MiddlewareFault(message));
                }
            };
        }
        Ok(current)
    }

    /// Freeze the chain around the source the set-source pass settled on.
    pub fn accept(self, source: SourceDescriptor) -> MiddlewarePipeline {
        MiddlewarePipeline {
            generation: self.generation,
            source,
            middleware: self.middleware,
        }
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("generation", &self.generation)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// The middleware chain bound to an accepted source.
///
/// Immutable once built; a new source change produces a new pipeline.
pub struct MiddlewarePipeline {
    generation: u64,
    source: SourceDescriptor,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewarePipeline {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The source as rewritten by the set-source pass.
    pub fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Run the call-play pass and, unless a middleware terminated it, the
    /// backend's play.
    ///
    /// `played` hooks run in reverse order whether or not the pass was
    /// terminated.
    pub fn mediate_play(&self, tech: &dyn Tech) -> Mediation {
        let terminated = match self.intercept(|m| m.call_play()) {
            Ok(terminated) => terminated,
            Err(err) => return Mediation::Faulted(err),
        };

        let outcome = if terminated {
            None
        } else {
            Some(tech.play())
        };

        self.unwind(|m| m.played(terminated));

        match outcome {
            Some(ret) => Mediation::Executed(ret),
            None => {
                debug!(generation = self.generation, "Play terminated by middleware");
                Mediation::Terminated
            }
        }
    }

    /// Run the call-pause pass and, unless terminated, the backend's pause.
    ///
    /// Returns `Ok(false)` when a middleware terminated the call.
    pub fn mediate_pause(&self, tech: &dyn Tech) -> Result<bool> {
        let terminated = self.intercept(|m| m.call_pause())?;
        if !terminated {
            tech.pause();
        }
        self.unwind(|m| m.paused(terminated));
        Ok(!terminated)
    }

    /// Walk the chain in order until a middleware terminates.
    fn intercept(&self, hook: impl Fn(&dyn Middleware) -> PlayDirective) -> Result<bool> {
        for (index, middleware) in self.middleware.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| hook(middleware.as_ref()))) {
                Ok(PlayDirective::Continue) => {}
                Ok(PlayDirective::Terminate) => return Ok(true),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(
                        generation = self.generation,
                        index,
                        %message,
                        "Middleware panicked in call hook"
                    );
                    return Err(PlaybackError::MiddlewareFault(message));
                }
            }
        }
        Ok(false)
    }

    /// Notify the chain in reverse order. Panics are logged and skipped.
    fn unwind(&self, hook: impl Fn(&dyn Middleware)) {
        for (index, middleware) in self.middleware.iter().enumerate().rev() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| hook(middleware.as_ref()))) {
                let message = panic_message(payload.as_ref());
                warn!(
                    generation = self.generation,
                    index,
                    %message,
                    "Middleware panicked in post hook"
                );
            }
        }
    }
}

impl fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewarePipeline")
            .field("generation", &self.generation)
            .field("source", &self.source)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{factory, TERMINATOR};
    use crate::traits::{PlayReturn, PlayValue};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTech {
        plays: AtomicUsize,
        pauses: AtomicUsize,
    }

    impl Tech for CountingTech {
        fn name(&self) -> &str {
            "counting"
        }

        fn set_source(&self, _source: &SourceDescriptor) -> Result<()> {
            Ok(())
        }

        fn play(&self) -> PlayReturn {
            self.plays.fetch_add(1, Ordering::SeqCst);
            PlayReturn::value(PlayValue::from("played"))
        }

        fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }

        fn muted(&self) -> bool {
            false
        }

        fn set_muted(&self, _muted: bool) {}
    }

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
        terminate: bool,
    }

    #[async_trait]
    impl Middleware for Recorder {
        async fn set_source(&self, source: SourceDescriptor) -> Result<SourceDescriptor> {
            self.log.lock().push(format!("{}:set_source", self.name));
            Ok(source.with_src(format!("{}/{}", source.src, self.name)))
        }

        fn call_play(&self) -> PlayDirective {
            self.log.lock().push(format!("{}:call_play", self.name));
            if self.terminate {
                TERMINATOR
            } else {
                PlayDirective::Continue
            }
        }

        fn played(&self, terminated: bool) {
            self.log
                .lock()
                .push(format!("{}:played:{}", self.name, terminated));
        }

        fn call_pause(&self) -> PlayDirective {
            self.log.lock().push(format!("{}:call_pause", self.name));
            PlayDirective::Continue
        }
    }

    struct Panicking;

    #[async_trait]
    impl Middleware for Panicking {
        async fn set_source(&self, _source: SourceDescriptor) -> Result<SourceDescriptor> {
            panic!("boom");
        }

        fn call_play(&self) -> PlayDirective {
            panic!("kaboom");
        }
    }

    fn setup(terminate_second: bool) -> (MiddlewareChain, Log, Arc<CountingTech>) {
        let log: Log = Arc::default();
        let registry = MiddlewareRegistry::new();
        for (name, terminate) in [("a", false), ("b", terminate_second)] {
            let log = log.clone();
            registry.register(
                "video/mp4",
                factory(move |_| Recorder {
                    name,
                    log: log.clone(),
                    terminate,
                }),
            );
        }
        let counting = Arc::new(CountingTech::default());
        let tech: Arc<dyn Tech> = counting.clone();
        let chain = MiddlewareChain::instantiate(&registry, "video/mp4", &tech, 1);
        (chain, log, counting)
    }

    #[tokio::test]
    async fn test_resolve_source_folds_in_order() {
        let (chain, log, _) = setup(false);
        let resolved = chain
            .resolve_source(SourceDescriptor::new("clip", "video/mp4"))
            .await
            .unwrap();

        assert_eq!(resolved.src, "clip/a/b");
        assert_eq!(*log.lock(), vec!["a:set_source", "b:set_source"]);
    }

    #[tokio::test]
    async fn test_panicking_set_source_is_contained() {
        let registry = MiddlewareRegistry::new();
        registry.register("video/mp4", factory(|_| Panicking));
        let tech: Arc<dyn Tech> = Arc::new(CountingTech::default());
        let chain = MiddlewareChain::instantiate(&registry, "video/mp4", &tech, 1);

        let err = chain
            .resolve_source(SourceDescriptor::new("clip", "video/mp4"))
            .await
            .unwrap_err();
        assert_eq!(err, PlaybackError::MiddlewareFault("boom".to_string()));
    }

    #[test]
    fn test_mediate_play_runs_tech_and_post_hooks_in_reverse() {
        let (chain, log, tech) = setup(false);
        let pipeline = chain.accept(SourceDescriptor::new("clip", "video/mp4"));

        let mediation = pipeline.mediate_play(tech.as_ref());
        assert!(matches!(mediation, Mediation::Executed(_)));
        assert_eq!(tech.plays.load(Ordering::SeqCst), 1);
        assert_eq!(
            *log.lock(),
            vec![
                "a:call_play",
                "b:call_play",
                "b:played:false",
                "a:played:false"
            ]
        );
    }

    #[test]
    fn test_terminator_skips_tech() {
        let (chain, log, tech) = setup(true);
        let pipeline = chain.accept(SourceDescriptor::new("clip", "video/mp4"));

        let mediation = pipeline.mediate_play(tech.as_ref());
        assert!(matches!(mediation, Mediation::Terminated));
        assert_eq!(tech.plays.load(Ordering::SeqCst), 0);
        assert_eq!(
            *log.lock(),
            vec![
                "a:call_play",
                "b:call_play",
                "b:played:true",
                "a:played:true"
            ]
        );
    }

    #[test]
    fn test_panicking_call_play_faults() {
        let registry = MiddlewareRegistry::new();
        registry.register("video/mp4", factory(|_| Panicking));
        let counting = Arc::new(CountingTech::default());
        let tech: Arc<dyn Tech> = counting.clone();
        let pipeline = MiddlewareChain::instantiate(&registry, "video/mp4", &tech, 1)
            .accept(SourceDescriptor::new("clip", "video/mp4"));

        match pipeline.mediate_play(counting.as_ref()) {
            Mediation::Faulted(err) => {
                assert_eq!(err, PlaybackError::MiddlewareFault("kaboom".to_string()))
            }
            other => panic!("unexpected mediation: {:?}", other),
        }
        assert_eq!(counting.plays.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_mediate_pause_calls_tech() {
        let (chain, log, tech) = setup(false);
        let pipeline = chain.accept(SourceDescriptor::new("clip", "video/mp4"));

        assert!(pipeline.mediate_pause(tech.as_ref()).unwrap());
        assert_eq!(tech.pauses.load(Ordering::SeqCst), 1);
        assert_eq!(*log.lock(), vec!["a:call_pause", "b:call_pause"]);
    }
}
