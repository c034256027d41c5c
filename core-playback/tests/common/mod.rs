//! Shared fixtures for the core-playback integration tests.

#![allow(dead_code)]

use core_playback::{
    factory, Middleware, MiddlewareRegistry, PlayDirective, PlayReturn, PlayValue, Player,
    PlayerConfig, PlaybackError, Result, SourceDescriptor, Tech, TERMINATOR,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

type Responder = Box<dyn Fn() -> PlayReturn + Send + Sync>;

/// In-memory backend with a scriptable play result.
pub struct FakeTech {
    responder: Mutex<Responder>,
    muted: AtomicBool,
    refuse_sources: AtomicBool,
    plays: AtomicUsize,
    pauses: AtomicUsize,
    sources: Mutex<Vec<SourceDescriptor>>,
}

impl FakeTech {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responder: Mutex::new(Box::new(PlayReturn::nothing) as Responder),
            muted: AtomicBool::new(false),
            refuse_sources: AtomicBool::new(false),
            plays: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            sources: Mutex::new(Vec::new()),
        })
    }

    pub fn respond_with<F>(&self, responder: F)
    where
        F: Fn() -> PlayReturn + Send + Sync + 'static,
    {
        *self.responder.lock() = Box::new(responder);
    }

    pub fn refuse_sources(&self, refuse: bool) {
        self.refuse_sources.store(refuse, Ordering::SeqCst);
    }

    pub fn play_count(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn pause_count(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn sources(&self) -> Vec<SourceDescriptor> {
        self.sources.lock().clone()
    }
}

impl Tech for FakeTech {
    fn name(&self) -> &str {
        "fake"
    }

    fn set_source(&self, source: &SourceDescriptor) -> Result<()> {
        if self.refuse_sources.load(Ordering::SeqCst) {
            return Err(PlaybackError::Tech("unsupported source".to_string()));
        }
        self.sources.lock().push(source.clone());
        Ok(())
    }

    fn play(&self) -> PlayReturn {
        self.plays.fetch_add(1, Ordering::SeqCst);
        (**self.responder.lock())()
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }
}

/// Middleware that terminates play while its switch is on.
pub struct Gate {
    terminate: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl Middleware for Gate {
    async fn set_source(&self, source: SourceDescriptor) -> Result<SourceDescriptor> {
        Ok(source)
    }

    fn call_play(&self) -> PlayDirective {
        if self.terminate.load(Ordering::SeqCst) {
            TERMINATOR
        } else {
            PlayDirective::Continue
        }
    }
}

/// Register a wildcard [`Gate`] and return its switch, initially on.
pub fn install_gate(registry: &MiddlewareRegistry) -> Arc<AtomicBool> {
    let terminate = Arc::new(AtomicBool::new(true));
    let switch = terminate.clone();
    registry.register(
        "*",
        factory(move |_| Gate {
            terminate: switch.clone(),
        }),
    );
    terminate
}

pub fn mp4() -> SourceDescriptor {
    SourceDescriptor::new("http://example.com/video.mp4", "video/mp4")
}

pub fn webm() -> SourceDescriptor {
    SourceDescriptor::new("http://example.com/video.webm", "video/webm")
}

pub fn foo() -> PlayValue {
    PlayValue::from("foo")
}

pub fn player_with(
    tech: &Arc<FakeTech>,
    registry: &MiddlewareRegistry,
    config: PlayerConfig,
) -> Player {
    Player::builder(tech.clone())
        .registry(registry.clone())
        .config(config)
        .build()
        .expect("valid config")
}

pub fn player(tech: &Arc<FakeTech>, registry: &MiddlewareRegistry) -> Player {
    player_with(tech, registry, PlayerConfig::default())
}
