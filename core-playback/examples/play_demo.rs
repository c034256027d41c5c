//! Play coordination walkthrough
//!
//! Wires a player to an in-memory backend, registers a middleware that vetoes
//! the first play attempt, and shows deferred requests settling on load-start.
//!
//! Run with:
//! ```bash
//! cargo run --example play_demo
//!
//! # JSON logs
//! cargo run --example play_demo -- json
//! ```

use async_trait::async_trait;
use core_playback::{
    factory, AutoplayMode, Middleware, MiddlewareRegistry, PlayDirective, PlayReturn, Player,
    PlayerConfig, Result, SourceDescriptor, Tech, TechEvent, TERMINATOR, WILDCARD,
};
use core_runtime::events::EventStream;
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

struct DemoTech {
    muted: AtomicBool,
}

impl Tech for DemoTech {
    fn name(&self) -> &str {
        "demo"
    }

    fn set_source(&self, source: &SourceDescriptor) -> Result<()> {
        info!(src = %source.src, "Backend loading source");
        Ok(())
    }

    fn play(&self) -> PlayReturn {
        PlayReturn::thenable(async { Ok("playing".into()) })
    }

    fn pause(&self) {}

    fn muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }
}

/// Vetoes the first play attempt, like a pre-roll ad would.
struct PreRoll {
    pending: AtomicBool,
}

#[async_trait]
impl Middleware for PreRoll {
    fn call_play(&self) -> PlayDirective {
        if self.pending.swap(false, Ordering::SeqCst) {
            info!("Pre-roll showing, holding playback");
            TERMINATOR
        } else {
            PlayDirective::Continue
        }
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let format = match env::args().nth(1).as_deref() {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };
    init_logging(
        LoggingConfig::default()
            .with_format(format)
            .with_level(LogLevel::Debug),
    )?;

    let registry = MiddlewareRegistry::new();
    registry.register(
        WILDCARD,
        factory(|_| PreRoll {
            pending: AtomicBool::new(true),
        }),
    );

    let tech = Arc::new(DemoTech {
        muted: AtomicBool::new(false),
    });
    let player = Player::builder(tech)
        .registry(registry.clone())
        .config(PlayerConfig::default().with_autoplay(AutoplayMode::Off).with_url_redaction(true))
        .build()?;
    let mut events = EventStream::new(player.subscribe());

    let change = player.set_source(SourceDescriptor::new(
        "https://cdn.example.com/movie.mp4?token=secret",
        "video/mp4",
    ));
    let first = player.play();
    change.await?;

    player.handle_tech_event(TechEvent::LoadStart);
    info!(pending = player.pending_play_count(), "First play held by middleware");

    let second = player.play();
    info!(first = ?first.await?, second = ?second.await?, "Both requests settled");

    for event in events.drain() {
        info!(event = event.description(), severity = ?event.severity(), "Event");
    }

    player.dispose();
    registry.reset();
    Ok(())
}
