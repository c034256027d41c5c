//! # Playback Coordination
//!
//! Coordinates play requests between a player and its media backend.
//!
//! ## Overview
//!
//! This crate handles:
//! - Source assignment through a pluggable middleware chain
//! - Deferring play requests until the backend reports load-start
//! - Middleware vetoes of play and pause calls
//! - Normalizing backend play results into one awaitable shape
//! - Autoplay on load-start
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{factory, MiddlewareRegistry, Player, SourceDescriptor, TechEvent};
//!
//! let registry = MiddlewareRegistry::new();
//! registry.register("*", factory(|_tech| AnalyticsMiddleware::default()));
//!
//! let player = Player::builder(tech).registry(registry).build()?;
//! player.set_source(SourceDescriptor::new("https://cdn/a.mp4", "video/mp4")).await?;
//! let handle = player.play();
//! player.handle_tech_event(TechEvent::LoadStart);
//! handle.await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod normalize;
pub mod player;
pub mod readiness;
pub mod source;
pub mod traits;

pub use config::{AutoplayMode, PlayerConfig};
pub use error::{PlaybackError, Result};
pub use middleware::{
    factory, Middleware, MiddlewareFactory, MiddlewareRegistry, PlayDirective, TERMINATOR,
    WILDCARD,
};
pub use player::{PlayHandle, Player, PlayerBuilder, SourceChange};
pub use readiness::ReadinessState;
pub use source::SourceDescriptor;
pub use traits::{PlayReturn, PlayValue, Tech, TechEvent};
