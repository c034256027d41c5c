//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the playback coordination crates:
//! - Logging and tracing bootstrap
//! - Event bus used as the collaborator event layer
//! - Runtime error type
//!
//! ## Overview
//!
//! Nothing in here knows about sources, middleware or play requests. The
//! playback crate publishes its notifications through [`events::EventBus`]
//! and logs through `tracing`; hosts decide how to observe either.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
