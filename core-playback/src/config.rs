//! # Player Configuration
//!
//! Options that shape how the player reacts to readiness changes.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the player does on its own once a source reports load-start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoplayMode {
    /// Wait for an explicit `play()`.
    #[default]
    Off,
    /// Request playback as-is.
    Play,
    /// Mute, request playback, and restore the previous mute state if the
    /// request is terminated or rejected.
    Muted,
    /// Try `Play`, fall back to `Muted` if it is rejected.
    Any,
}

impl AutoplayMode {
    pub fn is_enabled(self) -> bool {
        !matches!(self, AutoplayMode::Off)
    }
}

impl fmt::Display for AutoplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AutoplayMode::Off => "off",
            AutoplayMode::Play => "play",
            AutoplayMode::Muted => "muted",
            AutoplayMode::Any => "any",
        };
        f.write_str(name)
    }
}

/// Player configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Autoplay behaviour on load-start.
    ///
    /// Default: `Off`.
    #[serde(default)]
    pub autoplay: AutoplayMode,

    /// Capacity of the event bus created when none is supplied.
    ///
    /// Default: 100.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    /// Strip query strings from source URLs before they are logged or
    /// published in events.
    ///
    /// Default: true.
    #[serde(default = "default_redact_urls")]
    pub redact_urls: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            autoplay: AutoplayMode::default(),
            event_buffer_size: default_event_buffer_size(),
            redact_urls: default_redact_urls(),
        }
    }
}

impl PlayerConfig {
    pub fn with_autoplay(mut self, autoplay: AutoplayMode) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    pub fn with_url_redaction(mut self, redact: bool) -> Self {
        self.redact_urls = redact;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(PlaybackError::InvalidConfig(
                "event_buffer_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_event_buffer_size() -> usize {
    core_runtime::events::DEFAULT_EVENT_BUFFER_SIZE
}

fn default_redact_urls() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.autoplay, AutoplayMode::Off);
        assert_eq!(config.event_buffer_size, 100);
        assert!(config.redact_urls);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let config = PlayerConfig::default().with_event_buffer_size(0);
        assert!(matches!(
            config.validate(),
            Err(PlaybackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: PlayerConfig = serde_json::from_str(r#"{"autoplay":"muted"}"#).unwrap();
        assert_eq!(config.autoplay, AutoplayMode::Muted);
        assert_eq!(config.event_buffer_size, 100);
        assert!(config.redact_urls);
    }

    #[test]
    fn test_autoplay_display() {
        assert_eq!(AutoplayMode::Any.to_string(), "any");
        assert!(!AutoplayMode::Off.is_enabled());
        assert!(AutoplayMode::Muted.is_enabled());
    }
}
