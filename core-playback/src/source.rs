//! Source descriptors.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};

/// A media source: where to load it from and what MIME type it claims.
///
/// The type selects which middleware apply. Descriptors are values; a
/// middleware that rewrites a source returns a new descriptor instead of
/// mutating the one it was given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub src: String,
    #[serde(rename = "type")]
    pub source_type: String,
}

impl SourceDescriptor {
    pub fn new(src: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            source_type: source_type.into(),
        }
    }

    /// Copy of this descriptor pointing at a different URL.
    pub fn with_src(&self, src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            source_type: self.source_type.clone(),
        }
    }

    /// Copy of this descriptor with a different type.
    pub fn with_type(&self, source_type: impl Into<String>) -> Self {
        Self {
            src: self.src.clone(),
            source_type: source_type.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.src.trim().is_empty() {
            return Err(PlaybackError::InvalidSource("src is empty".to_string()));
        }
        if self.source_type.trim().is_empty() {
            return Err(PlaybackError::InvalidSource("type is empty".to_string()));
        }
        Ok(())
    }
}
