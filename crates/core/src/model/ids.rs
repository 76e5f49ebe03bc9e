use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error from parsing one of the identifier types out of text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseIdError {
    #[error("invalid tab id: {0}")]
    InvalidTab(String),
    #[error("invalid session id: {0}")]
    InvalidSession(String),
    #[error("video id cannot be empty")]
    EmptyVideo,
}

/// Identifier of one browsing surface (one tab in the demo driver).
///
/// Assigned by the embedder, never by the coordinator. Plain integers
/// keep log lines and registry keys readable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(u64);

impl TabId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        TabId(raw)
    }

    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TabId({})", self.0)
    }
}

impl FromStr for TabId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(TabId)
            .map_err(|_| ParseIdError::InvalidTab(s.to_string()))
    }
}

/// Identifier of one study session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// A fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        SessionId(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        SessionId(id)
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(SessionId)
            .map_err(|_| ParseIdError::InvalidSession(s.to_string()))
    }
}

/// Platform-assigned identifier of a short video, as it appears in the
/// page URL. Opaque to us; only equality matters.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoId(String);

impl VideoId {
    /// Wraps a raw id, rejecting empty or all-whitespace input.
    ///
    /// # Errors
    ///
    /// Returns [`ParseIdError::EmptyVideo`] when `raw` has no visible
    /// characters.
    pub fn new(raw: impl Into<String>) -> Result<Self, ParseIdError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError::EmptyVideo);
        }
        Ok(VideoId(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VideoId({})", self.0)
    }
}

impl FromStr for VideoId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VideoId::new(s)
    }
}
