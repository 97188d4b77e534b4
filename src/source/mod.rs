// src/source/mod.rs
//! Channel source seam: where messages come from.
//!
//! The pipeline only ever sees [`ChannelSource::fetch_messages`] returning
//! batches ordered oldest-first. The production implementation talks to the
//! Telegram Bot API ([`botapi`]); tests script a [`mock::MockSource`].

pub mod botapi;
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A message as fetched from a channel. Immutable once fetched; `id` is
/// unique within its channel only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: i64,
    pub text: Option<String>,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("bad channel reference: {0}")]
    BadChannelRef(String),
    #[error("channel source request failed: {0}")]
    Http(String),
    #[error("channel source API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        SourceError::Http(e.to_string())
    }
}

/// Normalized channel reference.
///
/// Operators configure channels as raw numeric ids (`1234567890`), already
/// prefixed broadcast ids (`-1001234567890`), or handles (`@rustjobs` /
/// `rustjobs`). All three collapse into one of these two forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelRef {
    /// Broadcast chat id in the `-100…` form the Bot API expects.
    ChatId(i64),
    /// Public handle, stored without the leading `@`.
    Username(String),
}

impl ChannelRef {
    pub fn parse(raw: &str) -> Result<Self, SourceError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SourceError::BadChannelRef("empty channel reference".into()));
        }

        if let Some(handle) = trimmed.strip_prefix('@') {
            return Self::parse_handle(handle);
        }

        let digits_only = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

        if let Some(rest) = trimmed.strip_prefix("-100") {
            if digits_only(rest) {
                let id: i64 = trimmed
                    .parse()
                    .map_err(|_| SourceError::BadChannelRef(trimmed.to_string()))?;
                return Ok(Self::ChatId(id));
            }
        }

        let bare = trimmed.trim_start_matches('-');
        if digits_only(bare) {
            let id: i64 = format!("-100{bare}")
                .parse()
                .map_err(|_| SourceError::BadChannelRef(trimmed.to_string()))?;
            return Ok(Self::ChatId(id));
        }

        Self::parse_handle(trimmed)
    }

    fn parse_handle(handle: &str) -> Result<Self, SourceError> {
        let ok = !handle.is_empty()
            && handle
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_');
        if ok {
            Ok(Self::Username(handle.to_string()))
        } else {
            Err(SourceError::BadChannelRef(format!("@{handle}")))
        }
    }

    /// Whether a chat (id + optional public username) is this channel.
    pub fn matches(&self, chat_id: i64, username: Option<&str>) -> bool {
        match self {
            Self::ChatId(id) => *id == chat_id,
            Self::Username(name) => {
                username.is_some_and(|u| u.eq_ignore_ascii_case(name.as_str()))
            }
        }
    }
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChatId(id) => write!(f, "{id}"),
            Self::Username(name) => write!(f, "@{name}"),
        }
    }
}

/// The polling side of a message source.
#[async_trait]
pub trait ChannelSource: Send + Sync {
    /// Messages with `id > since_id`, oldest first, at most `limit`.
    async fn fetch_messages(
        &self,
        channel: &ChannelRef,
        since_id: i64,
        limit: usize,
    ) -> Result<Vec<RawMessage>, SourceError>;

    /// Startup authentication probe. Failure here is fatal for the process.
    async fn health_check(&self) -> Result<(), SourceError>;

    /// Release the underlying connection on shutdown.
    async fn close(&self) -> Result<(), SourceError>;
}
