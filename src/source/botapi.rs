// src/source/botapi.rs
//! Telegram Bot API channel source.
//!
//! The bot must be an admin of every monitored channel; Telegram then
//! delivers channel posts through `getUpdates`. Each `fetch_messages` call
//! drains pending updates into a per-channel buffer and serves the slice the
//! caller asked for (`id > since_id`, oldest first, bounded by `limit`).
//! Posts for channels nobody asked about yet stay buffered.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::source::{ChannelRef, ChannelSource, RawMessage, SourceError};

pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// One `getUpdates` page. Bot API maximum.
const UPDATES_PAGE_SIZE: u32 = 100;
/// Upper bound on pages drained per fetch, so one burst cannot pin a cycle.
const MAX_PAGES_PER_DRAIN: usize = 10;

pub struct BotApiSource {
    http: reqwest::Client,
    base_url: String,
    token: String,
    state: Mutex<PollState>,
}

#[derive(Default)]
struct PollState {
    /// Next `getUpdates` offset (last seen update_id + 1).
    offset: Option<i64>,
    buffer: Vec<BufferedPost>,
}

struct BufferedPost {
    chat_id: i64,
    chat_username: Option<String>,
    msg: RawMessage,
}

// --- Bot API wire types ---

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    channel_post: Option<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    message_id: i64,
    date: i64,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Me {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdatesQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    limit: u32,
    timeout: u32,
    allowed_updates: &'static str,
}

impl BotApiSource {
    pub fn new(token: &str) -> Result<Self, SourceError> {
        if token.trim().is_empty() {
            return Err(SourceError::Api("bot token is empty".into()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| SourceError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.trim().to_string(),
            state: Mutex::new(PollState::default()),
        })
    }

    /// Point the client at a different server (tests use wiremock here).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Pull pending `channel_post` updates into the buffer and advance the
    /// update offset.
    async fn drain_updates(&self, state: &mut PollState) -> Result<(), SourceError> {
        for _ in 0..MAX_PAGES_PER_DRAIN {
            let query = UpdatesQuery {
                offset: state.offset,
                limit: UPDATES_PAGE_SIZE,
                timeout: 0,
                allowed_updates: r#"["channel_post"]"#,
            };
            let resp = self
                .http
                .get(self.method_url("getUpdates"))
                .query(&query)
                .send()
                .await?;
            let env: Envelope<Vec<Update>> = resp
                .json()
                .await
                .map_err(|e| SourceError::Http(format!("decoding getUpdates response: {e}")))?;
            if !env.ok {
                return Err(SourceError::Api(
                    env.description
                        .unwrap_or_else(|| "getUpdates returned ok=false".into()),
                ));
            }

            let updates = env.result.unwrap_or_default();
            let page_len = updates.len();
            for update in updates {
                state.offset = Some(
                    state
                        .offset
                        .map_or(update.update_id + 1, |o| o.max(update.update_id + 1)),
                );
                let Some(post) = update.channel_post else {
                    continue;
                };
                let text = post.text.or(post.caption);
                state.buffer.push(BufferedPost {
                    chat_id: post.chat.id,
                    chat_username: post.chat.username,
                    msg: RawMessage {
                        id: post.message_id,
                        text,
                        posted_at: DateTime::from_timestamp(post.date, 0)
                            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                    },
                });
            }

            if page_len < UPDATES_PAGE_SIZE as usize {
                break;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelSource for BotApiSource {
    async fn fetch_messages(
        &self,
        channel: &ChannelRef,
        since_id: i64,
        limit: usize,
    ) -> Result<Vec<RawMessage>, SourceError> {
        let mut state = self.state.lock().await;
        self.drain_updates(&mut state).await?;

        // Pick the oldest `limit` unseen posts for this channel.
        let mut picked: Vec<(usize, i64)> = state
            .buffer
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                channel.matches(p.chat_id, p.chat_username.as_deref()) && p.msg.id > since_id
            })
            .map(|(i, p)| (i, p.msg.id))
            .collect();
        picked.sort_by_key(|&(_, id)| id);
        picked.truncate(limit);
        let take: HashSet<usize> = picked.into_iter().map(|(i, _)| i).collect();

        let mut out = Vec::with_capacity(take.len());
        let mut kept = Vec::with_capacity(state.buffer.len());
        for (i, p) in state.buffer.drain(..).enumerate() {
            if take.contains(&i) {
                out.push(p.msg);
            } else if channel.matches(p.chat_id, p.chat_username.as_deref())
                && p.msg.id <= since_id
            {
                // Already behind the caller's cursor: never served again.
            } else {
                kept.push(p);
            }
        }
        state.buffer = kept;

        out.sort_by_key(|m| m.id);
        out.dedup_by_key(|m| m.id);
        debug!(
            channel = %channel,
            since_id,
            fetched = out.len(),
            buffered = state.buffer.len(),
            "served channel posts from update buffer"
        );
        Ok(out)
    }

    async fn health_check(&self) -> Result<(), SourceError> {
        let resp = self.http.get(self.method_url("getMe")).send().await?;
        let env: Envelope<Me> = resp
            .json()
            .await
            .map_err(|e| SourceError::Http(format!("decoding getMe response: {e}")))?;
        if !env.ok {
            return Err(SourceError::Api(
                env.description
                    .unwrap_or_else(|| "getMe returned ok=false".into()),
            ));
        }
        let username = env.result.and_then(|m| m.username).unwrap_or_default();
        info!(bot = %username, "Telegram bot authenticated");
        Ok(())
    }

    async fn close(&self) -> Result<(), SourceError> {
        // Long polling holds no persistent connection; dropping the client
        // is enough. Kept for seam symmetry with stateful sources.
        Ok(())
    }
}
