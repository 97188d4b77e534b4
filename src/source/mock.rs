// src/source/mock.rs
//! Scripted channel source for tests and failure injection.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::source::{ChannelRef, ChannelSource, RawMessage, SourceError};

#[derive(Default)]
pub struct MockSource {
    inner: Mutex<Inner>,
    closed: AtomicBool,
}

#[derive(Default)]
struct Inner {
    history: HashMap<ChannelRef, Vec<RawMessage>>,
    failing: HashSet<ChannelRef>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a message posted at a fixed instant.
    pub fn msg(id: i64, text: Option<&str>) -> RawMessage {
        RawMessage {
            id,
            text: text.map(str::to_string),
            posted_at: DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(id),
        }
    }

    /// Append messages to a channel's history. `channel` is the raw
    /// configured form; it is normalized the same way the pipeline does it.
    pub fn push_history(&self, channel: &str, messages: Vec<RawMessage>) {
        let key = ChannelRef::parse(channel).expect("mock channel ref");
        self.inner
            .lock()
            .expect("mock source mutex poisoned")
            .history
            .entry(key)
            .or_default()
            .extend(messages);
    }

    /// Make every fetch for this channel fail.
    pub fn fail_channel(&self, channel: &str) {
        let key = ChannelRef::parse(channel).expect("mock channel ref");
        self.inner
            .lock()
            .expect("mock source mutex poisoned")
            .failing
            .insert(key);
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelSource for MockSource {
    async fn fetch_messages(
        &self,
        channel: &ChannelRef,
        since_id: i64,
        limit: usize,
    ) -> Result<Vec<RawMessage>, SourceError> {
        let inner = self.inner.lock().expect("mock source mutex poisoned");
        if inner.failing.contains(channel) {
            return Err(SourceError::Http("simulated fetch failure".into()));
        }
        let mut out: Vec<RawMessage> = inner
            .history
            .get(channel)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| m.id > since_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by_key(|m| m.id);
        out.truncate(limit);
        Ok(out)
    }

    async fn health_check(&self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), SourceError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
