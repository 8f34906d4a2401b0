//! Chat-platform boundary.
//!
//! [`ChatPlatform`] is the only way the pipeline talks to the outside world.
//! Implementations report failures as [`PlatformError`] classes and never
//! retry on their own; retrying is the executor's job. An in-memory
//! implementation lives in [`crate::fakes`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PlatformResult;
use crate::model::{ActorProfile, ActorRef, MessageContent, RawEvent, Reaction, SelfIdentity};

/// Largest page the history endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Parameters for one history page request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Inclusive lower bound, seconds since the epoch.
    pub oldest: Option<f64>,
    /// Inclusive upper bound, seconds since the epoch.
    pub latest: Option<f64>,
    pub cursor: Option<String>,
    pub limit: u32,
}

impl HistoryQuery {
    /// Most recent `limit` events, no time bounds.
    pub fn recent(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}

/// One page of history, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPage {
    pub events: Vec<RawEvent>,
    pub next_cursor: Option<String>,
    /// Records on this page that could not be decoded and were skipped.
    pub malformed: u64,
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// List events in `channel` matching `query`.
    async fn list_events(&self, channel: &str, query: &HistoryQuery) -> PlatformResult<EventPage>;

    /// Full reaction detail for a single event.
    async fn get_reactions(&self, channel: &str, event_id: &str) -> PlatformResult<Vec<Reaction>>;

    /// Display name and bot flag for an actor.
    async fn resolve_identity(&self, actor: &ActorRef) -> PlatformResult<ActorProfile>;

    /// Post a message and return its event id.
    async fn post_message(&self, channel: &str, content: &MessageContent)
        -> PlatformResult<String>;

    /// The identity this client authenticates as.
    async fn whoami(&self) -> PlatformResult<SelfIdentity>;
}
