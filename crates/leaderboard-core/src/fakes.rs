//! In-memory [`ChatPlatform`] for tests.
//!
//! `FakePlatform` holds channels, reactions and profiles in a mutex, records
//! every post, and can be scripted to fail the next N calls of an operation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{PlatformError, PlatformResult};
use crate::model::{
    ActorProfile, ActorRef, MessageContent, RawEvent, Reaction, SelfIdentity, SourceKind,
};
use crate::platform::{ChatPlatform, EventPage, HistoryQuery};

/// Operation names accepted by [`FakePlatform::fail_next`] and
/// [`FakePlatform::calls`].
pub const LIST_EVENTS: &str = "list_events";
pub const GET_REACTIONS: &str = "get_reactions";
pub const RESOLVE_IDENTITY: &str = "resolve_identity";
pub const POST_MESSAGE: &str = "post_message";
pub const WHOAMI: &str = "whoami";

/// A message recorded by [`ChatPlatform::post_message`].
#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub channel: String,
    pub message_id: String,
    pub content: MessageContent,
}

#[derive(Debug)]
struct FakeState {
    me: SelfIdentity,
    channels: HashMap<String, Vec<RawEvent>>,
    reactions: HashMap<String, Vec<Reaction>>,
    profiles: HashMap<ActorRef, ActorProfile>,
    malformed: HashMap<String, u64>,
    posted: Vec<PostedMessage>,
    failures: HashMap<&'static str, VecDeque<PlatformError>>,
    calls: HashMap<&'static str, u32>,
    page_cap: Option<u32>,
}

#[derive(Debug)]
pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn new(me: SelfIdentity) -> Self {
        Self {
            state: Mutex::new(FakeState {
                me,
                channels: HashMap::new(),
                reactions: HashMap::new(),
                profiles: HashMap::new(),
                malformed: HashMap::new(),
                posted: Vec::new(),
                failures: HashMap::new(),
                calls: HashMap::new(),
                page_cap: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_event(&self, channel: &str, event: RawEvent) {
        self.state()
            .channels
            .entry(channel.to_string())
            .or_default()
            .push(event);
    }

    /// Full reaction detail served by `get_reactions` for `event_id`.
    pub fn set_reactions(&self, event_id: &str, reactions: Vec<Reaction>) {
        self.state()
            .reactions
            .insert(event_id.to_string(), reactions);
    }

    pub fn add_profile(&self, actor: &str, display_name: &str, is_bot: bool) {
        self.state().profiles.insert(
            ActorRef::new(actor),
            ActorProfile {
                display_name: display_name.to_string(),
                is_bot,
            },
        );
    }

    /// Report `count` undecodable records on the first history page of
    /// `channel`, as a real platform does when a record is missing fields.
    pub fn add_malformed(&self, channel: &str, count: u64) {
        *self
            .state()
            .malformed
            .entry(channel.to_string())
            .or_insert(0) += count;
    }

    /// Cap every history page at `cap` events regardless of the requested limit.
    pub fn set_page_cap(&self, cap: u32) {
        self.state().page_cap = Some(cap);
    }

    /// Fail the next call of `operation` with `err`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, operation: &'static str, err: PlatformError) {
        self.state()
            .failures
            .entry(operation)
            .or_default()
            .push_back(err);
    }

    pub fn calls(&self, operation: &str) -> u32 {
        self.state().calls.get(operation).copied().unwrap_or(0)
    }

    pub fn posted(&self) -> Vec<PostedMessage> {
        self.state().posted.clone()
    }

    /// Count the call and pop a scripted failure, if any.
    fn enter(&self, operation: &'static str) -> PlatformResult<MutexGuard<'_, FakeState>> {
        let mut state = self.state();
        *state.calls.entry(operation).or_insert(0) += 1;
        if let Some(err) = state
            .failures
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        Ok(state)
    }
}

fn in_range(event: &RawEvent, query: &HistoryQuery) -> bool {
    query.oldest.map_or(true, |o| event.timestamp >= o)
        && query.latest.map_or(true, |l| event.timestamp <= l)
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn list_events(&self, channel: &str, query: &HistoryQuery) -> PlatformResult<EventPage> {
        let state = self.enter(LIST_EVENTS)?;
        let Some(events) = state.channels.get(channel) else {
            return Err(PlatformError::NotFound(format!("channel_not_found: {channel}")));
        };

        let mut matching: Vec<RawEvent> =
            events.iter().filter(|e| in_range(e, query)).cloned().collect();
        matching.sort_by(|a, b| b.timestamp.total_cmp(&a.timestamp));

        let offset = match &query.cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| PlatformError::Api(format!("invalid_cursor: {cursor}")))?,
            None => 0,
        };
        let limit = state
            .page_cap
            .map_or(query.limit, |cap| cap.min(query.limit))
            .max(1) as usize;

        let end = (offset + limit).min(matching.len());
        let page: Vec<RawEvent> = matching.get(offset..end).unwrap_or_default().to_vec();
        let next_cursor = (end < matching.len()).then(|| end.to_string());
        let malformed = match offset {
            0 => state.malformed.get(channel).copied().unwrap_or(0),
            _ => 0,
        };

        Ok(EventPage {
            events: page,
            next_cursor,
            malformed,
        })
    }

    async fn get_reactions(&self, channel: &str, event_id: &str) -> PlatformResult<Vec<Reaction>> {
        let state = self.enter(GET_REACTIONS)?;
        if let Some(reactions) = state.reactions.get(event_id) {
            return Ok(reactions.clone());
        }
        state
            .channels
            .get(channel)
            .and_then(|events| events.iter().find(|e| e.id == event_id))
            .map(|e| e.reactions.clone())
            .ok_or_else(|| PlatformError::NotFound(format!("message_not_found: {event_id}")))
    }

    async fn resolve_identity(&self, actor: &ActorRef) -> PlatformResult<ActorProfile> {
        let state = self.enter(RESOLVE_IDENTITY)?;
        state
            .profiles
            .get(actor)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("user_not_found: {actor}")))
    }

    async fn post_message(
        &self,
        channel: &str,
        content: &MessageContent,
    ) -> PlatformResult<String> {
        let mut state = self.enter(POST_MESSAGE)?;
        let newest = state
            .channels
            .get(channel)
            .and_then(|events| events.iter().map(|e| e.timestamp).reduce(f64::max))
            .unwrap_or(1_700_000_000.0);
        let timestamp = newest + 1.0;
        let message_id = format!("{timestamp:.6}");

        let me = state.me.clone();
        let event = RawEvent {
            id: message_id.clone(),
            author: Some(me.user_id),
            text: content.text.clone(),
            timestamp,
            source: match me.bot_id {
                Some(bot_id) => SourceKind::Bot { bot_id },
                None => SourceKind::Human,
            },
            reactions: Vec::new(),
        };
        state
            .channels
            .entry(channel.to_string())
            .or_default()
            .push(event);
        state.posted.push(PostedMessage {
            channel: channel.to_string(),
            message_id: message_id.clone(),
            content: content.clone(),
        });
        Ok(message_id)
    }

    async fn whoami(&self) -> PlatformResult<SelfIdentity> {
        let state = self.enter(WHOAMI)?;
        Ok(state.me.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> SelfIdentity {
        SelfIdentity {
            user_id: ActorRef::new("UBOT"),
            bot_id: Some("BLEADER".to_string()),
        }
    }

    fn event(ts: f64) -> RawEvent {
        RawEvent {
            id: format!("{ts:.6}"),
            author: Some(ActorRef::new("U1")),
            text: String::new(),
            timestamp: ts,
            source: SourceKind::Human,
            reactions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_pages_newest_first_with_cursor() {
        let fake = FakePlatform::new(me());
        for ts in [10.0, 30.0, 20.0] {
            fake.add_event("C1", event(ts));
        }
        let first = fake
            .list_events("C1", &HistoryQuery::recent(2))
            .await
            .unwrap();
        assert_eq!(first.events[0].timestamp, 30.0);
        assert_eq!(first.events[1].timestamp, 20.0);
        let cursor = first.next_cursor.clone().unwrap();

        let query = HistoryQuery {
            cursor: Some(cursor),
            ..HistoryQuery::recent(2)
        };
        let second = fake.list_events("C1", &query).await.unwrap();
        assert_eq!(second.events.len(), 1);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_scripted_failure_is_consumed_once() {
        let fake = FakePlatform::new(me());
        fake.fail_next(WHOAMI, PlatformError::Unauthorized("invalid_auth".into()));
        assert!(fake.whoami().await.is_err());
        assert_eq!(fake.whoami().await.unwrap(), me());
        assert_eq!(fake.calls(WHOAMI), 2);
    }

    #[tokio::test]
    async fn test_posted_message_is_visible_in_history() {
        let fake = FakePlatform::new(me());
        let content = MessageContent {
            text: "hello".to_string(),
            blocks: serde_json::Value::Null,
        };
        let id = fake.post_message("C2", &content).await.unwrap();
        let page = fake
            .list_events("C2", &HistoryQuery::recent(10))
            .await
            .unwrap();
        assert_eq!(page.events[0].id, id);
        assert!(page.events[0].is_authored_by(&me()));
    }
}
