//! Data model shared by every pipeline stage.

use serde::{Deserialize, Serialize};

/// Opaque platform reference to a user or bot (e.g. a Slack user id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorRef(pub String);

impl ActorRef {
    pub fn new(id: impl Into<String>) -> Self {
        ActorRef(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Label used when the display name cannot be resolved.
    pub fn fallback_label(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl std::fmt::Display for ActorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    Human,
    Bot { bot_id: String },
}

/// A single emoji reaction on an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// Emoji short name without colons, e.g. `white_check_mark`.
    pub emoji: String,
    /// Actors listed by the platform. May be truncated in history pages.
    pub actors: Vec<ActorRef>,
    /// Total number of actors who applied the reaction.
    pub count: u32,
}

impl Reaction {
    /// `true` when `emoji` names this reaction, ignoring skin-tone modifiers.
    pub fn is(&self, emoji: &str) -> bool {
        base_emoji(&self.emoji) == base_emoji(emoji)
    }

    /// `true` when every reacting actor is listed.
    pub fn is_complete(&self) -> bool {
        self.actors.len() as u64 >= u64::from(self.count)
    }
}

fn base_emoji(name: &str) -> &str {
    let name = name.trim_matches(':');
    name.split_once("::").map_or(name, |(base, _)| base)
}

/// A message as returned by the platform's history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Platform event id (Slack message `ts`).
    pub id: String,
    pub author: Option<ActorRef>,
    pub text: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub source: SourceKind,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl RawEvent {
    pub fn is_bot_authored(&self) -> bool {
        matches!(self.source, SourceKind::Bot { .. })
    }

    pub fn bot_id(&self) -> Option<&str> {
        match &self.source {
            SourceKind::Bot { bot_id } => Some(bot_id),
            SourceKind::Human => None,
        }
    }

    /// Reactions naming `emoji`, one per skin-tone variant present.
    pub fn reactions_for<'a>(
        &'a self,
        emoji: &'a str,
    ) -> impl Iterator<Item = &'a Reaction> + 'a {
        self.reactions.iter().filter(move |r| r.is(emoji))
    }

    /// Whether this event was posted by the running bot.
    pub fn is_authored_by(&self, me: &SelfIdentity) -> bool {
        let by_user = self.author.as_ref() == Some(&me.user_id);
        let by_bot = match (&me.bot_id, self.bot_id()) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        };
        by_user || by_bot
    }
}

/// The identity this process posts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfIdentity {
    pub user_id: ActorRef,
    pub bot_id: Option<String>,
}

/// Identity used to avoid crediting one support thread twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ThreadKey {
    /// Canonical thread URL found in the event text.
    Url(String),
    /// The event's own id; no cross-event identity is available.
    Event(String),
}

/// One validated unit of resolution credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionSignal {
    pub agent: ActorRef,
    pub thread_key: ThreadKey,
    pub raw_event_id: String,
}

/// Key under which [`dedupe`](crate::dedupe::dedupe) collapses signals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DedupeKey {
    Thread(String),
    AgentEvent(ActorRef, String),
}

impl ResolutionSignal {
    pub(crate) fn dedupe_key(&self) -> DedupeKey {
        match &self.thread_key {
            ThreadKey::Url(url) => DedupeKey::Thread(url.clone()),
            ThreadKey::Event(id) => DedupeKey::AgentEvent(self.agent.clone(), id.clone()),
        }
    }
}

/// Profile data resolved for an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorProfile {
    pub display_name: String,
    pub is_bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub agent: ActorRef,
    pub agent_display_name: String,
    pub credit_count: u32,
}

/// Ranked per-agent credit counts for one window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardResult {
    pub entries: Vec<LeaderboardEntry>,
}

impl LeaderboardResult {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_credits(&self) -> u32 {
        self.entries.iter().map(|e| e.credit_count).sum()
    }
}

/// Content posted to the output channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    /// Plain-text fallback; also what history returns as the message text.
    pub text: String,
    pub blocks: serde_json::Value,
}

/// A prior output-channel entry, reduced to what duplicate detection needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationRecord {
    pub author_is_self: bool,
    pub text: String,
}

impl PublicationRecord {
    pub fn from_event(event: &RawEvent, me: &SelfIdentity) -> Self {
        Self {
            author_is_self: event.is_authored_by(me),
            text: event.text.clone(),
        }
    }

    pub fn announces(&self, window_label: &str) -> bool {
        self.author_is_self && self.text.contains(window_label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(author: Option<&str>, source: SourceKind) -> RawEvent {
        RawEvent {
            id: "1717000000.000100".to_string(),
            author: author.map(ActorRef::new),
            text: String::new(),
            timestamp: 1_717_000_000.0001,
            source,
            reactions: Vec::new(),
        }
    }

    #[test]
    fn test_reaction_matches_skin_tone_variant() {
        let r = Reaction {
            emoji: "white_check_mark::skin-tone-3".to_string(),
            actors: vec![ActorRef::new("U1")],
            count: 1,
        };
        assert!(r.is("white_check_mark"));
        assert!(r.is(":white_check_mark:"));
        assert!(!r.is("eyes"));
    }

    #[test]
    fn test_truncated_reaction_is_incomplete() {
        let r = Reaction {
            emoji: "white_check_mark".to_string(),
            actors: vec![ActorRef::new("U1")],
            count: 3,
        };
        assert!(!r.is_complete());
    }

    #[test]
    fn test_self_authorship_by_user_or_bot_id() {
        let me = SelfIdentity {
            user_id: ActorRef::new("UBOT"),
            bot_id: Some("B01".to_string()),
        };
        assert!(event(Some("UBOT"), SourceKind::Human).is_authored_by(&me));
        assert!(event(
            None,
            SourceKind::Bot {
                bot_id: "B01".to_string()
            }
        )
        .is_authored_by(&me));
        assert!(!event(Some("U2"), SourceKind::Human).is_authored_by(&me));
    }

    #[test]
    fn test_dedupe_key_for_event_identity_includes_agent() {
        let a = ResolutionSignal {
            agent: ActorRef::new("U1"),
            thread_key: ThreadKey::Event("1.0".to_string()),
            raw_event_id: "1.0".to_string(),
        };
        let mut b = a.clone();
        b.agent = ActorRef::new("U2");
        assert_ne!(a.dedupe_key(), b.dedupe_key());
    }
}
