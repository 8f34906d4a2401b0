//! Slack Web API payloads and their mapping onto the core model.

use std::time::Duration;

use leaderboard_core::{
    ActorProfile, ActorRef, EventPage, PlatformError, PlatformResult, RawEvent, Reaction,
    SelfIdentity, SourceKind,
};
use serde::{Deserialize, Deserializer};
use tracing::debug;

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Every Web API reply: `ok`, an error code when not ok, then the
/// method-specific body.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn into_result(self, retry_after: Option<Duration>) -> PlatformResult<T> {
        if self.ok {
            return Ok(self.body);
        }
        let code = self.error.unwrap_or_else(|| "unknown_error".to_string());
        Err(classify_error_code(&code, retry_after))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SlackMessage {
    #[serde(deserialize_with = "null_as_default")]
    pub ts: String,
    pub user: Option<String>,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(deserialize_with = "null_as_default")]
    pub reactions: Vec<SlackReaction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SlackReaction {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub users: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub count: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ResponseMetadata {
    pub next_cursor: Option<String>,
}

/// `conversations.history`
///
/// Messages stay raw until [`HistoryBody::into_event_page`] so that one
/// undecodable message is skipped instead of failing the page.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct HistoryBody {
    #[serde(deserialize_with = "null_as_default")]
    pub messages: Vec<serde_json::Value>,
    pub response_metadata: Option<ResponseMetadata>,
}

impl HistoryBody {
    /// Continuation cursor, if another page exists.
    pub fn next_cursor(&self) -> Option<String> {
        self.response_metadata
            .as_ref()
            .and_then(|m| m.next_cursor.clone())
            .filter(|c| !c.is_empty())
    }

    /// Decode every message, counting the ones that cannot be mapped.
    pub fn into_event_page(self) -> EventPage {
        let next_cursor = self.next_cursor();
        let mut events = Vec::with_capacity(self.messages.len());
        let mut malformed = 0u64;

        for raw in self.messages {
            let decoded = serde_json::from_value::<SlackMessage>(raw)
                .map_err(|e| PlatformError::Decode(e.to_string()))
                .and_then(SlackMessage::into_raw_event);
            match decoded {
                Ok(event) => events.push(event),
                Err(err) => {
                    debug!(error = %err, "skipping undecodable history message");
                    malformed += 1;
                }
            }
        }

        EventPage {
            events,
            next_cursor,
            malformed,
        }
    }
}

/// `reactions.get`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ReactionsBody {
    pub message: Option<SlackMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SlackProfile {
    pub display_name: String,
    pub real_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SlackUser {
    pub id: String,
    pub name: String,
    pub real_name: Option<String>,
    pub is_bot: bool,
    pub profile: Option<SlackProfile>,
}

/// `users.info`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct UserInfoBody {
    pub user: Option<SlackUser>,
}

/// `chat.postMessage`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PostMessageBody {
    pub ts: Option<String>,
}

/// `auth.test`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AuthTestBody {
    pub user_id: Option<String>,
    pub bot_id: Option<String>,
}

/// Map a Slack `error` code onto a platform error class.
pub(crate) fn classify_error_code(code: &str, retry_after: Option<Duration>) -> PlatformError {
    match code {
        "ratelimited" | "rate_limited" => PlatformError::RateLimited { retry_after },
        "message_not_found" | "channel_not_found" | "user_not_found" | "thread_not_found" => {
            PlatformError::NotFound(code.to_string())
        }
        "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked"
        | "token_expired" => PlatformError::Unauthorized(code.to_string()),
        "missing_scope" | "not_in_channel" | "restricted_action" | "is_archived"
        | "ekm_access_denied" => PlatformError::PermissionDenied(code.to_string()),
        "internal_error" | "fatal_error" | "service_unavailable" | "request_timeout" => {
            PlatformError::Transient(code.to_string())
        }
        other => PlatformError::Api(other.to_string()),
    }
}

/// Map a non-2xx HTTP status. Only 429 and 5xx are retryable.
pub(crate) fn classify_status(status: u16, retry_after: Option<Duration>) -> PlatformError {
    match status {
        429 => PlatformError::RateLimited { retry_after },
        500..=599 => PlatformError::Transient(format!("http {status}")),
        401 => PlatformError::Unauthorized(format!("http {status}")),
        403 => PlatformError::PermissionDenied(format!("http {status}")),
        404 => PlatformError::NotFound(format!("http {status}")),
        _ => PlatformError::Api(format!("http {status}")),
    }
}

/// `Retry-After` in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

pub(crate) fn parse_ts(ts: &str) -> PlatformResult<f64> {
    ts.trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .ok_or_else(|| PlatformError::Decode(format!("invalid message ts: {ts:?}")))
}

/// Slack formats `oldest`/`latest` as `seconds.micros`.
pub(crate) fn format_ts(ts: f64) -> String {
    format!("{ts:.6}")
}

impl SlackReaction {
    fn into_reaction(self) -> Reaction {
        Reaction {
            emoji: self.name,
            actors: self.users.into_iter().map(ActorRef::new).collect(),
            count: self.count,
        }
    }
}

impl SlackMessage {
    pub fn into_raw_event(self) -> PlatformResult<RawEvent> {
        let timestamp = parse_ts(&self.ts)?;
        let source = match (self.bot_id, self.subtype.as_deref()) {
            (Some(bot_id), _) => SourceKind::Bot { bot_id },
            // Legacy integrations post as bot_message without a bot_id.
            (None, Some("bot_message")) => SourceKind::Bot {
                bot_id: String::new(),
            },
            (None, _) => SourceKind::Human,
        };
        Ok(RawEvent {
            id: self.ts,
            author: self.user.map(ActorRef::new),
            text: self.text,
            timestamp,
            source,
            reactions: self
                .reactions
                .into_iter()
                .map(SlackReaction::into_reaction)
                .collect(),
        })
    }

    pub fn into_reactions(self) -> Vec<Reaction> {
        self.reactions
            .into_iter()
            .map(SlackReaction::into_reaction)
            .collect()
    }
}

impl SlackUser {
    /// Display name preference: profile display name, real name, handle.
    pub fn into_profile(self) -> ActorProfile {
        let profile = self.profile.unwrap_or_default();
        let display_name = [
            profile.display_name,
            profile.real_name,
            self.real_name.unwrap_or_default(),
            self.name,
        ]
        .into_iter()
        .map(|n| n.trim().to_string())
        .find(|n| !n.is_empty())
        .unwrap_or_default();
        ActorProfile {
            display_name,
            is_bot: self.is_bot || self.id == "USLACKBOT",
        }
    }
}

impl AuthTestBody {
    pub fn into_identity(self) -> PlatformResult<SelfIdentity> {
        let user_id = self
            .user_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PlatformError::Decode("auth.test returned no user_id".to_string()))?;
        Ok(SelfIdentity {
            user_id: ActorRef::new(user_id),
            bot_id: self.bot_id.filter(|id| !id.is_empty()),
        })
    }
}
