//! Slack Web API client
//!
//! Implements [`ChatPlatform`] over `conversations.history`,
//! `reactions.get`, `users.info`, `chat.postMessage` and `auth.test`. Each
//! method issues exactly one HTTP request and classifies the outcome;
//! retries are left to the core's `RequestExecutor`.

use std::time::Duration;

use async_trait::async_trait;
use leaderboard_core::{
    ActorProfile, ActorRef, ChatPlatform, EventPage, HistoryQuery, MessageContent, PlatformError,
    PlatformResult, Reaction, SelfIdentity,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::config::SlackConfig;
use crate::error::{Result, SlackError};
use crate::wire::{
    classify_status, format_ts, parse_retry_after, AuthTestBody, Envelope, HistoryBody,
    PostMessageBody, ReactionsBody, UserInfoBody,
};

pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("support-leaderboard/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token.trim()))
            .map_err(|_| SlackError::InvalidConfig("token contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    /// Send one request and unwrap the Slack envelope.
    async fn call<T>(&self, method: &str, request: reqwest::RequestBuilder) -> PlatformResult<T>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        debug!(method = %method, status = status.as_u16(), "slack api response");

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), retry_after));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| PlatformError::Decode(format!("{method}: {e}")))?;
        envelope.into_result(retry_after)
    }
}

fn transport_error(err: reqwest::Error) -> PlatformError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        PlatformError::Transient(err.to_string())
    } else if err.is_decode() {
        PlatformError::Decode(err.to_string())
    } else {
        PlatformError::Api(err.to_string())
    }
}

#[async_trait]
impl ChatPlatform for SlackClient {
    async fn list_events(&self, channel: &str, query: &HistoryQuery) -> PlatformResult<EventPage> {
        let mut params: Vec<(&str, String)> = vec![
            ("channel", channel.to_string()),
            ("limit", query.limit.to_string()),
            ("inclusive", "true".to_string()),
        ];
        if let Some(oldest) = query.oldest {
            params.push(("oldest", format_ts(oldest)));
        }
        if let Some(latest) = query.latest {
            params.push(("latest", format_ts(latest)));
        }
        if let Some(cursor) = &query.cursor {
            params.push(("cursor", cursor.clone()));
        }

        let request = self.http.get(self.url("conversations.history")).query(&params);
        let body: HistoryBody = self.call("conversations.history", request).await?;
        Ok(body.into_event_page())
    }

    async fn get_reactions(&self, channel: &str, event_id: &str) -> PlatformResult<Vec<Reaction>> {
        let request = self.http.get(self.url("reactions.get")).query(&[
            ("channel", channel),
            ("timestamp", event_id),
            ("full", "true"),
        ]);
        let body: ReactionsBody = self.call("reactions.get", request).await?;
        Ok(body.message.map(|m| m.into_reactions()).unwrap_or_default())
    }

    async fn resolve_identity(&self, actor: &ActorRef) -> PlatformResult<ActorProfile> {
        let request = self
            .http
            .get(self.url("users.info"))
            .query(&[("user", actor.as_str())]);
        let body: UserInfoBody = self.call("users.info", request).await?;
        body.user
            .map(|u| u.into_profile())
            .ok_or_else(|| PlatformError::Decode("users.info returned no user".to_string()))
    }

    async fn post_message(
        &self,
        channel: &str,
        content: &MessageContent,
    ) -> PlatformResult<String> {
        let payload = json!({
            "channel": channel,
            "text": content.text,
            "blocks": content.blocks,
            "unfurl_links": false,
        });
        let request = self.http.post(self.url("chat.postMessage")).json(&payload);
        let body: PostMessageBody = self.call("chat.postMessage", request).await?;
        body.ts
            .ok_or_else(|| PlatformError::Decode("chat.postMessage returned no ts".to_string()))
    }

    async fn whoami(&self) -> PlatformResult<SelfIdentity> {
        let request = self.http.post(self.url("auth.test"));
        let body: AuthTestBody = self.call("auth.test", request).await?;
        body.into_identity()
    }
}
