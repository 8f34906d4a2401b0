//! Signal validation: decides which raw events count as resolutions and who
//! gets the credit.
//!
//! Two strategies exist and a deployment picks exactly one:
//!
//! - [`ReactionStrategy`] credits every non-bot actor who applied the
//!   configured emoji to an event.
//! - [`WorkflowStrategy`] credits the agent named in a structured
//!   "thread resolved by <@U…>" message posted by a (trusted) bot.
//!
//! Events that fail a check are dropped and counted, never reported as errors.

use std::collections::HashSet;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{StrategyConfig, WorkflowTrust};
use crate::diagnostics::WindowDiagnostics;
use crate::directory::AgentDirectory;
use crate::error::Result;
use crate::executor::RequestExecutor;
use crate::fetcher::EventFetcher;
use crate::model::{ActorRef, RawEvent, ResolutionSignal, ThreadKey};
use crate::platform::{ChatPlatform, HistoryQuery};

/// Everything a strategy may need while validating one window.
pub struct ValidationContext<'a> {
    pub platform: &'a dyn ChatPlatform,
    pub executor: &'a RequestExecutor,
    pub fetcher: &'a EventFetcher<'a>,
    pub channel: &'a str,
    pub directory: &'a mut AgentDirectory,
    pub diagnostics: &'a mut WindowDiagnostics,
}

#[derive(Debug, Clone)]
pub struct ReactionStrategy {
    emoji: String,
}

impl ReactionStrategy {
    pub fn new(emoji: impl Into<String>) -> Self {
        Self {
            emoji: emoji.into(),
        }
    }

    async fn extract(
        &self,
        event: &RawEvent,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Vec<ResolutionSignal>> {
        let mut matching: Vec<_> = event.reactions_for(&self.emoji).cloned().collect();
        if matching.is_empty() {
            return Ok(Vec::new());
        }

        if matching.iter().any(|r| !r.is_complete()) {
            let full = ctx
                .fetcher
                .fetch_reactions(ctx.channel, &event.id, ctx.diagnostics)
                .await?;
            matching = full.into_iter().filter(|r| r.is(&self.emoji)).collect();
        }

        let mut seen = HashSet::new();
        let mut signals = Vec::new();
        for actor in matching.iter().flat_map(|r| r.actors.iter()) {
            if !seen.insert(actor.clone()) {
                continue;
            }
            let profile = ctx
                .directory
                .resolve(ctx.platform, ctx.executor, actor, ctx.diagnostics)
                .await;
            if profile.is_bot {
                debug!(event_id = %event.id, actor = %actor, "ignoring reaction by bot");
                ctx.diagnostics.dropped_bot_reactor += 1;
                continue;
            }
            signals.push(ResolutionSignal {
                agent: actor.clone(),
                thread_key: ThreadKey::Event(event.id.clone()),
                raw_event_id: event.id.clone(),
            });
        }
        Ok(signals)
    }
}

/// Which bot a [`WorkflowStrategy`] accepts, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustedAuthor {
    AnyBot,
    Bot(String),
    /// Auto-detection found no workflow bot; nothing is trusted.
    Nobody,
}

/// Why a workflow message was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotBot,
    UntrustedAuthor,
    PatternMismatch,
}

#[derive(Debug, Clone)]
pub struct WorkflowStrategy {
    resolution: Regex,
    thread_url: Regex,
    trusted: TrustedAuthor,
}

impl WorkflowStrategy {
    pub fn new(
        resolution_pattern: &str,
        thread_url_pattern: &str,
        trusted: TrustedAuthor,
    ) -> Result<Self> {
        Ok(Self {
            resolution: Regex::new(resolution_pattern)?,
            thread_url: Regex::new(thread_url_pattern)?,
            trusted,
        })
    }

    /// Agent named by the resolution pattern, if `text` matches it.
    pub fn resolving_agent(&self, text: &str) -> Option<ActorRef> {
        self.resolution
            .captures(text)
            .and_then(|c| c.name("agent"))
            .map(|m| ActorRef::new(m.as_str()))
    }

    /// Canonical thread URL embedded in `text`.
    pub fn thread_url(&self, text: &str) -> Option<String> {
        self.thread_url
            .captures(text)
            .and_then(|c| c.name("url"))
            .map(|m| canonical_url(m.as_str()))
            .filter(|u| !u.is_empty())
    }

    /// Validate a single event. Pure; never touches the platform.
    pub fn check(&self, event: &RawEvent) -> std::result::Result<ResolutionSignal, Rejection> {
        let Some(bot_id) = event.bot_id() else {
            return Err(Rejection::NotBot);
        };
        match &self.trusted {
            TrustedAuthor::AnyBot => {}
            TrustedAuthor::Bot(trusted) if trusted == bot_id => {}
            _ => return Err(Rejection::UntrustedAuthor),
        }
        let agent = self
            .resolving_agent(&event.text)
            .ok_or(Rejection::PatternMismatch)?;
        let thread_key = match self.thread_url(&event.text) {
            Some(url) => ThreadKey::Url(url),
            None => ThreadKey::Event(event.id.clone()),
        };
        Ok(ResolutionSignal {
            agent,
            thread_key,
            raw_event_id: event.id.clone(),
        })
    }

    fn extract(
        &self,
        event: &RawEvent,
        diagnostics: &mut WindowDiagnostics,
    ) -> Vec<ResolutionSignal> {
        match self.check(event) {
            Ok(signal) => vec![signal],
            Err(rejection) => {
                match rejection {
                    Rejection::NotBot => diagnostics.dropped_not_bot += 1,
                    Rejection::UntrustedAuthor => diagnostics.dropped_untrusted_author += 1,
                    Rejection::PatternMismatch => diagnostics.dropped_pattern_mismatch += 1,
                }
                Vec::new()
            }
        }
    }

    /// Bot id of the first bot-authored event in `events` whose text matches
    /// the resolution pattern.
    pub fn detect_trusted_bot(&self, events: &[RawEvent]) -> Option<String> {
        events
            .iter()
            .filter(|e| self.resolving_agent(&e.text).is_some())
            .find_map(|e| e.bot_id().map(str::to_string))
    }
}

fn canonical_url(raw: &str) -> String {
    raw.trim_end_matches(&['.', ',', ';', ':', ')', '!', '?'][..])
        .trim_end_matches('/')
        .to_string()
}

/// The configured validation strategy.
#[derive(Debug, Clone)]
pub enum SignalValidator {
    Reaction(ReactionStrategy),
    WorkflowMessage(WorkflowStrategy),
}

impl SignalValidator {
    /// Build the validator for `strategy`. `AutoDetect` trust scans the most
    /// recent `scan_limit` events of `channel` once, here.
    pub async fn from_config(
        strategy: &StrategyConfig,
        platform: &dyn ChatPlatform,
        executor: &RequestExecutor,
        channel: &str,
        scan_limit: u32,
    ) -> Result<Self> {
        match strategy {
            StrategyConfig::Reaction { emoji } => {
                Ok(SignalValidator::Reaction(ReactionStrategy::new(emoji.clone())))
            }
            StrategyConfig::WorkflowMessage {
                resolution_pattern,
                thread_url_pattern,
                trust,
            } => {
                let trusted = match trust {
                    WorkflowTrust::AnyBot => TrustedAuthor::AnyBot,
                    WorkflowTrust::Pinned(bot_id) => TrustedAuthor::Bot(bot_id.clone()),
                    WorkflowTrust::AutoDetect => TrustedAuthor::Nobody,
                };
                let mut workflow =
                    WorkflowStrategy::new(resolution_pattern, thread_url_pattern, trusted)?;

                if *trust == WorkflowTrust::AutoDetect {
                    let query = HistoryQuery::recent(scan_limit);
                    let page = executor
                        .execute("conversations.history", || platform.list_events(channel, &query))
                        .await?;
                    workflow.trusted = match workflow.detect_trusted_bot(&page.events) {
                        Some(bot_id) => {
                            info!(bot_id = %bot_id, "detected trusted workflow bot");
                            TrustedAuthor::Bot(bot_id)
                        }
                        None => {
                            warn!(
                                channel = %channel,
                                scanned = page.events.len(),
                                "no workflow bot found in recent history; no messages will be trusted"
                            );
                            TrustedAuthor::Nobody
                        }
                    };
                }

                Ok(SignalValidator::WorkflowMessage(workflow))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SignalValidator::Reaction(_) => "reaction",
            SignalValidator::WorkflowMessage(_) => "workflow_message",
        }
    }

    /// Signals carried by one event. Zero, one, or (reaction strategy) many.
    pub async fn extract_signals(
        &self,
        event: &RawEvent,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Vec<ResolutionSignal>> {
        match self {
            SignalValidator::Reaction(strategy) => strategy.extract(event, ctx).await,
            SignalValidator::WorkflowMessage(strategy) => {
                Ok(strategy.extract(event, ctx.diagnostics))
            }
        }
    }

    /// Signals for every event, in event order.
    pub async fn validate_all(
        &self,
        events: &[RawEvent],
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Vec<ResolutionSignal>> {
        let mut signals = Vec::new();
        for event in events {
            signals.extend(self.extract_signals(event, ctx).await?);
        }
        ctx.diagnostics.signals_extracted += signals.len() as u64;
        Ok(signals)
    }
}
