//! End-to-end processing of reporting windows.
//!
//! Per window: duplicate guard (short-circuits), fetch, validate, dedupe,
//! aggregate, publish. Windows are independent; a failure in one is reported
//! and the next one still runs.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeZone};
use tracing::Instrument;

use crate::aggregate::aggregate;
use crate::config::LeaderboardConfig;
use crate::dedupe::dedupe;
use crate::diagnostics::WindowDiagnostics;
use crate::directory::AgentDirectory;
use crate::error::Result;
use crate::executor::RequestExecutor;
use crate::fetcher::EventFetcher;
use crate::guard::already_published;
use crate::model::{LeaderboardResult, MessageContent, SelfIdentity};
use crate::obs;
use crate::platform::ChatPlatform;
use crate::publisher::{publish, render};
use crate::validator::{SignalValidator, ValidationContext};
use crate::window::{compute_window_at, TimeWindow};

/// What happened to one window.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    /// The output channel already carries this window's leaderboard.
    AlreadyPublished,
    Published {
        message_id: String,
        result: LeaderboardResult,
        diagnostics: WindowDiagnostics,
    },
    /// Rendered but not posted.
    DryRun {
        result: LeaderboardResult,
        content: MessageContent,
        diagnostics: WindowDiagnostics,
    },
}

#[derive(Debug)]
pub struct WindowReport {
    pub weeks_ago: u32,
    pub window: TimeWindow,
    pub outcome: Result<WindowOutcome>,
}

impl WindowReport {
    pub fn is_failure(&self) -> bool {
        self.outcome.is_err()
    }
}

pub struct LeaderboardPipeline {
    platform: Arc<dyn ChatPlatform>,
    executor: RequestExecutor,
    config: LeaderboardConfig,
    validator: SignalValidator,
    directory: AgentDirectory,
    me: SelfIdentity,
}

impl LeaderboardPipeline {
    /// Validate `config`, authenticate, and build the signal validator.
    ///
    /// Any error here means no window can be processed.
    pub async fn connect(
        platform: Arc<dyn ChatPlatform>,
        config: LeaderboardConfig,
    ) -> Result<Self> {
        config.validate()?;
        let executor = RequestExecutor::new(config.retry.clone());

        let me = executor.execute("auth.test", || platform.whoami()).await?;
        tracing::info!(user_id = %me.user_id, bot_id = ?me.bot_id, "authenticated");

        let validator = SignalValidator::from_config(
            &config.strategy,
            platform.as_ref(),
            &executor,
            &config.source_channel,
            config.history_scan_limit,
        )
        .await?;

        Ok(Self {
            platform,
            executor,
            config,
            validator,
            directory: AgentDirectory::new(),
            me,
        })
    }

    pub fn validator(&self) -> &SignalValidator {
        &self.validator
    }

    /// Process a single window.
    pub async fn run_window(&mut self, window: &TimeWindow) -> Result<WindowOutcome> {
        let label = window.label();
        self.process(window)
            .instrument(obs::window_span(&label))
            .await
    }

    /// Process each offset in order, relative to `now`. Never stops early.
    pub async fn run_offsets<Tz: TimeZone>(
        &mut self,
        offsets: &[u32],
        now: &DateTime<Tz>,
    ) -> Vec<WindowReport> {
        let started = Instant::now();
        obs::emit_run_started(
            &self.config.source_channel,
            &self.config.destination_channel,
            offsets.len(),
        );

        let mut reports = Vec::with_capacity(offsets.len());
        for &weeks_ago in offsets {
            let window = compute_window_at(now, weeks_ago);
            let outcome = self.run_window(&window).await;
            if let Err(err) = &outcome {
                obs::emit_window_failed(&window.label(), err);
            }
            reports.push(WindowReport {
                weeks_ago,
                window,
                outcome,
            });
        }

        let failed = reports.iter().filter(|r| r.is_failure()).count();
        obs::emit_run_finished(
            reports.len(),
            failed,
            started.elapsed().as_millis() as u64,
        );
        reports
    }

    async fn process(&mut self, window: &TimeWindow) -> Result<WindowOutcome> {
        let label = window.label();
        obs::emit_window_started(&label, self.validator.name());

        if already_published(
            self.platform.as_ref(),
            &self.executor,
            &self.config.destination_channel,
            &self.me,
            window,
            self.config.history_scan_limit,
        )
        .await
        {
            obs::emit_window_skipped(&label);
            return Ok(WindowOutcome::AlreadyPublished);
        }

        let mut diagnostics = WindowDiagnostics::new();
        let computed = self.compute(window, &mut diagnostics).await;
        diagnostics.flush(&label);
        let result = computed?;

        if self.config.dry_run {
            let content = render(&result, window);
            obs::emit_window_dry_run(&label, result.entries.len(), result.total_credits());
            return Ok(WindowOutcome::DryRun {
                result,
                content,
                diagnostics,
            });
        }

        let message_id = publish(
            self.platform.as_ref(),
            &self.executor,
            &self.config.destination_channel,
            &result,
            window,
        )
        .await?;
        obs::emit_window_published(
            &label,
            &message_id,
            result.entries.len(),
            result.total_credits(),
        );
        Ok(WindowOutcome::Published {
            message_id,
            result,
            diagnostics,
        })
    }

    async fn compute(
        &mut self,
        window: &TimeWindow,
        diagnostics: &mut WindowDiagnostics,
    ) -> Result<LeaderboardResult> {
        let platform = self.platform.as_ref();
        let channel = self.config.source_channel.as_str();
        let fetcher = EventFetcher::new(platform, &self.executor, &self.config.fetch);

        let events = fetcher.fetch_events(channel, window, diagnostics).await?;
        diagnostics.events_scanned = events.len() as u64;

        let signals = {
            let mut ctx = ValidationContext {
                platform,
                executor: &self.executor,
                fetcher: &fetcher,
                channel,
                directory: &mut self.directory,
                diagnostics: &mut *diagnostics,
            };
            self.validator.validate_all(&events, &mut ctx).await?
        };

        let deduped = dedupe(signals);
        diagnostics.duplicates_discarded = deduped.duplicates;

        Ok(aggregate(
            &deduped.signals,
            platform,
            &self.executor,
            &mut self.directory,
            diagnostics,
        )
        .await)
    }
}
