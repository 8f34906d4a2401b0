//! Support Leaderboard CLI
//!
//! `support-leaderboard` credits support agents for threads resolved in a
//! Slack channel and posts one ranked leaderboard per Monday–Sunday week.
//!
//! ## Usage
//!
//! - no window flag: last complete week
//! - `--weeks N`: the last N complete weeks, oldest first
//! - `--week-offset K`: only the week K weeks before the last complete one
//! - `--dry-run`: print the rendered leaderboard instead of posting it
//! - `--strict`: exit non-zero if any week failed

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, ValueEnum};
use leaderboard_core::{
    backfill_offsets, ChatPlatform, FetchSettings, LeaderboardConfig, LeaderboardPipeline,
    RetryPolicy, StrategyConfig, WindowOutcome, WindowReport, WorkflowTrust,
    DEFAULT_HISTORY_SCAN_LIMIT, DEFAULT_RESOLUTION_EMOJI, DEFAULT_RESOLUTION_PATTERN,
    DEFAULT_THREAD_URL_PATTERN, MAX_PAGE_SIZE,
};
use leaderboard_slack::{SlackClient, SlackConfig, DEFAULT_API_BASE, DEFAULT_REQUEST_TIMEOUT_MS};
use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// Credit whoever reacts with the resolution emoji
    Reaction,
    /// Credit the agent named in a workflow bot's "resolved by" message
    Workflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Trust {
    /// Accept resolution messages from any bot
    AnyBot,
    /// Trust the bot that recently posted resolution messages
    AutoDetect,
    /// Trust only --trusted-bot-id
    Pinned,
}

#[derive(Parser, Debug)]
#[command(name = "support-leaderboard")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Weekly support resolution leaderboard for Slack", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Render the leaderboard to stdout instead of posting it
    #[arg(long)]
    dry_run: bool,

    /// Exit non-zero when any window fails
    #[arg(long)]
    strict: bool,

    /// Process the last N complete weeks, oldest first
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..), conflicts_with = "week_offset")]
    weeks: Option<u32>,

    /// Process only the week this many weeks before the last complete one
    #[arg(long)]
    week_offset: Option<u32>,

    /// Slack bot token
    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Slack Web API base URL
    #[arg(long, env = "SLACK_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "SLACK_REQUEST_TIMEOUT_MS", default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    request_timeout_ms: u64,

    /// Channel whose history is scanned for resolutions
    #[arg(long, env = "LEADERBOARD_SOURCE_CHANNEL")]
    source_channel: String,

    /// Channel the leaderboard is posted to (default: the source channel)
    #[arg(long, env = "LEADERBOARD_DESTINATION_CHANNEL")]
    destination_channel: Option<String>,

    /// How resolutions are recognised
    #[arg(long, value_enum, env = "LEADERBOARD_STRATEGY", default_value_t = Strategy::Reaction)]
    strategy: Strategy,

    /// Resolution emoji for the reaction strategy
    #[arg(long, env = "LEADERBOARD_EMOJI", default_value = DEFAULT_RESOLUTION_EMOJI)]
    emoji: String,

    /// Resolution regex for the workflow strategy; must define an `agent` group
    #[arg(long, env = "LEADERBOARD_RESOLUTION_PATTERN", default_value = DEFAULT_RESOLUTION_PATTERN)]
    resolution_pattern: String,

    /// Thread URL regex for the workflow strategy; must define a `url` group
    #[arg(long, env = "LEADERBOARD_THREAD_URL_PATTERN", default_value = DEFAULT_THREAD_URL_PATTERN)]
    thread_url_pattern: String,

    /// Which bots may post resolution messages
    #[arg(long, value_enum, env = "LEADERBOARD_TRUST", default_value_t = Trust::AutoDetect)]
    trust: Trust,

    /// Bot id trusted with --trust pinned
    #[arg(long, env = "LEADERBOARD_TRUSTED_BOT_ID")]
    trusted_bot_id: Option<String>,

    /// Attempts per remote call, including the first
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: u32,

    /// First transient-error backoff in milliseconds (doubles per retry)
    #[arg(long, default_value_t = 1_000)]
    initial_backoff_ms: u64,

    /// Rate-limit wait when the server gives no Retry-After, in milliseconds
    #[arg(long, default_value_t = 30_000)]
    rate_limit_fallback_ms: u64,

    /// Pause between history pages in milliseconds
    #[arg(long, default_value_t = 1_000)]
    page_delay_ms: u64,

    /// Recent output-channel entries checked for an earlier post
    #[arg(long, default_value_t = DEFAULT_HISTORY_SCAN_LIMIT)]
    history_scan_limit: u32,
}

impl Cli {
    /// Week offsets to process, in processing order.
    fn offsets(&self) -> Vec<u32> {
        match (self.weeks, self.week_offset) {
            (Some(weeks), _) => backfill_offsets(weeks),
            (None, Some(offset)) => vec![offset],
            (None, None) => vec![0],
        }
    }

    fn strategy_config(&self) -> Result<StrategyConfig> {
        Ok(match self.strategy {
            Strategy::Reaction => StrategyConfig::reaction(self.emoji.clone()),
            Strategy::Workflow => {
                let trust = match self.trust {
                    Trust::AnyBot => WorkflowTrust::AnyBot,
                    Trust::AutoDetect => WorkflowTrust::AutoDetect,
                    Trust::Pinned => match &self.trusted_bot_id {
                        Some(bot_id) => WorkflowTrust::Pinned(bot_id.clone()),
                        None => bail!("--trust pinned requires --trusted-bot-id"),
                    },
                };
                StrategyConfig::WorkflowMessage {
                    resolution_pattern: self.resolution_pattern.clone(),
                    thread_url_pattern: self.thread_url_pattern.clone(),
                    trust,
                }
            }
        })
    }

    fn leaderboard_config(&self) -> Result<LeaderboardConfig> {
        let mut config = LeaderboardConfig::new(&self.source_channel, self.strategy_config()?);
        if let Some(destination) = &self.destination_channel {
            config = config.with_destination(destination);
        }
        config.retry = RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff_ms: self.initial_backoff_ms,
            rate_limit_fallback_ms: self.rate_limit_fallback_ms,
        };
        config.fetch = FetchSettings {
            page_size: MAX_PAGE_SIZE,
            page_delay_ms: self.page_delay_ms,
        };
        config.history_scan_limit = self.history_scan_limit;
        config.dry_run = self.dry_run;
        config.validate().context("invalid leaderboard configuration")?;
        Ok(config)
    }

    fn slack_config(&self) -> SlackConfig {
        let mut config =
            SlackConfig::new(self.token.clone().unwrap_or_default()).with_api_base(&self.api_base);
        config.request_timeout_ms = self.request_timeout_ms;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    leaderboard_core::init_tracing(cli.json, level);

    let config = cli.leaderboard_config()?;
    let client = SlackClient::new(&cli.slack_config()).context("failed to set up Slack client")?;
    let platform: Arc<dyn ChatPlatform> = Arc::new(client);

    cmd_run(platform, config, &cli.offsets(), cli.strict, Local::now()).await
}

/// Authenticate, then process each window in turn and print a summary.
async fn cmd_run(
    platform: Arc<dyn ChatPlatform>,
    config: LeaderboardConfig,
    offsets: &[u32],
    strict: bool,
    now: DateTime<Local>,
) -> Result<()> {
    let mut pipeline = LeaderboardPipeline::connect(platform, config)
        .await
        .context("pre-flight check failed")?;

    let reports = pipeline.run_offsets(offsets, &now).await;
    for report in &reports {
        print_report(report)?;
    }

    let failed = reports.iter().filter(|r| r.is_failure()).count();
    if strict && failed > 0 {
        bail!("{failed} of {} window(s) failed", reports.len());
    }
    Ok(())
}

fn print_report(report: &WindowReport) -> Result<()> {
    let label = report.window.label();
    match &report.outcome {
        Ok(WindowOutcome::AlreadyPublished) => {
            println!("{label}: already published, skipped");
        }
        Ok(WindowOutcome::Published {
            message_id, result, ..
        }) => {
            println!(
                "{label}: published {message_id} ({} agents, {} resolutions)",
                result.entries.len(),
                result.total_credits()
            );
        }
        Ok(WindowOutcome::DryRun { content, .. }) => {
            println!("{label}: dry run, not posted");
            println!("{}", serde_json::to_string_pretty(content)?);
        }
        Err(err) => {
            println!("{label}: failed: {err}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use leaderboard_core::fakes::FakePlatform;
    use leaderboard_core::{ActorRef, SelfIdentity};

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        let mut argv = vec!["support-leaderboard", "--source-channel", "CSUPPORT"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv)
    }

    #[test]
    fn test_default_is_last_complete_week() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.offsets(), vec![0]);
        assert!(!cli.strict);
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_weeks_backfills_oldest_first() {
        let cli = parse(&["--weeks", "3"]).unwrap();
        assert_eq!(cli.offsets(), vec![2, 1, 0]);
    }

    #[test]
    fn test_week_offset_selects_single_week() {
        let cli = parse(&["--week-offset", "4"]).unwrap();
        assert_eq!(cli.offsets(), vec![4]);
    }

    #[test]
    fn test_weeks_conflicts_with_week_offset() {
        assert!(parse(&["--weeks", "2", "--week-offset", "1"]).is_err());
    }

    #[test]
    fn test_zero_weeks_rejected() {
        assert!(parse(&["--weeks", "0"]).is_err());
    }

    #[test]
    fn test_destination_defaults_to_source() {
        let config = parse(&[]).unwrap().leaderboard_config().unwrap();
        assert_eq!(config.destination_channel, "CSUPPORT");
        assert_eq!(config.strategy, StrategyConfig::reaction("white_check_mark"));

        let config = parse(&["--destination-channel", "CLEADER"])
            .unwrap()
            .leaderboard_config()
            .unwrap();
        assert_eq!(config.destination_channel, "CLEADER");
    }

    #[test]
    fn test_pinned_trust_requires_bot_id() {
        let cli = parse(&["--strategy", "workflow", "--trust", "pinned"]).unwrap();
        assert!(cli.leaderboard_config().is_err());

        let cli = parse(&[
            "--strategy",
            "workflow",
            "--trust",
            "pinned",
            "--trusted-bot-id",
            "B123",
        ])
        .unwrap();
        let config = cli.leaderboard_config().unwrap();
        assert!(matches!(
            config.strategy,
            StrategyConfig::WorkflowMessage {
                trust: WorkflowTrust::Pinned(ref id),
                ..
            } if id == "B123"
        ));
    }

    #[test]
    fn test_retry_flags_reach_config() {
        let config = parse(&["--max-attempts", "5", "--initial-backoff-ms", "250"])
            .unwrap()
            .leaderboard_config()
            .unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 250);
    }

    #[test]
    fn test_slack_flags_reach_client_config() {
        let config = parse(&[
            "--token",
            "xoxb-test",
            "--api-base",
            "http://localhost:9000/api",
            "--request-timeout-ms",
            "1500",
        ])
        .unwrap()
        .slack_config();
        assert_eq!(config.token, "xoxb-test");
        assert_eq!(config.api_base, "http://localhost:9000/api");
        assert_eq!(config.request_timeout_ms, 1500);
        assert!(config.validate().is_ok());
    }

    fn wednesday() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap()
    }

    fn fake() -> Arc<dyn ChatPlatform> {
        // The source channel has no history at all, so every fetch fails.
        Arc::new(FakePlatform::new(SelfIdentity {
            user_id: ActorRef::new("UBOT"),
            bot_id: None,
        }))
    }

    fn quick_config() -> LeaderboardConfig {
        let mut config = parse(&[]).unwrap().leaderboard_config().unwrap();
        config.fetch.page_delay_ms = 0;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_window_is_lenient_by_default() {
        let result = cmd_run(fake(), quick_config(), &[0], false, wednesday()).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_fails_on_window_failure() {
        let result = cmd_run(fake(), quick_config(), &[1, 0], true, wednesday()).await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("2 of 2 window(s) failed"));
    }
}
