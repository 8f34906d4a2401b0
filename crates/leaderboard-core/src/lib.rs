//! Support Leaderboard core
//!
//! Attributes support-resolution credit to agents from chat history and
//! publishes one ranked leaderboard per Monday–Sunday window.
//!
//! ## Pipeline
//!
//! Window → duplicate guard → fetch → validate → dedupe → aggregate → publish.
//! Every remote call goes through [`RequestExecutor`], and the chat platform
//! is reached only through the [`ChatPlatform`] trait.

pub mod aggregate;
pub mod config;
pub mod dedupe;
pub mod diagnostics;
pub mod directory;
pub mod error;
pub mod executor;
pub mod fakes;
pub mod fetcher;
pub mod guard;
pub mod model;
pub mod obs;
pub mod pipeline;
pub mod platform;
pub mod publisher;
pub mod telemetry;
pub mod validator;
pub mod window;

pub use aggregate::{aggregate, tally};
pub use config::{
    FetchSettings, LeaderboardConfig, StrategyConfig, WorkflowTrust, DEFAULT_HISTORY_SCAN_LIMIT,
    DEFAULT_RESOLUTION_EMOJI, DEFAULT_RESOLUTION_PATTERN, DEFAULT_THREAD_URL_PATTERN,
};
pub use dedupe::{dedupe, DedupeOutcome};
pub use diagnostics::WindowDiagnostics;
pub use directory::AgentDirectory;
pub use error::{LeaderboardError, PlatformError, PlatformResult, Result};
pub use executor::{RequestExecutor, RetryPolicy};
pub use fetcher::EventFetcher;
pub use guard::already_published;
pub use model::{
    ActorProfile, ActorRef, LeaderboardEntry, LeaderboardResult, MessageContent,
    PublicationRecord, RawEvent, Reaction, ResolutionSignal, SelfIdentity, SourceKind, ThreadKey,
};
pub use pipeline::{LeaderboardPipeline, WindowOutcome, WindowReport};
pub use platform::{ChatPlatform, EventPage, HistoryQuery, MAX_PAGE_SIZE};
pub use publisher::{publish, render};
pub use telemetry::init_tracing;
pub use validator::{SignalValidator, TrustedAuthor, WorkflowStrategy};
pub use window::{backfill_offsets, compute_window, compute_window_at, TimeWindow};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
