//! Per-window diagnostic counters.
//!
//! Dropped or degraded records never fail a run; they are counted here
//! instead. Call [`WindowDiagnostics::flush`] to emit the counters as a
//! single `tracing::info!` event once the window is finished.

use serde::{Deserialize, Serialize};

/// Plain counters, one set per processed window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowDiagnostics {
    /// Events returned by the fetcher for the window.
    pub events_scanned: u64,
    /// History records skipped because they could not be decoded.
    pub malformed_events: u64,
    /// Signals produced by validation, before deduplication.
    pub signals_extracted: u64,
    /// Workflow strategy: message not authored by a bot.
    pub dropped_not_bot: u64,
    /// Workflow strategy: bot is not the trusted workflow identity.
    pub dropped_untrusted_author: u64,
    /// Workflow strategy: text does not match the resolution pattern.
    pub dropped_pattern_mismatch: u64,
    /// Reaction strategy: reaction applied by a bot actor.
    pub dropped_bot_reactor: u64,
    /// Extra per-event reaction lookups issued.
    pub reaction_lookups: u64,
    /// Reaction lookups that found the event gone.
    pub reactions_missing: u64,
    /// Signals discarded by deduplication.
    pub duplicates_discarded: u64,
    /// Identity lookups that fell back to the reference label.
    pub identity_fallbacks: u64,
}

impl WindowDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total events dropped by validation for any reason.
    pub fn dropped_total(&self) -> u64 {
        self.dropped_not_bot
            + self.dropped_untrusted_author
            + self.dropped_pattern_mismatch
            + self.dropped_bot_reactor
    }

    /// Emit all counters as one `info!` event.
    pub fn flush(&self, window_label: &str) {
        tracing::info!(
            event = "window.diagnostics",
            window = %window_label,
            events_scanned = self.events_scanned,
            malformed_events = self.malformed_events,
            signals_extracted = self.signals_extracted,
            dropped_not_bot = self.dropped_not_bot,
            dropped_untrusted_author = self.dropped_untrusted_author,
            dropped_pattern_mismatch = self.dropped_pattern_mismatch,
            dropped_bot_reactor = self.dropped_bot_reactor,
            dropped_total = self.dropped_total(),
            reaction_lookups = self.reaction_lookups,
            reactions_missing = self.reactions_missing,
            duplicates_discarded = self.duplicates_discarded,
            identity_fallbacks = self.identity_fallbacks,
        );
    }
}
