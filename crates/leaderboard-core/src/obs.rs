//! Structured lifecycle events for leaderboard runs.
//!
//! Every processed window runs inside a `leaderboard.window` span from
//! [`window_span`]; the `emit_*` functions record one event per lifecycle
//! transition. Filter with `RUST_LOG`, switch to JSON with `--json`.

use tracing::{info, warn};

/// Span covering one window. Attach it to the window's future with
/// [`tracing::Instrument`] so every event below carries the label.
pub fn window_span(window_label: &str) -> tracing::Span {
    tracing::info_span!("leaderboard.window", window = %window_label)
}

pub fn emit_run_started(source_channel: &str, destination_channel: &str, windows: usize) {
    info!(
        event = "run.started",
        source_channel = %source_channel,
        destination_channel = %destination_channel,
        windows = windows,
    );
}

pub fn emit_window_started(window_label: &str, strategy: &str) {
    info!(event = "window.started", window = %window_label, strategy = %strategy);
}

/// The window was already announced in the output channel.
pub fn emit_window_skipped(window_label: &str) {
    info!(event = "window.skipped", window = %window_label, reason = "already_published");
}

pub fn emit_window_published(window_label: &str, message_id: &str, agents: usize, total: u32) {
    info!(
        event = "window.published",
        window = %window_label,
        message_id = %message_id,
        agents = agents,
        total_credits = total,
    );
}

pub fn emit_window_dry_run(window_label: &str, agents: usize, total: u32) {
    info!(
        event = "window.dry_run",
        window = %window_label,
        agents = agents,
        total_credits = total,
    );
}

pub fn emit_window_failed(window_label: &str, error: &dyn std::fmt::Display) {
    warn!(event = "window.failed", window = %window_label, error = %error);
}

pub fn emit_run_finished(processed: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "run.finished",
        processed = processed,
        failed = failed,
        duration_ms = duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_span_enter() {
        let _entered = window_span("Jun 02 - Jun 08, 2025").entered();
        emit_window_skipped("Jun 02 - Jun 08, 2025");
    }
}
