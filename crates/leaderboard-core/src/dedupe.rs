//! Collapse signals that credit the same underlying thread.
//!
//! Signals keyed by thread URL (workflow strategy) collapse per URL. Signals
//! keyed by their own event (reaction strategy) collapse per (agent, event)
//! pair. The first signal for a key wins; order is otherwise preserved.

use std::collections::HashSet;

use crate::model::ResolutionSignal;

/// Deduplicated signals plus the number discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupeOutcome {
    pub signals: Vec<ResolutionSignal>,
    pub duplicates: u64,
}

pub fn dedupe(signals: Vec<ResolutionSignal>) -> DedupeOutcome {
    let mut seen = HashSet::with_capacity(signals.len());
    let mut outcome = DedupeOutcome::default();

    for signal in signals {
        if seen.insert(signal.dedupe_key()) {
            outcome.signals.push(signal);
        } else {
            outcome.duplicates += 1;
        }
    }

    outcome
}
