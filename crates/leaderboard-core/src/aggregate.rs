//! Per-agent tallies and ranking.

use std::collections::HashMap;

use crate::diagnostics::WindowDiagnostics;
use crate::directory::AgentDirectory;
use crate::executor::RequestExecutor;
use crate::model::{ActorRef, LeaderboardEntry, LeaderboardResult, ResolutionSignal};
use crate::platform::ChatPlatform;

/// Count signals per agent, ranked by count descending. Agents with equal
/// counts keep the order in which they first appear in `signals`.
pub fn tally(signals: &[ResolutionSignal]) -> Vec<(ActorRef, u32)> {
    let mut index: HashMap<&ActorRef, usize> = HashMap::new();
    let mut counts: Vec<(ActorRef, u32)> = Vec::new();

    for signal in signals {
        match index.get(&signal.agent) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(&signal.agent, counts.len());
                counts.push((signal.agent.clone(), 1));
            }
        }
    }

    // sort_by is stable: ties stay in first-seen order
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Build the ranked leaderboard, resolving display names through `directory`.
///
/// Empty input yields an empty result.
pub async fn aggregate(
    signals: &[ResolutionSignal],
    platform: &dyn ChatPlatform,
    executor: &RequestExecutor,
    directory: &mut AgentDirectory,
    diagnostics: &mut WindowDiagnostics,
) -> LeaderboardResult {
    let mut entries = Vec::new();
    for (agent, credit_count) in tally(signals) {
        let profile = directory
            .resolve(platform, executor, &agent, diagnostics)
            .await;
        entries.push(LeaderboardEntry {
            agent,
            agent_display_name: profile.display_name,
            credit_count,
        });
    }
    LeaderboardResult { entries }
}
