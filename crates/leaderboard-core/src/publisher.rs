//! Leaderboard rendering and posting.

use serde_json::{json, Value};
use tracing::info;

use crate::error::Result;
use crate::executor::RequestExecutor;
use crate::model::{LeaderboardResult, MessageContent};
use crate::platform::ChatPlatform;
use crate::window::TimeWindow;

const TITLE: &str = "Weekly Resolution Leaderboard";
const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];
const NO_MEDAL: &str = "   ";

/// Plain-text fallback. Always contains the window label, which is what the
/// duplicate guard looks for.
pub fn fallback_text(window: &TimeWindow) -> String {
    format!("{TITLE} ({})", window.label())
}

fn entry_line(position: usize, name: &str, count: u32) -> String {
    let medal = MEDALS.get(position).copied().unwrap_or(NO_MEDAL);
    let noun = if count == 1 { "resolution" } else { "resolutions" };
    format!("{medal} *{name}*: {count} {noun}")
}

fn section(text: String) -> Value {
    json!({ "type": "section", "text": { "type": "mrkdwn", "text": text } })
}

/// Render `result` for `window`. An empty result renders the "no
/// resolutions" state.
pub fn render(result: &LeaderboardResult, window: &TimeWindow) -> MessageContent {
    let label = window.label();
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": format!("🏆 {TITLE}"), "emoji": true }
        }),
        section(format!("*Week of {label}*")),
        json!({ "type": "divider" }),
    ];

    if result.is_empty() {
        blocks.push(section("_No resolutions logged this week._".to_string()));
    } else {
        let lines: Vec<String> = result
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| entry_line(i, &e.agent_display_name, e.credit_count))
            .collect();
        blocks.push(section(lines.join("\n")));
        blocks.push(json!({ "type": "divider" }));
        blocks.push(json!({
            "type": "context",
            "elements": [{
                "type": "mrkdwn",
                "text": format!("📊 *Total resolutions:* {}", result.total_credits())
            }]
        }));
    }

    MessageContent {
        text: fallback_text(window),
        blocks: Value::Array(blocks),
    }
}

/// Render and post the leaderboard for `window`, returning the new event id.
///
/// Failures propagate once the executor has given up; the caller reports
/// them per window.
pub async fn publish(
    platform: &dyn ChatPlatform,
    executor: &RequestExecutor,
    channel: &str,
    result: &LeaderboardResult,
    window: &TimeWindow,
) -> Result<String> {
    let content = render(result, window);
    let message_id = executor
        .execute("chat.postMessage", || platform.post_message(channel, &content))
        .await?;
    info!(
        channel = %channel,
        window = %window.label(),
        message_id = %message_id,
        "leaderboard posted"
    );
    Ok(message_id)
}
