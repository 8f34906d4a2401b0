//! Duplicate-publication guard.
//!
//! A window's leaderboard counts as published when one of the most recent
//! output-channel entries was posted by us and carries the window label.
//! Read failures fail open: a possible duplicate post is preferred over a
//! silently skipped week.

use tracing::{debug, warn};

use crate::executor::RequestExecutor;
use crate::model::{PublicationRecord, SelfIdentity};
use crate::platform::{ChatPlatform, HistoryQuery};
use crate::window::TimeWindow;

pub async fn already_published(
    platform: &dyn ChatPlatform,
    executor: &RequestExecutor,
    channel: &str,
    me: &SelfIdentity,
    window: &TimeWindow,
    scan_limit: u32,
) -> bool {
    let label = window.label();
    let query = HistoryQuery::recent(scan_limit);

    let page = match executor
        .execute("conversations.history", || platform.list_events(channel, &query))
        .await
    {
        Ok(page) => page,
        Err(err) => {
            warn!(
                channel = %channel,
                window = %label,
                error = %err,
                "could not read output history; assuming not yet published"
            );
            return false;
        }
    };

    let found = page
        .events
        .iter()
        .take(scan_limit as usize)
        .map(|event| PublicationRecord::from_event(event, me))
        .any(|record| record.announces(&label));

    debug!(
        channel = %channel,
        window = %label,
        scanned = page.events.len(),
        found = found,
        "duplicate publication check"
    );
    found
}
