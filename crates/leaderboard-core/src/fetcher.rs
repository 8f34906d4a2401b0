//! Paginated history retrieval for a window.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::FetchSettings;
use crate::diagnostics::WindowDiagnostics;
use crate::error::Result;
use crate::executor::RequestExecutor;
use crate::model::{RawEvent, Reaction};
use crate::platform::{ChatPlatform, HistoryQuery};
use crate::window::TimeWindow;

pub struct EventFetcher<'a> {
    platform: &'a dyn ChatPlatform,
    executor: &'a RequestExecutor,
    settings: &'a FetchSettings,
}

impl<'a> EventFetcher<'a> {
    pub fn new(
        platform: &'a dyn ChatPlatform,
        executor: &'a RequestExecutor,
        settings: &'a FetchSettings,
    ) -> Self {
        Self {
            platform,
            executor,
            settings,
        }
    }

    /// Every event in `channel` whose timestamp lies within `window`,
    /// bounds inclusive.
    pub async fn fetch_events(
        &self,
        channel: &str,
        window: &TimeWindow,
        diagnostics: &mut WindowDiagnostics,
    ) -> Result<Vec<RawEvent>> {
        let (oldest, latest) = window.epoch_bounds()?;
        self.fetch_range(channel, oldest, latest, diagnostics).await
    }

    /// Every event in `channel` with `oldest <= timestamp <= latest`.
    ///
    /// Records the platform could not decode are counted in
    /// `diagnostics.malformed_events` and otherwise ignored.
    pub async fn fetch_range(
        &self,
        channel: &str,
        oldest: f64,
        latest: f64,
        diagnostics: &mut WindowDiagnostics,
    ) -> Result<Vec<RawEvent>> {
        let mut events = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0u32;

        loop {
            if pages > 0 && self.settings.page_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.settings.page_delay_ms)).await;
            }

            let query = HistoryQuery {
                oldest: Some(oldest),
                latest: Some(latest),
                cursor: cursor.take(),
                limit: self.settings.page_size,
            };
            let page = self
                .executor
                .execute("conversations.history", || {
                    self.platform.list_events(channel, &query)
                })
                .await?;
            pages += 1;

            debug!(
                channel = %channel,
                page = pages,
                events = page.events.len(),
                has_more = page.next_cursor.is_some(),
                "fetched history page"
            );
            if page.malformed > 0 {
                warn!(
                    channel = %channel,
                    page = pages,
                    skipped = page.malformed,
                    "skipped undecodable history records"
                );
                diagnostics.malformed_events += page.malformed;
            }

            events.extend(
                page.events
                    .into_iter()
                    .filter(|e| e.timestamp >= oldest && e.timestamp <= latest),
            );

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        info!(channel = %channel, pages = pages, events = events.len(), "history fetched");
        Ok(events)
    }

    /// Full reaction list for one event.
    ///
    /// An event deleted since it was listed yields no reactions rather than
    /// an error.
    pub async fn fetch_reactions(
        &self,
        channel: &str,
        event_id: &str,
        diagnostics: &mut WindowDiagnostics,
    ) -> Result<Vec<Reaction>> {
        diagnostics.reaction_lookups += 1;
        match self
            .executor
            .execute("reactions.get", || {
                self.platform.get_reactions(channel, event_id)
            })
            .await
        {
            Ok(reactions) => Ok(reactions),
            Err(err) if err.is_not_found() => {
                debug!(event_id = %event_id, "event gone, treating as no reactions");
                diagnostics.reactions_missing += 1;
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }
}
