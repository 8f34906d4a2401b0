//! Actor reference → display name resolution, cached for the whole run.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::diagnostics::WindowDiagnostics;
use crate::executor::RequestExecutor;
use crate::model::{ActorProfile, ActorRef};
use crate::platform::ChatPlatform;

/// Run-scoped identity cache.
///
/// A reference resolves to the same profile for the rest of the run, fallback
/// included, so a name never changes between windows or between the bot
/// check and the leaderboard.
#[derive(Debug, Default)]
pub struct AgentDirectory {
    profiles: HashMap<ActorRef, ActorProfile>,
}

impl AgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `actor`, hitting the platform only on a cache miss.
    ///
    /// Lookup failures degrade to a non-bot profile labelled with the
    /// reference itself.
    pub async fn resolve(
        &mut self,
        platform: &dyn ChatPlatform,
        executor: &RequestExecutor,
        actor: &ActorRef,
        diagnostics: &mut WindowDiagnostics,
    ) -> ActorProfile {
        if let Some(profile) = self.profiles.get(actor) {
            return profile.clone();
        }

        let profile = match executor
            .execute("users.info", || platform.resolve_identity(actor))
            .await
        {
            Ok(profile) if !profile.display_name.trim().is_empty() => profile,
            Ok(profile) => {
                debug!(actor = %actor, "empty display name, using fallback label");
                diagnostics.identity_fallbacks += 1;
                ActorProfile {
                    display_name: actor.fallback_label(),
                    is_bot: profile.is_bot,
                }
            }
            Err(err) => {
                warn!(actor = %actor, error = %err, "identity lookup failed, using fallback label");
                diagnostics.identity_fallbacks += 1;
                ActorProfile {
                    display_name: actor.fallback_label(),
                    is_bot: false,
                }
            }
        };

        self.profiles.insert(actor.clone(), profile.clone());
        profile
    }
}
