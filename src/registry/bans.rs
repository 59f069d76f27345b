//! Ban registry: time-boxed matchmaking suspensions

use crate::error::Result;
use crate::store::Store;
use crate::types::{Ban, GuildId, UserId};
use crate::utils::Clock;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Issues and resolves matchmaking bans. Queue admission only cares about
/// the latest-expiring active ban.
pub struct BanRegistry {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl BanRegistry {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Ban a user from matchmaking for `length`
    pub fn ban_user(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        length: Duration,
        reason: Option<String>,
        moderator: Option<UserId>,
    ) -> Result<Ban> {
        let ban = Ban {
            guild_id,
            user_id,
            time_of_ban: self.clock.now(),
            length,
            manually_disabled: false,
            reason,
            moderator,
        };
        self.store.insert_ban(ban.clone())?;
        info!(
            guild_id,
            user_id,
            length_secs = length.as_secs(),
            "Issued matchmaking ban"
        );
        Ok(ban)
    }

    /// The user's active ban with the latest expiry, if any
    pub fn active_ban(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<Ban>> {
        let now = self.clock.now();
        let bans = self.store.bans_for_user(guild_id, user_id)?;
        Ok(bans
            .into_iter()
            .filter(|ban| ban.is_active(now))
            .max_by_key(|ban| ban.expires_at()))
    }

    /// Manually disable all of a user's bans, returning how many changed
    pub fn unban_user(&self, guild_id: GuildId, user_id: UserId) -> Result<usize> {
        let changed = self.store.disable_bans(guild_id, user_id)?;
        if changed > 0 {
            info!(guild_id, user_id, changed, "Disabled matchmaking bans");
        }
        Ok(changed)
    }
}
