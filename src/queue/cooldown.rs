//! Requeue cooldown cache
//!
//! Guild-scoped "last queued at" timestamps backing the optional requeue
//! delay. Deliberately not persisted: the cache is best-effort and resets
//! on process restart. Each guild's map sits behind its own lock so
//! concurrent joins in the same guild cannot corrupt it.

use crate::types::{GuildId, UserId};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Injected cooldown cache, constructed once and shared by queue managers
#[derive(Debug, Default)]
pub struct RequeueCooldowns {
    guilds: RwLock<HashMap<GuildId, Arc<Mutex<HashMap<UserId, DateTime<Utc>>>>>>,
}

impl RequeueCooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    fn guild_map(&self, guild_id: GuildId) -> Option<Arc<Mutex<HashMap<UserId, DateTime<Utc>>>>> {
        if let Ok(guilds) = self.guilds.read() {
            if let Some(map) = guilds.get(&guild_id) {
                return Some(map.clone());
            }
        }
        self.guilds
            .write()
            .ok()
            .map(|mut guilds| guilds.entry(guild_id).or_default().clone())
    }

    /// Time left before the user may requeue, if the delay still applies
    pub fn remaining(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        delay: Duration,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let map = self.guild_map(guild_id)?;
        let guard = map.lock().ok()?;
        let last = guard.get(&user_id)?;
        let ready_at = *last + delay;
        if ready_at > now {
            Some(ready_at - now)
        } else {
            None
        }
    }

    /// Record a successful join
    pub fn record(&self, guild_id: GuildId, user_id: UserId, now: DateTime<Utc>) {
        if let Some(map) = self.guild_map(guild_id) {
            if let Ok(mut guard) = map.lock() {
                guard.insert(user_id, now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cooldown_window() {
        let cooldowns = RequeueCooldowns::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let delay = Duration::minutes(5);

        // No record yet
        assert!(cooldowns.remaining(1, 2, delay, now).is_none());

        cooldowns.record(1, 2, now);
        assert_eq!(
            cooldowns.remaining(1, 2, delay, now + Duration::minutes(2)),
            Some(Duration::minutes(3))
        );
        assert!(cooldowns
            .remaining(1, 2, delay, now + Duration::minutes(5))
            .is_none());
    }

    #[test]
    fn test_guilds_are_independent() {
        let cooldowns = RequeueCooldowns::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        cooldowns.record(1, 2, now);
        assert!(cooldowns
            .remaining(9, 2, Duration::minutes(5), now)
            .is_none());
    }
}
