//! Queue admission, leaves, expiry
//!
//! Admission checks run in a fixed order inside the lobby's critical
//! section: lobby exists, not frozen, no active ban, queue not full,
//! multi-queue policy, minimum points, no draft in progress, not already
//! queued, requeue cooldown. Parties are admitted or rejected as a unit.
//! The final seat triggers the lobby-full transition synchronously, before
//! the lock is released.

use crate::config::QueueSettings;
use crate::error::{LadderError, Result};
use crate::events::EventSink;
use crate::game::GameManager;
use crate::queue::{LobbyLocks, RequeueCooldowns};
use crate::registry::{BanRegistry, PartyRegistry};
use crate::store::Store;
use crate::types::{
    ChannelId, GameId, GameState, GuildId, LadderEvent, PlayerJoined, PlayerLeft, QueuedPlayer,
    UserId,
};
use crate::utils::{format_duration, parse_duration, Clock};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a join attempt. Everything except `Joined` is a policy
/// rejection, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined {
        queue_size: usize,
        capacity: usize,
        /// Set when this join filled the lobby and created a game
        started_game: Option<GameId>,
    },
    AlreadyQueued,
    LobbyFull,
    LobbyFrozen,
    Banned {
        user_id: UserId,
        remaining: Duration,
    },
    BelowMinimumPoints {
        user_id: UserId,
        required: i32,
    },
    MultiQueueDisallowed {
        user_id: UserId,
        channels: Vec<ChannelId>,
    },
    PickingInProgress,
    RequeueCooldown {
        user_id: UserId,
        remaining: Duration,
    },
}

/// Result of a leave attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left { queue_size: usize, capacity: usize },
    NotQueued,
    /// Leaving is blocked while captains are drafting
    PickingInProgress,
}

/// Serializes and applies all queue mutations
pub struct QueueManager {
    store: Arc<dyn Store>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    locks: Arc<LobbyLocks>,
    games: Arc<GameManager>,
    parties: Arc<PartyRegistry>,
    bans: Arc<BanRegistry>,
    cooldowns: Arc<RequeueCooldowns>,
    settings: QueueSettings,
}

impl QueueManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        locks: Arc<LobbyLocks>,
        games: Arc<GameManager>,
        parties: Arc<PartyRegistry>,
        bans: Arc<BanRegistry>,
        cooldowns: Arc<RequeueCooldowns>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            store,
            events,
            clock,
            locks,
            games,
            parties,
            bans,
            cooldowns,
            settings,
        }
    }

    /// Attempt to add a user (and their whole party) to a lobby's queue
    pub async fn join_queue(&self, channel_id: ChannelId, user_id: UserId) -> Result<JoinOutcome> {
        let _guard = self.locks.acquire(channel_id).await;
        let now = self.clock.now();

        let lobby = self
            .store
            .get_lobby(channel_id)?
            .ok_or(LadderError::LobbyNotFound { channel_id })?;
        if lobby.is_locked {
            return Ok(JoinOutcome::LobbyFrozen);
        }

        let group = self.parties.party_of(channel_id, user_id)?;

        for &member in &group {
            if let Some(ban) = self.bans.active_ban(lobby.guild_id, member)? {
                let remaining = ban.remaining(now).unwrap_or_else(Duration::zero);
                debug!(
                    channel_id,
                    user_id = member,
                    remaining = %format_duration(remaining),
                    "Join rejected by active ban"
                );
                return Ok(JoinOutcome::Banned {
                    user_id: member,
                    remaining,
                });
            }
        }

        let queue = self.store.queue_for_lobby(channel_id)?;
        if queue.len() + group.len() > lobby.capacity() {
            return Ok(JoinOutcome::LobbyFull);
        }

        let guild_settings = self.store.get_or_create_guild_settings(lobby.guild_id)?;
        if !guild_settings.allow_multi_queueing {
            for &member in &group {
                let elsewhere: Vec<ChannelId> = self
                    .store
                    .queues_for_user(lobby.guild_id, member)?
                    .iter()
                    .map(|entry| entry.channel_id)
                    .filter(|&other| other != channel_id)
                    .collect();
                if !elsewhere.is_empty() {
                    return Ok(JoinOutcome::MultiQueueDisallowed {
                        user_id: member,
                        channels: elsewhere,
                    });
                }
            }
        }

        // Registration is mandatory; minimum points applies on top when the
        // lobby sets one
        for &member in &group {
            let player = self
                .store
                .get_player(lobby.guild_id, member)?
                .ok_or(LadderError::PlayerNotFound {
                    guild_id: lobby.guild_id,
                    user_id: member,
                })?;
            if let Some(required) = lobby.minimum_points {
                if player.points < required {
                    return Ok(JoinOutcome::BelowMinimumPoints {
                        user_id: member,
                        required,
                    });
                }
            }
        }

        if let Some(game) = self.store.latest_game(channel_id)? {
            if game.state == GameState::Picking {
                return Ok(JoinOutcome::PickingInProgress);
            }
        }

        if queue
            .iter()
            .any(|entry| group.contains(&entry.user_id))
        {
            return Ok(JoinOutcome::AlreadyQueued);
        }

        if let Some(delay) = guild_settings.requeue_delay {
            let delay = Duration::from_std(delay).unwrap_or_else(|_| Duration::zero());
            for &member in &group {
                if let Some(remaining) =
                    self.cooldowns
                        .remaining(lobby.guild_id, member, delay, now)
                {
                    debug!(
                        channel_id,
                        user_id = member,
                        remaining = %format_duration(remaining),
                        "Join rejected by requeue cooldown"
                    );
                    return Ok(JoinOutcome::RequeueCooldown {
                        user_id: member,
                        remaining,
                    });
                }
            }
        }

        let expire_at = now + self.settings.default_expiry();
        let entries = group
            .iter()
            .map(|&member| QueuedPlayer {
                channel_id,
                user_id: member,
                guild_id: lobby.guild_id,
                queued_at: now,
                expire_at,
            })
            .collect();
        self.store.insert_queued_players(entries)?;
        for &member in &group {
            self.cooldowns.record(lobby.guild_id, member, now);
        }

        let mut queue_size = queue.len();
        for &member in &group {
            queue_size += 1;
            self.events
                .emit(LadderEvent::PlayerJoined(PlayerJoined {
                    channel_id,
                    guild_id: lobby.guild_id,
                    user_id: member,
                    queue_size,
                    capacity: lobby.capacity(),
                    timestamp: now,
                }))
                .await?;
        }
        debug!(channel_id, user_id, queue_size, "Queue join accepted");

        let started_game = if queue_size == lobby.capacity() {
            Some(self.games.start_game(&lobby).await?.game_id)
        } else {
            None
        };

        Ok(JoinOutcome::Joined {
            queue_size,
            capacity: lobby.capacity(),
            started_game,
        })
    }

    /// Remove a user (and their whole party) from a lobby's queue
    pub async fn leave_queue(&self, channel_id: ChannelId, user_id: UserId) -> Result<LeaveOutcome> {
        let _guard = self.locks.acquire(channel_id).await;

        let lobby = self
            .store
            .get_lobby(channel_id)?
            .ok_or(LadderError::LobbyNotFound { channel_id })?;
        if let Some(game) = self.store.latest_game(channel_id)? {
            if game.state == GameState::Picking {
                return Ok(LeaveOutcome::PickingInProgress);
            }
        }

        let queue = self.store.queue_for_lobby(channel_id)?;
        if !queue.iter().any(|entry| entry.user_id == user_id) {
            return Ok(LeaveOutcome::NotQueued);
        }

        let group = self.parties.party_of(channel_id, user_id)?;
        let leaving: Vec<UserId> = queue
            .iter()
            .map(|entry| entry.user_id)
            .filter(|member| group.contains(member))
            .collect();
        let removed = self.store.remove_queued_players(channel_id, &leaving)?;

        let mut queue_size = queue.len();
        for &member in &leaving {
            queue_size = queue_size.saturating_sub(1);
            self.events
                .emit(LadderEvent::PlayerLeft(PlayerLeft {
                    channel_id,
                    guild_id: lobby.guild_id,
                    user_id: member,
                    queue_size,
                    capacity: lobby.capacity(),
                    timestamp: self.clock.now(),
                }))
                .await?;
        }
        info!(channel_id, user_id, removed, "Queue leave");

        Ok(LeaveOutcome::Left {
            queue_size,
            capacity: lobby.capacity(),
        })
    }

    /// Reset the expiry on all of a user's queue entries from a duration
    /// string such as "90m", "2h", "1h30m", or "01:30". Returns the parsed
    /// duration and how many entries changed.
    pub fn set_expiry(&self, user_id: UserId, input: &str) -> Result<(Duration, usize)> {
        let duration = parse_duration(input)?;
        let min = Duration::minutes(self.settings.min_expiry_minutes as i64);
        let max = Duration::minutes(self.settings.max_expiry_minutes as i64);
        if duration < min || duration > max {
            return Err(LadderError::ValidationError {
                reason: format!(
                    "Queue expiry must be between {}m and {}m",
                    self.settings.min_expiry_minutes, self.settings.max_expiry_minutes
                ),
            }
            .into());
        }

        let expire_at = self.clock.now() + duration;
        let changed = self.store.update_queue_expiry(user_id, expire_at)?;
        Ok((duration, changed))
    }

    /// The earliest upcoming expiry among a user's queue entries
    pub fn soonest_expiry(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .queues_for_user(guild_id, user_id)?
            .iter()
            .map(|entry| entry.expire_at)
            .min())
    }

    /// Current queue for a lobby, in join order
    pub fn queue(&self, channel_id: ChannelId) -> Result<Vec<QueuedPlayer>> {
        self.store.queue_for_lobby(channel_id)
    }

    /// Drop every queue entry past its expiry, lobby by lobby under each
    /// lobby's lock. Driven by the external sweep scheduler only; joins
    /// never evict on the way in.
    pub async fn expire_stale(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut total = 0;

        for channel_id in self.store.channels_with_queues()? {
            let _guard = self.locks.acquire(channel_id).await;
            let expired = self.store.remove_expired(channel_id, now)?;
            if expired.is_empty() {
                continue;
            }
            total += expired.len();

            let capacity = self
                .store
                .get_lobby(channel_id)?
                .map(|lobby| lobby.capacity())
                .unwrap_or(0);
            let queue_size = self.store.queue_for_lobby(channel_id)?.len();
            info!(channel_id, expired = expired.len(), "Expired stale queue entries");
            for entry in expired {
                self.events
                    .emit(LadderEvent::PlayerLeft(PlayerLeft {
                        channel_id,
                        guild_id: entry.guild_id,
                        user_id: entry.user_id,
                        queue_size,
                        capacity,
                        timestamp: now,
                    }))
                    .await?;
            }
        }

        Ok(total)
    }

    /// Freeze or unfreeze a lobby's queue, reporting whether the flag
    /// actually changed
    pub async fn set_locked(&self, channel_id: ChannelId, locked: bool) -> Result<bool> {
        let _guard = self.locks.acquire(channel_id).await;

        let mut lobby = self
            .store
            .get_lobby(channel_id)?
            .ok_or(LadderError::LobbyNotFound { channel_id })?;
        if lobby.is_locked == locked {
            return Ok(false);
        }
        lobby.is_locked = locked;
        self.store.upsert_lobby(lobby)?;
        info!(channel_id, locked, "Lobby lock changed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuildSettings;
    use crate::events::RecordingEventSink;
    use crate::store::MemoryStore;
    use crate::types::{Lobby, PickMode, Player};
    use crate::utils::ManualClock;
    use chrono::TimeZone;

    struct Harness {
        store: Arc<MemoryStore>,
        sink: Arc<RecordingEventSink>,
        clock: Arc<ManualClock>,
        manager: QueueManager,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingEventSink::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let locks = Arc::new(LobbyLocks::new());
        let games = Arc::new(GameManager::with_seed(
            store.clone(),
            sink.clone(),
            clock.clone(),
            locks.clone(),
            7,
        ));
        let manager = QueueManager::new(
            store.clone(),
            sink.clone(),
            clock.clone(),
            locks.clone(),
            games,
            Arc::new(PartyRegistry::new(store.clone())),
            Arc::new(BanRegistry::new(store.clone(), clock.clone())),
            Arc::new(RequeueCooldowns::new()),
            QueueSettings::default(),
        );
        Harness {
            store,
            sink,
            clock,
            manager,
        }
    }

    fn seed_lobby(harness: &Harness, players_per_team: usize) {
        harness
            .store
            .upsert_lobby(Lobby::new(10, 1, players_per_team))
            .unwrap();
    }

    fn register(harness: &Harness, user_id: UserId, points: i32) {
        let mut player = Player::new(1, user_id, format!("player-{user_id}"), harness.clock.now());
        player.points = points;
        harness.store.upsert_player(player).unwrap();
    }

    #[tokio::test]
    async fn test_join_and_leave() {
        let harness = harness();
        seed_lobby(&harness, 2);
        register(&harness, 1, 0);

        let outcome = harness.manager.join_queue(10, 1).await.unwrap();
        assert_eq!(
            outcome,
            JoinOutcome::Joined {
                queue_size: 1,
                capacity: 4,
                started_game: None
            }
        );
        assert_eq!(
            harness.manager.join_queue(10, 1).await.unwrap(),
            JoinOutcome::AlreadyQueued
        );

        let left = harness.manager.leave_queue(10, 1).await.unwrap();
        assert_eq!(
            left,
            LeaveOutcome::Left {
                queue_size: 0,
                capacity: 4
            }
        );
        assert_eq!(
            harness.manager.leave_queue(10, 1).await.unwrap(),
            LeaveOutcome::NotQueued
        );
        assert_eq!(harness.sink.count_of("PlayerJoined"), 1);
        assert_eq!(harness.sink.count_of("PlayerLeft"), 1);
    }

    #[tokio::test]
    async fn test_unknown_lobby_is_an_error() {
        let harness = harness();
        assert!(harness.manager.join_queue(99, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_frozen_lobby_rejects_joins() {
        let harness = harness();
        seed_lobby(&harness, 2);
        register(&harness, 1, 0);
        harness.manager.set_locked(10, true).await.unwrap();

        assert_eq!(
            harness.manager.join_queue(10, 1).await.unwrap(),
            JoinOutcome::LobbyFrozen
        );

        harness.manager.set_locked(10, false).await.unwrap();
        assert!(matches!(
            harness.manager.join_queue(10, 1).await.unwrap(),
            JoinOutcome::Joined { .. }
        ));
    }

    #[tokio::test]
    async fn test_banned_user_rejected_until_expiry() {
        let harness = harness();
        seed_lobby(&harness, 2);
        register(&harness, 1, 0);
        harness
            .store
            .insert_ban(crate::types::Ban {
                guild_id: 1,
                user_id: 1,
                time_of_ban: harness.clock.now(),
                length: std::time::Duration::from_secs(3600),
                manually_disabled: false,
                reason: None,
                moderator: None,
            })
            .unwrap();

        harness.clock.advance(Duration::minutes(30));
        assert_eq!(
            harness.manager.join_queue(10, 1).await.unwrap(),
            JoinOutcome::Banned {
                user_id: 1,
                remaining: Duration::minutes(30)
            }
        );

        harness.clock.advance(Duration::minutes(31));
        assert!(matches!(
            harness.manager.join_queue(10, 1).await.unwrap(),
            JoinOutcome::Joined { .. }
        ));
    }

    #[tokio::test]
    async fn test_minimum_points_gate() {
        let harness = harness();
        let mut lobby = Lobby::new(10, 1, 2);
        lobby.minimum_points = Some(100);
        harness.store.upsert_lobby(lobby).unwrap();
        register(&harness, 1, 50);

        assert_eq!(
            harness.manager.join_queue(10, 1).await.unwrap(),
            JoinOutcome::BelowMinimumPoints {
                user_id: 1,
                required: 100
            }
        );
    }

    #[tokio::test]
    async fn test_unregistered_user_is_an_error() {
        let harness = harness();
        seed_lobby(&harness, 2);
        assert!(harness.manager.join_queue(10, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_multiqueue_policy() {
        let harness = harness();
        seed_lobby(&harness, 2);
        harness.store.upsert_lobby(Lobby::new(11, 1, 2)).unwrap();
        register(&harness, 1, 0);

        let mut settings = GuildSettings::new(1);
        settings.allow_multi_queueing = false;
        harness.store.update_guild_settings(settings).unwrap();

        assert!(matches!(
            harness.manager.join_queue(10, 1).await.unwrap(),
            JoinOutcome::Joined { .. }
        ));
        assert_eq!(
            harness.manager.join_queue(11, 1).await.unwrap(),
            JoinOutcome::MultiQueueDisallowed {
                user_id: 1,
                channels: vec![10]
            }
        );
    }

    #[tokio::test]
    async fn test_requeue_cooldown() {
        let harness = harness();
        seed_lobby(&harness, 2);
        register(&harness, 1, 0);

        let mut settings = GuildSettings::new(1);
        settings.requeue_delay = Some(std::time::Duration::from_secs(300));
        harness.store.update_guild_settings(settings).unwrap();

        assert!(matches!(
            harness.manager.join_queue(10, 1).await.unwrap(),
            JoinOutcome::Joined { .. }
        ));
        harness.manager.leave_queue(10, 1).await.unwrap();

        harness.clock.advance(Duration::minutes(2));
        assert_eq!(
            harness.manager.join_queue(10, 1).await.unwrap(),
            JoinOutcome::RequeueCooldown {
                user_id: 1,
                remaining: Duration::minutes(3)
            }
        );

        harness.clock.advance(Duration::minutes(3));
        assert!(matches!(
            harness.manager.join_queue(10, 1).await.unwrap(),
            JoinOutcome::Joined { .. }
        ));
    }

    #[tokio::test]
    async fn test_final_join_starts_game_and_flushes_queue() {
        let harness = harness();
        seed_lobby(&harness, 1);
        register(&harness, 1, 0);
        register(&harness, 2, 0);

        harness.manager.join_queue(10, 1).await.unwrap();
        let outcome = harness.manager.join_queue(10, 2).await.unwrap();
        assert_eq!(
            outcome,
            JoinOutcome::Joined {
                queue_size: 2,
                capacity: 2,
                started_game: Some(1)
            }
        );

        assert!(harness.manager.queue(10).unwrap().is_empty());
        assert_eq!(harness.sink.count_of("LobbyFull"), 1);
        assert_eq!(
            harness.store.get_lobby(10).unwrap().unwrap().current_game_count,
            1
        );
    }

    #[tokio::test]
    async fn test_party_joins_and_leaves_as_a_unit() {
        let harness = harness();
        seed_lobby(&harness, 2);
        register(&harness, 1, 0);
        register(&harness, 2, 0);
        let parties = PartyRegistry::new(harness.store.clone());
        parties.form_party(10, 1, &[2]).unwrap();

        let outcome = harness.manager.join_queue(10, 1).await.unwrap();
        assert_eq!(
            outcome,
            JoinOutcome::Joined {
                queue_size: 2,
                capacity: 4,
                started_game: None
            }
        );

        let left = harness.manager.leave_queue(10, 2).await.unwrap();
        assert_eq!(
            left,
            LeaveOutcome::Left {
                queue_size: 0,
                capacity: 4
            }
        );
    }

    #[tokio::test]
    async fn test_party_that_overfills_is_rejected() {
        let harness = harness();
        seed_lobby(&harness, 1);
        for user in 1..=3 {
            register(&harness, user, 0);
        }
        let parties = PartyRegistry::new(harness.store.clone());
        parties.form_party(10, 2, &[3]).unwrap();

        harness.manager.join_queue(10, 1).await.unwrap();
        // One seat left, two arriving
        assert_eq!(
            harness.manager.join_queue(10, 2).await.unwrap(),
            JoinOutcome::LobbyFull
        );
    }

    #[tokio::test]
    async fn test_join_blocked_while_picking() {
        let harness = harness();
        let mut lobby = Lobby::new(10, 1, 2);
        lobby.pick_mode = PickMode::CaptainsRandom;
        harness.store.upsert_lobby(lobby).unwrap();
        for user in 1..=5 {
            register(&harness, user, 0);
        }
        for user in 1..=4 {
            harness.manager.join_queue(10, user).await.unwrap();
        }

        assert_eq!(
            harness.manager.join_queue(10, 5).await.unwrap(),
            JoinOutcome::PickingInProgress
        );
    }

    #[tokio::test]
    async fn test_set_expiry_bounds() {
        let harness = harness();
        seed_lobby(&harness, 2);
        register(&harness, 1, 0);
        harness.manager.join_queue(10, 1).await.unwrap();

        assert!(harness.manager.set_expiry(1, "5m").is_err());
        assert!(harness.manager.set_expiry(1, "5h").is_err());

        let (duration, changed) = harness.manager.set_expiry(1, "1h30m").unwrap();
        assert_eq!(duration, Duration::minutes(90));
        assert_eq!(changed, 1);
        assert_eq!(
            harness.manager.soonest_expiry(1, 1).unwrap(),
            Some(harness.clock.now() + Duration::minutes(90))
        );
    }

    #[tokio::test]
    async fn test_expire_stale_sweeps_only_past_due() {
        let harness = harness();
        seed_lobby(&harness, 2);
        register(&harness, 1, 0);
        register(&harness, 2, 0);
        harness.manager.join_queue(10, 1).await.unwrap();

        harness.clock.advance(Duration::minutes(60));
        harness.manager.join_queue(10, 2).await.unwrap();

        // Default expiry is 120m; user 1 lapses at +120m, user 2 at +180m
        harness.clock.advance(Duration::minutes(61));
        assert_eq!(harness.manager.expire_stale().await.unwrap(), 1);
        let queue = harness.manager.queue(10).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].user_id, 2);
    }
}
