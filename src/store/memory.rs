//! In-memory store implementation
//!
//! All tables live behind a single RwLock, so every commit_* method is
//! naturally atomic: validation happens before the first write, and the
//! write lock is held for the whole mutation.

use crate::config::GuildSettings;
use crate::error::{LadderError, Result};
use crate::store::Store;
use crate::team::DraftState;
use crate::types::{
    Ban, ChannelId, GameId, GameResult, GuildId, Lobby, PartyMember, Player, QueuedPlayer, Rank,
    RoleId, ScoreUpdate, TeamCaptain, TeamPlayer, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tables {
    guilds: HashMap<GuildId, GuildSettings>,
    players: HashMap<(GuildId, UserId), Player>,
    ranks: BTreeMap<(GuildId, RoleId), Rank>,
    lobbies: HashMap<ChannelId, Lobby>,
    queued: BTreeMap<(ChannelId, UserId), QueuedPlayer>,
    bans: Vec<Ban>,
    parties: BTreeMap<(ChannelId, UserId), PartyMember>,
    games: BTreeMap<(ChannelId, GameId), GameResult>,
    team_players: BTreeMap<(ChannelId, GameId, UserId), TeamPlayer>,
    captains: BTreeMap<(ChannelId, GameId, i32), TeamCaptain>,
    score_updates: BTreeMap<(ChannelId, GameId, UserId), ScoreUpdate>,
    drafts: HashMap<(ChannelId, GameId), DraftState>,
}

/// In-memory `Store` implementation
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| {
            LadderError::StorageFailure {
                message: "Failed to acquire store read lock".to_string(),
            }
            .into()
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| {
            LadderError::StorageFailure {
                message: "Failed to acquire store write lock".to_string(),
            }
            .into()
        })
    }
}

fn sorted_queue(entries: Vec<QueuedPlayer>) -> Vec<QueuedPlayer> {
    let mut entries = entries;
    entries.sort_by(|a, b| a.queued_at.cmp(&b.queued_at).then(a.user_id.cmp(&b.user_id)));
    entries
}

impl Store for MemoryStore {
    fn get_or_create_guild_settings(&self, guild_id: GuildId) -> Result<GuildSettings> {
        let mut tables = self.write()?;
        Ok(tables
            .guilds
            .entry(guild_id)
            .or_insert_with(|| GuildSettings::new(guild_id))
            .clone())
    }

    fn update_guild_settings(&self, settings: GuildSettings) -> Result<()> {
        let mut tables = self.write()?;
        tables.guilds.insert(settings.guild_id, settings);
        Ok(())
    }

    fn get_player(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<Player>> {
        let tables = self.read()?;
        Ok(tables.players.get(&(guild_id, user_id)).cloned())
    }

    fn upsert_player(&self, player: Player) -> Result<()> {
        let mut tables = self.write()?;
        tables
            .players
            .insert((player.guild_id, player.user_id), player);
        Ok(())
    }

    fn ranks_for_guild(&self, guild_id: GuildId) -> Result<Vec<Rank>> {
        let tables = self.read()?;
        let mut ranks: Vec<Rank> = tables
            .ranks
            .range((guild_id, 0)..=(guild_id, RoleId::MAX))
            .map(|(_, rank)| rank.clone())
            .collect();
        ranks.sort_by(|a, b| a.points.cmp(&b.points).then(a.role_id.cmp(&b.role_id)));
        Ok(ranks)
    }

    fn upsert_rank(&self, rank: Rank) -> Result<()> {
        let mut tables = self.write()?;
        tables.ranks.insert((rank.guild_id, rank.role_id), rank);
        Ok(())
    }

    fn remove_rank(&self, guild_id: GuildId, role_id: RoleId) -> Result<bool> {
        let mut tables = self.write()?;
        Ok(tables.ranks.remove(&(guild_id, role_id)).is_some())
    }

    fn get_lobby(&self, channel_id: ChannelId) -> Result<Option<Lobby>> {
        let tables = self.read()?;
        Ok(tables.lobbies.get(&channel_id).cloned())
    }

    fn upsert_lobby(&self, lobby: Lobby) -> Result<()> {
        let mut tables = self.write()?;
        tables.lobbies.insert(lobby.channel_id, lobby);
        Ok(())
    }

    fn queue_for_lobby(&self, channel_id: ChannelId) -> Result<Vec<QueuedPlayer>> {
        let tables = self.read()?;
        let entries = tables
            .queued
            .range((channel_id, 0)..=(channel_id, UserId::MAX))
            .map(|(_, entry)| entry.clone())
            .collect();
        Ok(sorted_queue(entries))
    }

    fn queues_for_user(&self, guild_id: GuildId, user_id: UserId) -> Result<Vec<QueuedPlayer>> {
        let tables = self.read()?;
        Ok(tables
            .queued
            .values()
            .filter(|entry| entry.guild_id == guild_id && entry.user_id == user_id)
            .cloned()
            .collect())
    }

    fn insert_queued_players(&self, entries: Vec<QueuedPlayer>) -> Result<()> {
        let mut tables = self.write()?;
        for entry in &entries {
            if tables
                .queued
                .contains_key(&(entry.channel_id, entry.user_id))
            {
                return Err(LadderError::ConsistencyViolation {
                    message: format!(
                        "User {} is already queued in channel {}",
                        entry.user_id, entry.channel_id
                    ),
                }
                .into());
            }
        }
        for entry in entries {
            tables.queued.insert((entry.channel_id, entry.user_id), entry);
        }
        Ok(())
    }

    fn remove_queued_players(&self, channel_id: ChannelId, user_ids: &[UserId]) -> Result<usize> {
        let mut tables = self.write()?;
        let mut removed = 0;
        for &user_id in user_ids {
            if tables.queued.remove(&(channel_id, user_id)).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn update_queue_expiry(&self, user_id: UserId, expire_at: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.write()?;
        let mut updated = 0;
        for entry in tables.queued.values_mut() {
            if entry.user_id == user_id {
                entry.expire_at = expire_at;
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn remove_expired(
        &self,
        channel_id: ChannelId,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueuedPlayer>> {
        let mut tables = self.write()?;
        let stale: Vec<(ChannelId, UserId)> = tables
            .queued
            .range((channel_id, 0)..=(channel_id, UserId::MAX))
            .filter(|(_, entry)| entry.expire_at <= now)
            .map(|(key, _)| *key)
            .collect();

        let mut removed = Vec::with_capacity(stale.len());
        for key in stale {
            if let Some(entry) = tables.queued.remove(&key) {
                removed.push(entry);
            }
        }
        Ok(sorted_queue(removed))
    }

    fn channels_with_queues(&self) -> Result<Vec<ChannelId>> {
        let tables = self.read()?;
        let mut channels: Vec<ChannelId> =
            tables.queued.keys().map(|&(channel, _)| channel).collect();
        channels.dedup();
        Ok(channels)
    }

    fn insert_ban(&self, ban: Ban) -> Result<()> {
        let mut tables = self.write()?;
        tables.bans.push(ban);
        Ok(())
    }

    fn bans_for_user(&self, guild_id: GuildId, user_id: UserId) -> Result<Vec<Ban>> {
        let tables = self.read()?;
        Ok(tables
            .bans
            .iter()
            .filter(|ban| ban.guild_id == guild_id && ban.user_id == user_id)
            .cloned()
            .collect())
    }

    fn disable_bans(&self, guild_id: GuildId, user_id: UserId) -> Result<usize> {
        let mut tables = self.write()?;
        let mut changed = 0;
        for ban in tables.bans.iter_mut() {
            if ban.guild_id == guild_id && ban.user_id == user_id && !ban.manually_disabled {
                ban.manually_disabled = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn party_member(&self, channel_id: ChannelId, user_id: UserId) -> Result<Option<PartyMember>> {
        let tables = self.read()?;
        Ok(tables.parties.get(&(channel_id, user_id)).cloned())
    }

    fn party_members(&self, channel_id: ChannelId, host: UserId) -> Result<Vec<PartyMember>> {
        let tables = self.read()?;
        Ok(tables
            .parties
            .range((channel_id, 0)..=(channel_id, UserId::MAX))
            .filter(|(_, member)| member.party_host == host)
            .map(|(_, member)| member.clone())
            .collect())
    }

    fn insert_party(&self, members: Vec<PartyMember>) -> Result<()> {
        let mut tables = self.write()?;
        for member in &members {
            if tables
                .parties
                .contains_key(&(member.channel_id, member.user_id))
            {
                return Err(LadderError::ConsistencyViolation {
                    message: format!(
                        "User {} already belongs to a party in channel {}",
                        member.user_id, member.channel_id
                    ),
                }
                .into());
            }
        }
        for member in members {
            tables
                .parties
                .insert((member.channel_id, member.user_id), member);
        }
        Ok(())
    }

    fn remove_party(&self, channel_id: ChannelId, host: UserId) -> Result<usize> {
        let mut tables = self.write()?;
        let keys: Vec<(ChannelId, UserId)> = tables
            .parties
            .range((channel_id, 0)..=(channel_id, UserId::MAX))
            .filter(|(_, member)| member.party_host == host)
            .map(|(key, _)| *key)
            .collect();

        for key in &keys {
            tables.parties.remove(key);
        }
        Ok(keys.len())
    }

    fn get_game(&self, channel_id: ChannelId, game_id: GameId) -> Result<Option<GameResult>> {
        let tables = self.read()?;
        Ok(tables.games.get(&(channel_id, game_id)).cloned())
    }

    fn latest_game(&self, channel_id: ChannelId) -> Result<Option<GameResult>> {
        let tables = self.read()?;
        Ok(tables
            .games
            .range((channel_id, 0)..=(channel_id, GameId::MAX))
            .next_back()
            .map(|(_, game)| game.clone()))
    }

    fn team_players(&self, channel_id: ChannelId, game_id: GameId) -> Result<Vec<TeamPlayer>> {
        let tables = self.read()?;
        Ok(tables
            .team_players
            .range((channel_id, game_id, 0)..=(channel_id, game_id, UserId::MAX))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn team_captains(&self, channel_id: ChannelId, game_id: GameId) -> Result<Vec<TeamCaptain>> {
        let tables = self.read()?;
        Ok(tables
            .captains
            .range((channel_id, game_id, i32::MIN)..=(channel_id, game_id, i32::MAX))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn score_updates(&self, channel_id: ChannelId, game_id: GameId) -> Result<Vec<ScoreUpdate>> {
        let tables = self.read()?;
        Ok(tables
            .score_updates
            .range((channel_id, game_id, 0)..=(channel_id, game_id, UserId::MAX))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn get_draft(&self, channel_id: ChannelId, game_id: GameId) -> Result<Option<DraftState>> {
        let tables = self.read()?;
        Ok(tables.drafts.get(&(channel_id, game_id)).cloned())
    }

    fn commit_lobby_full(
        &self,
        lobby: Lobby,
        game: GameResult,
        team_players: Vec<TeamPlayer>,
        captains: Vec<TeamCaptain>,
        draft: Option<DraftState>,
    ) -> Result<()> {
        let mut tables = self.write()?;

        let key = (game.channel_id, game.game_id);
        if tables.games.contains_key(&key) {
            return Err(LadderError::ConsistencyViolation {
                message: format!(
                    "Game {} already exists for channel {}",
                    game.game_id, game.channel_id
                ),
            }
            .into());
        }

        let channel_id = lobby.channel_id;
        tables.lobbies.insert(channel_id, lobby);
        tables.games.insert(key, game);
        for row in team_players {
            tables
                .team_players
                .insert((row.channel_id, row.game_id, row.user_id), row);
        }
        for row in captains {
            tables
                .captains
                .insert((row.channel_id, row.game_id, row.team.number()), row);
        }
        if let Some(draft) = draft {
            tables.drafts.insert(key, draft);
        }

        // Flush the queue; validated only at insertion, so the whole set goes
        let queued: Vec<(ChannelId, UserId)> = tables
            .queued
            .range((channel_id, 0)..=(channel_id, UserId::MAX))
            .map(|(k, _)| *k)
            .collect();
        for k in queued {
            tables.queued.remove(&k);
        }

        Ok(())
    }

    fn commit_draft_progress(
        &self,
        game: GameResult,
        draft: Option<DraftState>,
        picks: Vec<TeamPlayer>,
    ) -> Result<()> {
        let mut tables = self.write()?;

        let key = (game.channel_id, game.game_id);
        if !tables.games.contains_key(&key) {
            return Err(LadderError::GameNotFound {
                channel_id: game.channel_id,
                game_id: game.game_id,
            }
            .into());
        }

        tables.games.insert(key, game);
        for row in picks {
            tables
                .team_players
                .insert((row.channel_id, row.game_id, row.user_id), row);
        }
        match draft {
            Some(draft) => {
                tables.drafts.insert(key, draft);
            }
            None => {
                tables.drafts.remove(&key);
            }
        }

        Ok(())
    }

    fn commit_decision(
        &self,
        game: GameResult,
        players: Vec<Player>,
        updates: Vec<ScoreUpdate>,
    ) -> Result<()> {
        let mut tables = self.write()?;

        let key = (game.channel_id, game.game_id);
        if !tables.games.contains_key(&key) {
            return Err(LadderError::GameNotFound {
                channel_id: game.channel_id,
                game_id: game.game_id,
            }
            .into());
        }

        // Replace the game's ledger rows wholesale
        let stale: Vec<(ChannelId, GameId, UserId)> = tables
            .score_updates
            .range((game.channel_id, game.game_id, 0)..=(game.channel_id, game.game_id, UserId::MAX))
            .map(|(k, _)| *k)
            .collect();
        for k in stale {
            tables.score_updates.remove(&k);
        }

        tables.games.insert(key, game);
        for player in players {
            tables
                .players
                .insert((player.guild_id, player.user_id), player);
        }
        for row in updates {
            tables
                .score_updates
                .insert((row.channel_id, row.game_id, row.user_id), row);
        }

        Ok(())
    }

    fn commit_cancellation(&self, game: GameResult, players: Vec<Player>) -> Result<()> {
        let mut tables = self.write()?;

        let key = (game.channel_id, game.game_id);
        if !tables.games.contains_key(&key) {
            return Err(LadderError::GameNotFound {
                channel_id: game.channel_id,
                game_id: game.game_id,
            }
            .into());
        }

        let stale: Vec<(ChannelId, GameId, UserId)> = tables
            .score_updates
            .range((game.channel_id, game.game_id, 0)..=(game.channel_id, game.game_id, UserId::MAX))
            .map(|(k, _)| *k)
            .collect();
        for k in stale {
            tables.score_updates.remove(&k);
        }

        tables.games.insert(key, game);
        tables.drafts.remove(&key);
        for player in players {
            tables
                .players
                .insert((player.guild_id, player.user_id), player);
        }

        Ok(())
    }
}
