//! Persistence interface for ladder state
//!
//! The trait covers CRUD along the entity key paths plus the atomic
//! multi-row commits the lobby-full transition and the score engine
//! require. `MemoryStore` is the bundled implementation; a database-backed
//! store would implement the same trait with real transactions.

pub mod memory;

use crate::config::GuildSettings;
use crate::error::Result;
use crate::team::DraftState;
use crate::types::{
    Ban, ChannelId, GameId, GameResult, GuildId, Lobby, PartyMember, Player, QueuedPlayer, Rank,
    RoleId, ScoreUpdate, TeamCaptain, TeamPlayer, UserId,
};
use chrono::{DateTime, Utc};

pub use memory::MemoryStore;

/// Storage operations for all ladder entities
pub trait Store: Send + Sync {
    // Guild settings

    /// Fetch a guild's settings, creating defaults on first touch
    fn get_or_create_guild_settings(&self, guild_id: GuildId) -> Result<GuildSettings>;

    fn update_guild_settings(&self, settings: GuildSettings) -> Result<()>;

    // Players

    fn get_player(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<Player>>;

    fn upsert_player(&self, player: Player) -> Result<()>;

    // Ranks

    /// All ranks for a guild, ordered by threshold ascending then role id
    fn ranks_for_guild(&self, guild_id: GuildId) -> Result<Vec<Rank>>;

    fn upsert_rank(&self, rank: Rank) -> Result<()>;

    fn remove_rank(&self, guild_id: GuildId, role_id: RoleId) -> Result<bool>;

    // Lobbies

    fn get_lobby(&self, channel_id: ChannelId) -> Result<Option<Lobby>>;

    fn upsert_lobby(&self, lobby: Lobby) -> Result<()>;

    // Queue entries

    /// Queue for a lobby in insertion order (queued_at, then user id)
    fn queue_for_lobby(&self, channel_id: ChannelId) -> Result<Vec<QueuedPlayer>>;

    /// Every queue entry a user currently holds within a guild
    fn queues_for_user(&self, guild_id: GuildId, user_id: UserId) -> Result<Vec<QueuedPlayer>>;

    /// Insert queue entries as one unit; duplicates abort the whole insert
    fn insert_queued_players(&self, entries: Vec<QueuedPlayer>) -> Result<()>;

    /// Remove specific users from a lobby's queue, returning how many rows
    /// were actually deleted
    fn remove_queued_players(&self, channel_id: ChannelId, user_ids: &[UserId]) -> Result<usize>;

    /// Reset the expiry on all of a user's queue entries
    fn update_queue_expiry(&self, user_id: UserId, expire_at: DateTime<Utc>) -> Result<usize>;

    /// Delete and return a lobby's entries with `expire_at <= now`
    fn remove_expired(&self, channel_id: ChannelId, now: DateTime<Utc>) -> Result<Vec<QueuedPlayer>>;

    /// All channels that currently have at least one queue entry
    fn channels_with_queues(&self) -> Result<Vec<ChannelId>>;

    // Bans

    fn insert_ban(&self, ban: Ban) -> Result<()>;

    fn bans_for_user(&self, guild_id: GuildId, user_id: UserId) -> Result<Vec<Ban>>;

    /// Manually disable every ban a user holds, returning how many changed
    fn disable_bans(&self, guild_id: GuildId, user_id: UserId) -> Result<usize>;

    // Parties

    fn party_member(&self, channel_id: ChannelId, user_id: UserId) -> Result<Option<PartyMember>>;

    fn party_members(&self, channel_id: ChannelId, host: UserId) -> Result<Vec<PartyMember>>;

    /// Insert a whole party at once; any member already in a party aborts
    /// the whole insert
    fn insert_party(&self, members: Vec<PartyMember>) -> Result<()>;

    /// Remove every member of a host's party
    fn remove_party(&self, channel_id: ChannelId, host: UserId) -> Result<usize>;

    // Games

    fn get_game(&self, channel_id: ChannelId, game_id: GameId) -> Result<Option<GameResult>>;

    /// The lobby's most recent game, by game id
    fn latest_game(&self, channel_id: ChannelId) -> Result<Option<GameResult>>;

    fn team_players(&self, channel_id: ChannelId, game_id: GameId) -> Result<Vec<TeamPlayer>>;

    fn team_captains(&self, channel_id: ChannelId, game_id: GameId) -> Result<Vec<TeamCaptain>>;

    fn score_updates(&self, channel_id: ChannelId, game_id: GameId) -> Result<Vec<ScoreUpdate>>;

    fn get_draft(&self, channel_id: ChannelId, game_id: GameId) -> Result<Option<DraftState>>;

    // Atomic multi-row commits

    /// Commit the lobby-full transition as one unit: the new game with its
    /// team/captain/draft rows, the updated lobby (incremented game count),
    /// and the flush of the lobby's queue.
    fn commit_lobby_full(
        &self,
        lobby: Lobby,
        game: GameResult,
        team_players: Vec<TeamPlayer>,
        captains: Vec<TeamCaptain>,
        draft: Option<DraftState>,
    ) -> Result<()>;

    /// Commit draft progress: new team-player rows, the updated draft
    /// record (`None` removes it), and any game state change.
    fn commit_draft_progress(
        &self,
        game: GameResult,
        draft: Option<DraftState>,
        picks: Vec<TeamPlayer>,
    ) -> Result<()>;

    /// Commit a decision (or recompute): the updated game, the mutated
    /// player records, and the replacement score-update ledger rows.
    fn commit_decision(
        &self,
        game: GameResult,
        players: Vec<Player>,
        updates: Vec<ScoreUpdate>,
    ) -> Result<()>;

    /// Commit a cancellation: the updated game, any reversed player
    /// records, and removal of the game's ledger rows and draft.
    fn commit_cancellation(&self, game: GameResult, players: Vec<Player>) -> Result<()>;
}
