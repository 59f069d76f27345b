//! Common types used throughout the ladder service

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;

/// Guild (server) identifier
pub type GuildId = u64;

/// Channel identifier; lobbies are keyed by the channel that hosts them
pub type ChannelId = u64;

/// User identifier
pub type UserId = u64;

/// Role identifier, used as the rank key
pub type RoleId = u64;

/// Per-lobby game sequence number, monotonic starting at 1
pub type GameId = u32;

/// One of the two sides of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    One,
    Two,
}

impl Team {
    /// The opposing team
    pub fn other(self) -> Team {
        match self {
            Team::One => Team::Two,
            Team::Two => Team::One,
        }
    }

    pub fn number(self) -> i32 {
        match self {
            Team::One => 1,
            Team::Two => 2,
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Team {}", self.number())
    }
}

/// Outcome of a decided game. `-1` stands for a draw in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinningTeam {
    One,
    Two,
    Draw,
}

impl WinningTeam {
    pub fn number(self) -> i32 {
        match self {
            WinningTeam::One => 1,
            WinningTeam::Two => 2,
            WinningTeam::Draw => -1,
        }
    }

    /// Winning side, if any
    pub fn team(self) -> Option<Team> {
        match self {
            WinningTeam::One => Some(Team::One),
            WinningTeam::Two => Some(Team::Two),
            WinningTeam::Draw => None,
        }
    }
}

impl From<Team> for WinningTeam {
    fn from(team: Team) -> Self {
        match team {
            Team::One => WinningTeam::One,
            Team::Two => WinningTeam::Two,
        }
    }
}

/// Algorithm used to split a full queue into two teams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickMode {
    Random,
    CaptainsRandom,
    CaptainsHighestRanked,
    CaptainsRandomHighestRanked,
}

impl PickMode {
    /// Captain modes start their games in the Picking state
    pub fn is_captain_mode(self) -> bool {
        !matches!(self, PickMode::Random)
    }
}

impl std::fmt::Display for PickMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PickMode::Random => write!(f, "Random"),
            PickMode::CaptainsRandom => write!(f, "Captains (random)"),
            PickMode::CaptainsHighestRanked => write!(f, "Captains (highest ranked)"),
            PickMode::CaptainsRandomHighestRanked => {
                write!(f, "Captains (random + highest ranked)")
            }
        }
    }
}

/// Lifecycle state of one match instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    /// Teams are set (or being played); no result recorded yet
    Undecided,
    /// Captains are drafting teams
    Picking,
    /// A result has been recorded and scores applied
    Decided,
    /// Game was voided; terminal
    Canceled,
}

/// Per-guild player record. Mutated only by the score engine or explicit
/// admin correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub display_name: String,
    pub points: i32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub games: u32,
    pub kills: u32,
    pub deaths: u32,
    pub registered_at: DateTime<Utc>,
}

impl Player {
    pub fn new(
        guild_id: GuildId,
        user_id: UserId,
        display_name: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            guild_id,
            user_id,
            display_name,
            points: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            games: 0,
            kills: 0,
            deaths: 0,
            registered_at: now,
        }
    }
}

/// A point-threshold tier with optional win/loss modifier overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rank {
    pub guild_id: GuildId,
    pub role_id: RoleId,
    pub points: i32,
    pub win_modifier: Option<i32>,
    pub loss_modifier: Option<i32>,
}

/// A configured matchmaking channel with a fixed team size
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lobby {
    pub channel_id: ChannelId,
    pub guild_id: GuildId,
    pub players_per_team: usize,
    pub is_locked: bool,
    pub minimum_points: Option<i32>,
    pub hide_queue: bool,
    pub current_game_count: GameId,
    pub pick_mode: PickMode,
}

impl Lobby {
    pub fn new(channel_id: ChannelId, guild_id: GuildId, players_per_team: usize) -> Self {
        Self {
            channel_id,
            guild_id,
            players_per_team,
            is_locked: false,
            minimum_points: None,
            hide_queue: false,
            current_game_count: 0,
            pick_mode: PickMode::Random,
        }
    }

    /// Total players needed to fill a game
    pub fn capacity(&self) -> usize {
        self.players_per_team * 2
    }
}

/// A player waiting in a lobby's queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedPlayer {
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub queued_at: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
}

/// A time-boxed matchmaking suspension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ban {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub time_of_ban: DateTime<Utc>,
    pub length: StdDuration,
    pub manually_disabled: bool,
    pub reason: Option<String>,
    pub moderator: Option<UserId>,
}

impl Ban {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.time_of_ban + Duration::from_std(self.length).unwrap_or_else(|_| Duration::zero())
    }

    /// Whether the ban window covers `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.manually_disabled && now >= self.time_of_ban && now < self.expires_at()
    }

    /// Time left on the ban, if still active
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.is_active(now) {
            Some(self.expires_at() - now)
        } else {
            None
        }
    }
}

/// Membership row for a party. A party is every row in a channel sharing
/// the same host; the host has `user_id == party_host`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyMember {
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub party_host: UserId,
}

/// One match instance for a lobby
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResult {
    pub channel_id: ChannelId,
    pub game_id: GameId,
    pub guild_id: GuildId,
    pub state: GameState,
    pub winning_team: Option<WinningTeam>,
    pub pick_mode: PickMode,
    pub created_at: DateTime<Utc>,
}

/// Team membership for one participant in one game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamPlayer {
    pub channel_id: ChannelId,
    pub game_id: GameId,
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub team: Team,
}

/// Captaincy marker for captain pick modes. Captains also appear as
/// TeamPlayer rows; this row only records who drafts for the team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamCaptain {
    pub channel_id: ChannelId,
    pub game_id: GameId,
    pub guild_id: GuildId,
    pub team: Team,
    pub user_id: UserId,
}

/// The durable point-delta ledger entry for one player in one game.
/// `modify_amount` is the effective applied delta, so reversal is exact
/// even when the nominal modifier was clamped at the zero floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub channel_id: ChannelId,
    pub game_id: GameId,
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub modify_amount: i32,
}

/// Emitted after a successful queue join
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerJoined {
    pub channel_id: ChannelId,
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub queue_size: usize,
    pub capacity: usize,
    pub timestamp: DateTime<Utc>,
}

/// Emitted after a successful queue leave
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerLeft {
    pub channel_id: ChannelId,
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub queue_size: usize,
    pub capacity: usize,
    pub timestamp: DateTime<Utc>,
}

/// Emitted when a queue reaches capacity and a game is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyFull {
    pub channel_id: ChannelId,
    pub guild_id: GuildId,
    pub game_id: GameId,
    pub pick_mode: PickMode,
    pub timestamp: DateTime<Utc>,
}

/// Emitted whenever a draft is waiting on a captain's pick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPickRequested {
    pub channel_id: ChannelId,
    pub game_id: GameId,
    pub team: Team,
    pub pool: Vec<UserId>,
    pub timestamp: DateTime<Utc>,
}

/// Emitted once a game result has been applied to the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDecided {
    pub channel_id: ChannelId,
    pub game_id: GameId,
    pub winning_team: WinningTeam,
    pub deltas: Vec<ScoreUpdate>,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all outbound events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LadderEvent {
    PlayerJoined(PlayerJoined),
    PlayerLeft(PlayerLeft),
    LobbyFull(LobbyFull),
    DraftPickRequested(DraftPickRequested),
    GameDecided(GameDecided),
}
