//! Score engine: applies outcomes, recomputes them, and owns the player
//! directory
//!
//! Point deltas come from the guild's rank table (per-rank modifier
//! overrides, guild defaults otherwise), evaluated against each player's
//! points at application time. Points never drop below zero; the ledger
//! records what was actually applied.

use crate::config::GuildSettings;
use crate::error::{LadderError, Result};
use crate::events::EventSink;
use crate::queue::LobbyLocks;
use crate::registry::RankTable;
use crate::store::Store;
use crate::types::{
    ChannelId, GameDecided, GameId, GameResult, GameState, GuildId, LadderEvent, Player,
    ScoreUpdate, TeamPlayer, UserId, WinningTeam,
};
use crate::utils::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Result of a registration attempt
#[derive(Debug, Clone)]
pub enum RegistrationOutcome {
    Registered(Player),
    AlreadyRegistered(Player),
}

/// Applies game outcomes to player records and maintains the ledger
pub struct ScoreEngine {
    store: Arc<dyn Store>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    locks: Arc<LobbyLocks>,
}

impl ScoreEngine {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        locks: Arc<LobbyLocks>,
    ) -> Self {
        Self {
            store,
            events,
            clock,
            locks,
        }
    }

    /// Record the outcome of an undecided game, moving it to Decided and
    /// applying one ledger-backed delta per participant.
    pub async fn apply_result(
        &self,
        channel_id: ChannelId,
        game_id: GameId,
        outcome: WinningTeam,
    ) -> Result<GameResult> {
        let _guard = self.locks.acquire(channel_id).await;

        let mut game = self.require_game(channel_id, game_id)?;
        match game.state {
            GameState::Undecided => {}
            GameState::Picking => {
                return Err(LadderError::ValidationError {
                    reason: format!("Game {game_id} is still drafting teams"),
                }
                .into())
            }
            GameState::Decided => {
                return Err(LadderError::ConsistencyViolation {
                    message: format!(
                        "Game {game_id} already has a result; recompute it instead"
                    ),
                }
                .into())
            }
            GameState::Canceled => {
                return Err(LadderError::ValidationError {
                    reason: format!("Game {game_id} was canceled"),
                }
                .into())
            }
        }

        let membership = self.store.team_players(channel_id, game_id)?;
        let mut players = self.load_players(&membership)?;
        let settings = self.store.get_or_create_guild_settings(game.guild_id)?;
        let table = RankTable::load(self.store.as_ref(), game.guild_id)?;

        let updates = apply_outcome(&table, &settings, &membership, &mut players, outcome);

        game.state = GameState::Decided;
        game.winning_team = Some(outcome);
        self.commit_and_announce(game.clone(), players, updates)
            .await?;
        Ok(game)
    }

    /// Replace a decided game's outcome: reverse the recorded ledger
    /// deltas, then apply the new outcome, all in one commit.
    pub async fn recompute(
        &self,
        channel_id: ChannelId,
        game_id: GameId,
        outcome: WinningTeam,
    ) -> Result<GameResult> {
        let _guard = self.locks.acquire(channel_id).await;

        let mut game = self.require_game(channel_id, game_id)?;
        if game.state != GameState::Decided {
            return Err(LadderError::ValidationError {
                reason: format!("Game {game_id} has no result to recompute"),
            }
            .into());
        }
        let previous = game
            .winning_team
            .ok_or_else(|| LadderError::ConsistencyViolation {
                message: format!("Decided game {game_id} has no recorded winner"),
            })?;

        let membership = self.store.team_players(channel_id, game_id)?;
        let recorded = self.store.score_updates(channel_id, game_id)?;
        let mut players = self.load_players(&membership)?;

        reverse_outcome(&membership, &recorded, &mut players, previous)?;

        let settings = self.store.get_or_create_guild_settings(game.guild_id)?;
        let table = RankTable::load(self.store.as_ref(), game.guild_id)?;
        let updates = apply_outcome(&table, &settings, &membership, &mut players, outcome);

        game.winning_team = Some(outcome);
        info!(
            channel_id,
            game_id,
            from = previous.number(),
            to = outcome.number(),
            "Recomputed game result"
        );
        self.commit_and_announce(game.clone(), players, updates)
            .await?;
        Ok(game)
    }

    async fn commit_and_announce(
        &self,
        game: GameResult,
        players: HashMap<UserId, Player>,
        updates: Vec<ScoreUpdate>,
    ) -> Result<()> {
        let winning_team = game
            .winning_team
            .ok_or_else(|| LadderError::ConsistencyViolation {
                message: "Committing a decision without a winner".to_string(),
            })?;
        self.store.commit_decision(
            game.clone(),
            players.into_values().collect(),
            updates.clone(),
        )?;
        self.events
            .emit(LadderEvent::GameDecided(GameDecided {
                channel_id: game.channel_id,
                game_id: game.game_id,
                winning_team,
                deltas: updates,
                timestamp: self.clock.now(),
            }))
            .await
    }

    fn require_game(&self, channel_id: ChannelId, game_id: GameId) -> Result<GameResult> {
        self.store
            .get_game(channel_id, game_id)?
            .ok_or_else(|| LadderError::GameNotFound {
                channel_id,
                game_id,
            }
            .into())
    }

    fn load_players(&self, membership: &[TeamPlayer]) -> Result<HashMap<UserId, Player>> {
        let mut players = HashMap::with_capacity(membership.len());
        for row in membership {
            let player = self
                .store
                .get_player(row.guild_id, row.user_id)?
                .ok_or_else(|| LadderError::ConsistencyViolation {
                    message: format!(
                        "Game participant {} has no player record in guild {}",
                        row.user_id, row.guild_id
                    ),
                })?;
            players.insert(row.user_id, player);
        }
        Ok(players)
    }

    // Player directory

    /// Create a player record at zero points. Registration is idempotent;
    /// an existing record is returned untouched.
    pub fn register_player(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        display_name: String,
    ) -> Result<RegistrationOutcome> {
        if let Some(existing) = self.store.get_player(guild_id, user_id)? {
            return Ok(RegistrationOutcome::AlreadyRegistered(existing));
        }
        let player = Player::new(guild_id, user_id, display_name, self.clock.now());
        self.store.upsert_player(player.clone())?;
        info!(guild_id, user_id, "Registered player");
        Ok(RegistrationOutcome::Registered(player))
    }

    /// Admin point correction, outside any game ledger. The zero floor
    /// still applies.
    pub fn modify_points(&self, guild_id: GuildId, user_id: UserId, delta: i32) -> Result<Player> {
        let mut player =
            self.store
                .get_player(guild_id, user_id)?
                .ok_or(LadderError::PlayerNotFound {
                    guild_id,
                    user_id,
                })?;
        player.points = (player.points + delta).max(0);
        self.store.upsert_player(player.clone())?;
        info!(guild_id, user_id, delta, points = player.points, "Adjusted points");
        Ok(player)
    }

    /// Update a player's stored display name
    pub fn rename_player(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        display_name: String,
    ) -> Result<Player> {
        let mut player =
            self.store
                .get_player(guild_id, user_id)?
                .ok_or(LadderError::PlayerNotFound {
                    guild_id,
                    user_id,
                })?;
        player.display_name = display_name;
        self.store.upsert_player(player.clone())?;
        Ok(player)
    }
}

/// Render a player's name through the guild's name format template
pub fn formatted_name(settings: &GuildSettings, player: &Player) -> String {
    settings
        .name_format
        .replace("{name}", &player.display_name)
        .replace("{points}", &player.points.to_string())
}

/// Apply an outcome to every participant, mutating the player map and
/// returning the ledger rows. Each row records the effective delta after
/// the zero floor.
fn apply_outcome(
    table: &RankTable,
    settings: &GuildSettings,
    membership: &[TeamPlayer],
    players: &mut HashMap<UserId, Player>,
    outcome: WinningTeam,
) -> Vec<ScoreUpdate> {
    let mut updates = Vec::with_capacity(membership.len());
    for row in membership {
        let Some(player) = players.get_mut(&row.user_id) else {
            continue;
        };

        let effective = match outcome.team() {
            None => {
                player.draws += 1;
                0
            }
            Some(winner) if row.team == winner => {
                player.wins += 1;
                let nominal = table.win_modifier(player.points, settings);
                let next = (player.points + nominal).max(0);
                let effective = next - player.points;
                player.points = next;
                effective
            }
            Some(_) => {
                player.losses += 1;
                let nominal = table.loss_modifier(player.points, settings);
                let next = (player.points - nominal).max(0);
                let effective = next - player.points;
                player.points = next;
                effective
            }
        };
        player.games += 1;

        updates.push(ScoreUpdate {
            channel_id: row.channel_id,
            game_id: row.game_id,
            user_id: row.user_id,
            guild_id: row.guild_id,
            modify_amount: effective,
        });
    }
    updates
}

/// Undo a previously applied outcome in memory: subtract each recorded
/// ledger delta and roll back the win/loss/draw/game counters.
fn reverse_outcome(
    membership: &[TeamPlayer],
    recorded: &[ScoreUpdate],
    players: &mut HashMap<UserId, Player>,
    outcome: WinningTeam,
) -> Result<()> {
    let deltas: HashMap<UserId, i32> = recorded
        .iter()
        .map(|update| (update.user_id, update.modify_amount))
        .collect();

    for row in membership {
        let Some(player) = players.get_mut(&row.user_id) else {
            continue;
        };
        let delta = deltas
            .get(&row.user_id)
            .copied()
            .ok_or_else(|| LadderError::ConsistencyViolation {
                message: format!(
                    "No ledger row for participant {} in game {}",
                    row.user_id, row.game_id
                ),
            })?;

        player.points = (player.points - delta).max(0);
        match outcome.team() {
            None => player.draws = player.draws.saturating_sub(1),
            Some(winner) if row.team == winner => player.wins = player.wins.saturating_sub(1),
            Some(_) => player.losses = player.losses.saturating_sub(1),
        }
        player.games = player.games.saturating_sub(1);
    }
    Ok(())
}

/// Load a decided game's participants with its recorded outcome reversed,
/// ready to persist alongside a cancellation.
pub(crate) fn reversed_players(store: &dyn Store, game: &GameResult) -> Result<Vec<Player>> {
    let outcome = game
        .winning_team
        .ok_or_else(|| LadderError::ConsistencyViolation {
            message: format!("Decided game {} has no recorded winner", game.game_id),
        })?;
    let membership = store.team_players(game.channel_id, game.game_id)?;
    let recorded = store.score_updates(game.channel_id, game.game_id)?;

    let mut players = HashMap::with_capacity(membership.len());
    for row in &membership {
        let player = store
            .get_player(row.guild_id, row.user_id)?
            .ok_or_else(|| LadderError::ConsistencyViolation {
                message: format!(
                    "Game participant {} has no player record in guild {}",
                    row.user_id, row.guild_id
                ),
            })?;
        players.insert(row.user_id, player);
    }

    reverse_outcome(&membership, &recorded, &mut players, outcome)?;
    Ok(players.into_values().collect())
}
