//! Game state machine
//!
//! Owns the Undecided/Picking/Decided/Canceled transitions. The lobby-full
//! transition runs inside the queue manager's critical section; draft and
//! cancellation entry points take the lobby lock themselves.

use crate::error::{LadderError, Result};
use crate::events::EventSink;
use crate::queue::LobbyLocks;
use crate::score::reversed_players;
use crate::store::Store;
use crate::team::{assembler_for, DraftState, RosterEntry};
use crate::types::{
    ChannelId, DraftPickRequested, GameId, GameResult, GameState, LadderEvent, Lobby, LobbyFull,
    Team, TeamCaptain, TeamPlayer, UserId,
};
use crate::utils::Clock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Result of a single draft step
#[derive(Debug, Clone)]
pub struct DraftProgress {
    pub game: GameResult,
    /// The player assigned by this step
    pub picked: UserId,
    /// The team the player landed on
    pub team: Team,
    /// Set once the final pool player has been auto-assigned
    pub completed: bool,
}

/// Drives game creation, captain drafts, and cancellation for all lobbies
pub struct GameManager {
    store: Arc<dyn Store>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    locks: Arc<LobbyLocks>,
    rng: Mutex<StdRng>,
}

impl GameManager {
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
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic variant for tests
    pub fn with_seed(
        store: Arc<dyn Store>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        locks: Arc<LobbyLocks>,
        seed: u64,
    ) -> Self {
        Self {
            store,
            events,
            clock,
            locks,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn rng(&self) -> Result<std::sync::MutexGuard<'_, StdRng>> {
        self.rng.lock().map_err(|_| {
            LadderError::InternalError {
                message: "Game RNG lock poisoned".to_string(),
            }
            .into()
        })
    }

    /// Turn a full queue into a new game. The caller must already hold the
    /// lobby's lock; the queue flush, lobby counter bump, and game rows all
    /// land in one commit.
    pub(crate) async fn start_game(&self, lobby: &Lobby) -> Result<GameResult> {
        let queue = self.store.queue_for_lobby(lobby.channel_id)?;
        if queue.len() != lobby.capacity() {
            return Err(LadderError::ConsistencyViolation {
                message: format!(
                    "Lobby-full transition with {} of {} players queued in channel {}",
                    queue.len(),
                    lobby.capacity(),
                    lobby.channel_id
                ),
            }
            .into());
        }

        let mut roster = Vec::with_capacity(queue.len());
        for entry in &queue {
            let points = match self.store.get_player(lobby.guild_id, entry.user_id)? {
                Some(player) => player.points,
                None => {
                    warn!(
                        guild_id = lobby.guild_id,
                        user_id = entry.user_id,
                        "Queued player has no registration record, assuming zero points"
                    );
                    0
                }
            };
            roster.push(RosterEntry {
                user_id: entry.user_id,
                points,
                queued_at: entry.queued_at,
            });
        }

        let assembly = {
            let mut rng = self.rng()?;
            assembler_for(lobby.pick_mode).assemble(&roster, &mut *rng)?
        };

        let game_id: GameId = lobby.current_game_count + 1;
        // A captain draft only exists when there is a pool to draft from;
        // a 1v1 captains lobby goes straight to Undecided
        let needs_draft = assembly.captains.is_some() && !assembly.pool.is_empty();
        let state = if needs_draft {
            GameState::Picking
        } else {
            GameState::Undecided
        };
        let game = GameResult {
            channel_id: lobby.channel_id,
            game_id,
            guild_id: lobby.guild_id,
            state,
            winning_team: None,
            pick_mode: lobby.pick_mode,
            created_at: self.clock.now(),
        };

        let mut team_players = Vec::with_capacity(lobby.capacity());
        for &user_id in &assembly.team1 {
            team_players.push(self.team_player(lobby, game_id, user_id, Team::One));
        }
        for &user_id in &assembly.team2 {
            team_players.push(self.team_player(lobby, game_id, user_id, Team::Two));
        }

        let mut captains = Vec::new();
        let mut draft = None;
        if let Some((captain1, captain2)) = assembly.captains {
            captains.push(TeamCaptain {
                channel_id: lobby.channel_id,
                game_id,
                guild_id: lobby.guild_id,
                team: Team::One,
                user_id: captain1,
            });
            captains.push(TeamCaptain {
                channel_id: lobby.channel_id,
                game_id,
                guild_id: lobby.guild_id,
                team: Team::Two,
                user_id: captain2,
            });
            if needs_draft {
                draft = Some(DraftState::new(
                    lobby.channel_id,
                    game_id,
                    assembly.pool.clone(),
                ));
            }
        }

        let mut updated_lobby = lobby.clone();
        updated_lobby.current_game_count = game_id;
        self.store.commit_lobby_full(
            updated_lobby,
            game.clone(),
            team_players,
            captains,
            draft.clone(),
        )?;

        info!(
            channel_id = lobby.channel_id,
            game_id,
            pick_mode = %lobby.pick_mode,
            "Game created from full lobby"
        );
        self.events
            .emit(LadderEvent::LobbyFull(LobbyFull {
                channel_id: lobby.channel_id,
                guild_id: lobby.guild_id,
                game_id,
                pick_mode: lobby.pick_mode,
                timestamp: self.clock.now(),
            }))
            .await?;
        if let Some(draft) = draft {
            self.emit_pick_request(&game, &draft).await?;
        }

        Ok(game)
    }

    fn team_player(&self, lobby: &Lobby, game_id: GameId, user_id: UserId, team: Team) -> TeamPlayer {
        TeamPlayer {
            channel_id: lobby.channel_id,
            game_id,
            user_id,
            guild_id: lobby.guild_id,
            team,
        }
    }

    async fn emit_pick_request(&self, game: &GameResult, draft: &DraftState) -> Result<()> {
        self.events
            .emit(LadderEvent::DraftPickRequested(DraftPickRequested {
                channel_id: game.channel_id,
                game_id: game.game_id,
                team: draft.whose_turn,
                pool: draft.pool.clone(),
                timestamp: self.clock.now(),
            }))
            .await
    }

    /// A captain drafts one player from the pool
    pub async fn draft_pick(
        &self,
        channel_id: ChannelId,
        captain_id: UserId,
        pick_id: UserId,
    ) -> Result<DraftProgress> {
        let _guard = self.locks.acquire(channel_id).await;

        let (game, mut draft) = self.picking_game(channel_id)?;
        let captains = self.store.team_captains(channel_id, game.game_id)?;
        let team = captains
            .iter()
            .find(|captain| captain.user_id == captain_id)
            .map(|captain| captain.team)
            .ok_or_else(|| LadderError::ValidationError {
                reason: "Only the game's captains may draft players".to_string(),
            })?;

        draft.pick(team, pick_id)?;
        self.apply_draft_step(game, draft, pick_id, team).await
    }

    /// Pick a random pool player for the captain whose turn it is, used to
    /// unblock a stalled draft
    pub async fn force_pick(&self, channel_id: ChannelId) -> Result<DraftProgress> {
        let _guard = self.locks.acquire(channel_id).await;

        let (game, mut draft) = self.picking_game(channel_id)?;
        let team = draft.whose_turn;
        let picked = {
            let mut rng = self.rng()?;
            draft.force_pick(&mut *rng)?
        };
        self.apply_draft_step(game, draft, picked, team).await
    }

    fn picking_game(&self, channel_id: ChannelId) -> Result<(GameResult, DraftState)> {
        let game = self
            .store
            .latest_game(channel_id)?
            .filter(|game| game.state == GameState::Picking)
            .ok_or_else(|| LadderError::ValidationError {
                reason: "No draft is in progress for this lobby".to_string(),
            })?;
        let draft = self
            .store
            .get_draft(channel_id, game.game_id)?
            .ok_or_else(|| LadderError::ConsistencyViolation {
                message: format!(
                    "Game {} in channel {} is Picking but has no draft record",
                    game.game_id, channel_id
                ),
            })?;
        Ok((game, draft))
    }

    /// Persist one draft step: the pick itself, the auto-assignment of a
    /// lone remaining player, and the Picking -> Undecided transition when
    /// the pool drains.
    async fn apply_draft_step(
        &self,
        mut game: GameResult,
        mut draft: DraftState,
        picked: UserId,
        team: Team,
    ) -> Result<DraftProgress> {
        let mut picks = vec![TeamPlayer {
            channel_id: game.channel_id,
            game_id: game.game_id,
            user_id: picked,
            guild_id: game.guild_id,
            team,
        }];

        if let Some(last) = draft.take_last() {
            let members = self.store.team_players(game.channel_id, game.game_id)?;
            let count = |side: Team| {
                members
                    .iter()
                    .filter(|row| row.team == side)
                    .chain(picks.iter().filter(|row| row.team == side))
                    .count()
            };
            let last_team = if count(Team::One) <= count(Team::Two) {
                Team::One
            } else {
                Team::Two
            };
            picks.push(TeamPlayer {
                channel_id: game.channel_id,
                game_id: game.game_id,
                user_id: last,
                guild_id: game.guild_id,
                team: last_team,
            });
        }

        let completed = draft.is_complete();
        if completed {
            game.state = GameState::Undecided;
            self.store
                .commit_draft_progress(game.clone(), None, picks)?;
            info!(
                channel_id = game.channel_id,
                game_id = game.game_id,
                "Draft complete, teams are set"
            );
        } else {
            self.store
                .commit_draft_progress(game.clone(), Some(draft.clone()), picks)?;
            self.emit_pick_request(&game, &draft).await?;
        }

        Ok(DraftProgress {
            game,
            picked,
            team,
            completed,
        })
    }

    /// Void a game. A Decided game has its recorded point deltas and
    /// counter changes reversed in the same commit that cancels it.
    pub async fn cancel_game(&self, channel_id: ChannelId, game_id: GameId) -> Result<GameResult> {
        let _guard = self.locks.acquire(channel_id).await;

        let mut game = self
            .store
            .get_game(channel_id, game_id)?
            .ok_or(LadderError::GameNotFound {
                channel_id,
                game_id,
            })?;
        if game.state == GameState::Canceled {
            return Err(LadderError::ValidationError {
                reason: format!("Game {game_id} is already canceled"),
            }
            .into());
        }

        let reversed = if game.state == GameState::Decided {
            reversed_players(self.store.as_ref(), &game)?
        } else {
            Vec::new()
        };

        game.state = GameState::Canceled;
        game.winning_team = None;
        self.store.commit_cancellation(game.clone(), reversed)?;

        info!(channel_id, game_id, "Game canceled");
        Ok(game)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use crate::queue::LobbyLocks;
    use crate::score::ScoreEngine;
    use crate::store::MemoryStore;
    use crate::types::{PickMode, Player, QueuedPlayer, WinningTeam};
    use crate::utils::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    struct Harness {
        store: Arc<MemoryStore>,
        sink: Arc<RecordingEventSink>,
        clock: Arc<ManualClock>,
        locks: Arc<LobbyLocks>,
        games: GameManager,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingEventSink::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let locks = Arc::new(LobbyLocks::new());
        let games = GameManager::with_seed(
            store.clone(),
            sink.clone(),
            clock.clone(),
            locks.clone(),
            42,
        );
        Harness {
            store,
            sink,
            clock,
            locks,
            games,
        }
    }

    fn fill_queue(harness: &Harness, lobby: &Lobby, players: &[(UserId, i32)]) {
        let now = harness.clock.now();
        for (i, &(user_id, points)) in players.iter().enumerate() {
            let mut player = Player::new(lobby.guild_id, user_id, format!("p{user_id}"), now);
            player.points = points;
            harness.store.upsert_player(player).unwrap();
            harness
                .store
                .insert_queued_players(vec![QueuedPlayer {
                    channel_id: lobby.channel_id,
                    user_id,
                    guild_id: lobby.guild_id,
                    queued_at: now + chrono::Duration::seconds(i as i64),
                    expire_at: now + chrono::Duration::hours(2),
                }])
                .unwrap();
        }
    }

    fn team_of(harness: &Harness, game: &GameResult, team: Team) -> Vec<UserId> {
        harness
            .store
            .team_players(game.channel_id, game.game_id)
            .unwrap()
            .iter()
            .filter(|row| row.team == team)
            .map(|row| row.user_id)
            .collect()
    }

    #[tokio::test]
    async fn test_random_mode_partitions_immediately() {
        let harness = harness();
        let lobby = Lobby::new(10, 1, 2);
        harness.store.upsert_lobby(lobby.clone()).unwrap();
        fill_queue(&harness, &lobby, &[(1, 0), (2, 0), (3, 0), (4, 0)]);

        let game = harness.games.start_game(&lobby).await.unwrap();
        assert_eq!(game.game_id, 1);
        assert_eq!(game.state, GameState::Undecided);

        let team1 = team_of(&harness, &game, Team::One);
        let team2 = team_of(&harness, &game, Team::Two);
        assert_eq!(team1.len(), 2);
        assert_eq!(team2.len(), 2);
        let all: HashSet<_> = team1.iter().chain(team2.iter()).collect();
        assert_eq!(all.len(), 4);

        // Queue flushed, counter bumped, no draft
        assert!(harness.store.queue_for_lobby(10).unwrap().is_empty());
        assert_eq!(
            harness.store.get_lobby(10).unwrap().unwrap().current_game_count,
            1
        );
        assert!(harness.store.get_draft(10, 1).unwrap().is_none());
        assert_eq!(harness.sink.count_of("LobbyFull"), 1);
        assert_eq!(harness.sink.count_of("DraftPickRequested"), 0);
    }

    #[tokio::test]
    async fn test_captains_mode_opens_a_draft() {
        let harness = harness();
        let mut lobby = Lobby::new(10, 1, 2);
        lobby.pick_mode = PickMode::CaptainsHighestRanked;
        harness.store.upsert_lobby(lobby.clone()).unwrap();
        fill_queue(&harness, &lobby, &[(1, 1200), (2, 1000), (3, 1100), (4, 900)]);

        let game = harness.games.start_game(&lobby).await.unwrap();
        assert_eq!(game.state, GameState::Picking);

        let captains = harness.store.team_captains(10, 1).unwrap();
        assert_eq!(captains.len(), 2);
        assert_eq!(captains[0].user_id, 1);
        assert_eq!(captains[1].user_id, 3);

        let draft = harness.store.get_draft(10, 1).unwrap().unwrap();
        assert_eq!(draft.pool, vec![2, 4]);
        assert_eq!(draft.whose_turn, Team::One);
        assert_eq!(harness.sink.count_of("DraftPickRequested"), 1);
    }

    #[tokio::test]
    async fn test_draft_runs_to_completion() {
        let harness = harness();
        let mut lobby = Lobby::new(10, 1, 2);
        lobby.pick_mode = PickMode::CaptainsHighestRanked;
        harness.store.upsert_lobby(lobby.clone()).unwrap();
        fill_queue(&harness, &lobby, &[(1, 1200), (2, 1000), (3, 1100), (4, 900)]);
        harness.games.start_game(&lobby).await.unwrap();

        // Captain 1 (team 1) picks B; D auto-assigns to the smaller team 2
        let progress = harness.games.draft_pick(10, 1, 2).await.unwrap();
        assert!(progress.completed);
        assert_eq!(progress.game.state, GameState::Undecided);

        assert_eq!(team_of(&harness, &progress.game, Team::One), vec![1, 2]);
        assert_eq!(team_of(&harness, &progress.game, Team::Two), vec![3, 4]);
        assert!(harness.store.get_draft(10, 1).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_only_the_turn_captain_may_pick() {
        let harness = harness();
        let mut lobby = Lobby::new(10, 1, 2);
        lobby.pick_mode = PickMode::CaptainsHighestRanked;
        harness.store.upsert_lobby(lobby.clone()).unwrap();
        fill_queue(&harness, &lobby, &[(1, 1200), (2, 1000), (3, 1100), (4, 900)]);
        harness.games.start_game(&lobby).await.unwrap();

        // Not a captain at all
        assert!(harness.games.draft_pick(10, 2, 4).await.is_err());
        // Captain of team 2, but team 1 picks first
        assert!(harness.games.draft_pick(10, 3, 4).await.is_err());
        // Pick outside the pool
        assert!(harness.games.draft_pick(10, 1, 3).await.is_err());

        let draft = harness.store.get_draft(10, 1).unwrap().unwrap();
        assert_eq!(draft.pool, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_force_pick_unblocks_the_draft() {
        let harness = harness();
        let mut lobby = Lobby::new(10, 1, 3);
        lobby.pick_mode = PickMode::CaptainsHighestRanked;
        harness.store.upsert_lobby(lobby.clone()).unwrap();
        fill_queue(
            &harness,
            &lobby,
            &[(1, 600), (2, 500), (3, 400), (4, 300), (5, 200), (6, 100)],
        );
        harness.games.start_game(&lobby).await.unwrap();

        let progress = harness.games.force_pick(10).await.unwrap();
        assert_eq!(progress.team, Team::One);
        assert!(!progress.completed);

        let draft = harness.store.get_draft(10, 1).unwrap().unwrap();
        assert_eq!(draft.whose_turn, Team::Two);
        assert!(!draft.pool.contains(&progress.picked));
    }

    #[tokio::test]
    async fn test_cancel_undecided_game() {
        let harness = harness();
        let lobby = Lobby::new(10, 1, 1);
        harness.store.upsert_lobby(lobby.clone()).unwrap();
        fill_queue(&harness, &lobby, &[(1, 0), (2, 0)]);
        harness.games.start_game(&lobby).await.unwrap();

        let game = harness.games.cancel_game(10, 1).await.unwrap();
        assert_eq!(game.state, GameState::Canceled);
        // Canceling twice is rejected
        assert!(harness.games.cancel_game(10, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_decided_game_reverses_scores() {
        let harness = harness();
        let lobby = Lobby::new(10, 1, 1);
        harness.store.upsert_lobby(lobby.clone()).unwrap();
        fill_queue(&harness, &lobby, &[(1, 100), (2, 100)]);
        harness.games.start_game(&lobby).await.unwrap();

        let scores = ScoreEngine::new(
            harness.store.clone(),
            harness.sink.clone(),
            harness.clock.clone(),
            harness.locks.clone(),
        );
        scores.apply_result(10, 1, WinningTeam::One).await.unwrap();
        assert_ne!(harness.store.get_player(1, 1).unwrap().unwrap().points, 100);

        let game = harness.games.cancel_game(10, 1).await.unwrap();
        assert_eq!(game.state, GameState::Canceled);
        assert!(game.winning_team.is_none());

        for user_id in [1, 2] {
            let player = harness.store.get_player(1, user_id).unwrap().unwrap();
            assert_eq!(player.points, 100);
            assert_eq!(player.games, 0);
            assert_eq!(player.wins + player.losses, 0);
        }
        assert!(harness.store.score_updates(10, 1).unwrap().is_empty());
    }
}
