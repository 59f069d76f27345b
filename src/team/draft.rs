//! Captain draft state machine
//!
//! The draft is persisted as an explicit {pool, whose_turn} record so an
//! in-progress draft survives a process restart instead of living in
//! transient callbacks.

use crate::error::LadderError;
use crate::types::{ChannelId, GameId, Team, UserId};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Persisted state of an in-progress captain draft
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftState {
    pub channel_id: ChannelId,
    pub game_id: GameId,
    /// Players not yet assigned to a team, in queue order
    pub pool: Vec<UserId>,
    /// Which captain's pick is next
    pub whose_turn: Team,
}

impl DraftState {
    /// Start a draft. Team 1's captain always picks first.
    pub fn new(channel_id: ChannelId, game_id: GameId, pool: Vec<UserId>) -> Self {
        Self {
            channel_id,
            game_id,
            pool,
            whose_turn: Team::One,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pool.is_empty()
    }

    /// Remove a picked player from the pool and pass the turn. The pick
    /// must match the current turn; the caller validates captaincy.
    pub fn pick(&mut self, team: Team, user_id: UserId) -> crate::error::Result<()> {
        if team != self.whose_turn {
            return Err(LadderError::ValidationError {
                reason: format!("It is {}'s turn to pick", self.whose_turn),
            }
            .into());
        }

        let position = self.pool.iter().position(|&id| id == user_id).ok_or_else(|| {
            LadderError::ValidationError {
                reason: format!("User {user_id} is not in the remaining player pool"),
            }
        })?;

        self.pool.remove(position);
        self.whose_turn = self.whose_turn.other();
        Ok(())
    }

    /// Pick a uniformly random pool player on behalf of the current turn,
    /// used to unblock a stalled draft.
    pub fn force_pick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> crate::error::Result<UserId> {
        if self.pool.is_empty() {
            return Err(LadderError::ConsistencyViolation {
                message: format!(
                    "Force pick on an empty pool for game {} in channel {}",
                    self.game_id, self.channel_id
                ),
            }
            .into());
        }

        let index = rng.gen_range(0..self.pool.len());
        let user_id = self.pool.remove(index);
        self.whose_turn = self.whose_turn.other();
        Ok(user_id)
    }

    /// Drain the final pool entry, if exactly one player remains. The
    /// caller assigns them to the smaller team.
    pub fn take_last(&mut self) -> Option<UserId> {
        if self.pool.len() == 1 {
            self.pool.pop()
        } else {
            None
        }
    }
}
