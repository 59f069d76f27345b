//! Rank table resolution
//!
//! A player's current rank is the highest threshold at or below their
//! points; the next rank is the lowest threshold above. Equal thresholds
//! resolve to the lowest role id, which keeps resolution deterministic and
//! stable under rank-table edits.

use crate::config::GuildSettings;
use crate::error::Result;
use crate::store::Store;
use crate::types::{GuildId, Rank};

/// A guild's ordered rank table, loaded once per scoring pass
#[derive(Debug, Clone)]
pub struct RankTable {
    ranks: Vec<Rank>,
}

impl RankTable {
    /// Load the table from storage, ordered ascending by threshold then
    /// role id
    pub fn load(store: &dyn Store, guild_id: GuildId) -> Result<Self> {
        Ok(Self {
            ranks: store.ranks_for_guild(guild_id)?,
        })
    }

    pub fn from_ranks(mut ranks: Vec<Rank>) -> Self {
        ranks.sort_by(|a, b| a.points.cmp(&b.points).then(a.role_id.cmp(&b.role_id)));
        Self { ranks }
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// Highest rank whose threshold is at or below `points`; equal
    /// thresholds resolve to the lowest role id
    pub fn current_rank(&self, points: i32) -> Option<&Rank> {
        self.ranks
            .iter()
            .rev()
            .filter(|rank| rank.points <= points)
            .min_by_key(|rank| (std::cmp::Reverse(rank.points), rank.role_id))
    }

    /// Lowest rank whose threshold is above `points`
    pub fn next_rank(&self, points: i32) -> Option<&Rank> {
        self.ranks.iter().find(|rank| rank.points > points)
    }

    /// Win modifier for a player at `points`: rank override, else the
    /// guild default
    pub fn win_modifier(&self, points: i32, settings: &GuildSettings) -> i32 {
        self.current_rank(points)
            .and_then(|rank| rank.win_modifier)
            .unwrap_or(settings.default_win_modifier)
    }

    /// Loss modifier for a player at `points`: rank override, else the
    /// guild default
    pub fn loss_modifier(&self, points: i32, settings: &GuildSettings) -> i32 {
        self.current_rank(points)
            .and_then(|rank| rank.loss_modifier)
            .unwrap_or(settings.default_loss_modifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank(role_id: u64, points: i32, win: Option<i32>, loss: Option<i32>) -> Rank {
        Rank {
            guild_id: 1,
            role_id,
            points,
            win_modifier: win,
            loss_modifier: loss,
        }
    }

    fn table() -> RankTable {
        RankTable::from_ranks(vec![
            rank(100, 0, None, None),
            rank(200, 500, Some(15), None),
            rank(300, 1000, Some(20), Some(10)),
        ])
    }

    #[test]
    fn test_current_and_next_rank() {
        let table = table();
        assert_eq!(table.current_rank(750).unwrap().role_id, 200);
        assert_eq!(table.next_rank(750).unwrap().role_id, 300);

        // Exactly at threshold counts as reached
        assert_eq!(table.current_rank(1000).unwrap().role_id, 300);
        assert!(table.next_rank(1000).is_none());
    }

    #[test]
    fn test_below_lowest_threshold() {
        let table = RankTable::from_ranks(vec![rank(200, 500, None, None)]);
        assert!(table.current_rank(100).is_none());
        assert_eq!(table.next_rank(100).unwrap().role_id, 200);
    }

    #[test]
    fn test_equal_thresholds_resolve_to_lowest_role() {
        let table = RankTable::from_ranks(vec![
            rank(900, 500, None, None),
            rank(100, 500, None, None),
        ]);
        assert_eq!(table.current_rank(600).unwrap().role_id, 100);
    }

    #[test]
    fn test_modifier_resolution_falls_back_to_defaults() {
        let table = table();
        let settings = GuildSettings::new(1);

        // Rank 200 overrides win only
        assert_eq!(table.win_modifier(600, &settings), 15);
        assert_eq!(table.loss_modifier(600, &settings), settings.default_loss_modifier);

        // No rank at all below the bottom threshold of a sparse table
        let sparse = RankTable::from_ranks(vec![rank(200, 500, Some(99), Some(99))]);
        assert_eq!(sparse.win_modifier(10, &settings), settings.default_win_modifier);
    }
}
