//! Team assembly strategies, one per pick mode
//!
//! Every assembler shares the `assemble(roster) -> Assembly` contract and
//! is selected from the lobby's configured pick mode. Captain modes return
//! two single-captain teams plus the draft pool; Random returns the full
//! partition immediately.

use crate::error::LadderError;
use crate::types::{PickMode, UserId};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::RngCore;

/// One queued player as seen by the assembly engine, in queue insertion
/// order with the points snapshot taken at assembly time.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub user_id: UserId,
    pub points: i32,
    pub queued_at: DateTime<Utc>,
}

/// Result of splitting a full roster
#[derive(Debug, Clone)]
pub struct Assembly {
    pub team1: Vec<UserId>,
    pub team2: Vec<UserId>,
    /// (team 1 captain, team 2 captain) for captain modes
    pub captains: Option<(UserId, UserId)>,
    /// Unassigned players awaiting the draft, in roster order
    pub pool: Vec<UserId>,
}

/// Strategy contract shared by all pick modes
pub trait TeamAssembler: Send + Sync {
    fn pick_mode(&self) -> PickMode;

    fn assemble(&self, roster: &[RosterEntry], rng: &mut dyn RngCore)
        -> crate::error::Result<Assembly>;
}

/// Select the assembler for a lobby's configured pick mode
pub fn assembler_for(mode: PickMode) -> Box<dyn TeamAssembler> {
    match mode {
        PickMode::Random => Box::new(RandomAssembler),
        PickMode::CaptainsRandom => Box::new(CaptainsRandomAssembler),
        PickMode::CaptainsHighestRanked => Box::new(CaptainsHighestRankedAssembler),
        PickMode::CaptainsRandomHighestRanked => Box::new(CaptainsRandomHighestRankedAssembler),
    }
}

fn ensure_even_roster(roster: &[RosterEntry]) -> crate::error::Result<()> {
    if roster.len() < 2 || roster.len() % 2 != 0 {
        return Err(LadderError::ConsistencyViolation {
            message: format!(
                "Team assembly requires an even roster of at least two, got {}",
                roster.len()
            ),
        }
        .into());
    }
    Ok(())
}

/// Roster sorted for captain selection: highest points first, earliest
/// queue time breaking ties, then user id for determinism.
fn by_points_desc(roster: &[RosterEntry]) -> Vec<RosterEntry> {
    let mut sorted = roster.to_vec();
    sorted.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(a.queued_at.cmp(&b.queued_at))
            .then(a.user_id.cmp(&b.user_id))
    });
    sorted
}

fn captains_assembly(roster: &[RosterEntry], captain1: UserId, captain2: UserId) -> Assembly {
    let pool = roster
        .iter()
        .map(|entry| entry.user_id)
        .filter(|&id| id != captain1 && id != captain2)
        .collect();

    Assembly {
        team1: vec![captain1],
        team2: vec![captain2],
        captains: Some((captain1, captain2)),
        pool,
    }
}

/// Uniform shuffle; first half team 1, second half team 2
pub struct RandomAssembler;

impl TeamAssembler for RandomAssembler {
    fn pick_mode(&self) -> PickMode {
        PickMode::Random
    }

    fn assemble(
        &self,
        roster: &[RosterEntry],
        rng: &mut dyn RngCore,
    ) -> crate::error::Result<Assembly> {
        ensure_even_roster(roster)?;

        let mut ids: Vec<UserId> = roster.iter().map(|entry| entry.user_id).collect();
        ids.shuffle(rng);

        let team2 = ids.split_off(ids.len() / 2);
        Ok(Assembly {
            team1: ids,
            team2,
            captains: None,
            pool: Vec::new(),
        })
    }
}

/// Two captains chosen uniformly at random without replacement
pub struct CaptainsRandomAssembler;

impl TeamAssembler for CaptainsRandomAssembler {
    fn pick_mode(&self) -> PickMode {
        PickMode::CaptainsRandom
    }

    fn assemble(
        &self,
        roster: &[RosterEntry],
        rng: &mut dyn RngCore,
    ) -> crate::error::Result<Assembly> {
        ensure_even_roster(roster)?;

        let mut ids: Vec<UserId> = roster.iter().map(|entry| entry.user_id).collect();
        ids.shuffle(rng);
        let captain1 = ids[0];
        let captain2 = ids[1];

        Ok(captains_assembly(roster, captain1, captain2))
    }
}

/// The two highest-point players captain; the higher of the two drafts
/// for team 1 and picks first.
pub struct CaptainsHighestRankedAssembler;

impl TeamAssembler for CaptainsHighestRankedAssembler {
    fn pick_mode(&self) -> PickMode {
        PickMode::CaptainsHighestRanked
    }

    fn assemble(
        &self,
        roster: &[RosterEntry],
        _rng: &mut dyn RngCore,
    ) -> crate::error::Result<Assembly> {
        ensure_even_roster(roster)?;

        let sorted = by_points_desc(roster);
        Ok(captains_assembly(roster, sorted[0].user_id, sorted[1].user_id))
    }
}

/// Team 1's captain is the highest-point player; team 2's is uniformly
/// random from the remainder.
pub struct CaptainsRandomHighestRankedAssembler;

impl TeamAssembler for CaptainsRandomHighestRankedAssembler {
    fn pick_mode(&self) -> PickMode {
        PickMode::CaptainsRandomHighestRanked
    }

    fn assemble(
        &self,
        roster: &[RosterEntry],
        rng: &mut dyn RngCore,
    ) -> crate::error::Result<Assembly> {
        ensure_even_roster(roster)?;

        let sorted = by_points_desc(roster);
        let captain1 = sorted[0].user_id;

        let remainder: Vec<UserId> = roster
            .iter()
            .map(|entry| entry.user_id)
            .filter(|&id| id != captain1)
            .collect();
        let captain2 = *remainder
            .choose(rng)
            .ok_or_else(|| LadderError::ConsistencyViolation {
                message: "No candidates left for the second captain".to_string(),
            })?;

        Ok(captains_assembly(roster, captain1, captain2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn roster(entries: &[(UserId, i32)]) -> Vec<RosterEntry> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        entries
            .iter()
            .enumerate()
            .map(|(i, &(user_id, points))| RosterEntry {
                user_id,
                points,
                queued_at: base + chrono::Duration::seconds(i as i64),
            })
            .collect()
    }

    #[test]
    fn test_random_partitions_whole_roster() {
        let mut rng = StdRng::seed_from_u64(3);
        let roster = roster(&[(1, 0), (2, 0), (3, 0), (4, 0), (5, 0), (6, 0)]);

        let assembly = RandomAssembler.assemble(&roster, &mut rng).unwrap();
        assert_eq!(assembly.team1.len(), 3);
        assert_eq!(assembly.team2.len(), 3);
        assert!(assembly.captains.is_none());
        assert!(assembly.pool.is_empty());

        let all: HashSet<_> = assembly
            .team1
            .iter()
            .chain(assembly.team2.iter())
            .collect();
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn test_highest_ranked_captains() {
        let mut rng = StdRng::seed_from_u64(3);
        // Captains are the two highest-point players: 1 (1200) and 3 (1100)
        let roster = roster(&[(1, 1200), (2, 1000), (3, 1100), (4, 900)]);

        let assembly = CaptainsHighestRankedAssembler
            .assemble(&roster, &mut rng)
            .unwrap();

        assert_eq!(assembly.captains, Some((1, 3)));
        assert_eq!(assembly.team1, vec![1]);
        assert_eq!(assembly.team2, vec![3]);
        assert_eq!(assembly.pool, vec![2, 4]);
    }

    #[test]
    fn test_highest_ranked_tie_breaks_on_queue_order() {
        let mut rng = StdRng::seed_from_u64(3);
        let roster = roster(&[(7, 1000), (8, 1000), (9, 500), (10, 400)]);

        let assembly = CaptainsHighestRankedAssembler
            .assemble(&roster, &mut rng)
            .unwrap();

        // 7 queued before 8, so 7 captains team 1
        assert_eq!(assembly.captains, Some((7, 8)));
    }

    #[test]
    fn test_random_highest_ranked_first_captain_fixed() {
        let roster = roster(&[(1, 1200), (2, 1000), (3, 1100), (4, 900)]);

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let assembly = CaptainsRandomHighestRankedAssembler
                .assemble(&roster, &mut rng)
                .unwrap();
            let (captain1, captain2) = assembly.captains.unwrap();
            assert_eq!(captain1, 1);
            assert_ne!(captain2, 1);
        }
    }

    #[test]
    fn test_captains_random_distinct() {
        let roster = roster(&[(1, 0), (2, 0), (3, 0), (4, 0)]);

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let assembly = CaptainsRandomAssembler.assemble(&roster, &mut rng).unwrap();
            let (captain1, captain2) = assembly.captains.unwrap();
            assert_ne!(captain1, captain2);
            assert_eq!(assembly.pool.len(), 2);
        }
    }

    #[test]
    fn test_odd_roster_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        let roster = roster(&[(1, 0), (2, 0), (3, 0)]);
        assert!(RandomAssembler.assemble(&roster, &mut rng).is_err());
    }
}
