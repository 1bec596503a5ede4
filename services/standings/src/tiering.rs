//! Rank-based tier assignment
//!
//! Top four ranks get the podium colors; everyone below is white with a
//! winning record and gray otherwise. A player without a single win is gray
//! no matter where they rank.

use types::stats::{Tier, UserStats, UserWithTier};

/// Tier for the row at `rank` (0-based) with the given record.
pub fn assign_tier(rank: usize, wins: u32, losses: u32) -> Tier {
    if wins == 0 {
        return Tier::Gray;
    }

    match Tier::PODIUM.get(rank) {
        Some(&tier) => tier,
        None if wins > losses => Tier::White,
        None => Tier::Gray,
    }
}

/// Attach tiers to an already-ranked sequence.
pub fn assign_tiers(ranked: Vec<UserStats>) -> Vec<UserWithTier> {
    ranked
        .into_iter()
        .enumerate()
        .map(|(rank, stats)| {
            let tier = assign_tier(rank, stats.wins, stats.losses);
            UserWithTier::new(stats, tier)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::UserId;

    #[test]
    fn test_podium_tiers() {
        assert_eq!(assign_tier(0, 5, 0), Tier::Orange);
        assert_eq!(assign_tier(1, 4, 2), Tier::Purple);
        assert_eq!(assign_tier(2, 1, 9), Tier::Blue);
        assert_eq!(assign_tier(3, 1, 1), Tier::Green);
    }

    #[test]
    fn test_below_podium() {
        assert_eq!(assign_tier(4, 3, 2), Tier::White);
        assert_eq!(assign_tier(4, 2, 2), Tier::Gray);
        assert_eq!(assign_tier(17, 1, 5), Tier::Gray);
    }

    #[test]
    fn test_zero_wins_overrides_rank() {
        for rank in 0..8 {
            assert_eq!(assign_tier(rank, 0, 0), Tier::Gray);
            assert_eq!(assign_tier(rank, 0, 3), Tier::Gray);
        }
    }

    #[test]
    fn test_assign_tiers_attaches_colors() {
        let mut a = UserStats::new(UserId::new("a"), "A");
        a.wins = 2;
        let b = UserStats::new(UserId::new("b"), "B");

        let rows = assign_tiers(vec![a, b]);
        assert_eq!(rows[0].tier, Tier::Orange);
        assert_eq!(rows[0].tier_color, "#ff8c00");
        assert_eq!(rows[1].tier, Tier::Gray);
        assert_eq!(rows[1].tier_color, "#94a3b8");
    }
}
