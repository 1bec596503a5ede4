//! Standings aggregation
//!
//! Folds the standing log over the profile list into per-identity win/loss
//! totals, ranks them and attaches tiers. Recomputed from scratch on every
//! snapshot change.

use std::collections::HashMap;

use types::ids::UserId;
use types::profile::Profile;
use types::standing::StandingEvent;
use types::stats::{UserStats, UserWithTier};

use crate::tiering::assign_tiers;

/// Insertion-ordered identity → stats table.
///
/// Rows keep the order in which identities were first seen so the final
/// sort has a deterministic fallback for full ties.
struct StatsTable {
    index: HashMap<UserId, usize>,
    rows: Vec<UserStats>,
}

impl StatsTable {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            rows: Vec::with_capacity(capacity),
        }
    }

    /// Seed or rename a profile row. A repeated profile keeps its first
    /// position and takes the later name.
    fn seed(&mut self, profile: &Profile) {
        match self.index.get(&profile.id) {
            Some(&slot) => self.rows[slot].name = profile.display_name(),
            None => {
                self.index.insert(profile.id.clone(), self.rows.len());
                self.rows
                    .push(UserStats::new(profile.id.clone(), profile.display_name()));
            }
        }
    }

    /// Row for `id`, discovering it with the fallback name if unseen.
    fn entry(&mut self, id: &UserId) -> &mut UserStats {
        let slot = match self.index.get(id) {
            Some(&slot) => slot,
            None => {
                let slot = self.rows.len();
                self.index.insert(id.clone(), slot);
                self.rows.push(UserStats::discovered(id.clone()));
                slot
            }
        };
        &mut self.rows[slot]
    }

    fn into_rows(self) -> Vec<UserStats> {
        self.rows
    }
}

/// Count wins and losses per identity.
///
/// Output is in first-seen order: profiles first, then identities found
/// only in events (winner before loser, in log order).
pub fn tally(profiles: &[Profile], standing: &[StandingEvent]) -> Vec<UserStats> {
    let mut table = StatsTable::with_capacity(profiles.len());

    for profile in profiles {
        table.seed(profile);
    }

    for event in standing {
        table.entry(event.winner()).wins += 1;
        if let Some(loser) = event.loser() {
            table.entry(loser).losses += 1;
        }
    }

    table.into_rows()
}

/// Sort by wins descending, then losses ascending.
///
/// The sort is stable: rows tied on both keep their input order.
pub fn rank(mut stats: Vec<UserStats>) -> Vec<UserStats> {
    stats.sort_by(|a, b| b.wins.cmp(&a.wins).then(a.losses.cmp(&b.losses)));
    stats
}

/// Full standings table: tally, rank and tier.
pub fn aggregate(profiles: &[Profile], standing: &[StandingEvent]) -> Vec<UserWithTier> {
    assign_tiers(rank(tally(profiles, standing)))
}
