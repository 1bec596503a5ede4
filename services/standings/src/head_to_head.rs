//! Head-to-head tallies from the viewer's perspective

use std::collections::BTreeMap;

use serde::Serialize;
use types::ids::UserId;
use types::standing::StandingEvent;

/// Per-opponent differential: viewer wins minus opponent wins.
///
/// Uses BTreeMap so iteration order is stable across recomputations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HeadToHead {
    diffs: BTreeMap<UserId, i64>,
}

impl HeadToHead {
    /// Differential against `opponent`, 0 if they never met.
    pub fn against(&self, opponent: &UserId) -> i64 {
        self.diffs.get(opponent).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserId, i64)> {
        self.diffs.iter().map(|(id, diff)| (id, *diff))
    }

    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }
}

/// Render a differential with an explicit sign for positive values.
pub fn format_diff(diff: i64) -> String {
    if diff > 0 {
        format!("+{}", diff)
    } else {
        diff.to_string()
    }
}

/// Tally the viewer's record against every opponent they have met.
///
/// Events without a loser and self-matches carry no head-to-head
/// information and are skipped.
pub fn head_to_head(standing: &[StandingEvent], viewer: Option<&UserId>) -> HeadToHead {
    let mut table = HeadToHead::default();
    let Some(viewer) = viewer else {
        return table;
    };

    for event in standing {
        let Some(loser) = event.loser() else {
            continue;
        };
        if event.is_self_match() {
            continue;
        }

        if event.winner() == viewer {
            *table.diffs.entry(loser.clone()).or_insert(0) += 1;
        } else if loser == viewer {
            *table.diffs.entry(event.winner().clone()).or_insert(0) -= 1;
        }
    }

    table
}
