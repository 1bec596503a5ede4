//! Derived leaderboard view
//!
//! Combines the standings table with the viewer's head-to-head record into
//! display rows. Rebuilt from the snapshot on demand.

use std::fmt::Write as _;

use serde::Serialize;
use standings::head_to_head::format_diff;
use standings::{aggregate, head_to_head};
use types::ids::UserId;
use types::profile::Profile;
use types::standing::StandingEvent;
use types::stats::UserWithTier;

/// One table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardRow {
    /// 1-based display position
    pub position: usize,
    pub entry: UserWithTier,
    /// Viewer's differential against this player; `None` on the viewer's
    /// own row and when nobody is signed in.
    pub head_to_head: Option<i64>,
}

impl LeaderboardRow {
    pub fn head_to_head_label(&self) -> Option<String> {
        self.head_to_head.map(|diff| format!("({})", format_diff(diff)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeaderboardView {
    pub viewer: Option<UserId>,
    pub rows: Vec<LeaderboardRow>,
}

impl LeaderboardView {
    pub fn build(profiles: &[Profile], standing: &[StandingEvent], viewer: Option<&UserId>) -> Self {
        let diffs = head_to_head(standing, viewer);
        let rows = aggregate(profiles, standing)
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                let head_to_head = match viewer {
                    Some(v) if v != entry.id() => Some(diffs.against(entry.id())),
                    _ => None,
                };
                LeaderboardRow {
                    position: idx + 1,
                    entry,
                    head_to_head,
                }
            })
            .collect();

        Self {
            viewer: viewer.cloned(),
            rows,
        }
    }

    pub fn row_for(&self, id: &UserId) -> Option<&LeaderboardRow> {
        self.rows.iter().find(|r| r.entry.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Plain-text standings table.
    pub fn render(&self) -> String {
        let name_width = self
            .rows
            .iter()
            .map(|r| r.entry.name().chars().count() + r.head_to_head_label().map_or(0, |l| l.len() + 1))
            .max()
            .unwrap_or(0)
            .max("Player".len());

        let mut out = String::new();
        let _ = writeln!(out, "{:<4} {:<name_width$} {:>5} {:>6}  Tier", "#", "Player", "Wins", "Losses");
        for row in &self.rows {
            let player = match row.head_to_head_label() {
                Some(label) => format!("{} {}", row.entry.name(), label),
                None => row.entry.name().to_string(),
            };
            let _ = writeln!(
                out,
                "{:<4} {:<name_width$} {:>5} {:>6}  {}",
                format!("{}.", row.position),
                player,
                row.entry.wins(),
                row.entry.losses(),
                row.entry.tier,
            );
        }
        out
    }
}

/// A choice in the "select loser" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoserOption {
    pub value: UserId,
    pub label: String,
}

/// Every profile except the viewer, labelled with its display name.
pub fn loser_options(profiles: &[Profile], viewer: Option<&UserId>) -> Vec<LoserOption> {
    profiles
        .iter()
        .filter(|p| Some(&p.id) != viewer)
        .map(|p| LoserOption {
            value: p.id.clone(),
            label: p.display_name(),
        })
        .collect()
}
