//! Derived standings types
//!
//! Nothing here is persisted. Rows are recomputed from the current
//! `(profiles, standing)` snapshot on every change.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::UserId;

/// Per-identity win/loss totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub id: UserId,
    pub name: String,
    pub wins: u32,
    pub losses: u32,
}

impl UserStats {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            wins: 0,
            losses: 0,
        }
    }

    /// Row for an identity discovered only through events.
    pub fn discovered(id: UserId) -> Self {
        let name = id.short();
        Self::new(id, name)
    }
}

/// Cosmetic rank-derived category controlling display color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Orange,
    Purple,
    Blue,
    Green,
    White,
    Gray,
}

impl Tier {
    /// Tiers reserved for the top four ranks, best first.
    pub const PODIUM: [Tier; 4] = [Tier::Orange, Tier::Purple, Tier::Blue, Tier::Green];

    /// Fixed display color for this tier.
    pub fn color(self) -> &'static str {
        match self {
            Tier::Orange => "#ff8c00",
            Tier::Purple => "#a855f7",
            Tier::Blue => "#3b82f6",
            Tier::Green => "#22c55e",
            Tier::White => "#ffffff",
            Tier::Gray => "#94a3b8",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Orange => "orange",
            Tier::Purple => "purple",
            Tier::Blue => "blue",
            Tier::Green => "green",
            Tier::White => "white",
            Tier::Gray => "gray",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ranked standings row with its tier badge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWithTier {
    #[serde(flatten)]
    pub stats: UserStats,
    pub tier: Tier,
    pub tier_color: String,
}

impl UserWithTier {
    pub fn new(stats: UserStats, tier: Tier) -> Self {
        Self {
            stats,
            tier,
            tier_color: tier.color().to_string(),
        }
    }

    pub fn id(&self) -> &UserId {
        &self.stats.id
    }

    pub fn name(&self) -> &str {
        &self.stats.name
    }

    pub fn wins(&self) -> u32 {
        self.stats.wins
    }

    pub fn losses(&self) -> u32 {
        self.stats.losses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_colors() {
        assert_eq!(Tier::Orange.color(), "#ff8c00");
        assert_eq!(Tier::Purple.color(), "#a855f7");
        assert_eq!(Tier::Blue.color(), "#3b82f6");
        assert_eq!(Tier::Green.color(), "#22c55e");
        assert_eq!(Tier::White.color(), "#ffffff");
        assert_eq!(Tier::Gray.color(), "#94a3b8");
    }

    #[test]
    fn test_tier_serialization() {
        assert_eq!(serde_json::to_string(&Tier::Purple).unwrap(), "\"purple\"");
        assert_eq!(Tier::Gray.to_string(), "gray");
    }

    #[test]
    fn test_discovered_uses_short_name() {
        let s = UserStats::discovered(UserId::new("0123456789"));
        assert_eq!(s.name, "012345");
        assert_eq!((s.wins, s.losses), (0, 0));
    }

    #[test]
    fn test_user_with_tier_flattens() {
        let row = UserWithTier::new(UserStats::new(UserId::new("a"), "Alice"), Tier::Orange);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["id"], "a");
        assert_eq!(json["name"], "Alice");
        assert_eq!(json["tier"], "orange");
        assert_eq!(json["tier_color"], "#ff8c00");
    }
}
