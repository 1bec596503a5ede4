//! Change-feed event definitions
//!
//! The backend pushes one `ChangeEvent` per row change on a subscribed
//! relation. Payloads carry the new row when the backend provides it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::profile::Profile;
use crate::standing::StandingEvent;

/// Relations mirrored by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Profiles,
    Standing,
}

impl Relation {
    /// Table name on the backend.
    pub fn table(self) -> &'static str {
        match self {
            Relation::Profiles => "profiles",
            Relation::Standing => "standing",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Every kind, for subscriptions that want all changes.
    pub const ALL: [ChangeKind; 3] = [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete];
}

/// Row payload of a change event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "row", rename_all = "snake_case")]
pub enum ChangeRecord {
    Profile(Profile),
    Standing(StandingEvent),
    /// The backend sent no new row (e.g. deletes).
    Empty,
}

/// A single change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub relation: Relation,
    pub kind: ChangeKind,
    pub record: ChangeRecord,
}

impl ChangeEvent {
    pub fn standing_insert(event: StandingEvent) -> Self {
        Self {
            relation: Relation::Standing,
            kind: ChangeKind::Insert,
            record: ChangeRecord::Standing(event),
        }
    }

    pub fn profile_change(kind: ChangeKind, profile: Option<Profile>) -> Self {
        Self {
            relation: Relation::Profiles,
            kind,
            record: profile.map_or(ChangeRecord::Empty, ChangeRecord::Profile),
        }
    }

    /// The inserted/updated standing row, if this event carries one.
    pub fn standing_row(&self) -> Option<&StandingEvent> {
        match &self.record {
            ChangeRecord::Standing(event) => Some(event),
            _ => None,
        }
    }

    /// Label for logging, e.g. `standing:INSERT`.
    pub fn label(&self) -> String {
        let kind = match self.kind {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        };
        format!("{}:{}", self.relation, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{EventId, UserId};
    use chrono::{TimeZone, Utc};

    fn sample_event() -> StandingEvent {
        StandingEvent::new(
            Some(EventId::new(3)),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            "a",
            Some(UserId::new("b")),
        )
    }

    #[test]
    fn test_standing_insert_accessors() {
        let change = ChangeEvent::standing_insert(sample_event());
        assert_eq!(change.relation, Relation::Standing);
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.standing_row().unwrap().id, Some(EventId::new(3)));
        assert_eq!(change.label(), "standing:INSERT");
    }

    #[test]
    fn test_profile_change_without_row() {
        let change = ChangeEvent::profile_change(ChangeKind::Delete, None);
        assert_eq!(change.record, ChangeRecord::Empty);
        assert!(change.standing_row().is_none());
        assert_eq!(change.label(), "profiles:DELETE");
    }

    #[test]
    fn test_change_event_json_shape() {
        let change = ChangeEvent::standing_insert(sample_event());
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["relation"], "standing");
        assert_eq!(json["kind"], "INSERT");
        assert_eq!(json["record"]["type"], "standing");
        assert_eq!(json["record"]["row"]["created_by"], "a");
    }
}
