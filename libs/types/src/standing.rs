//! Standing events: the append-only log of match results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EventId, UserId};

/// One recorded win/loss outcome (a row of the `standing` relation)
///
/// Immutable once created. `created_by` is the winner. A missing loser is
/// legal and contributes only a win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingEvent {
    #[serde(default)]
    pub id: Option<EventId>,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    #[serde(default)]
    pub loser_id: Option<UserId>,
}

impl StandingEvent {
    pub fn new(
        id: Option<EventId>,
        created_at: DateTime<Utc>,
        created_by: impl Into<UserId>,
        loser_id: Option<UserId>,
    ) -> Self {
        Self {
            id,
            created_at,
            created_by: created_by.into(),
            loser_id,
        }
    }

    pub fn winner(&self) -> &UserId {
        &self.created_by
    }

    pub fn loser(&self) -> Option<&UserId> {
        self.loser_id.as_ref()
    }

    /// Winner and loser are the same identity.
    pub fn is_self_match(&self) -> bool {
        self.loser_id.as_ref() == Some(&self.created_by)
    }
}

/// Insert payload for a new standing event
///
/// The backend assigns `id`; `created_at` is stamped by the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStandingEvent {
    pub created_by: UserId,
    pub loser_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl NewStandingEvent {
    pub fn new(created_by: UserId, loser_id: Option<UserId>, created_at: DateTime<Utc>) -> Self {
        Self {
            created_by,
            loser_id,
            created_at,
        }
    }

    /// Materialize the row the backend would return for this payload.
    pub fn into_event(self, id: Option<EventId>) -> StandingEvent {
        StandingEvent {
            id,
            created_at: self.created_at,
            created_by: self.created_by,
            loser_id: self.loser_id,
        }
    }
}

/// Sort events newest first, the order used for display.
///
/// Stable, so events sharing a timestamp keep their relative order.
pub fn sort_newest_first(events: &mut [StandingEvent]) {
    events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
