//! Identifier types for leaderboard entities
//!
//! User identities are opaque strings owned by the auth backend. Standing
//! events carry a numeric sequence assigned by the backend on insert.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of characters used for the fallback display name.
pub const SHORT_ID_LEN: usize = 6;

/// Opaque user identifier
///
/// The identity is the ownership key for profiles and the winner/loser
/// reference in standing events. No format is assumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fallback display name: the first six characters of the identity.
    ///
    /// Counts characters rather than bytes so multi-byte identities never
    /// split a code point.
    pub fn short(&self) -> String {
        self.0.chars().take(SHORT_ID_LEN).collect()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Backend-assigned sequence number of a standing event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(i64);

impl EventId {
    pub fn new(seq: i64) -> Self {
        Self(seq)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
