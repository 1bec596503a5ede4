//! Error types for the leaderboard
//!
//! Three families, matching how failures surface to the user:
//! validation (rejected before any remote call), collaborator (the backend
//! failed) and authentication mismatch (fatal to the operation).

use thiserror::Error;

use crate::change::Relation;

/// Top-level leaderboard error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LeaderboardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl LeaderboardError {
    /// Whether the failure happened before any remote call was made.
    pub fn is_validation(&self) -> bool {
        matches!(self, LeaderboardError::Validation(_))
    }
}

/// Invalid user input, rejected locally
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("You must be signed in to add wins")]
    NotSignedIn,

    #[error("Please select a user to record a loss for")]
    NoLoserSelected,

    #[error("You cannot mark yourself as the loser")]
    SelfAsLoser,

    #[error("Please enter your first name")]
    EmptyName,

    #[error("Name contains invalid characters. Allowed: letters, digits and space")]
    InvalidNameCharacters,
}

/// Failures reported by the remote data collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("Failed to fetch {relation}: {message}")]
    Fetch { relation: Relation, message: String },

    #[error("Insert failed: {message}")]
    Insert { message: String },

    #[error("Failed to save name: {message}")]
    Upsert { message: String },

    #[error("{message}")]
    Auth { message: String },

    #[error("Subscription to {relation} failed: {message}")]
    Subscribe { relation: Relation, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Acting identity does not match the current session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication mismatch. Please sign out and sign in again.")]
    Mismatch {
        acting: String,
        session: Option<String>,
    },
}
