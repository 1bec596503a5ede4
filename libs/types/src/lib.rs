//! Types library for the leaderboard
//!
//! Shared definitions for the standings engine, the state reconciler and
//! the command-line front end.
//!
//! # Modules
//! - `ids`: User and event identifiers
//! - `profile`: Profile rows
//! - `standing`: Standing events (match results)
//! - `stats`: Derived standings rows and tiers
//! - `session`: Auth session types
//! - `change`: Change-feed events
//! - `errors`: Error taxonomy

pub mod ids;
pub mod profile;
pub mod standing;
pub mod stats;
pub mod session;
pub mod change;
pub mod errors;
