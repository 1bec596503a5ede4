//! Standings Engine
//!
//! Turns the current `(profiles, standing)` snapshot into the ranked,
//! tiered standings table and the viewer's head-to-head record.
//!
//! **Key Invariants:**
//! - Pure functions: no I/O, no state carried between calls
//! - Every identity referenced by an event appears exactly once
//! - Ranking is wins descending, then losses ascending, then first-seen order
//! - Zero wins is always gray, whatever the rank

pub mod aggregation;
pub mod head_to_head;
pub mod tiering;

pub use aggregation::{aggregate, rank, tally};
pub use head_to_head::{head_to_head, HeadToHead};
pub use tiering::assign_tier;
