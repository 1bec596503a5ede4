//! Session/State Reconciler
//!
//! Keeps a local copy of the leaderboard's `profiles` and `standing`
//! relations consistent with the backend:
//! - Full load on start and on sign-in
//! - Optimistic insert of the viewer's own wins
//! - Merge of inbound change notifications, with echo de-duplication
//! - First-name validation and upsert with an identity check
//! - Transient success/error notifications
//!
//! # Architecture
//!
//! ```text
//!            Backend (memory | REST)
//!          │ fetch/insert    │ change feed
//!          │                 │
//!    ┌─────▼──────┐   ┌──────▼──────┐
//!    │ Reconciler │◄──│ LiveSession │◄── LiveHandle commands
//!    └─────┬──────┘   └──────┬──────┘
//!          │                 │
//!   ┌──────┴──────┐    ┌─────▼───────┐
//!   │ SessionCell │    │ View (watch)│
//!   └─────────────┘    └─────────────┘
//!          │
//!    ┌─────▼────────┐
//!    │ Notifications│
//!    └──────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod live;
pub mod names;
pub mod notify;
pub mod reconciler;
pub mod session;
pub mod view;

pub use backend::{Backend, InMemoryBackend, RestBackend};
pub use config::Config;
pub use live::{LiveHandle, LiveSession, RunSummary};
pub use reconciler::{Applied, LoadReport, Reconciler, Snapshot};
pub use session::SessionCell;
pub use view::LeaderboardView;
