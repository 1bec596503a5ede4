//! Remote data collaborator
//!
//! The reconciler talks to its backend only through the [`Backend`] trait:
//! point-in-time reads of `profiles` and `standing`, insert-and-return on
//! `standing`, profile upsert, password auth and a change feed.

pub mod feed;
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use types::change::{ChangeKind, Relation};
use types::errors::CollaboratorError;
use types::ids::UserId;
use types::profile::Profile;
use types::session::{Credentials, Session};
use types::standing::{NewStandingEvent, StandingEvent};

pub use feed::{FeedHub, FeedItem, Subscription};
pub use memory::InMemoryBackend;
pub use rest::RestBackend;

/// Operations consumed from the backend-as-a-service.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Current auth session, if any.
    async fn get_session(&self) -> Result<Option<Session>, CollaboratorError>;

    /// Single profile row by identity.
    async fn get_profile(&self, id: &UserId) -> Result<Option<Profile>, CollaboratorError>;

    /// Full `profiles` snapshot.
    async fn list_profiles(&self) -> Result<Vec<Profile>, CollaboratorError>;

    /// Full `standing` snapshot, newest `created_at` first.
    async fn list_standing_events(&self) -> Result<Vec<StandingEvent>, CollaboratorError>;

    /// Insert a standing event and return the stored row.
    async fn insert_standing_event(
        &self,
        event: NewStandingEvent,
    ) -> Result<StandingEvent, CollaboratorError>;

    /// Insert or update a profile, conflict target `id`.
    async fn upsert_profile(&self, profile: Profile) -> Result<(), CollaboratorError>;

    /// Open a change-feed subscription on `relation` for `kinds`.
    async fn subscribe(
        &self,
        relation: Relation,
        kinds: &[ChangeKind],
    ) -> Result<Subscription, CollaboratorError>;

    async fn sign_up(&self, credentials: &Credentials) -> Result<(), CollaboratorError>;

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, CollaboratorError>;

    async fn sign_out(&self) -> Result<(), CollaboratorError>;
}
