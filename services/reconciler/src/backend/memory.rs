//! In-process backend
//!
//! Implements the full collaborator contract in memory: password accounts,
//! a single client session, both relations with row-level ownership checks,
//! and a change feed that echoes every write the way the hosted realtime
//! service does. Tests use the call log and failure injection to assert
//! what reached the backend.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use types::change::{ChangeEvent, ChangeKind, Relation};
use types::errors::CollaboratorError;
use types::ids::{EventId, UserId};
use types::profile::Profile;
use types::session::{Credentials, Session};
use types::standing::{sort_newest_first, NewStandingEvent, StandingEvent};

use super::feed::{FeedHub, Subscription, DEFAULT_FEED_CAPACITY};
use super::Backend;

/// Backend operations, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    GetSession,
    GetProfile,
    ListProfiles,
    ListStanding,
    InsertStanding,
    UpsertProfile,
    Subscribe,
    SignUp,
    SignIn,
    SignOut,
}

#[derive(Debug, Clone)]
struct Account {
    id: UserId,
    password: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: BTreeMap<String, Account>,
    session: Option<Session>,
    profiles: Vec<Profile>,
    standing: Vec<StandingEvent>,
    next_event_id: i64,
    next_user: u64,
    failures: BTreeSet<Operation>,
    calls: Vec<Operation>,
}

impl MemoryState {
    /// Log the call and consume a pending injected failure for it.
    fn call(&mut self, op: Operation) -> bool {
        self.calls.push(op);
        self.failures.remove(&op)
    }

    fn next_event_id(&mut self) -> EventId {
        self.next_event_id += 1;
        EventId::new(self.next_event_id)
    }

    fn session_user(&self) -> Option<&UserId> {
        self.session.as_ref().map(Session::user_id)
    }

    fn upsert(&mut self, profile: Profile) -> ChangeKind {
        match self.profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => {
                *existing = profile;
                ChangeKind::Update
            }
            None => {
                self.profiles.push(profile);
                ChangeKind::Insert
            }
        }
    }
}

/// Backend held entirely in process memory.
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
    feed: FeedHub,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    pub fn with_feed_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            feed: FeedHub::new(capacity),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a profile row without touching the feed.
    pub fn seed_profile(&self, profile: Profile) {
        self.state().upsert(profile);
    }

    /// Seed a standing row without touching the feed.
    ///
    /// Rows without an id get the next sequence number.
    pub fn seed_event(&self, mut event: StandingEvent) -> StandingEvent {
        let mut state = self.state();
        match event.id {
            Some(id) => state.next_event_id = state.next_event_id.max(id.value()),
            None => event.id = Some(state.next_event_id()),
        }
        state.standing.push(event.clone());
        event
    }

    /// Register an account and return its identity.
    pub fn seed_account(&self, credentials: &Credentials) -> UserId {
        let mut state = self.state();
        Self::create_account(&mut state, credentials)
    }

    /// Make the next call of `op` fail.
    pub fn fail_next(&self, op: Operation) {
        self.state().failures.insert(op);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<Operation> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, op: Operation) -> usize {
        self.state().calls.iter().filter(|&&c| c == op).count()
    }

    pub fn standing_rows(&self) -> Vec<StandingEvent> {
        self.state().standing.clone()
    }

    pub fn profile_rows(&self) -> Vec<Profile> {
        self.state().profiles.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    /// Store a result on behalf of another client and broadcast it.
    pub fn insert_remote(&self, event: NewStandingEvent) -> StandingEvent {
        let stored = {
            let mut state = self.state();
            let id = state.next_event_id();
            let stored = event.into_event(Some(id));
            state.standing.push(stored.clone());
            stored
        };
        self.feed.publish(ChangeEvent::standing_insert(stored.clone()));
        stored
    }

    /// Upsert a profile on behalf of another client and broadcast it.
    pub fn upsert_remote(&self, profile: Profile) {
        let kind = self.state().upsert(profile.clone());
        self.feed.publish(ChangeEvent::profile_change(kind, Some(profile)));
    }

    /// Broadcast an arbitrary change without storing anything.
    pub fn publish(&self, change: ChangeEvent) -> usize {
        self.feed.publish(change)
    }

    fn create_account(state: &mut MemoryState, credentials: &Credentials) -> UserId {
        state.next_user += 1;
        let id = UserId::new(format!("user-{:08x}-{:04}", state.next_user, state.next_user));
        state.accounts.insert(
            credentials.email.clone(),
            Account {
                id: id.clone(),
                password: credentials.password.clone(),
            },
        );
        state.upsert(Profile {
            id: id.clone(),
            first_name: None,
        });
        id
    }

    fn injected(op: Operation) -> String {
        format!("injected failure: {:?}", op)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>, CollaboratorError> {
        let mut state = self.state();
        if state.call(Operation::GetSession) {
            return Err(CollaboratorError::Auth {
                message: Self::injected(Operation::GetSession),
            });
        }
        Ok(state.session.clone())
    }

    async fn get_profile(&self, id: &UserId) -> Result<Option<Profile>, CollaboratorError> {
        let mut state = self.state();
        if state.call(Operation::GetProfile) {
            return Err(CollaboratorError::Fetch {
                relation: Relation::Profiles,
                message: Self::injected(Operation::GetProfile),
            });
        }
        Ok(state.profiles.iter().find(|p| &p.id == id).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, CollaboratorError> {
        let mut state = self.state();
        if state.call(Operation::ListProfiles) {
            return Err(CollaboratorError::Fetch {
                relation: Relation::Profiles,
                message: Self::injected(Operation::ListProfiles),
            });
        }
        Ok(state.profiles.clone())
    }

    async fn list_standing_events(&self) -> Result<Vec<StandingEvent>, CollaboratorError> {
        let mut state = self.state();
        if state.call(Operation::ListStanding) {
            return Err(CollaboratorError::Fetch {
                relation: Relation::Standing,
                message: Self::injected(Operation::ListStanding),
            });
        }
        // Rows are appended in insertion order; newest-first on equal
        // timestamps means reversing before the stable sort.
        let mut rows: Vec<StandingEvent> = state.standing.iter().rev().cloned().collect();
        sort_newest_first(&mut rows);
        Ok(rows)
    }

    async fn insert_standing_event(
        &self,
        event: NewStandingEvent,
    ) -> Result<StandingEvent, CollaboratorError> {
        let stored = {
            let mut state = self.state();
            if state.call(Operation::InsertStanding) {
                return Err(CollaboratorError::Insert {
                    message: Self::injected(Operation::InsertStanding),
                });
            }
            if state.session_user() != Some(&event.created_by) {
                warn!(created_by = %event.created_by, "Insert rejected by row-level policy");
                return Err(CollaboratorError::Insert {
                    message: "new row violates row-level security policy for table \"standing\""
                        .to_string(),
                });
            }
            let id = state.next_event_id();
            let stored = event.into_event(Some(id));
            state.standing.push(stored.clone());
            stored
        };

        self.feed.publish(ChangeEvent::standing_insert(stored.clone()));
        Ok(stored)
    }

    async fn upsert_profile(&self, profile: Profile) -> Result<(), CollaboratorError> {
        let kind = {
            let mut state = self.state();
            if state.call(Operation::UpsertProfile) {
                return Err(CollaboratorError::Upsert {
                    message: Self::injected(Operation::UpsertProfile),
                });
            }
            if state.session_user() != Some(&profile.id) {
                warn!(id = %profile.id, "Upsert rejected by row-level policy");
                return Err(CollaboratorError::Upsert {
                    message: "new row violates row-level security policy for table \"profiles\""
                        .to_string(),
                });
            }
            state.upsert(profile.clone())
        };

        self.feed
            .publish(ChangeEvent::profile_change(kind, Some(profile)));
        Ok(())
    }

    async fn subscribe(
        &self,
        relation: Relation,
        kinds: &[ChangeKind],
    ) -> Result<Subscription, CollaboratorError> {
        if self.state().call(Operation::Subscribe) {
            return Err(CollaboratorError::Subscribe {
                relation,
                message: Self::injected(Operation::Subscribe),
            });
        }
        Ok(self.feed.subscribe(relation, kinds))
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<(), CollaboratorError> {
        let created = {
            let mut state = self.state();
            if state.call(Operation::SignUp) {
                return Err(CollaboratorError::Auth {
                    message: Self::injected(Operation::SignUp),
                });
            }
            if state.accounts.contains_key(&credentials.email) {
                return Err(CollaboratorError::Auth {
                    message: "User already registered".to_string(),
                });
            }
            let id = Self::create_account(&mut state, credentials);
            info!(user = %id, "Account created");
            Profile {
                id,
                first_name: None,
            }
        };

        self.feed
            .publish(ChangeEvent::profile_change(ChangeKind::Insert, Some(created)));
        Ok(())
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, CollaboratorError> {
        let mut state = self.state();
        if state.call(Operation::SignIn) {
            return Err(CollaboratorError::Auth {
                message: Self::injected(Operation::SignIn),
            });
        }

        let account = match state.accounts.get(&credentials.email) {
            Some(account) if account.password == credentials.password => account.clone(),
            _ => {
                return Err(CollaboratorError::Auth {
                    message: "Invalid login credentials".to_string(),
                })
            }
        };

        let session = Session::new(
            format!("token-{}", account.id),
            account.id,
            Some(credentials.email.clone()),
        );
        state.session = Some(session.clone());
        debug!(user = %session.user_id(), "Signed in");
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), CollaboratorError> {
        let mut state = self.state();
        if state.call(Operation::SignOut) {
            return Err(CollaboratorError::Auth {
                message: Self::injected(Operation::SignOut),
            });
        }
        state.session = None;
        Ok(())
    }
}
