//! Session/State Reconciler
//!
//! Keeps the local `profiles` and `standing` snapshots consistent with the
//! backend. Three paths mutate them: a full load, the local optimistic
//! insert of a win, and inbound change notifications. Every mutation takes
//! `&mut self` and completes before returning, so a caller never observes
//! a half-applied update.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use types::change::{ChangeEvent, ChangeKind, ChangeRecord, Relation};
use types::errors::{AuthError, CollaboratorError, LeaderboardError, ValidationError};
use types::ids::{EventId, UserId};
use types::profile::Profile;
use types::session::Credentials;
use types::standing::{NewStandingEvent, StandingEvent};
use types::stats::UserWithTier;

use standings::{aggregate, head_to_head, HeadToHead};

use crate::backend::Backend;
use crate::config::ReconcilerConfig;
use crate::names::validate_first_name;
use crate::notify::Notifier;
use crate::session::SessionCell;
use crate::view::{loser_options, LeaderboardView, LoserOption};

pub const SIGN_UP_MESSAGE: &str =
    "Sign-up successful! Please check your email to confirm your account.";

/// Local copy of both relations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub profiles: Vec<Profile>,
    /// Newest first
    pub standing: Vec<StandingEvent>,
}

/// Outcome of a load: which fetches failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub failures: Vec<CollaboratorError>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What `apply` did with a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A standing row was prepended.
    Prepended,
    /// The row is already held locally (echo of our own insert).
    Duplicate,
    /// The profiles relation was re-fetched.
    ProfilesRefreshed,
    /// Nothing to do for this change.
    Ignored,
}

pub struct Reconciler<B: Backend> {
    backend: Arc<B>,
    session: SessionCell,
    notifier: Option<Notifier>,
    config: ReconcilerConfig,
    snapshot: Snapshot,
    first_name: Option<String>,
    known_events: HashSet<EventId>,
}

impl<B: Backend> Reconciler<B> {
    pub fn new(backend: Arc<B>, session: SessionCell, config: ReconcilerConfig) -> Self {
        Self {
            backend,
            session,
            notifier: None,
            config,
            snapshot: Snapshot::default(),
            first_name: None,
            known_events: HashSet::new(),
        }
    }

    /// Publish success and failure messages through `notifier`.
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn session_cell(&self) -> &SessionCell {
        &self.session
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The viewer's own first name, if known.
    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    pub fn viewer(&self) -> Option<UserId> {
        self.session.viewer()
    }

    // === Loading ===

    /// Fetch session, profiles and standing.
    ///
    /// Each relation that fetches successfully replaces its local copy;
    /// a failed fetch is logged and leaves the prior state.
    pub async fn load(&mut self) -> LoadReport {
        let mut report = LoadReport::default();
        for result in [
            self.refresh_session().await,
            self.refresh_profiles().await,
            self.refresh_standing().await,
        ] {
            if let Err(e) = result {
                report.failures.push(e);
            }
        }

        info!(
            profiles = self.snapshot.profiles.len(),
            standing = self.snapshot.standing.len(),
            signed_in = self.session.is_signed_in(),
            failures = report.failures.len(),
            "Initial load complete"
        );
        report
    }

    /// Re-read the session and, if signed in, the viewer's first name.
    pub async fn refresh_session(&mut self) -> Result<(), CollaboratorError> {
        let session = self.backend.get_session().await.map_err(|e| {
            warn!(error = %e, "Session fetch failed");
            self.notify_failure(&e);
            e
        })?;
        self.session.set(session);
        self.refresh_first_name().await
    }

    async fn refresh_first_name(&mut self) -> Result<(), CollaboratorError> {
        let Some(viewer) = self.session.viewer() else {
            self.first_name = None;
            return Ok(());
        };
        match self.backend.get_profile(&viewer).await {
            Ok(profile) => {
                self.first_name = profile.and_then(|p| p.first_name);
                Ok(())
            }
            Err(e) => {
                warn!(viewer = %viewer, error = %e, "Profile fetch failed");
                self.notify_failure(&e);
                Err(e)
            }
        }
    }

    pub async fn refresh_profiles(&mut self) -> Result<(), CollaboratorError> {
        match self.backend.list_profiles().await {
            Ok(profiles) => {
                debug!(count = profiles.len(), "Profiles replaced");
                self.snapshot.profiles = profiles;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Profiles fetch failed, keeping prior state");
                self.notify_failure(&e);
                Err(e)
            }
        }
    }

    pub async fn refresh_standing(&mut self) -> Result<(), CollaboratorError> {
        match self.backend.list_standing_events().await {
            Ok(standing) => {
                self.known_events = standing.iter().filter_map(|e| e.id).collect();
                debug!(count = standing.len(), "Standing replaced");
                self.snapshot.standing = standing;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Standing fetch failed, keeping prior state");
                self.notify_failure(&e);
                Err(e)
            }
        }
    }

    // === Mutations ===

    /// Record a win of the signed-in user over `loser`.
    ///
    /// Validation happens before any remote call. On success the stored
    /// row is prepended immediately; on failure local state is unchanged.
    pub async fn submit_win(
        &mut self,
        loser: Option<&UserId>,
    ) -> Result<StandingEvent, LeaderboardError> {
        let result = self.try_submit_win(loser).await;
        if result.is_ok() {
            self.notify_success("Win recorded");
        }
        self.report(result)
    }

    async fn try_submit_win(
        &mut self,
        loser: Option<&UserId>,
    ) -> Result<StandingEvent, LeaderboardError> {
        let winner = self.session.viewer().ok_or(ValidationError::NotSignedIn)?;
        let loser = loser.ok_or(ValidationError::NoLoserSelected)?;
        if loser == &winner {
            return Err(ValidationError::SelfAsLoser.into());
        }

        let new = NewStandingEvent::new(winner, Some(loser.clone()), Utc::now());
        let stored = self.backend.insert_standing_event(new).await?;

        info!(
            event_id = ?stored.id.map(|id| id.value()),
            winner = %stored.created_by,
            loser = %loser,
            "Win recorded"
        );
        self.prepend(stored.clone());
        Ok(stored)
    }

    /// Merge one inbound change notification.
    pub async fn apply(&mut self, change: ChangeEvent) -> Result<Applied, LeaderboardError> {
        match (change.relation, change.kind) {
            (Relation::Standing, ChangeKind::Insert) => Ok(self.apply_standing_insert(change)),
            (Relation::Profiles, _) => {
                self.refresh_profiles().await?;
                Ok(Applied::ProfilesRefreshed)
            }
            _ => {
                debug!(change = %change.label(), "Change ignored");
                Ok(Applied::Ignored)
            }
        }
    }

    fn apply_standing_insert(&mut self, change: ChangeEvent) -> Applied {
        let ChangeRecord::Standing(event) = change.record else {
            warn!(change = %change.label(), "Standing insert without payload");
            return Applied::Ignored;
        };

        if self.config.dedup_events {
            if let Some(id) = event.id {
                if self.known_events.contains(&id) {
                    debug!(event_id = id.value(), "Duplicate standing insert skipped");
                    return Applied::Duplicate;
                }
            }
        }

        debug!(event_id = ?event.id.map(|id| id.value()), winner = %event.created_by, "Remote standing insert");
        self.prepend(event);
        Applied::Prepended
    }

    fn prepend(&mut self, event: StandingEvent) {
        if let Some(id) = event.id {
            self.known_events.insert(id);
        }
        self.snapshot.standing.insert(0, event);
    }

    /// Validate and store the first name of `acting`.
    ///
    /// `acting` must be the signed-in identity as reported by the backend.
    pub async fn set_first_name(
        &mut self,
        acting: &UserId,
        raw: &str,
    ) -> Result<String, LeaderboardError> {
        let result = self.try_set_first_name(acting, raw).await;
        if result.is_ok() {
            self.notify_success("Name saved");
        }
        self.report(result)
    }

    async fn try_set_first_name(
        &mut self,
        acting: &UserId,
        raw: &str,
    ) -> Result<String, LeaderboardError> {
        let name = validate_first_name(raw)?;

        let session = self.backend.get_session().await?;
        let session_user = session.as_ref().map(|s| s.user_id().clone());
        if session_user.as_ref() != Some(acting) {
            warn!(
                acting = %acting,
                session = ?session_user.as_ref().map(UserId::as_str),
                "Authentication mismatch"
            );
            return Err(AuthError::Mismatch {
                acting: acting.to_string(),
                session: session_user.map(|id| id.to_string()),
            }
            .into());
        }

        let profile = Profile {
            id: acting.clone(),
            first_name: Some(name.clone()),
        };
        self.backend.upsert_profile(profile.clone()).await?;

        match self.snapshot.profiles.iter_mut().find(|p| p.id == *acting) {
            Some(existing) => existing.first_name = Some(name.clone()),
            None => self.snapshot.profiles.push(profile),
        }
        self.first_name = Some(name.clone());
        info!(user = %acting, "First name saved");
        Ok(name)
    }

    // === Auth ===

    pub async fn sign_up(&mut self, credentials: &Credentials) -> Result<(), LeaderboardError> {
        let result = self
            .backend
            .sign_up(credentials)
            .await
            .map_err(LeaderboardError::from);
        if result.is_ok() {
            info!(email = %credentials.email, "Signed up");
            self.notify_success(SIGN_UP_MESSAGE);
        }
        self.report(result)
    }

    /// Sign in, then re-read the viewer's name and the profiles relation.
    pub async fn sign_in(&mut self, credentials: &Credentials) -> Result<UserId, LeaderboardError> {
        let session = match self.backend.sign_in_with_password(credentials).await {
            Ok(session) => session,
            Err(e) => return self.report(Err(e.into())),
        };
        let viewer = session.user_id().clone();
        self.session.set(Some(session));
        info!(user = %viewer, "Signed in");

        self.resync_viewer().await;
        Ok(viewer)
    }

    /// Re-read the viewer's first name and the profiles relation after a
    /// session transition. Failures are reported and leave prior state.
    pub async fn resync_viewer(&mut self) {
        let _ = self.refresh_first_name().await;
        let _ = self.refresh_profiles().await;
    }

    /// Sign out. The local session is cleared even if the backend call fails.
    pub async fn sign_out(&mut self) -> Result<(), LeaderboardError> {
        let result = self.backend.sign_out().await.map_err(LeaderboardError::from);
        self.session.clear();
        self.first_name = None;
        info!("Signed out");
        self.report(result)
    }

    /// Signed in with no first name on file.
    pub fn needs_first_name(&self) -> bool {
        self.session.is_signed_in()
            && self
                .first_name
                .as_deref()
                .map_or(true, |name| name.trim().is_empty())
    }

    // === Derived ===

    pub fn standings(&self) -> Vec<UserWithTier> {
        aggregate(&self.snapshot.profiles, &self.snapshot.standing)
    }

    pub fn head_to_head(&self) -> HeadToHead {
        head_to_head(&self.snapshot.standing, self.session.viewer().as_ref())
    }

    pub fn view(&self) -> LeaderboardView {
        LeaderboardView::build(
            &self.snapshot.profiles,
            &self.snapshot.standing,
            self.session.viewer().as_ref(),
        )
    }

    pub fn loser_options(&self) -> Vec<LoserOption> {
        loser_options(&self.snapshot.profiles, self.session.viewer().as_ref())
    }

    // === Notifications ===

    fn notify_success(&self, message: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.success(message);
        }
    }

    /// Fetch failures have no caller-facing result in the live loop, so
    /// they surface here.
    fn notify_failure(&self, error: &CollaboratorError) {
        if let Some(notifier) = &self.notifier {
            notifier.error(error.to_string());
        }
    }

    fn report<T>(&self, result: Result<T, LeaderboardError>) -> Result<T, LeaderboardError> {
        if let Err(e) = &result {
            if !e.is_validation() {
                warn!(error = %e, "Operation failed");
            }
            if let Some(notifier) = &self.notifier {
                notifier.error(e.to_string());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Operation;
    use crate::backend::InMemoryBackend;
    use chrono::TimeZone;
    use types::stats::Tier;

    fn at(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    struct Fixture {
        backend: Arc<InMemoryBackend>,
        alice: UserId,
        bob: UserId,
        alice_creds: Credentials,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(InMemoryBackend::new());
        let alice_creds = Credentials::new("alice@example.com", "pw-a");
        let alice = backend.seed_account(&alice_creds);
        let bob = backend.seed_account(&Credentials::new("bob@example.com", "pw-b"));
        Fixture {
            backend,
            alice,
            bob,
            alice_creds,
        }
    }

    fn reconciler(backend: &Arc<InMemoryBackend>) -> Reconciler<InMemoryBackend> {
        Reconciler::new(backend.clone(), SessionCell::new(), ReconcilerConfig::default())
    }

    #[tokio::test]
    async fn test_load_replaces_state() {
        let f = fixture();
        f.backend
            .seed_event(StandingEvent::new(None, at(0), f.alice.clone(), Some(f.bob.clone())));

        let mut rec = reconciler(&f.backend);
        let report = rec.load().await;
        assert!(report.is_complete());
        assert_eq!(rec.snapshot().profiles.len(), 2);
        assert_eq!(rec.snapshot().standing.len(), 1);
        assert_eq!(rec.viewer(), None);
    }

    #[tokio::test]
    async fn test_load_keeps_prior_state_on_failure() {
        let f = fixture();
        let mut rec = reconciler(&f.backend);
        rec.load().await;
        assert_eq!(rec.snapshot().profiles.len(), 2);

        f.backend.fail_next(Operation::ListProfiles);
        let report = rec.load().await;
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0],
            CollaboratorError::Fetch {
                relation: Relation::Profiles,
                ..
            }
        ));
        assert_eq!(rec.snapshot().profiles.len(), 2);
    }

    #[tokio::test]
    async fn test_submit_win_requires_sign_in() {
        let f = fixture();
        let mut rec = reconciler(&f.backend);
        let err = rec.submit_win(Some(&f.bob)).await.unwrap_err();
        assert_eq!(err, LeaderboardError::Validation(ValidationError::NotSignedIn));
        assert_eq!(f.backend.call_count(Operation::InsertStanding), 0);
    }

    #[tokio::test]
    async fn test_submit_win_validation_order() {
        let f = fixture();
        let mut rec = reconciler(&f.backend);
        rec.sign_in(&f.alice_creds).await.unwrap();

        let err = rec.submit_win(None).await.unwrap_err();
        assert_eq!(err, LeaderboardError::from(ValidationError::NoLoserSelected));

        let alice = f.alice.clone();
        let err = rec.submit_win(Some(&alice)).await.unwrap_err();
        assert_eq!(err, LeaderboardError::from(ValidationError::SelfAsLoser));

        assert_eq!(f.backend.call_count(Operation::InsertStanding), 0);
        assert!(rec.snapshot().standing.is_empty());
    }

    #[tokio::test]
    async fn test_submit_win_prepends_stored_row() {
        let f = fixture();
        f.backend
            .seed_event(StandingEvent::new(None, at(0), f.bob.clone(), Some(f.alice.clone())));
        let mut rec = reconciler(&f.backend);
        rec.load().await;
        rec.sign_in(&f.alice_creds).await.unwrap();

        let stored = rec.submit_win(Some(&f.bob)).await.unwrap();
        assert!(stored.id.is_some());
        assert_eq!(rec.snapshot().standing.len(), 2);
        assert_eq!(rec.snapshot().standing[0], stored);

        let rows = rec.standings();
        assert!(rows.iter().all(|r| r.wins() == 1 && r.losses() == 1));
        assert_eq!(rows[0].tier, Tier::Orange);
    }

    #[tokio::test]
    async fn test_apply_ignores_standing_updates() {
        let f = fixture();
        let mut rec = reconciler(&f.backend);
        let event = StandingEvent::new(None, at(0), f.alice.clone(), Some(f.bob.clone()));
        let change = ChangeEvent {
            relation: Relation::Standing,
            kind: ChangeKind::Delete,
            record: ChangeRecord::Standing(event),
        };
        assert_eq!(rec.apply(change).await.unwrap(), Applied::Ignored);
        assert!(rec.snapshot().standing.is_empty());
    }

    #[tokio::test]
    async fn test_events_without_id_always_prepended() {
        let f = fixture();
        let mut rec = reconciler(&f.backend);
        let event = StandingEvent::new(None, at(0), f.alice.clone(), Some(f.bob.clone()));

        for _ in 0..2 {
            let applied = rec
                .apply(ChangeEvent::standing_insert(event.clone()))
                .await
                .unwrap();
            assert_eq!(applied, Applied::Prepended);
        }
        assert_eq!(rec.snapshot().standing.len(), 2);
    }

    #[tokio::test]
    async fn test_set_first_name_updates_local_row() {
        let f = fixture();
        let mut rec = reconciler(&f.backend);
        rec.load().await;
        rec.sign_in(&f.alice_creds).await.unwrap();
        assert!(rec.needs_first_name());

        let alice = f.alice.clone();
        let name = rec.set_first_name(&alice, "  Alice ").await.unwrap();
        assert_eq!(name, "Alice");
        assert_eq!(rec.first_name(), Some("Alice"));
        assert!(!rec.needs_first_name());

        let row = rec
            .snapshot()
            .profiles
            .iter()
            .find(|p| p.id == f.alice)
            .unwrap();
        assert_eq!(row.display_name(), "Alice");
    }

    #[tokio::test]
    async fn test_set_first_name_rejects_before_remote_call() {
        let f = fixture();
        let mut rec = reconciler(&f.backend);
        rec.sign_in(&f.alice_creds).await.unwrap();

        let alice = f.alice.clone();
        let err = rec.set_first_name(&alice, "   ").await.unwrap_err();
        assert_eq!(err, LeaderboardError::from(ValidationError::EmptyName));
        let err = rec.set_first_name(&alice, "Bob!").await.unwrap_err();
        assert_eq!(err, LeaderboardError::from(ValidationError::InvalidNameCharacters));
        assert_eq!(f.backend.call_count(Operation::UpsertProfile), 0);
    }

    #[tokio::test]
    async fn test_sign_out_clears_viewer_state() {
        let f = fixture();
        let mut rec = reconciler(&f.backend);
        rec.sign_in(&f.alice_creds).await.unwrap();
        let alice = f.alice.clone();
        rec.set_first_name(&alice, "Alice").await.unwrap();

        rec.sign_out().await.unwrap();
        assert_eq!(rec.viewer(), None);
        assert_eq!(rec.first_name(), None);
        assert!(!rec.needs_first_name());
    }

    #[tokio::test]
    async fn test_sign_in_failure_keeps_signed_out() {
        let f = fixture();
        let mut rec = reconciler(&f.backend);
        let err = rec
            .sign_in(&Credentials::new("alice@example.com", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert!(!rec.session_cell().is_signed_in());
    }

    #[tokio::test]
    async fn test_loser_options_and_head_to_head() {
        let f = fixture();
        let mut rec = reconciler(&f.backend);
        rec.load().await;
        rec.sign_in(&f.alice_creds).await.unwrap();
        rec.submit_win(Some(&f.bob)).await.unwrap();

        let options = rec.loser_options();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].value, f.bob);
        assert_eq!(rec.head_to_head().against(&f.bob), 1);
        assert_eq!(rec.view().row_for(&f.bob).unwrap().head_to_head, Some(1));
    }

    #[tokio::test]
    async fn test_resync_failure_notifies() {
        let f = fixture();
        let (notifier, center) = crate::notify::channel(&crate::config::NotifyConfig::default());
        let mut shown = center.watch();
        tokio::spawn(center.run());
        let mut rec = reconciler(&f.backend).with_notifier(notifier);

        f.backend.fail_next(Operation::ListProfiles);
        assert_eq!(rec.sign_in(&f.alice_creds).await.unwrap(), f.alice);

        shown.changed().await.unwrap();
        let active = shown.borrow_and_update().clone();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, crate::notify::NotificationKind::Error);
        assert!(active[0].message.contains("ListProfiles"));
    }
}
