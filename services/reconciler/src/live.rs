//! Live session event loop
//!
//! Runs a [`Reconciler`] against the change feed. One task owns the
//! reconciler; feed changes, session transitions and commands from
//! [`LiveHandle`]s are handled one at a time, so every reaction applies
//! its full update before the next one starts.
//!
//! ```text
//!   standing feed ──┐
//!   profiles feed ──┤
//!   session cell  ──┼──► LiveSession::run ──► Reconciler ──► watch<LeaderboardView>
//!   LiveHandle    ──┤
//!   shutdown      ──┘
//! ```

use std::future::Future;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use types::change::{ChangeKind, Relation};
use types::errors::{CollaboratorError, LeaderboardError};
use types::ids::UserId;
use types::session::Credentials;
use types::standing::StandingEvent;

use crate::backend::{Backend, FeedItem, Subscription};
use crate::reconciler::{Applied, LoadReport, Reconciler, Snapshot};
use crate::view::LeaderboardView;

/// Both feed subscriptions of a live session.
///
/// Dropping the guard releases them.
pub struct Subscriptions {
    pub standing: Subscription,
    pub profiles: Subscription,
}

impl Subscriptions {
    /// Standing inserts and every profiles change.
    pub async fn acquire<B: Backend + ?Sized>(backend: &B) -> Result<Self, CollaboratorError> {
        let standing = backend
            .subscribe(Relation::Standing, &[ChangeKind::Insert])
            .await?;
        let profiles = backend.subscribe(Relation::Profiles, &ChangeKind::ALL).await?;
        debug!("Feed subscriptions acquired");
        Ok(Self { standing, profiles })
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        debug!("Feed subscriptions released");
    }
}

/// Requests handled by the live loop.
#[derive(Debug)]
pub enum Command {
    SubmitWin {
        loser: Option<UserId>,
        reply: oneshot::Sender<Result<StandingEvent, LeaderboardError>>,
    },
    SetFirstName {
        acting: UserId,
        name: String,
        reply: oneshot::Sender<Result<String, LeaderboardError>>,
    },
    SignIn {
        credentials: Credentials,
        reply: oneshot::Sender<Result<UserId, LeaderboardError>>,
    },
    SignOut {
        reply: oneshot::Sender<Result<(), LeaderboardError>>,
    },
    Reload {
        reply: oneshot::Sender<LoadReport>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub changes: u64,
    pub prepended: u64,
    pub duplicates: u64,
    pub resyncs: u64,
    pub commands: u64,
}

/// Client side of a running live session.
#[derive(Debug, Clone)]
pub struct LiveHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<LeaderboardView>,
}

fn stopped() -> LeaderboardError {
    CollaboratorError::Transport("live session stopped".to_string()).into()
}

impl LiveHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, LeaderboardError> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(make(reply)).await.map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }

    pub async fn submit_win(&self, loser: Option<UserId>) -> Result<StandingEvent, LeaderboardError> {
        self.request(|reply| Command::SubmitWin { loser, reply }).await?
    }

    pub async fn set_first_name(
        &self,
        acting: UserId,
        name: impl Into<String>,
    ) -> Result<String, LeaderboardError> {
        let name = name.into();
        self.request(|reply| Command::SetFirstName { acting, name, reply })
            .await?
    }

    pub async fn sign_in(&self, credentials: Credentials) -> Result<UserId, LeaderboardError> {
        self.request(|reply| Command::SignIn { credentials, reply })
            .await?
    }

    pub async fn sign_out(&self) -> Result<(), LeaderboardError> {
        self.request(|reply| Command::SignOut { reply }).await?
    }

    pub async fn reload(&self) -> Result<LoadReport, LeaderboardError> {
        self.request(|reply| Command::Reload { reply }).await
    }

    /// Current local snapshot, after every change queued before the call.
    pub async fn snapshot(&self) -> Result<Snapshot, LeaderboardError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Receiver of the derived view, republished after every reaction.
    pub fn view(&self) -> watch::Receiver<LeaderboardView> {
        self.view.clone()
    }
}

pub struct LiveSession<B: Backend> {
    reconciler: Reconciler<B>,
    commands: mpsc::Receiver<Command>,
    view: watch::Sender<LeaderboardView>,
}

impl<B: Backend> LiveSession<B> {
    pub fn new(reconciler: Reconciler<B>, queue_depth: usize) -> (Self, LiveHandle) {
        let (tx, commands) = mpsc::channel(queue_depth.max(1));
        let (view, view_rx) = watch::channel(LeaderboardView::default());
        let session = Self {
            reconciler,
            commands,
            view,
        };
        let handle = LiveHandle {
            commands: tx,
            view: view_rx,
        };
        (session, handle)
    }

    /// Load, subscribe and react until `shutdown` resolves or a feed closes.
    ///
    /// Only a failure to subscribe ends the run with an error. Subscriptions
    /// are released however the loop exits.
    pub async fn run<F>(self, shutdown: F) -> Result<RunSummary, LeaderboardError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            mut reconciler,
            mut commands,
            view,
        } = self;
        let mut summary = RunSummary::default();

        let report = reconciler.load().await;
        if !report.is_complete() {
            warn!(failures = report.failures.len(), "Starting with partial state");
        }

        let mut subs = Subscriptions::acquire(reconciler.backend().as_ref()).await?;
        let mut session_rx = reconciler.session_cell().watch();
        let _ = session_rx.borrow_and_update();
        view.send_replace(reconciler.view());
        info!("Live session started");

        tokio::pin!(shutdown);
        let mut commands_open = true;

        loop {
            // Feed changes are drained before commands.
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }

                item = subs.standing.recv() => {
                    if !handle_feed_item(&mut reconciler, Relation::Standing, item, &mut summary).await {
                        break;
                    }
                }

                item = subs.profiles.recv() => {
                    if !handle_feed_item(&mut reconciler, Relation::Profiles, item, &mut summary).await {
                        break;
                    }
                }

                changed = session_rx.changed() => {
                    if changed.is_ok() {
                        let _ = session_rx.borrow_and_update();
                        debug!("Session transition, resyncing viewer");
                        reconciler.resync_viewer().await;
                    }
                }

                command = commands.recv(), if commands_open => match command {
                    Some(command) => {
                        summary.commands += 1;
                        handle_command(&mut reconciler, command).await;
                        // Transitions caused by a command are already handled.
                        let _ = session_rx.borrow_and_update();
                    }
                    None => {
                        debug!("All live handles dropped");
                        commands_open = false;
                    }
                },
            }

            view.send_replace(reconciler.view());
        }

        drop(subs);
        info!(
            changes = summary.changes,
            prepended = summary.prepended,
            duplicates = summary.duplicates,
            resyncs = summary.resyncs,
            commands = summary.commands,
            "Live session stopped"
        );
        Ok(summary)
    }
}

/// Returns `false` when the feed has closed.
async fn handle_feed_item<B: Backend>(
    reconciler: &mut Reconciler<B>,
    relation: Relation,
    item: FeedItem,
    summary: &mut RunSummary,
) -> bool {
    match item {
        FeedItem::Change(change) => {
            summary.changes += 1;
            let label = change.label();
            match reconciler.apply(change).await {
                Ok(Applied::Prepended) => summary.prepended += 1,
                Ok(Applied::Duplicate) => summary.duplicates += 1,
                Ok(_) => {}
                Err(e) => warn!(change = %label, error = %e, "Change not applied"),
            }
            true
        }
        FeedItem::Lagged(missed) => {
            warn!(%relation, missed, "Feed lagged, re-fetching");
            summary.resyncs += 1;
            let resync = match relation {
                Relation::Standing => reconciler.refresh_standing().await,
                Relation::Profiles => reconciler.refresh_profiles().await,
            };
            if let Err(e) = resync {
                debug!(%relation, error = %e, "Resync failed, prior state kept");
            }
            true
        }
        FeedItem::Closed => {
            warn!(%relation, "Feed closed");
            false
        }
    }
}

async fn handle_command<B: Backend>(reconciler: &mut Reconciler<B>, command: Command) {
    // A dropped reply receiver only means the caller stopped waiting.
    match command {
        Command::SubmitWin { loser, reply } => {
            let _ = reply.send(reconciler.submit_win(loser.as_ref()).await);
        }
        Command::SetFirstName {
            acting,
            name,
            reply,
        } => {
            let _ = reply.send(reconciler.set_first_name(&acting, &name).await);
        }
        Command::SignIn { credentials, reply } => {
            let _ = reply.send(reconciler.sign_in(&credentials).await);
        }
        Command::SignOut { reply } => {
            let _ = reply.send(reconciler.sign_out().await);
        }
        Command::Reload { reply } => {
            let _ = reply.send(reconciler.load().await);
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(reconciler.snapshot().clone());
        }
    }
}
