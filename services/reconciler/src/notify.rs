//! Transient user notifications
//!
//! Any component can publish through a cloned [`Notifier`]. A single
//! [`NotificationCenter`] receives them, keeps a bounded queue of active
//! notifications and expires each one after its TTL. Publishing is
//! best-effort: a full or closed channel drops the notification.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

use crate::config::NotifyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

/// A notification as displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub kind: NotificationKind,
}

#[derive(Debug)]
struct Pending {
    message: String,
    kind: NotificationKind,
}

#[derive(Debug)]
struct Active {
    notification: Notification,
    expires_at: Instant,
}

/// Publishing handle.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Pending>,
}

impl Notifier {
    pub fn notify(&self, message: impl Into<String>, kind: NotificationKind) {
        let pending = Pending {
            message: message.into(),
            kind,
        };
        if let Err(e) = self.tx.try_send(pending) {
            debug!(error = %e, "Notification dropped");
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(message, NotificationKind::Success);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(message, NotificationKind::Error);
    }
}

/// Receiving side: owns the active queue and the expiry timers.
#[derive(Debug)]
pub struct NotificationCenter {
    rx: mpsc::Receiver<Pending>,
    active: VecDeque<Active>,
    capacity: usize,
    ttl: Duration,
    next_id: u64,
    published: watch::Sender<Vec<Notification>>,
    dropped: u64,
}

/// Create a connected notifier/center pair.
pub fn channel(config: &NotifyConfig) -> (Notifier, NotificationCenter) {
    let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
    let (published, _) = watch::channel(Vec::new());
    let center = NotificationCenter {
        rx,
        active: VecDeque::with_capacity(config.capacity),
        capacity: config.capacity.max(1),
        ttl: config.ttl,
        next_id: 1,
        published,
        dropped: 0,
    };
    (Notifier { tx }, center)
}

impl NotificationCenter {
    /// Add a notification, evicting the oldest if the queue is full.
    pub fn accept(&mut self, message: String, kind: NotificationKind, now: Instant) -> u64 {
        if self.active.len() >= self.capacity {
            self.active.pop_front();
            self.dropped += 1;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.active.push_back(Active {
            notification: Notification { id, message, kind },
            expires_at: now + self.ttl,
        });
        trace!(id, active = self.active.len(), "Notification shown");
        id
    }

    /// Remove every notification whose TTL has elapsed.
    ///
    /// All entries share one TTL, so the queue is ordered by expiry.
    pub fn expire(&mut self, now: Instant) -> usize {
        let mut expired = 0;
        while self.active.front().is_some_and(|a| a.expires_at <= now) {
            self.active.pop_front();
            expired += 1;
        }
        expired
    }

    /// Currently active notifications, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        self.active.iter().map(|a| a.notification.clone()).collect()
    }

    /// Receiver of the active list, updated after every change.
    pub fn watch(&self) -> watch::Receiver<Vec<Notification>> {
        self.published.subscribe()
    }

    /// Notifications evicted before expiry because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn publish(&self) {
        self.published.send_replace(self.active());
    }

    /// Receive and expire notifications until every notifier is gone and
    /// the last active notification has expired.
    pub async fn run(mut self) {
        let mut open = true;

        loop {
            if !open && self.active.is_empty() {
                break;
            }

            let next_expiry = self.active.front().map(|a| a.expires_at);
            let deadline = next_expiry.unwrap_or_else(|| Instant::now() + self.ttl);

            tokio::select! {
                pending = self.rx.recv(), if open => match pending {
                    Some(p) => {
                        self.accept(p.message, p.kind, Instant::now());
                        self.publish();
                    }
                    None => open = false,
                },
                _ = sleep_until(deadline), if next_expiry.is_some() => {
                    if self.expire(Instant::now()) > 0 {
                        self.publish();
                    }
                }
            }
        }

        debug!("Notification center stopped");
    }
}
