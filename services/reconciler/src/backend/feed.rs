//! In-process change-feed fan-out
//!
//! A `FeedHub` is the publishing side of a backend's change feed. Each
//! `Subscription` holds a receiver filtered to one relation and a set of
//! change kinds. Dropping the subscription releases it.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::debug;
use types::change::{ChangeEvent, ChangeKind, Relation};

/// Default number of undelivered changes buffered per subscriber.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// One item read from a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedItem {
    /// A change matching the subscription's filter.
    Change(ChangeEvent),
    /// The subscriber fell behind and this many changes were lost.
    Lagged(u64),
    /// The publishing side is gone; no more changes will arrive.
    Closed,
}

/// Publishing side of a change feed.
#[derive(Debug, Clone)]
pub struct FeedHub {
    sender: broadcast::Sender<ChangeEvent>,
}

impl FeedHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver a change to every live subscription.
    ///
    /// Returns the number of receivers reached; zero when nobody listens.
    pub fn publish(&self, change: ChangeEvent) -> usize {
        let label = change.label();
        let delivered = self.sender.send(change).unwrap_or(0);
        debug!(change = %label, delivered, "Published change");
        delivered
    }

    /// Open a subscription for `relation` filtered to `kinds`.
    pub fn subscribe(&self, relation: Relation, kinds: &[ChangeKind]) -> Subscription {
        debug!(%relation, ?kinds, "Subscription acquired");
        Subscription {
            relation,
            kinds: kinds.to_vec(),
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of subscriptions currently held open.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

/// Receiving side of a change feed, scoped to one relation.
#[derive(Debug)]
pub struct Subscription {
    relation: Relation,
    kinds: Vec<ChangeKind>,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn relation(&self) -> Relation {
        self.relation
    }

    fn accepts(&self, change: &ChangeEvent) -> bool {
        change.relation == self.relation && self.kinds.contains(&change.kind)
    }

    /// Wait for the next matching change.
    pub async fn recv(&mut self) -> FeedItem {
        loop {
            match self.receiver.recv().await {
                Ok(change) if self.accepts(&change) => return FeedItem::Change(change),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => return FeedItem::Lagged(missed),
                Err(RecvError::Closed) => return FeedItem::Closed,
            }
        }
    }

    /// Take the next matching change if one is already queued.
    pub fn try_recv(&mut self) -> Option<FeedItem> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) if self.accepts(&change) => return Some(FeedItem::Change(change)),
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(missed)) => return Some(FeedItem::Lagged(missed)),
                Err(TryRecvError::Closed) => return Some(FeedItem::Closed),
            }
        }
    }

    /// Release the subscription.
    pub fn unsubscribe(self) {
        debug!(relation = %self.relation, "Subscription released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use types::ids::{EventId, UserId};
    use types::profile::Profile;
    use types::standing::StandingEvent;

    fn standing_insert(seq: i64) -> ChangeEvent {
        ChangeEvent::standing_insert(StandingEvent::new(
            Some(EventId::new(seq)),
            Utc.timestamp_opt(1_700_000_000 + seq, 0).unwrap(),
            "a",
            Some(UserId::new("b")),
        ))
    }

    #[test]
    fn test_subscription_filters_relation_and_kind() {
        let hub = FeedHub::default();
        let mut standing = hub.subscribe(Relation::Standing, &[ChangeKind::Insert]);
        let mut profiles = hub.subscribe(Relation::Profiles, &ChangeKind::ALL);

        hub.publish(ChangeEvent::profile_change(
            ChangeKind::Update,
            Some(Profile::new("a", Some("Alice"))),
        ));
        hub.publish(standing_insert(1));

        match standing.try_recv() {
            Some(FeedItem::Change(change)) => assert_eq!(change.relation, Relation::Standing),
            other => panic!("expected standing change, got {:?}", other),
        }
        assert!(standing.try_recv().is_none());

        match profiles.try_recv() {
            Some(FeedItem::Change(change)) => assert_eq!(change.kind, ChangeKind::Update),
            other => panic!("expected profile change, got {:?}", other),
        }
        assert!(profiles.try_recv().is_none());
    }

    #[test]
    fn test_unsubscribe_releases_receiver() {
        let hub = FeedHub::default();
        let sub = hub.subscribe(Relation::Standing, &[ChangeKind::Insert]);
        assert_eq!(hub.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.publish(standing_insert(1)), 0);
    }

    #[test]
    fn test_lagging_subscriber_reports_loss() {
        let hub = FeedHub::new(2);
        let mut sub = hub.subscribe(Relation::Standing, &[ChangeKind::Insert]);

        for seq in 1..=4 {
            hub.publish(standing_insert(seq));
        }

        assert_eq!(sub.try_recv(), Some(FeedItem::Lagged(2)));
        match sub.try_recv() {
            Some(FeedItem::Change(change)) => {
                assert_eq!(change.standing_row().unwrap().id, Some(EventId::new(3)))
            }
            other => panic!("expected change, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recv_reports_closed() {
        let hub = FeedHub::default();
        let mut sub = hub.subscribe(Relation::Standing, &[ChangeKind::Insert]);
        drop(hub);
        assert_eq!(sub.recv().await, FeedItem::Closed);
    }
}
