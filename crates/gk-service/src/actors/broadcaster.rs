//! `Broadcaster` - single-owner fan-out loop for audit events and visits.
//!
//! One broadcaster instance runs per stream kind:
//!
//! - `Events`: every authorized call's `AuditEvent`, delivered to log subscribers
//! - `Visits`: every authorized call's `Visit`, delivered to statistics aggregators
//!
//! The subscriber set is owned by the actor task. Publishers and new
//! subscribers reach it only through one intake channel, so no lock is
//! needed anywhere and a subscriber registered after a publication never
//! sees it.
//!
//! # Delivery
//!
//! Items are forwarded to subscribers in registration order, one handoff at a
//! time. A slow subscriber stalls the whole round; the next message is not
//! taken from the intake until the current item reached everybody. Delivery
//! order on each subscriber equals publication order.
//!
//! A subscriber whose receiver was dropped (its call ended) is removed the next
//! time the actor touches the set. There is no explicit unsubscribe.

use crate::errors::GkError;
use crate::observability::metrics;

use super::messages::{BroadcasterMessage, StreamKind, HANDOFF_CAPACITY};

use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Handle to a `Broadcaster` actor.
///
/// Cheap to clone; every clone feeds the same actor.
#[derive(Debug)]
pub struct BroadcasterHandle<T> {
    kind: StreamKind,
    sender: mpsc::Sender<BroadcasterMessage<T>>,
}

impl<T> Clone for BroadcasterHandle<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            sender: self.sender.clone(),
        }
    }
}

/// A registered subscriber's end of the broadcast.
#[derive(Debug)]
pub struct Subscription<T> {
    /// Id assigned by the broadcaster, unique per stream.
    pub id: u64,
    /// Items published after registration.
    pub receiver: mpsc::Receiver<T>,
}

impl<T> BroadcasterHandle<T>
where
    T: Clone + Send + 'static,
{
    /// Spawn a broadcaster actor and return a handle to it.
    ///
    /// The actor exits when `cancel_token` is cancelled, even in the middle
    /// of a delivery round.
    #[must_use]
    pub fn spawn(kind: StreamKind, cancel_token: CancellationToken) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(HANDOFF_CAPACITY);

        let actor = Broadcaster {
            kind,
            receiver,
            subscribers: Vec::new(),
            next_id: 0,
            cancel_token,
        };

        let task = tokio::spawn(actor.run());

        (Self { kind, sender }, task)
    }

    /// Hand an item to the broadcaster.
    ///
    /// Returns once the actor's intake has accepted the item, not once it
    /// has been delivered.
    pub async fn publish(&self, item: T) -> Result<(), GkError> {
        self.sender
            .send(BroadcasterMessage::Publish(item))
            .await
            .map_err(|_| GkError::ShuttingDown)
    }

    /// Register a new subscriber.
    ///
    /// Returns after the actor has added the subscriber, so every item
    /// published from then on will be delivered to it. Items published
    /// earlier are never replayed.
    pub async fn subscribe(&self) -> Result<Subscription<T>, GkError> {
        let (subscriber, receiver) = mpsc::channel(HANDOFF_CAPACITY);
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(BroadcasterMessage::Subscribe {
                subscriber,
                respond_to: tx,
            })
            .await
            .map_err(|_| GkError::ShuttingDown)?;

        let id = rx.await.map_err(|_| GkError::ShuttingDown)?;

        Ok(Subscription { id, receiver })
    }

    /// Stream kind served by this broadcaster.
    #[must_use]
    pub fn kind(&self) -> StreamKind {
        self.kind
    }
}

struct Subscriber<T> {
    id: u64,
    sender: mpsc::Sender<T>,
}

/// The broadcaster actor. Owns the subscriber set.
struct Broadcaster<T> {
    kind: StreamKind,
    receiver: mpsc::Receiver<BroadcasterMessage<T>>,
    subscribers: Vec<Subscriber<T>>,
    next_id: u64,
    cancel_token: CancellationToken,
}

impl<T> Broadcaster<T>
where
    T: Clone + Send + 'static,
{
    #[instrument(skip_all, name = "gk.actor.broadcaster", fields(stream = self.kind.as_str()))]
    async fn run(mut self) {
        info!(
            target: "gk.actor.broadcaster",
            stream = self.kind.as_str(),
            "Broadcaster started"
        );

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "gk.actor.broadcaster",
                        stream = self.kind.as_str(),
                        "Broadcaster received cancellation signal"
                    );
                    break;
                }

                message = self.receiver.recv() => {
                    match message {
                        Some(BroadcasterMessage::Publish(item)) => {
                            if !self.fan_out(item).await {
                                break;
                            }
                        }
                        Some(BroadcasterMessage::Subscribe { subscriber, respond_to }) => {
                            self.add_subscriber(subscriber, respond_to);
                        }
                        None => break,
                    }
                }
            }
        }

        let remaining = self.subscribers.len();
        self.subscribers.clear();
        metrics::set_subscribers_active(self.kind.as_str(), 0);

        info!(
            target: "gk.actor.broadcaster",
            stream = self.kind.as_str(),
            subscribers_remaining = remaining,
            "Broadcaster stopped"
        );
    }

    fn add_subscriber(&mut self, subscriber: mpsc::Sender<T>, respond_to: oneshot::Sender<u64>) {
        self.prune_closed();

        let id = self.next_id;
        self.next_id += 1;

        if respond_to.send(id).is_err() {
            // Caller gave up before registration completed
            debug!(
                target: "gk.actor.broadcaster",
                stream = self.kind.as_str(),
                subscriber_id = id,
                "Subscriber went away before registration"
            );
            return;
        }

        self.subscribers.push(Subscriber {
            id,
            sender: subscriber,
        });
        metrics::set_subscribers_active(self.kind.as_str(), self.subscribers.len());

        debug!(
            target: "gk.actor.broadcaster",
            stream = self.kind.as_str(),
            subscriber_id = id,
            total_subscribers = self.subscribers.len(),
            "Subscriber added"
        );
    }

    /// Deliver one item to every subscriber in registration order.
    ///
    /// Returns `false` if cancelled before the round completed.
    async fn fan_out(&mut self, item: T) -> bool {
        let started = Instant::now();

        for subscriber in &self.subscribers {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => return false,

                result = subscriber.sender.send(item.clone()) => {
                    if result.is_err() {
                        debug!(
                            target: "gk.actor.broadcaster",
                            stream = self.kind.as_str(),
                            subscriber_id = subscriber.id,
                            "Subscriber receiver dropped"
                        );
                    }
                }
            }
        }

        self.prune_closed();
        metrics::record_fanout_duration(self.kind.as_str(), started.elapsed());

        true
    }

    fn prune_closed(&mut self) {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| !s.sender.is_closed());

        let removed = before - self.subscribers.len();
        if removed > 0 {
            metrics::set_subscribers_active(self.kind.as_str(), self.subscribers.len());
            debug!(
                target: "gk.actor.broadcaster",
                stream = self.kind.as_str(),
                removed,
                total_subscribers = self.subscribers.len(),
                "Removed closed subscribers"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    const RECV_TIMEOUT: Duration = Duration::from_secs(1);

    async fn recv<T>(subscription: &mut Subscription<T>) -> Option<T> {
        tokio::time::timeout(RECV_TIMEOUT, subscription.receiver.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_item() {
        let cancel_token = CancellationToken::new();
        let (handle, _task) =
            BroadcasterHandle::<String>::spawn(StreamKind::Events, cancel_token.clone());

        let mut subs = Vec::new();
        for _ in 0..3 {
            subs.push(handle.subscribe().await.unwrap());
        }

        // Readers must run concurrently: each handoff holds one item at a time
        let readers: Vec<_> = subs
            .into_iter()
            .map(|mut sub| tokio::spawn(async move { recv(&mut sub).await }))
            .collect();

        handle.publish("hello".to_string()).await.unwrap();

        for reader in readers {
            assert_eq!(reader.await.unwrap().as_deref(), Some("hello"));
        }

        cancel_token.cancel();
    }

    #[tokio::test]
    async fn test_delivery_preserves_publication_order() {
        let cancel_token = CancellationToken::new();
        let (handle, _task) =
            BroadcasterHandle::<u32>::spawn(StreamKind::Events, cancel_token.clone());
        let mut sub = handle.subscribe().await.unwrap();

        let publisher = handle.clone();
        tokio::spawn(async move {
            for i in 0..10 {
                publisher.publish(i).await.unwrap();
            }
        });

        let mut received = Vec::new();
        for _ in 0..10 {
            received.push(recv(&mut sub).await.unwrap());
        }

        assert_eq!(received, (0..10).collect::<Vec<_>>());
        cancel_token.cancel();
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_replay() {
        let cancel_token = CancellationToken::new();
        let (handle, _task) =
            BroadcasterHandle::<u32>::spawn(StreamKind::Events, cancel_token.clone());

        // Published with no subscribers: dropped
        handle.publish(1).await.unwrap();
        handle.publish(2).await.unwrap();

        let mut late = handle.subscribe().await.unwrap();
        handle.publish(3).await.unwrap();

        assert_eq!(recv(&mut late).await, Some(3));
        cancel_token.cancel();
    }

    #[tokio::test]
    async fn test_subscriber_ids_are_unique() {
        let cancel_token = CancellationToken::new();
        let (handle, _task) =
            BroadcasterHandle::<u32>::spawn(StreamKind::Visits, cancel_token.clone());

        let first = handle.subscribe().await.unwrap();
        let second = handle.subscribe().await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(handle.kind(), StreamKind::Visits);
        cancel_token.cancel();
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_block_others() {
        let cancel_token = CancellationToken::new();
        let (handle, _task) =
            BroadcasterHandle::<u32>::spawn(StreamKind::Events, cancel_token.clone());

        let gone = handle.subscribe().await.unwrap();
        let mut alive = handle.subscribe().await.unwrap();
        drop(gone);

        for i in 0..3 {
            handle.publish(i).await.unwrap();
            assert_eq!(recv(&mut alive).await, Some(i));
        }

        cancel_token.cancel();
    }

    #[tokio::test]
    async fn test_stalled_subscriber_blocks_round_until_drained() {
        let cancel_token = CancellationToken::new();
        let (handle, _task) =
            BroadcasterHandle::<u32>::spawn(StreamKind::Events, cancel_token.clone());

        let mut slow = handle.subscribe().await.unwrap();
        let mut fast = handle.subscribe().await.unwrap();

        // Fills the slow subscriber's single slot
        handle.publish(1).await.unwrap();
        assert_eq!(recv(&mut fast).await, Some(1));

        // Round for item 2 stalls on the slow subscriber
        handle.publish(2).await.unwrap();
        let stalled = tokio::time::timeout(Duration::from_millis(100), fast.receiver.recv()).await;
        assert!(
            stalled.is_err(),
            "fast subscriber must wait behind the slow one"
        );

        // Draining the slow subscriber releases the round
        assert_eq!(recv(&mut slow).await, Some(1));
        assert_eq!(recv(&mut fast).await, Some(2));
        assert_eq!(recv(&mut slow).await, Some(2));

        cancel_token.cancel();
    }

    #[tokio::test]
    async fn test_cancellation_stops_actor_mid_round() {
        let cancel_token = CancellationToken::new();
        let (handle, task) =
            BroadcasterHandle::<u32>::spawn(StreamKind::Events, cancel_token.clone());

        // Never read: the second item's round blocks forever
        let _stuck = handle.subscribe().await.unwrap();
        handle.publish(1).await.unwrap();
        handle.publish(2).await.unwrap();

        cancel_token.cancel();

        tokio::time::timeout(RECV_TIMEOUT, task)
            .await
            .expect("broadcaster should exit on cancellation")
            .unwrap();
    }

    #[tokio::test]
    async fn test_handle_errors_after_shutdown() {
        let cancel_token = CancellationToken::new();
        let (handle, task) =
            BroadcasterHandle::<u32>::spawn(StreamKind::Events, cancel_token.clone());

        cancel_token.cancel();
        task.await.unwrap();

        assert!(matches!(
            handle.publish(1).await,
            Err(GkError::ShuttingDown)
        ));
        assert!(matches!(
            handle.subscribe().await,
            Err(GkError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_subscriptions_end_when_actor_stops() {
        let cancel_token = CancellationToken::new();
        let (handle, task) =
            BroadcasterHandle::<u32>::spawn(StreamKind::Events, cancel_token.clone());
        let mut sub = handle.subscribe().await.unwrap();

        cancel_token.cancel();
        task.await.unwrap();

        assert_eq!(sub.receiver.recv().await, None);
    }
}
