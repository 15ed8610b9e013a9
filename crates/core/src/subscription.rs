//! Ordered, cancellable topic subscriptions.
//!
//! The store is the source of truth; the broadcast channel only wakes
//! subscribers up. A subscriber that lags behind the channel simply re-reads
//! the store, so no message is ever skipped or delivered twice.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::account::TopicMessage;
use crate::error::{LedgerError, Result};
use crate::store::LedgerStore;
use crate::types::TopicId;

/// How long a forwarder waits per round before re-checking its channel.
const FORWARD_WAIT: Duration = Duration::from_secs(30);

pub struct TopicSubscription {
    store: Arc<RwLock<LedgerStore>>,
    notifications: broadcast::Receiver<TopicMessage>,
    topic: TopicId,
    next_sequence: u64,
    cancel: CancellationToken,
    closed: bool,
}

impl TopicSubscription {
    /// `notifications` must be subscribed before the store is read for the
    /// first time, otherwise a message committed in between is only picked
    /// up on the next wake-up.
    pub(crate) fn new(
        store: Arc<RwLock<LedgerStore>>,
        notifications: broadcast::Receiver<TopicMessage>,
        topic: TopicId,
        from_sequence: u64,
    ) -> Self {
        Self {
            store,
            notifications,
            topic,
            next_sequence: from_sequence.max(1),
            cancel: CancellationToken::new(),
            closed: false,
        }
    }

    pub fn topic(&self) -> TopicId {
        self.topic
    }

    /// Sequence number of the next message this subscription yields.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that cancels this subscription from elsewhere.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn poll_store(&self) -> Result<Option<TopicMessage>> {
        let store = self.store.read().await;
        Ok(store.get_topic(&self.topic)?.message(self.next_sequence).cloned())
    }

    /// Next message in sequence order, waiting at most `wait` for one to be
    /// submitted. `Ok(None)` means the subscription was cancelled or the
    /// ledger is gone.
    pub async fn next(&mut self, wait: Duration) -> Result<Option<TopicMessage>> {
        let deadline = Instant::now() + wait;
        loop {
            if self.cancel.is_cancelled() {
                return Ok(None);
            }
            if let Some(message) = self.poll_store().await? {
                self.next_sequence += 1;
                return Ok(Some(message));
            }
            if self.closed {
                return Ok(None);
            }

            // wait for a notification concerning this topic
            loop {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return Ok(None),
                    received = tokio::time::timeout_at(deadline, self.notifications.recv()) => match received {
                        Err(_) => {
                            return Err(LedgerError::Timeout {
                                topic: self.topic,
                                waited: wait,
                            })
                        }
                        Ok(Ok(message)) if message.topic != self.topic => continue,
                        Ok(Ok(_)) => break,
                        Ok(Err(RecvError::Lagged(skipped))) => {
                            debug!("subscription to {} lagged by {skipped} notifications", self.topic);
                            break;
                        }
                        Ok(Err(RecvError::Closed)) => {
                            self.closed = true;
                            break;
                        }
                    },
                }
            }
        }
    }

    /// Moves the subscription onto a background task that pushes every
    /// message into the returned channel until cancelled or until the
    /// receiver is dropped.
    pub fn spawn_forwarder(mut self, buffer: usize) -> (mpsc::Receiver<TopicMessage>, CancellationToken) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let cancel = self.cancel_handle();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    next = self.next(FORWARD_WAIT) => match next {
                        Ok(Some(message)) => {
                            if tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(LedgerError::Timeout { .. }) => continue,
                        Err(e) => {
                            warn!("forwarder for topic {} stopped: {e}", self.topic);
                            break;
                        }
                    },
                }
            }
            debug!("forwarder for topic {} finished at sequence {}", self.topic, self.next_sequence);
        });
        (rx, cancel)
    }
}
