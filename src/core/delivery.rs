use std::collections::HashMap;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::core::error::BrokerError;
use crate::core::message::{Delivery, Message};
use crate::core::queue_store::QueueStore;
use crate::core::session::SessionState;

pub type SessionId = u64;

/// One registered consumer. Tags count up from 1 per session and are never
/// reused, so tag order doubles as delivery order when outstanding messages
/// have to go back to their queue.
struct SessionEntry {
    consumer_tag: String,
    queue: String,
    state: SessionState,
    next_tag: u64,
    outstanding: HashMap<u64, Message>,
    // dropped on cancel so the consumer's channel closes
    sender: Option<UnboundedSender<Delivery>>,
}

impl SessionEntry {
    fn has_capacity(&self, prefetch_limit: usize) -> bool {
        prefetch_limit == 0 || self.outstanding.len() < prefetch_limit
    }
}

#[derive(Default)]
struct ConsumerRing {
    members: Vec<SessionId>,
    cursor: usize,
}

impl ConsumerRing {
    fn remove(&mut self, id: SessionId) {
        self.members.retain(|m| *m != id);
        if self.cursor >= self.members.len() {
            self.cursor = 0;
        }
    }
}

/// Tracks unacknowledged deliveries per consumer session and dispatches
/// queue heads to whichever active consumer has capacity, round-robin per
/// queue. Separating "in the buffer" from "outstanding" is what makes the
/// at-least-once contract hold: between delivery and ack a message lives
/// here, and nack or cancel sends it back to the buffer instead of losing it.
pub struct DeliveryManager {
    sessions: HashMap<SessionId, SessionEntry>,
    consumers: HashMap<String, ConsumerRing>,
    next_session_id: SessionId,
    prefetch_limit: usize,
}

impl DeliveryManager {
    pub fn new(prefetch_limit: usize) -> DeliveryManager {
        DeliveryManager {
            sessions: HashMap::new(),
            consumers: HashMap::new(),
            next_session_id: 1,
            prefetch_limit,
        }
    }

    /// Registers a consumer on a queue. Consumer tags must be unique among
    /// the active consumers of that queue.
    pub fn register(
        &mut self,
        queue: &str,
        consumer_tag: &str,
        sender: UnboundedSender<Delivery>,
    ) -> Result<SessionId, BrokerError> {
        let duplicate = self.consumers.get(queue).is_some_and(|ring| {
            ring.members.iter().any(|id| {
                self.sessions.get(id).is_some_and(|s| {
                    s.state == SessionState::Active && s.consumer_tag == consumer_tag
                })
            })
        });
        if duplicate {
            return Err(BrokerError::Conflict {
                entity: "consumer",
                name: consumer_tag.to_string(),
            });
        }

        let id = self.next_session_id;
        self.next_session_id += 1;
        self.sessions.insert(
            id,
            SessionEntry {
                consumer_tag: consumer_tag.to_string(),
                queue: queue.to_string(),
                state: SessionState::Active,
                next_tag: 0,
                outstanding: HashMap::new(),
                sender: Some(sender),
            },
        );
        self.consumers
            .entry(queue.to_string())
            .or_default()
            .members
            .push(id);
        debug!(queue, consumer_tag, session = id, "consumer registered");
        Ok(id)
    }

    /// Drains the queue head towards ready consumers until either the buffer
    /// is empty or nobody has capacity left. Returns how many deliveries went
    /// out. A consumer whose receiver is gone is treated as cancelled and its
    /// messages are requeued on the spot.
    pub fn pump(&mut self, queue: &str, store: &mut QueueStore) -> Result<usize, BrokerError> {
        let mut delivered = 0;
        loop {
            if store.is_empty(queue)? {
                break;
            }
            let Some(session_id) = self.next_ready_consumer(queue) else {
                break;
            };
            let Some(message) = store.pop_head(queue)? else {
                break;
            };

            let entry = self
                .sessions
                .get_mut(&session_id)
                .ok_or_else(|| internal(format!("ring references unknown session {session_id}")))?;
            entry.next_tag += 1;
            let tag = entry.next_tag;
            let delivery = Delivery {
                delivery_tag: tag,
                consumer_tag: entry.consumer_tag.clone(),
                queue: queue.to_string(),
                message: message.clone(),
            };
            entry.outstanding.insert(tag, message);

            let sent = entry
                .sender
                .as_ref()
                .is_some_and(|tx| tx.send(delivery).is_ok());
            if sent {
                debug!(queue, tag, session = session_id, "delivered");
                delivered += 1;
            } else {
                // receiver dropped without an explicit cancel
                self.cancel(session_id, store)?;
            }
        }
        Ok(delivered)
    }

    pub fn ack(&mut self, id: SessionId, tag: u64) -> Result<(), BrokerError> {
        let entry = self.entry_mut(id)?;
        if entry.outstanding.remove(&tag).is_none() {
            return Err(BrokerError::UnknownTag {
                consumer_tag: entry.consumer_tag.clone(),
                tag,
            });
        }
        debug!(tag, session = id, "acked");
        Ok(())
    }

    /// Retires the tag; with `requeue` the message goes back to the head of
    /// its queue marked redelivered, otherwise it is discarded. Either way
    /// the session regains delivery capacity, so the caller should pump.
    pub fn nack(
        &mut self,
        id: SessionId,
        tag: u64,
        requeue: bool,
        store: &mut QueueStore,
    ) -> Result<(), BrokerError> {
        let entry = self.entry_mut(id)?;
        let Some(mut message) = entry.outstanding.remove(&tag) else {
            return Err(BrokerError::UnknownTag {
                consumer_tag: entry.consumer_tag.clone(),
                tag,
            });
        };
        if !requeue {
            debug!(tag, session = id, "nacked and discarded");
            return Ok(());
        }
        message.redelivered = true;
        let queue = entry.queue.clone();
        store
            .requeue_front(&queue, message)
            .map_err(|e| internal(format!("requeue into '{queue}' failed: {e}")))?;
        debug!(tag, session = id, queue = %queue, "nacked and requeued");
        Ok(())
    }

    /// Terminal and idempotent. Everything the session still had outstanding
    /// goes back to the head of its queue in original delivery order, marked
    /// redelivered. Returns the queue when the call actually cancelled
    /// something, `None` for a repeat cancel.
    pub fn cancel(
        &mut self,
        id: SessionId,
        store: &mut QueueStore,
    ) -> Result<Option<String>, BrokerError> {
        let entry = self.entry_mut(id)?;
        if entry.state == SessionState::Cancelled {
            return Ok(None);
        }
        entry.state = SessionState::Cancelled;
        entry.sender = None;
        let queue = entry.queue.clone();

        let mut returned: Vec<(u64, Message)> = entry.outstanding.drain().collect();
        // highest tag first, so the earliest delivery ends up at the head
        returned.sort_by_key(|(tag, _)| std::cmp::Reverse(*tag));
        let requeued = returned.len();
        for (_, mut message) in returned {
            message.redelivered = true;
            store
                .requeue_front(&queue, message)
                .map_err(|e| internal(format!("requeue into '{queue}' failed: {e}")))?;
        }

        if let Some(ring) = self.consumers.get_mut(&queue) {
            ring.remove(id);
        }
        debug!(session = id, queue = %queue, requeued, "session cancelled");
        Ok(Some(queue))
    }

    /// Queue deletion path: every consumer of the queue is cancelled and its
    /// outstanding messages are dropped along with the queue itself.
    pub fn drop_queue_consumers(&mut self, queue: &str) {
        let Some(ring) = self.consumers.remove(queue) else {
            return;
        };
        for id in ring.members {
            if let Some(entry) = self.sessions.get_mut(&id) {
                entry.state = SessionState::Cancelled;
                entry.sender = None;
                entry.outstanding.clear();
            }
        }
    }

    pub fn session_queue(&self, id: SessionId) -> Option<&str> {
        self.sessions.get(&id).map(|s| s.queue.as_str())
    }

    fn next_ready_consumer(&mut self, queue: &str) -> Option<SessionId> {
        let ring = self.consumers.get_mut(queue)?;
        let count = ring.members.len();
        for step in 0..count {
            let idx = (ring.cursor + step) % count;
            let id = ring.members[idx];
            let ready = self.sessions.get(&id).is_some_and(|s| {
                s.state == SessionState::Active && s.has_capacity(self.prefetch_limit)
            });
            if ready {
                ring.cursor = (idx + 1) % count;
                return Some(id);
            }
        }
        None
    }

    fn entry_mut(&mut self, id: SessionId) -> Result<&mut SessionEntry, BrokerError> {
        self.sessions
            .get_mut(&id)
            .ok_or_else(|| internal(format!("unknown session {id}")))
    }
}

fn internal(detail: String) -> BrokerError {
    BrokerError::Internal(detail)
}
