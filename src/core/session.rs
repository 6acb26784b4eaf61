use tokio::sync::mpsc::UnboundedReceiver;

use crate::core::delivery::SessionId;
use crate::core::error::BrokerError;
use crate::core::message::Delivery;
use crate::types::SharedCore;

/// `Active` is entered when `consume` registers the session; `Cancelled` is
/// terminal, whether the consumer asked for it or the broker did (queue
/// deleted). There is no way back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Cancelled,
}

/// A consumer's handle on its subscription: a pull end for deliveries plus
/// the ack/nack/cancel operations that go with them.
pub struct Session {
    core: SharedCore,
    id: SessionId,
    consumer_tag: String,
    queue: String,
    receiver: UnboundedReceiver<Delivery>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("consumer_tag", &self.consumer_tag)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(
        core: SharedCore,
        id: SessionId,
        consumer_tag: String,
        queue: String,
        receiver: UnboundedReceiver<Delivery>,
    ) -> Session {
        Session {
            core,
            id,
            consumer_tag,
            queue,
            receiver,
        }
    }

    /// Waits for the next delivery. `None` once the session is cancelled and
    /// every already-pushed delivery has been drained.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Session::recv).
    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.receiver.try_recv().ok()
    }

    pub async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        self.core.lock().await.ack_delivery(self.id, delivery_tag)
    }

    pub async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError> {
        self.core
            .lock()
            .await
            .nack_delivery(self.id, delivery_tag, requeue)
    }

    /// Cancels the subscription. Outstanding deliveries are requeued; copies
    /// already pushed into this session's channel are void and acking them
    /// afterwards fails with `UnknownTag`. Cancelling twice is a no-op.
    pub async fn cancel(&self) -> Result<(), BrokerError> {
        self.core.lock().await.cancel_session(self.id)
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }
}
