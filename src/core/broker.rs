use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::core::delivery::{DeliveryManager, SessionId};
use crate::core::error::BrokerError;
use crate::core::message::Message;
use crate::core::queue_store::QueueStore;
use crate::core::registry::{ExchangeKind, Registry};
use crate::core::router;
use crate::core::session::Session;
use crate::types::SharedCore;

/// All broker state behind the single lock: the name registry, the per-queue
/// buffers and the delivery bookkeeping. Every mutation funnels through here.
pub struct Core {
    registry: Registry,
    store: QueueStore,
    deliveries: DeliveryManager,
    unroutable: u64,
    log_unroutable: bool,
}

impl Core {
    fn new(config: &BrokerConfig) -> Core {
        Core {
            registry: Registry::new(),
            store: QueueStore::default(),
            deliveries: DeliveryManager::new(config.prefetch_limit),
            unroutable: 0,
            log_unroutable: config.log_unroutable,
        }
    }

    fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), BrokerError> {
        let targets = router::resolve_targets(&self.registry, exchange, routing_key)?;
        if targets.is_empty() {
            // standard broker semantics: not an error, but worth counting
            self.unroutable += 1;
            if self.log_unroutable {
                warn!(exchange, routing_key, "unroutable message dropped");
            }
            return Ok(());
        }

        let message = Message::new(body, content_type, routing_key);
        for queue in &targets {
            self.store.enqueue(queue, message.clone())?;
        }
        for queue in &targets {
            self.deliveries.pump(queue, &mut self.store)?;
        }
        debug!(exchange, routing_key, targets = targets.len(), "published");
        Ok(())
    }

    fn declare_queue(&mut self, name: &str, durable: bool) -> Result<(), BrokerError> {
        if self.registry.declare_queue(name, durable)? {
            self.store.create(name);
        }
        Ok(())
    }

    fn delete_queue(&mut self, name: &str) -> Result<(), BrokerError> {
        self.registry.delete_queue(name)?;
        self.deliveries.drop_queue_consumers(name);
        let dropped = self.store.drop_queue(name).map(|b| b.len()).unwrap_or(0);
        info!(queue = name, dropped, "queue deleted");
        Ok(())
    }

    pub(crate) fn ack_delivery(&mut self, id: SessionId, tag: u64) -> Result<(), BrokerError> {
        self.deliveries.ack(id, tag)?;
        // retiring the tag freed capacity, keep the queue flowing
        self.pump_session_queue(id)
    }

    pub(crate) fn nack_delivery(
        &mut self,
        id: SessionId,
        tag: u64,
        requeue: bool,
    ) -> Result<(), BrokerError> {
        self.deliveries.nack(id, tag, requeue, &mut self.store)?;
        self.pump_session_queue(id)
    }

    fn pump_session_queue(&mut self, id: SessionId) -> Result<(), BrokerError> {
        if let Some(queue) = self.deliveries.session_queue(id).map(str::to_string) {
            self.deliveries.pump(&queue, &mut self.store)?;
        }
        Ok(())
    }

    pub(crate) fn cancel_session(&mut self, id: SessionId) -> Result<(), BrokerError> {
        if let Some(queue) = self.deliveries.cancel(id, &mut self.store)? {
            // requeued messages may be deliverable to the remaining consumers
            self.deliveries.pump(&queue, &mut self.store)?;
        }
        Ok(())
    }
}

/// The externally visible broker: a cheap-to-clone handle every producer and
/// consumer shares. Publish and deliver may block on the core lock, never on
/// I/O.
#[derive(Clone)]
pub struct Broker {
    core: SharedCore,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Broker {
        Broker {
            core: Arc::new(Mutex::new(Core::new(&config))),
        }
    }

    pub async fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
        durable: bool,
    ) -> Result<(), BrokerError> {
        self.core
            .lock()
            .await
            .registry
            .declare_exchange(name, kind, durable)
    }

    pub async fn declare_queue(&self, name: &str, durable: bool) -> Result<(), BrokerError> {
        self.core.lock().await.declare_queue(name, durable)
    }

    pub async fn bind(
        &self,
        exchange: &str,
        queue: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.core.lock().await.registry.bind(exchange, queue, routing_key)
    }

    pub async fn unbind(
        &self,
        exchange: &str,
        queue: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.core
            .lock()
            .await
            .registry
            .unbind(exchange, queue, routing_key)
    }

    /// Routes the message and enqueues a copy into every matching queue, then
    /// immediately pushes to whatever active sessions have capacity.
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), BrokerError> {
        self.core
            .lock()
            .await
            .publish(exchange, routing_key, body, content_type)
    }

    /// Subscribes a consumer to a queue. The returned [`Session`] pulls
    /// deliveries; any backlog already in the queue starts flowing right
    /// away.
    pub async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<Session, BrokerError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        if !core.registry.has_queue(queue) {
            return Err(BrokerError::NotFound {
                entity: "queue",
                name: queue.to_string(),
            });
        }
        let id = core.deliveries.register(queue, consumer_tag, sender)?;
        core.deliveries.pump(queue, &mut core.store)?;
        drop(guard);

        Ok(Session::new(
            self.core.clone(),
            id,
            consumer_tag.to_string(),
            queue.to_string(),
            receiver,
        ))
    }

    /// Deletes the queue, cancelling its consumers and dropping whatever was
    /// still buffered. Bindings referencing the queue disappear with it.
    pub async fn delete_queue(&self, name: &str) -> Result<(), BrokerError> {
        self.core.lock().await.delete_queue(name)
    }

    pub async fn delete_exchange(&self, name: &str) -> Result<(), BrokerError> {
        self.core.lock().await.registry.delete_exchange(name)
    }

    pub async fn queue_depth(&self, name: &str) -> Result<usize, BrokerError> {
        self.core.lock().await.store.len(name)
    }

    /// How many publishes matched no binding and were dropped.
    pub async fn unroutable_count(&self) -> u64 {
        self.core.lock().await.unroutable
    }
}
