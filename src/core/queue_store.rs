use std::collections::{HashMap, VecDeque};

use crate::core::error::BrokerError;
use crate::core::message::Message;

/// FIFO buffers, one per declared queue. Nothing here knows about consumers
/// or tags; a message sits in its buffer from enqueue until it is handed to
/// the delivery side, and comes back via `requeue_front` on nack or cancel.
#[derive(Debug, Default)]
pub struct QueueStore {
    buffers: HashMap<String, VecDeque<Message>>,
}

impl QueueStore {
    pub fn create(&mut self, name: &str) {
        self.buffers.entry(name.to_string()).or_default();
    }

    pub fn drop_queue(&mut self, name: &str) -> Option<VecDeque<Message>> {
        self.buffers.remove(name)
    }

    pub fn enqueue(&mut self, name: &str, message: Message) -> Result<(), BrokerError> {
        self.buffer_mut(name)?.push_back(message);
        Ok(())
    }

    pub fn peek(&self, name: &str) -> Result<Option<&Message>, BrokerError> {
        Ok(self.buffer(name)?.front())
    }

    pub fn pop_head(&mut self, name: &str) -> Result<Option<Message>, BrokerError> {
        Ok(self.buffer_mut(name)?.pop_front())
    }

    /// Requeued messages go to the head, ahead of anything enqueued after the
    /// original delivery attempt.
    pub fn requeue_front(&mut self, name: &str, message: Message) -> Result<(), BrokerError> {
        self.buffer_mut(name)?.push_front(message);
        Ok(())
    }

    pub fn len(&self, name: &str) -> Result<usize, BrokerError> {
        Ok(self.buffer(name)?.len())
    }

    pub fn is_empty(&self, name: &str) -> Result<bool, BrokerError> {
        Ok(self.buffer(name)?.is_empty())
    }

    fn buffer(&self, name: &str) -> Result<&VecDeque<Message>, BrokerError> {
        self.buffers.get(name).ok_or_else(|| not_found(name))
    }

    fn buffer_mut(&mut self, name: &str) -> Result<&mut VecDeque<Message>, BrokerError> {
        self.buffers.get_mut(name).ok_or_else(|| not_found(name))
    }
}

fn not_found(name: &str) -> BrokerError {
    BrokerError::NotFound {
        entity: "queue",
        name: name.to_string(),
    }
}
