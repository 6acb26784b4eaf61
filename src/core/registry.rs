use std::collections::HashMap;

use crate::core::error::BrokerError;

/// The nameless direct exchange every queue is implicitly bound to under its
/// own name. It exists from the start and cannot be redeclared differently,
/// bound explicitly, or deleted.
pub const DEFAULT_EXCHANGE: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Direct,
    Fanout,
    Topic,
}

#[derive(Debug, Clone)]
pub struct Exchange {
    pub name: String,
    pub kind: ExchangeKind,
    pub durable: bool,
}

#[derive(Debug, Clone)]
pub struct QueueInfo {
    pub name: String,
    pub durable: bool,
}

/// A binding is a fact relating an exchange to a queue under a routing key
/// pattern, not an owned object. Duplicates are collapsed on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub exchange: String,
    pub queue: String,
    pub routing_key: String,
}

/// Pure in-memory name registry: exchanges, queues and the bindings between
/// them. No I/O, and no partial mutation — every failing operation leaves the
/// registry exactly as it was.
#[derive(Debug)]
pub struct Registry {
    exchanges: HashMap<String, Exchange>,
    queues: HashMap<String, QueueInfo>,
    bindings: Vec<Binding>,
}

impl Registry {
    pub fn new() -> Registry {
        let mut registry = Registry {
            exchanges: HashMap::new(),
            queues: HashMap::new(),
            bindings: Vec::new(),
        };
        registry.exchanges.insert(
            DEFAULT_EXCHANGE.to_string(),
            Exchange {
                name: DEFAULT_EXCHANGE.to_string(),
                kind: ExchangeKind::Direct,
                durable: true,
            },
        );
        registry
    }

    /// Idempotent when the parameters match the existing declaration,
    /// `Conflict` when they do not.
    pub fn declare_exchange(
        &mut self,
        name: &str,
        kind: ExchangeKind,
        durable: bool,
    ) -> Result<(), BrokerError> {
        if let Some(existing) = self.exchanges.get(name) {
            if existing.kind == kind && existing.durable == durable {
                return Ok(());
            }
            return Err(BrokerError::Conflict {
                entity: "exchange",
                name: name.to_string(),
            });
        }
        self.exchanges.insert(
            name.to_string(),
            Exchange {
                name: name.to_string(),
                kind,
                durable,
            },
        );
        Ok(())
    }

    /// Returns whether the queue was newly created, so the caller can set up
    /// its buffer. A fresh queue is implicitly bound to the default exchange
    /// under its own name.
    pub fn declare_queue(&mut self, name: &str, durable: bool) -> Result<bool, BrokerError> {
        if let Some(existing) = self.queues.get(name) {
            if existing.durable == durable {
                return Ok(false);
            }
            return Err(BrokerError::Conflict {
                entity: "queue",
                name: name.to_string(),
            });
        }
        self.queues.insert(
            name.to_string(),
            QueueInfo {
                name: name.to_string(),
                durable,
            },
        );
        self.bindings.push(Binding {
            exchange: DEFAULT_EXCHANGE.to_string(),
            queue: name.to_string(),
            routing_key: name.to_string(),
        });
        Ok(true)
    }

    pub fn bind(
        &mut self,
        exchange: &str,
        queue: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        if exchange == DEFAULT_EXCHANGE {
            return Err(BrokerError::Conflict {
                entity: "exchange",
                name: String::from("(default)"),
            });
        }
        if !self.exchanges.contains_key(exchange) {
            return Err(BrokerError::NotFound {
                entity: "exchange",
                name: exchange.to_string(),
            });
        }
        if !self.queues.contains_key(queue) {
            return Err(BrokerError::NotFound {
                entity: "queue",
                name: queue.to_string(),
            });
        }
        let binding = Binding {
            exchange: exchange.to_string(),
            queue: queue.to_string(),
            routing_key: routing_key.to_string(),
        };
        if !self.bindings.contains(&binding) {
            self.bindings.push(binding);
        }
        Ok(())
    }

    pub fn unbind(
        &mut self,
        exchange: &str,
        queue: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        if exchange == DEFAULT_EXCHANGE {
            return Err(BrokerError::Conflict {
                entity: "exchange",
                name: String::from("(default)"),
            });
        }
        let position = self.bindings.iter().position(|b| {
            b.exchange == exchange && b.queue == queue && b.routing_key == routing_key
        });
        match position {
            Some(idx) => {
                self.bindings.remove(idx);
                Ok(())
            }
            None => Err(BrokerError::NotFound {
                entity: "binding",
                name: format!("{exchange} -> {queue} ({routing_key})"),
            }),
        }
    }

    /// Removes the queue and every binding that references it, including the
    /// implicit default-exchange one.
    pub fn delete_queue(&mut self, name: &str) -> Result<(), BrokerError> {
        if self.queues.remove(name).is_none() {
            return Err(BrokerError::NotFound {
                entity: "queue",
                name: name.to_string(),
            });
        }
        self.bindings.retain(|b| b.queue != name);
        Ok(())
    }

    pub fn delete_exchange(&mut self, name: &str) -> Result<(), BrokerError> {
        if name == DEFAULT_EXCHANGE {
            return Err(BrokerError::Conflict {
                entity: "exchange",
                name: String::from("(default)"),
            });
        }
        if self.exchanges.remove(name).is_none() {
            return Err(BrokerError::NotFound {
                entity: "exchange",
                name: name.to_string(),
            });
        }
        self.bindings.retain(|b| b.exchange != name);
        Ok(())
    }

    pub fn exchange(&self, name: &str) -> Option<&Exchange> {
        self.exchanges.get(name)
    }

    pub fn has_queue(&self, name: &str) -> bool {
        self.queues.contains_key(name)
    }

    pub fn bindings_for<'a>(&'a self, exchange: &'a str) -> impl Iterator<Item = &'a Binding> + 'a {
        self.bindings.iter().filter(move |b| b.exchange == exchange)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}
