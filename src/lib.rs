pub mod core;

mod config;
mod types;

pub use config::BrokerConfig;

// Public re-exports for easy access
pub use core::broker::Broker;
pub use core::error::BrokerError;
pub use core::message::{Delivery, Message};
pub use core::registry::{Binding, Exchange, ExchangeKind, QueueInfo, DEFAULT_EXCHANGE};
pub use core::session::{Session, SessionState};
