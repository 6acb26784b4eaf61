#![allow(dead_code)] // not every suite uses every helper

use wrenmq::{Broker, BrokerConfig, ExchangeKind};

pub fn broker() -> Broker {
    Broker::new(BrokerConfig::default())
}

pub fn broker_with_prefetch(prefetch_limit: usize) -> Broker {
    Broker::new(BrokerConfig {
        prefetch_limit,
        ..BrokerConfig::default()
    })
}

/// The topology of the original hello-world scripts: a durable direct
/// exchange, one queue, bound under "hola".
pub async fn hello_topology(broker: &Broker) {
    broker
        .declare_exchange("hello-exchange", ExchangeKind::Direct, true)
        .await
        .expect("declare exchange failed");
    broker
        .declare_queue("hello-queue", false)
        .await
        .expect("declare queue failed");
    broker
        .bind("hello-exchange", "hello-queue", "hola")
        .await
        .expect("bind failed");
}
