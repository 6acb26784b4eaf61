mod common;

use bytes::Bytes;
use wrenmq::{BrokerError, ExchangeKind};

use crate::common::{broker, hello_topology};

#[tokio::test]
async fn hello_scenario_delivers_acks_and_empties_the_queue() {
    let broker = broker();
    hello_topology(&broker).await;

    let mut session = broker.consume("hello-queue", "hello-consumer").await.unwrap();
    broker
        .publish(
            "hello-exchange",
            "hola",
            Bytes::from_static(b"hello"),
            Some("text/plain"),
        )
        .await
        .unwrap();

    let delivery = session.recv().await.expect("expected a delivery");
    assert_eq!(&delivery.message.body[..], b"hello");
    assert_eq!(delivery.message.routing_key, "hola");
    assert_eq!(delivery.message.content_type.as_deref(), Some("text/plain"));
    assert!(!delivery.message.redelivered);
    assert_eq!(delivery.consumer_tag, "hello-consumer");

    session.ack(delivery.delivery_tag).await.unwrap();
    assert_eq!(broker.queue_depth("hello-queue").await.unwrap(), 0);
}

#[tokio::test]
async fn consumer_sees_backlog_published_before_it_subscribed() {
    let broker = broker();
    hello_topology(&broker).await;

    broker
        .publish("hello-exchange", "hola", Bytes::from_static(b"early"), None)
        .await
        .unwrap();

    let mut session = broker.consume("hello-queue", "late-consumer").await.unwrap();
    let delivery = session.recv().await.expect("backlog should flow on consume");
    assert_eq!(&delivery.message.body[..], b"early");
}

#[tokio::test]
async fn redeclare_with_identical_parameters_is_idempotent() {
    let broker = broker();
    hello_topology(&broker).await;

    // same declarations again, verbatim
    hello_topology(&broker).await;

    broker
        .publish("hello-exchange", "hola", Bytes::from_static(b"once"), None)
        .await
        .unwrap();
    // a duplicated registry entry would have doubled the depth
    assert_eq!(broker.queue_depth("hello-queue").await.unwrap(), 1);
}

#[tokio::test]
async fn conflicting_redeclare_fails_and_changes_nothing() {
    let broker = broker();
    hello_topology(&broker).await;

    let err = broker
        .declare_exchange("hello-exchange", ExchangeKind::Fanout, true)
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Conflict { entity: "exchange", .. }));

    let err = broker.declare_queue("hello-queue", true).await.unwrap_err();
    assert!(matches!(err, BrokerError::Conflict { entity: "queue", .. }));

    // the original topology still routes
    broker
        .publish("hello-exchange", "hola", Bytes::from_static(b"still"), None)
        .await
        .unwrap();
    assert_eq!(broker.queue_depth("hello-queue").await.unwrap(), 1);
}

#[tokio::test]
async fn bind_against_missing_names_fails() {
    let broker = broker();
    broker
        .declare_exchange("orders", ExchangeKind::Direct, false)
        .await
        .unwrap();

    let err = broker.bind("orders", "no-such-queue", "k").await.unwrap_err();
    assert!(matches!(err, BrokerError::NotFound { entity: "queue", .. }));

    let err = broker.bind("no-such-exchange", "q", "k").await.unwrap_err();
    assert!(matches!(err, BrokerError::NotFound { entity: "exchange", .. }));
}

#[tokio::test]
async fn consume_on_missing_queue_fails() {
    let broker = broker();

    let err = broker.consume("ghost", "tag").await.unwrap_err();
    assert!(matches!(err, BrokerError::NotFound { entity: "queue", .. }));
}

#[tokio::test]
async fn duplicate_consumer_tag_on_one_queue_conflicts() {
    let broker = broker();
    hello_topology(&broker).await;
    broker.declare_queue("other-queue", false).await.unwrap();

    let _first = broker.consume("hello-queue", "worker").await.unwrap();
    let err = broker.consume("hello-queue", "worker").await.unwrap_err();
    assert!(matches!(err, BrokerError::Conflict { entity: "consumer", .. }));

    // the same tag on a different queue is fine
    broker.consume("other-queue", "worker").await.unwrap();
}

#[tokio::test]
async fn cancelled_tag_can_be_reused_on_the_same_queue() {
    let broker = broker();
    hello_topology(&broker).await;

    let session = broker.consume("hello-queue", "worker").await.unwrap();
    session.cancel().await.unwrap();

    broker.consume("hello-queue", "worker").await.unwrap();
}

#[tokio::test]
async fn delete_queue_cancels_consumers_and_drops_messages() {
    let broker = broker();
    hello_topology(&broker).await;

    broker
        .publish("hello-exchange", "hola", Bytes::from_static(b"doomed"), None)
        .await
        .unwrap();
    let mut session = broker.consume("hello-queue", "worker").await.unwrap();

    broker.delete_queue("hello-queue").await.unwrap();

    // the session's channel closes once the pushed backlog is drained
    let mut drained = 0;
    while session.recv().await.is_some() {
        drained += 1;
    }
    assert!(drained <= 1);

    assert!(matches!(
        broker.queue_depth("hello-queue").await,
        Err(BrokerError::NotFound { .. })
    ));

    // the binding died with the queue, so the publish is now unroutable
    broker
        .publish("hello-exchange", "hola", Bytes::from_static(b"nowhere"), None)
        .await
        .unwrap();
    assert_eq!(broker.unroutable_count().await, 1);
}

#[tokio::test]
async fn delete_exchange_removes_its_bindings() {
    let broker = broker();
    hello_topology(&broker).await;

    broker.delete_exchange("hello-exchange").await.unwrap();

    let err = broker
        .publish("hello-exchange", "hola", Bytes::from_static(b"x"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::NotFound { entity: "exchange", .. }));

    // the queue itself survives
    assert_eq!(broker.queue_depth("hello-queue").await.unwrap(), 0);
}
