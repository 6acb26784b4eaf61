use anyhow::Result;
use bytes::Bytes;
use clap::Parser;
use tracing::info;
use wrenmq::{Broker, BrokerConfig, ExchangeKind};

#[derive(Parser, Debug)]
#[command(name = "wrenmq")]
struct Params {
    /// Optional TOML config file.
    #[arg(long, env = "WRENMQ_CONFIG")]
    config: Option<String>,

    #[arg(long, env = "WRENMQ_EXCHANGE", default_value = "hello-exchange")]
    exchange: String,

    #[arg(long, env = "WRENMQ_QUEUE", default_value = "hello-queue")]
    queue: String,

    #[arg(long, env = "WRENMQ_ROUTING_KEY", default_value = "hola")]
    routing_key: String,

    /// Message bodies to publish; the consumer acks each one and stops after
    /// a "quit" body.
    #[arg(default_values_t = vec![String::from("hello"), String::from("quit")])]
    messages: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_thread_ids(true)
        .compact()
        .init();

    let params = Params::parse();
    info!("wrenmq starting with params: {:?}", params);

    let config = BrokerConfig::load_or_default(params.config.as_deref())?;
    let broker = Broker::new(config);

    broker
        .declare_exchange(&params.exchange, ExchangeKind::Direct, true)
        .await?;
    broker.declare_queue(&params.queue, false).await?;
    broker
        .bind(&params.exchange, &params.queue, &params.routing_key)
        .await?;

    let mut session = broker.consume(&params.queue, "hello-consumer").await?;
    let consumer = tokio::spawn(async move {
        while let Some(delivery) = session.recv().await {
            let body = String::from_utf8_lossy(&delivery.message.body).to_string();
            session.ack(delivery.delivery_tag).await?;
            if body == "quit" {
                session.cancel().await?;
                break;
            }
            println!("{body}");
        }
        anyhow::Ok(())
    });

    for body in &params.messages {
        broker
            .publish(
                &params.exchange,
                &params.routing_key,
                Bytes::from(body.clone()),
                Some("text/plain"),
            )
            .await?;
    }

    consumer.await??;
    info!("done");
    Ok(())
}
