use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct Message {
    pub body: Bytes,                  // opaque payload, never inspected by the core
    pub content_type: Option<String>, // e.g. "text/plain"
    pub routing_key: String,
    pub timestamp_ms: u64, // unix epoch in millis, set at publish time
    pub redelivered: bool, // true once the message has been requeued at least once
}

impl Message {
    pub fn new(body: Bytes, content_type: Option<&str>, routing_key: &str) -> Message {
        Message {
            body,
            content_type: content_type.map(String::from),
            routing_key: routing_key.to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis() as u64,
            redelivered: false,
        }
    }
}

/// What a consumer session actually receives. The tag is assigned when the
/// message is handed to the session, not when it is enqueued, and stays valid
/// until the session acks, nacks or is cancelled.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub consumer_tag: String,
    pub queue: String,
    pub message: Message,
}
