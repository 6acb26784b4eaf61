use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Declaration conflict for {entity} '{name}'")]
    Conflict { entity: &'static str, name: String },

    #[error("No such {entity}: '{name}'")]
    NotFound { entity: &'static str, name: String },

    #[error("Delivery tag {tag} is not outstanding for consumer '{consumer_tag}'")]
    UnknownTag { consumer_tag: String, tag: u64 },

    #[error("Broken broker invariant: {0}")]
    Internal(String),
}
