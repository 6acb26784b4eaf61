use crate::core::error::BrokerError;
use crate::core::registry::{ExchangeKind, Registry};

/// Resolves which queues a message published to `exchange` with
/// `routing_key` should land in.
///
/// Direct exchanges match the binding key exactly, fanout ignores the key,
/// topic treats the binding key as a dot-separated pattern where `*` matches
/// exactly one segment and `#` matches zero or more. An unknown exchange is
/// an error; zero matches is not — the caller decides what to do with an
/// unroutable message.
pub fn resolve_targets(
    registry: &Registry,
    exchange: &str,
    routing_key: &str,
) -> Result<Vec<String>, BrokerError> {
    let kind = registry
        .exchange(exchange)
        .ok_or_else(|| BrokerError::NotFound {
            entity: "exchange",
            name: exchange.to_string(),
        })?
        .kind;

    let mut targets: Vec<String> = Vec::new();
    for binding in registry.bindings_for(exchange) {
        let matched = match kind {
            ExchangeKind::Direct => binding.routing_key == routing_key,
            ExchangeKind::Fanout => true,
            ExchangeKind::Topic => topic_matches(&binding.routing_key, routing_key),
        };
        // overlapping bindings on the same queue must not duplicate delivery
        if matched && !targets.iter().any(|q| q == &binding.queue) {
            targets.push(binding.queue.clone());
        }
    }
    Ok(targets)
}

pub fn topic_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    segments_match(&pattern, &key)
}

fn segments_match(pattern: &[&str], key: &[&str]) -> bool {
    let Some((first, rest)) = pattern.split_first() else {
        return key.is_empty();
    };
    match *first {
        // `#` may swallow any number of leading segments, including none
        "#" => (0..=key.len()).any(|skip| segments_match(rest, &key[skip..])),
        "*" => key
            .split_first()
            .is_some_and(|(_, key_rest)| segments_match(rest, key_rest)),
        segment => key
            .split_first()
            .is_some_and(|(k, key_rest)| *k == segment && segments_match(rest, key_rest)),
    }
}
