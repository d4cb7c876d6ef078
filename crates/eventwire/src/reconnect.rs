//! What to do when a live connection is lost.

use std::time::Duration;

use crate::config::{ClientConfig, DEFAULT_RETRY_DELAY};
use crate::logging::{LogTarget, WireLog};
use crate::registry::PendingExchangeRegistry;

/// Reconnection settings for one client.
///
/// Lost connections are re-established immediately. Failed connect attempts
/// are retried after `retry_delay`, forever; there is no backoff and no
/// attempt limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReconnectionPolicy {
    pub(crate) enabled: bool,
    pub(crate) retry_delay: Duration,
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl ReconnectionPolicy {
    pub(crate) fn from_config(config: &ClientConfig) -> Self {
        Self {
            enabled: config.reconnect,
            retry_delay: config.retry_delay,
        }
    }

    /// Prepare the registry for a new connection after the old one was lost.
    ///
    /// Returns `true` if the caller should connect again. Every pending
    /// exchange, subscriptions included, goes back to the send queue without
    /// its old correlation id. When reconnection is disabled nothing moves and
    /// the client goes quiet.
    pub(crate) fn reconnect(&self, registry: &mut PendingExchangeRegistry, log: &WireLog) -> bool {
        if !self.enabled {
            log.info(
                LogTarget::Connection,
                format_args!(
                    "connection lost; reconnection disabled, {} exchange(s) left waiting",
                    registry.pending_len() + registry.queue_len()
                ),
            );
            return false;
        }

        let requeued = registry.drain_pending_to_queue();
        log.info(
            LogTarget::Connection,
            format_args!("connection lost; reconnecting with {requeued} exchange(s) to resend"),
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Exchange;
    use crate::graphql::GraphQLRequest;
    use crate::logging::LogLevel;
    use crate::protocol::RequestId;

    fn registry_with_pending() -> PendingExchangeRegistry {
        let mut registry = PendingExchangeRegistry::new();
        registry.enqueue(Exchange::subscription(
            GraphQLRequest::subscription("subscription { e }"),
            Box::new(|_| {}),
        ));
        registry.enqueue(Exchange::one_shot(GraphQLRequest::query("{ a }")).0);
        let mut queue = registry.take_queue();
        registry.insert_pending(RequestId::from_sequence(1), queue.pop_front().unwrap());
        registry.insert_pending(RequestId::from_sequence(2), queue.pop_front().unwrap());
        registry
    }

    #[test]
    fn test_defaults() {
        let policy = ReconnectionPolicy::default();
        assert!(policy.enabled);
        assert_eq!(policy.retry_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_from_config() {
        let config = ClientConfig::new("h", "s")
            .reconnect(false)
            .retry_delay(Duration::from_secs(2));
        let policy = ReconnectionPolicy::from_config(&config);
        assert!(!policy.enabled);
        assert_eq!(policy.retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_reconnect_requeues_everything() {
        let mut registry = registry_with_pending();
        let log = WireLog::tracing(LogLevel::None);

        assert!(ReconnectionPolicy::default().reconnect(&mut registry, &log));
        assert_eq!(registry.pending_len(), 0);
        assert_eq!(registry.queue_len(), 2);
        assert!(registry.take_queue().iter().all(|e| e.id.is_none()));
    }

    #[test]
    fn test_disabled_policy_leaves_registry_alone() {
        let mut registry = registry_with_pending();
        let log = WireLog::tracing(LogLevel::None);
        let policy = ReconnectionPolicy {
            enabled: false,
            ..Default::default()
        };

        assert!(!policy.reconnect(&mut registry, &log));
        assert_eq!(registry.pending_len(), 2);
        assert_eq!(registry.queue_len(), 0);
    }
}
