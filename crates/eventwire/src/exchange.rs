//! Exchanges: one submitted operation plus the handler its responses go to.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tokio::sync::oneshot;

use crate::graphql::{GraphQLRequest, GraphQLResponse};
use crate::protocol::RequestId;

/// Callback invoked once per inbound event of a subscription.
pub type SubscriptionCallback = Box<dyn FnMut(GraphQLResponse) + Send + 'static>;

/// Whether an exchange resolves once or keeps receiving events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Queries and mutations: resolved exactly once.
    OneShot,
    /// Standing subscriptions: invoked for every event, never completed.
    Subscription,
}

pub(crate) enum Completion {
    OneShot(oneshot::Sender<GraphQLResponse>),
    Subscription(SubscriptionCallback),
}

/// A unit of work owned by the connection driver.
///
/// `id` is `None` while the exchange sits in the send queue and holds the
/// correlation id of the current transmission while it is pending.
/// `sequence` is the submission order, stable across reconnects.
pub(crate) struct Exchange {
    request: GraphQLRequest,
    completion: Completion,
    pub(crate) id: Option<RequestId>,
    pub(crate) sequence: u64,
}

impl Exchange {
    /// A one-shot exchange and the receiver its response will arrive on.
    pub(crate) fn one_shot(request: GraphQLRequest) -> (Self, oneshot::Receiver<GraphQLResponse>) {
        let (tx, rx) = oneshot::channel();
        let exchange = Self {
            request,
            completion: Completion::OneShot(tx),
            id: None,
            sequence: 0,
        };
        (exchange, rx)
    }

    pub(crate) fn subscription(request: GraphQLRequest, callback: SubscriptionCallback) -> Self {
        Self {
            request,
            completion: Completion::Subscription(callback),
            id: None,
            sequence: 0,
        }
    }

    pub(crate) fn kind(&self) -> ExchangeKind {
        match self.completion {
            Completion::OneShot(_) => ExchangeKind::OneShot,
            Completion::Subscription(_) => ExchangeKind::Subscription,
        }
    }

    pub(crate) fn request(&self) -> &GraphQLRequest {
        &self.request
    }

    /// Resolve a one-shot exchange, consuming it.
    ///
    /// Returns `false` if the caller already dropped the future, or if this
    /// is a subscription (which is never resolved this way).
    pub(crate) fn resolve(self, response: GraphQLResponse) -> bool {
        match self.completion {
            Completion::OneShot(tx) => tx.send(response).is_ok(),
            Completion::Subscription(_) => false,
        }
    }

    /// Invoke a subscription's callback with one event.
    ///
    /// Returns `false` if the callback panicked. The panic does not escape,
    /// and the subscription stays usable for later events.
    pub(crate) fn notify(&mut self, response: GraphQLResponse) -> bool {
        match &mut self.completion {
            Completion::Subscription(callback) => {
                panic::catch_unwind(AssertUnwindSafe(|| callback(response))).is_ok()
            }
            Completion::OneShot(_) => true,
        }
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("kind", &self.kind())
            .field("id", &self.id)
            .field("sequence", &self.sequence)
            .field("operation_name", &self.request.operation_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_one_shot_resolves_once() {
        let (exchange, mut rx) = Exchange::one_shot(GraphQLRequest::query("{ a }"));
        assert_eq!(exchange.kind(), ExchangeKind::OneShot);
        assert!(exchange.id.is_none());

        assert!(exchange.resolve(GraphQLResponse::default()));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_one_shot_with_dropped_receiver() {
        let (exchange, rx) = Exchange::one_shot(GraphQLRequest::query("{ a }"));
        drop(rx);
        assert!(!exchange.resolve(GraphQLResponse::default()));
    }

    #[test]
    fn test_subscription_notifies_repeatedly() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let mut exchange = Exchange::subscription(
            GraphQLRequest::subscription("subscription { e }"),
            Box::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(exchange.kind(), ExchangeKind::Subscription);

        assert!(exchange.notify(GraphQLResponse::default()));
        assert!(exchange.notify(GraphQLResponse::default()));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let mut exchange = Exchange::subscription(
            GraphQLRequest::subscription("subscription { e }"),
            Box::new(move |_| {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("handler bug");
                }
            }),
        );

        assert!(!exchange.notify(GraphQLResponse::default()));
        assert!(exchange.notify(GraphQLResponse::default()));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
