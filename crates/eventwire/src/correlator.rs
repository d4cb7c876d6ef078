//! Correlation id assignment and inbound routing.

use std::fmt;

use crate::exchange::ExchangeKind;
use crate::graphql::GraphQLResponse;
use crate::logging::{LogTarget, WireLog};
use crate::protocol::RequestId;
use crate::registry::PendingExchangeRegistry;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    /// A one-shot exchange was resolved and removed.
    Resolved(String),
    /// A one-shot exchange was removed but its caller had stopped waiting.
    Abandoned(String),
    /// A subscription callback was invoked; the subscription stays pending.
    Notified(String),
    /// No pending exchange owns the message. It was dropped.
    Unroutable(Option<String>),
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(id) => write!(f, "resolved {id}"),
            Self::Abandoned(id) => write!(f, "discarded late response for {id}"),
            Self::Notified(id) => write!(f, "delivered event for {id}"),
            Self::Unroutable(Some(id)) => write!(f, "dropped message for {id}"),
            Self::Unroutable(None) => write!(f, "dropped message without request id"),
        }
    }
}

/// Hands out correlation ids and routes responses back to their exchange.
///
/// The counter is never reset, so an id is never reused for the lifetime of
/// the client, across any number of reconnects.
#[derive(Debug)]
pub(crate) struct Correlator {
    next: u64,
    log: WireLog,
}

impl Correlator {
    pub(crate) fn new(log: WireLog) -> Self {
        Self { next: 1, log }
    }

    pub(crate) fn assign_id(&mut self) -> RequestId {
        let id = RequestId::from_sequence(self.next);
        self.next += 1;
        id
    }

    /// Route `response` to the exchange named by its `extensions.requestId`.
    ///
    /// The exchange receives the whole message. One-shot exchanges leave the
    /// pending table here; subscriptions stay.
    pub(crate) fn dispatch(
        &self,
        registry: &mut PendingExchangeRegistry,
        response: GraphQLResponse,
    ) -> DispatchOutcome {
        let Some(id) = response.request_id().map(str::to_owned) else {
            self.log.error(
                LogTarget::Dispatch,
                "dropping message without extensions.requestId",
            );
            return DispatchOutcome::Unroutable(None);
        };

        match registry.pending_kind(&id) {
            Some(ExchangeKind::OneShot) => {
                let Some(exchange) = registry.remove_pending(&id) else {
                    return DispatchOutcome::Unroutable(Some(id));
                };
                if exchange.resolve(response) {
                    DispatchOutcome::Resolved(id)
                } else {
                    self.log.info(
                        LogTarget::Dispatch,
                        format_args!("response for {id} arrived after its caller went away"),
                    );
                    DispatchOutcome::Abandoned(id)
                }
            }
            Some(ExchangeKind::Subscription) => {
                let Some(exchange) = registry.get_pending_mut(&id) else {
                    return DispatchOutcome::Unroutable(Some(id));
                };
                if !exchange.notify(response) {
                    self.log.error(
                        LogTarget::Dispatch,
                        format_args!("subscription callback for {id} panicked"),
                    );
                }
                DispatchOutcome::Notified(id)
            }
            None => {
                self.log.error(
                    LogTarget::Dispatch,
                    format_args!("dropping message for unknown or stale request id {id}"),
                );
                DispatchOutcome::Unroutable(Some(id))
            }
        }
    }
}
