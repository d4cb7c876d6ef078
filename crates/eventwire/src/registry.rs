//! Bookkeeping for queued and in-flight exchanges.

use std::collections::{HashMap, VecDeque};

use crate::exchange::{Exchange, ExchangeKind};
use crate::protocol::RequestId;

/// Holds every exchange the client still owes an answer to.
///
/// An exchange lives in exactly one of two places: the FIFO send queue while
/// it waits for a live connection, or the pending table (keyed by its current
/// correlation id) once it has been written to the wire.
#[derive(Debug, Default)]
pub(crate) struct PendingExchangeRegistry {
    send_queue: VecDeque<Exchange>,
    pending: HashMap<RequestId, Exchange>,
    next_sequence: u64,
}

impl PendingExchangeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a newly submitted exchange to the send queue.
    pub(crate) fn enqueue(&mut self, mut exchange: Exchange) {
        exchange.id = None;
        exchange.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.send_queue.push_back(exchange);
    }

    /// Take the whole send queue, leaving it empty.
    pub(crate) fn take_queue(&mut self) -> VecDeque<Exchange> {
        std::mem::take(&mut self.send_queue)
    }

    /// Put an exchange back at the head of the queue after a failed write.
    pub(crate) fn requeue_front(&mut self, mut exchange: Exchange) {
        exchange.id = None;
        self.send_queue.push_front(exchange);
    }

    /// Record a transmitted exchange under `id`.
    pub(crate) fn insert_pending(&mut self, id: RequestId, mut exchange: Exchange) {
        exchange.id = Some(id.clone());
        self.pending.insert(id, exchange);
    }

    pub(crate) fn pending_kind(&self, id: &str) -> Option<ExchangeKind> {
        self.pending.get(id).map(Exchange::kind)
    }

    pub(crate) fn get_pending_mut(&mut self, id: &str) -> Option<&mut Exchange> {
        self.pending.get_mut(id)
    }

    pub(crate) fn remove_pending(&mut self, id: &str) -> Option<Exchange> {
        self.pending.remove(id)
    }

    /// Move every pending exchange back into the send queue, forgetting its
    /// correlation id.
    ///
    /// The resulting queue is ordered by submission, so exchanges
    /// that were already on the wire and exchanges that never left the queue
    /// are resent interleaved exactly as they were submitted.
    pub(crate) fn drain_pending_to_queue(&mut self) -> usize {
        let drained = self.pending.len();
        if drained == 0 {
            return 0;
        }

        let mut all: Vec<Exchange> = self
            .pending
            .drain()
            .map(|(_, mut exchange)| {
                exchange.id = None;
                exchange
            })
            .collect();
        all.extend(self.send_queue.drain(..));
        all.sort_by_key(|exchange| exchange.sequence);
        self.send_queue = all.into();
        drained
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.send_queue.len()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop everything. Outstanding one-shot futures observe the shutdown.
    pub(crate) fn clear(&mut self) {
        self.send_queue.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::GraphQLRequest;

    fn one_shot(name: &str) -> Exchange {
        Exchange::one_shot(GraphQLRequest::query("{ a }").operation_name(name)).0
    }

    fn names(queue: &VecDeque<Exchange>) -> Vec<String> {
        queue
            .iter()
            .map(|e| e.request().operation_name.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_enqueue_is_fifo() {
        let mut registry = PendingExchangeRegistry::new();
        registry.enqueue(one_shot("a"));
        registry.enqueue(one_shot("b"));

        let queue = registry.take_queue();
        assert_eq!(names(&queue), ["a", "b"]);
        assert_eq!(registry.queue_len(), 0);
    }

    #[test]
    fn test_insert_and_remove_pending() {
        let mut registry = PendingExchangeRegistry::new();
        registry.enqueue(one_shot("a"));
        let exchange = registry.take_queue().pop_front().unwrap();

        registry.insert_pending(RequestId::from_sequence(1), exchange);
        assert_eq!(registry.pending_kind("R1"), Some(ExchangeKind::OneShot));
        assert_eq!(
            registry.get_pending_mut("R1").unwrap().id,
            Some(RequestId::from_sequence(1))
        );

        assert!(registry.remove_pending("R1").is_some());
        assert!(registry.remove_pending("R1").is_none());
        assert_eq!(registry.pending_len(), 0);
    }

    #[test]
    fn test_drain_restores_submission_order_and_clears_ids() {
        let mut registry = PendingExchangeRegistry::new();
        registry.enqueue(one_shot("first"));
        registry.enqueue(one_shot("second"));
        let mut sent = registry.take_queue();
        registry.insert_pending(RequestId::from_sequence(1), sent.pop_front().unwrap());
        registry.insert_pending(RequestId::from_sequence(2), sent.pop_front().unwrap());
        registry.enqueue(one_shot("third"));

        assert_eq!(registry.drain_pending_to_queue(), 2);
        assert_eq!(registry.pending_len(), 0);

        let queue = registry.take_queue();
        assert_eq!(names(&queue), ["first", "second", "third"]);
        assert!(queue.iter().all(|e| e.id.is_none()));
    }

    #[test]
    fn test_drain_with_nothing_pending() {
        let mut registry = PendingExchangeRegistry::new();
        registry.enqueue(one_shot("a"));
        assert_eq!(registry.drain_pending_to_queue(), 0);
        assert_eq!(registry.queue_len(), 1);
    }

    #[test]
    fn test_requeue_front() {
        let mut registry = PendingExchangeRegistry::new();
        registry.enqueue(one_shot("a"));
        registry.enqueue(one_shot("b"));
        let mut queue = registry.take_queue();
        let a = queue.pop_front().unwrap();
        registry.enqueue(one_shot("c"));
        registry.requeue_front(a);

        assert_eq!(names(&registry.take_queue()), ["a", "c"]);
    }
}
