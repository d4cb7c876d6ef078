//! The connection driver.
//!
//! One [`ConnectionController`] runs per client as a tokio task. It is the
//! only owner of the send queue, the pending table and the id counter, so
//! every transition below runs to completion without locking:
//!
//! ```text
//! Disconnected --connect()--> Connecting --Connected--> Connected
//!      ^                        |   ^                      |
//!      |      ConnectFailed, Error or Closed:              |
//!      |      retry after delay                            |
//!      +------------------- Error / Closed ----------------+
//!                      (reconnect immediately if enabled)
//! ```

use std::fmt;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::correlator::Correlator;
use crate::exchange::Exchange;
use crate::logging::{LogTarget, WireLog};
use crate::protocol;
use crate::reconnect::ReconnectionPolicy;
use crate::registry::PendingExchangeRegistry;
use crate::transport::{ConnectRequest, ConnectionId, Frame, Lifecycle, Transport, TransportEvents};

/// Connection state of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No live connection. Submissions wait in the send queue.
    #[default]
    Disconnected,
    /// A connect attempt is in progress.
    Connecting,
    /// Connected; submissions go straight to the wire.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Requests from client handles to the driver.
pub(crate) enum Command {
    Submit(Exchange),
    Connect,
    Shutdown,
}

pub(crate) struct ConnectionController {
    transport: Box<dyn Transport>,
    request: ConnectRequest,
    registry: PendingExchangeRegistry,
    correlator: Correlator,
    policy: ReconnectionPolicy,
    log: WireLog,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    connection: ConnectionId,
    retry_at: Option<Instant>,
    message_tx: mpsc::UnboundedSender<(ConnectionId, Frame)>,
    message_rx: mpsc::UnboundedReceiver<(ConnectionId, Frame)>,
    lifecycle_tx: mpsc::UnboundedSender<(ConnectionId, Lifecycle)>,
    lifecycle_rx: mpsc::UnboundedReceiver<(ConnectionId, Lifecycle)>,
}

impl ConnectionController {
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        request: ConnectRequest,
        policy: ReconnectionPolicy,
        log: WireLog,
        state_tx: watch::Sender<ConnectionState>,
    ) -> Self {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            request,
            registry: PendingExchangeRegistry::new(),
            correlator: Correlator::new(log.clone()),
            policy,
            log,
            state: ConnectionState::Disconnected,
            state_tx,
            connection: 0,
            retry_at: None,
            message_tx,
            message_rx,
            lifecycle_tx,
            lifecycle_rx,
        }
    }

    /// Drive the client until it is shut down or every handle is gone.
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let retry_at = self.retry_at;

            // Inbound frames first: a response that arrived before a close
            // must still be routed before the close requeues its exchange.
            tokio::select! {
                biased;

                Some((connection, frame)) = self.message_rx.recv() => {
                    self.handle_frame(connection, frame);
                }

                Some((connection, event)) = self.lifecycle_rx.recv() => {
                    self.handle_lifecycle(connection, event);
                }

                command = commands.recv() => {
                    match command {
                        Some(Command::Submit(exchange)) => self.submit(exchange),
                        Some(Command::Connect) => self.connect(),
                        Some(Command::Shutdown) | None => break,
                    }
                }

                _ = tokio::time::sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    self.start_connect();
                }
            }
        }

        self.shutdown();
    }

    pub(crate) fn submit(&mut self, exchange: Exchange) {
        self.registry.enqueue(exchange);
        if self.state == ConnectionState::Connected {
            self.flush();
        }
    }

    /// Explicit connect request from the application.
    pub(crate) fn connect(&mut self) {
        if self.state != ConnectionState::Disconnected {
            self.log.info(
                LogTarget::Connection,
                format_args!("connect ignored; already {}", self.state),
            );
            return;
        }

        // Exchanges stranded by a lost connection with reconnection disabled.
        self.registry.drain_pending_to_queue();
        self.start_connect();
    }

    fn start_connect(&mut self) {
        self.retry_at = None;
        self.connection += 1;
        self.set_state(ConnectionState::Connecting);
        self.log.info(
            LogTarget::Connection,
            format_args!("connecting to {} (attempt #{})", self.request.url, self.connection),
        );

        let events = TransportEvents::new(
            self.connection,
            self.message_tx.clone(),
            self.lifecycle_tx.clone(),
        );
        self.transport.connect(self.request.clone(), events);
    }

    pub(crate) fn handle_lifecycle(&mut self, connection: ConnectionId, event: Lifecycle) {
        if connection != self.connection {
            self.log.fine(
                LogTarget::Connection,
                format_args!("ignoring {event:?} from superseded connection #{connection}"),
            );
            return;
        }

        match event {
            Lifecycle::Connected => {
                self.set_state(ConnectionState::Connected);
                self.log.info(
                    LogTarget::Connection,
                    format_args!(
                        "connected to {}; sending {} queued exchange(s)",
                        self.request.url,
                        self.registry.queue_len()
                    ),
                );
                self.flush();
            }
            Lifecycle::ConnectFailed(reason) => self.connect_failed(reason),
            // Before `Connected`, an error or close is a failed attempt.
            Lifecycle::Error(reason) if self.state == ConnectionState::Connecting => {
                self.connect_failed(reason)
            }
            Lifecycle::Closed(reason) if self.state == ConnectionState::Connecting => match reason {
                Some(reason) => self.connect_failed(format_args!("closed during handshake: {reason}")),
                None => self.connect_failed("closed during handshake"),
            },
            Lifecycle::Error(reason) => {
                self.log.error(LogTarget::Connection, format_args!("connection error: {reason}"));
                self.connection_lost();
            }
            Lifecycle::Closed(reason) => {
                match reason {
                    Some(reason) => self.log.info(
                        LogTarget::Connection,
                        format_args!("connection closed: {reason}"),
                    ),
                    None => self.log.info(LogTarget::Connection, "connection closed"),
                }
                self.connection_lost();
            }
        }
    }

    fn connect_failed(&mut self, reason: impl fmt::Display) {
        self.log.error(
            LogTarget::Connection,
            format_args!("connect to {} failed: {reason}", self.request.url),
        );
        self.set_state(ConnectionState::Disconnected);
        self.retry_at = Some(Instant::now() + self.policy.retry_delay);
        self.log.info(
            LogTarget::Connection,
            format_args!("retrying in {:?}", self.policy.retry_delay),
        );
    }

    fn connection_lost(&mut self) {
        self.transport.close();
        self.set_state(ConnectionState::Disconnected);
        if self.policy.reconnect(&mut self.registry, &self.log) {
            self.start_connect();
        }
    }

    pub(crate) fn handle_frame(&mut self, connection: ConnectionId, frame: Frame) {
        if connection != self.connection {
            self.log.fine(
                LogTarget::Wire,
                format_args!("ignoring frame from superseded connection #{connection}"),
            );
            return;
        }

        match frame {
            Frame::Text(text) => {
                self.log.fine(LogTarget::Wire, format_args!("<< {text}"));
                match protocol::decode(&text) {
                    Ok(response) => {
                        let outcome = self.correlator.dispatch(&mut self.registry, response);
                        self.log.fine(LogTarget::Dispatch, outcome);
                    }
                    Err(e) => {
                        self.log.error(
                            LogTarget::Wire,
                            format_args!("dropping undecodable message: {e}"),
                        );
                    }
                }
            }
            Frame::Binary(data) => {
                self.log.error(
                    LogTarget::Wire,
                    format_args!("dropping binary frame of {} bytes", data.len()),
                );
            }
        }
    }

    /// Write every queued exchange, in order, with a fresh id each.
    fn flush(&mut self) {
        let mut queue = self.registry.take_queue();
        while let Some(exchange) = queue.pop_front() {
            if let Err(exchange) = self.transmit(exchange) {
                // The connection is going away; its lifecycle event follows.
                for rest in queue.into_iter().rev() {
                    self.registry.requeue_front(rest);
                }
                self.registry.requeue_front(exchange);
                return;
            }
        }
    }

    fn transmit(&mut self, exchange: Exchange) -> Result<(), Exchange> {
        let id = self.correlator.assign_id();
        let text = match protocol::encode(exchange.request(), &id) {
            Ok(text) => text,
            Err(e) => {
                self.log.error(
                    LogTarget::Wire,
                    format_args!("dropping {exchange:?}: cannot encode request: {e}"),
                );
                return Ok(());
            }
        };

        self.log.fine(LogTarget::Wire, format_args!(">> {text}"));
        match self.transport.send(text) {
            Ok(()) => {
                self.registry.insert_pending(id, exchange);
                Ok(())
            }
            Err(e) => {
                self.log.error(
                    LogTarget::Wire,
                    format_args!("send of {id} failed: {e}; keeping it queued"),
                );
                Err(exchange)
            }
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn shutdown(&mut self) {
        self.log.info(
            LogTarget::Connection,
            format_args!(
                "shutting down with {} pending and {} queued exchange(s)",
                self.registry.pending_len(),
                self.registry.queue_len()
            ),
        );
        self.retry_at = None;
        self.transport.close();
        self.registry.clear();
        self.set_state(ConnectionState::Disconnected);
    }
}
