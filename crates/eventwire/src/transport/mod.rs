//! The message transport the client runs over.
//!
//! The connection driver only ever talks to a [`Transport`]: it asks it to
//! connect, hands it text frames to send, and asks it to close. Everything the
//! transport observes comes back through the [`TransportEvents`] handle it was
//! given for that connection, on two channels: inbound [`Frame`]s and
//! [`Lifecycle`] changes.
//!
//! [`WebSocketTransport`] is the production implementation. Tests substitute
//! their own.
//!
//! # Implementing a transport
//!
//! ```ignore
//! struct Loopback { events: Option<TransportEvents> }
//!
//! impl Transport for Loopback {
//!     fn connect(&mut self, _request: ConnectRequest, events: TransportEvents) {
//!         events.connected();
//!         self.events = Some(events);
//!     }
//!
//!     fn send(&mut self, text: String) -> Result<()> {
//!         let events = self.events.as_ref().ok_or(EventwireError::NotConnected)?;
//!         events.text(text);
//!         Ok(())
//!     }
//!
//!     fn close(&mut self) {
//!         self.events = None;
//!     }
//! }
//! ```

mod close;
mod websocket;

use std::time::Duration;

use tokio::sync::mpsc;

pub use close::{CloseCode, CloseReason};
pub use websocket::WebSocketTransport;

use crate::error::Result;
use crate::tls::TlsConfig;

/// Identifies one connection attempt. Events from older attempts are ignored.
pub type ConnectionId = u64;

/// Transport tuning handed through to the transport untouched.
#[derive(Clone, Debug, Default)]
pub struct TransportOptions {
    /// Extra headers to send during the handshake.
    pub headers: Vec<(String, String)>,
    /// TLS configuration for `wss://` endpoints.
    pub tls: Option<TlsConfig>,
    /// Give up on a connect attempt after this long.
    pub connect_timeout: Option<Duration>,
}

impl TransportOptions {
    /// Create empty transport options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handshake header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set TLS configuration.
    pub fn tls_config(mut self, config: TlsConfig) -> Self {
        self.tls = Some(config);
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

/// Everything a transport needs to open a connection.
#[derive(Clone, Debug)]
pub struct ConnectRequest {
    /// Endpoint URL.
    pub url: String,
    /// Handshake headers chosen by the client (origin, credentials).
    pub headers: Vec<(String, String)>,
    /// Transport-specific options from the client configuration.
    pub options: TransportOptions,
}

/// An inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A text frame; the only kind the client understands.
    Text(String),
    /// A binary frame.
    Binary(Vec<u8>),
}

/// A connection lifecycle change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// The connection is open and ready for sends.
    Connected,
    /// The connect attempt failed.
    ConnectFailed(String),
    /// An established connection failed.
    Error(String),
    /// An established connection was closed.
    Closed(Option<CloseReason>),
}

/// Where a transport reports what happens on one connection.
///
/// Every event is stamped with the [`ConnectionId`] of the attempt this
/// handle was created for. Sends fail silently once the client is gone; the
/// boolean results say whether the event was delivered.
#[derive(Clone, Debug)]
pub struct TransportEvents {
    connection: ConnectionId,
    messages: mpsc::UnboundedSender<(ConnectionId, Frame)>,
    lifecycle: mpsc::UnboundedSender<(ConnectionId, Lifecycle)>,
}

impl TransportEvents {
    pub(crate) fn new(
        connection: ConnectionId,
        messages: mpsc::UnboundedSender<(ConnectionId, Frame)>,
        lifecycle: mpsc::UnboundedSender<(ConnectionId, Lifecycle)>,
    ) -> Self {
        Self {
            connection,
            messages,
            lifecycle,
        }
    }

    /// The connection attempt this handle reports for.
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Report an inbound frame.
    pub fn message(&self, frame: Frame) -> bool {
        self.messages.send((self.connection, frame)).is_ok()
    }

    /// Report an inbound text frame.
    pub fn text(&self, text: impl Into<String>) -> bool {
        self.message(Frame::Text(text.into()))
    }

    /// Report a lifecycle change.
    pub fn lifecycle(&self, event: Lifecycle) -> bool {
        self.lifecycle.send((self.connection, event)).is_ok()
    }

    /// Report that the connection is open.
    pub fn connected(&self) -> bool {
        self.lifecycle(Lifecycle::Connected)
    }

    /// Report that the connect attempt failed.
    pub fn connect_failed(&self, reason: impl Into<String>) -> bool {
        self.lifecycle(Lifecycle::ConnectFailed(reason.into()))
    }

    /// Report that the open connection failed.
    pub fn error(&self, reason: impl Into<String>) -> bool {
        self.lifecycle(Lifecycle::Error(reason.into()))
    }

    /// Report that the open connection closed.
    pub fn closed(&self, reason: Option<CloseReason>) -> bool {
        self.lifecycle(Lifecycle::Closed(reason))
    }

    /// Whether the client listening on this handle has shut down.
    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }
}

/// A full-duplex text message connection.
///
/// Implementations own at most one live connection. `connect` must not block:
/// it starts the attempt and reports the outcome later through `events`.
pub trait Transport: Send + 'static {
    /// Start connecting, replacing any previous connection.
    fn connect(&mut self, request: ConnectRequest, events: TransportEvents);

    /// Write one text frame on the live connection.
    fn send(&mut self, text: String) -> Result<()>;

    /// Close the live connection, if any. No further events are reported for it.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, request: ConnectRequest, events: TransportEvents) {
        (**self).connect(request, events)
    }

    fn send(&mut self, text: String) -> Result<()> {
        (**self).send(text)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_stamped_with_connection() {
        let (msg_tx, mut msg_rx) = mpsc::unbounded_channel();
        let (life_tx, mut life_rx) = mpsc::unbounded_channel();
        let events = TransportEvents::new(7, msg_tx, life_tx);

        assert!(events.connected());
        assert!(events.text("{}"));
        assert!(events.closed(None));

        assert_eq!(life_rx.try_recv().unwrap(), (7, Lifecycle::Connected));
        assert_eq!(msg_rx.try_recv().unwrap(), (7, Frame::Text("{}".into())));
        assert_eq!(life_rx.try_recv().unwrap(), (7, Lifecycle::Closed(None)));
    }

    #[test]
    fn test_events_after_receiver_dropped() {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (life_tx, life_rx) = mpsc::unbounded_channel();
        let events = TransportEvents::new(1, msg_tx, life_tx);
        drop(msg_rx);
        drop(life_rx);

        assert!(events.is_closed());
        assert!(!events.connected());
        assert!(!events.text("{}"));
    }

    #[test]
    fn test_transport_options_builder() {
        let options = TransportOptions::new()
            .header("X-Client", "eventwire")
            .connect_timeout(Duration::from_secs(5));
        assert_eq!(options.headers.len(), 1);
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(5)));
        assert!(options.tls.is_none());
    }
}
