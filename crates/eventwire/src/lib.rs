//! Resilient GraphQL event client.
//!
//! eventwire multiplexes GraphQL queries, mutations and subscriptions over a
//! single persistent WebSocket connection to an event service:
//!
//! - **Correlation**: every transmission carries a fresh id in
//!   `extensions.requestId`; responses are routed back by that id.
//! - **Queueing**: operations submitted while disconnected wait and are sent,
//!   in submission order, once a connection is open.
//! - **Reconnection**: a lost connection is re-established and every
//!   unanswered operation is sent again under a new id. Subscriptions survive
//!   any number of reconnects.
//!
//! # Example
//!
//! ```ignore
//! use eventwire::{ClientConfig, EventClient, GraphQLRequest, IdentifierKind};
//!
//! let config = ClientConfig::from_env()?;
//! let client = EventClient::new(config)?;
//! client.connect()?;
//!
//! let subscriber = client
//!     .get_identifier(IdentifierKind::Subscription, "orders")
//!     .await?;
//! let offset = client.get_offset(&subscriber).await?;
//!
//! let mut events = client.subscribe_stream(
//!     GraphQLRequest::subscription("subscription { orderPlaced { id total } }"),
//! )?;
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event.data);
//! }
//! ```
//!
//! # Logging
//!
//! Diagnostics go through `tracing` under the names in [`logging::targets`],
//! gated by the client's [`LogLevel`].

mod cache;
mod client;
mod config;
mod controller;
mod correlator;
mod error;
mod exchange;
pub mod graphql;
pub mod logging;
pub mod protocol;
mod reconnect;
mod registry;
pub mod tls;
pub mod transport;

pub use cache::IdentifierKind;
pub use client::{EventClient, ResponseFuture, SubscriptionStream};
pub use config::{ClientConfig, DEFAULT_RETRY_DELAY, env};
pub use controller::ConnectionState;
pub use error::{EventwireError, Result};
pub use exchange::{ExchangeKind, SubscriptionCallback};
pub use graphql::{GraphQLError, GraphQLRequest, GraphQLResponse, OperationType};
pub use logging::{LogLevel, LogTarget, TracingWireLogger, WireLogger};
pub use protocol::RequestId;
pub use transport::{
    CloseCode, CloseReason, ConnectRequest, ConnectionId, Frame, Lifecycle, Transport,
    TransportEvents, TransportOptions, WebSocketTransport,
};
