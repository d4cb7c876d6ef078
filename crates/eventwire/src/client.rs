//! The client handle applications hold.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use crate::cache::{IdentifierCache, IdentifierKind};
use crate::config::ClientConfig;
use crate::controller::{Command, ConnectionController, ConnectionState};
use crate::error::{EventwireError, Result};
use crate::exchange::Exchange;
use crate::graphql::{GraphQLRequest, GraphQLResponse};
use crate::logging::{LogLevel, TracingWireLogger, WireLog, WireLogger};
use crate::reconnect::ReconnectionPolicy;
use crate::transport::{ConnectRequest, Transport, WebSocketTransport};

const GET_OFFSET: &str = "query GetOffset($subscriberId: ID!) { offset(subscriberId: $subscriberId) }";
const SET_OFFSET: &str = "mutation SetOffset($subscriberId: ID!, $offset: String!) { \
     setOffset(subscriberId: $subscriberId, offset: $offset) }";

/// A client multiplexing GraphQL exchanges over one persistent connection.
///
/// Handles are cheap to clone and all drive the same connection. The
/// connection is shut down when [`shutdown`](Self::shutdown) is called or the
/// last handle is dropped.
///
/// # Example
///
/// ```ignore
/// use eventwire::{ClientConfig, EventClient, GraphQLRequest};
///
/// let client = EventClient::new(ClientConfig::new("events.example.com", "prod"))?;
/// client.connect()?;
///
/// let response = client
///     .submit(GraphQLRequest::query("{ status }"))
///     .await?;
/// println!("{:?}", response.data);
///
/// client.subscribe(
///     GraphQLRequest::subscription("subscription { orderPlaced { id } }"),
///     |event| println!("order: {:?}", event.data),
/// )?;
/// ```
#[derive(Clone)]
pub struct EventClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    commands: mpsc::UnboundedSender<Command>,
    identifiers: IdentifierCache,
    log: WireLog,
    state: watch::Receiver<ConnectionState>,
    endpoint: String,
}

impl EventClient {
    /// Create a client speaking WebSocket to the configured endpoint.
    ///
    /// Nothing is connected until [`connect`](Self::connect) is called. Must be
    /// called from within a tokio runtime.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, WebSocketTransport::new())
    }

    /// Create a client over any [`Transport`].
    pub fn with_transport(config: ClientConfig, transport: impl Transport) -> Result<Self> {
        Self::with_logger(config, transport, Arc::new(TracingWireLogger))
    }

    /// Create a client over any [`Transport`], logging to `logger`.
    pub fn with_logger(
        config: ClientConfig,
        transport: impl Transport,
        logger: Arc<dyn WireLogger>,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            EventwireError::Config("EventClient must be created inside a tokio runtime".into())
        })?;

        let log = WireLog::new(config.log_level, logger);
        let endpoint = config.endpoint_url();
        let request = ConnectRequest {
            url: endpoint.clone(),
            headers: config.handshake_headers(),
            options: config.transport.clone(),
        };

        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let controller = ConnectionController::new(
            Box::new(transport),
            request,
            ReconnectionPolicy::from_config(&config),
            log.clone(),
            state_tx,
        );
        runtime.spawn(controller.run(command_rx));

        Ok(Self {
            inner: Arc::new(ClientInner {
                commands: command_tx,
                identifiers: IdentifierCache::new(),
                log,
                state: state_rx,
                endpoint,
            }),
        })
    }

    /// Start connecting.
    ///
    /// Ignored while a connection is open or being opened. Calling this after
    /// a lost connection with reconnection disabled resends every exchange
    /// that was still waiting.
    pub fn connect(&self) -> Result<()> {
        self.command(Command::Connect)
    }

    /// Submit a query or mutation and wait for its response.
    ///
    /// The request is queued while disconnected and sent once a connection is
    /// open; if the connection drops before the answer arrives it is sent
    /// again. The future never fails because of connectivity, only with
    /// [`EventwireError::ClientClosed`] when the client shuts down first.
    ///
    /// GraphQL errors in the payload are part of a successful response.
    /// Subscription documents belong to [`subscribe`](Self::subscribe); the
    /// future fails at once with [`EventwireError::Config`] for them.
    pub fn submit(&self, request: GraphQLRequest) -> ResponseFuture {
        if request.is_subscription() {
            return ResponseFuture::failed(EventwireError::Config(
                "subscription documents must be started with subscribe".into(),
            ));
        }
        let (exchange, receiver) = Exchange::one_shot(request);
        // On failure the exchange is dropped and the future reports it.
        let _ = self.inner.commands.send(Command::Submit(exchange));
        ResponseFuture::waiting(receiver)
    }

    /// Start a subscription, invoking `callback` for every event.
    ///
    /// The subscription lives as long as the client and is re-established
    /// after every reconnect. Events delivered between a disconnect and the
    /// resubscription are not replayed. Queries and mutations are refused
    /// with [`EventwireError::Config`].
    ///
    /// A callback that panics is logged and keeps receiving later events.
    pub fn subscribe<F>(&self, request: GraphQLRequest, callback: F) -> Result<()>
    where
        F: FnMut(GraphQLResponse) + Send + 'static,
    {
        if !request.is_subscription() {
            return Err(EventwireError::Config(format!(
                "{:?} documents must be sent with submit",
                request.operation_type()
            )));
        }
        let exchange = Exchange::subscription(request, Box::new(callback));
        self.command(Command::Submit(exchange))
    }

    /// Start a subscription whose events are read from a stream.
    pub fn subscribe_stream(&self, request: GraphQLRequest) -> Result<SubscriptionStream> {
        let (tx, receiver) = mpsc::unbounded_channel();
        self.subscribe(request, move |event| {
            let _ = tx.send(event);
        })?;
        Ok(SubscriptionStream { receiver })
    }

    /// Resolve a human-readable name to its stable id.
    ///
    /// Answers are remembered for the life of the client; only the first call
    /// for a given `kind` and `name` goes to the server.
    pub async fn get_identifier(&self, kind: IdentifierKind, name: &str) -> Result<String> {
        if let Some(id) = self.inner.identifiers.get(kind, name) {
            return Ok(id);
        }

        let response = self.submit(kind.lookup_request(name)).await?;
        let id = kind.extract(&response)?;
        self.inner.identifiers.insert(kind, name, id.clone());
        Ok(id)
    }

    /// Read the stored offset of a subscriber, if it has one.
    pub async fn get_offset(&self, subscriber_id: &str) -> Result<Option<String>> {
        let request = GraphQLRequest::query(GET_OFFSET)
            .operation_name("GetOffset")
            .variable("subscriberId", subscriber_id);
        let response = self.submit(request).await?;

        if let Some(message) = response.error_message() {
            return Err(EventwireError::GraphQL(message));
        }
        let offset = response
            .raw_data()
            .and_then(|data| data.get("offset"))
            .ok_or_else(|| EventwireError::MissingField("offset".into()))?;

        match offset {
            Value::Null => Ok(None),
            Value::String(offset) => Ok(Some(offset.clone())),
            other => Ok(Some(other.to_string())),
        }
    }

    /// Store the offset of a subscriber.
    ///
    /// The server refuses to move an offset backwards; that refusal arrives as
    /// [`EventwireError::GraphQL`].
    pub async fn set_offset(&self, subscriber_id: &str, offset: &str) -> Result<()> {
        let request = GraphQLRequest::mutation(SET_OFFSET)
            .operation_name("SetOffset")
            .variable("subscriberId", subscriber_id)
            .variable("offset", offset);
        let response = self.submit(request).await?;

        match response.error_message() {
            Some(message) => Err(EventwireError::GraphQL(message)),
            None => Ok(()),
        }
    }

    /// Current diagnostic log level.
    pub fn log_level(&self) -> LogLevel {
        self.inner.log.level()
    }

    /// Change the diagnostic log level, effective immediately.
    pub fn set_log_level(&self, level: LogLevel) {
        self.inner.log.set_level(level);
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// A receiver notified of every connection state change.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.clone()
    }

    /// The endpoint this client connects to.
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Close the connection and stop the client.
    ///
    /// Outstanding [`submit`](Self::submit) futures resolve to
    /// [`EventwireError::ClientClosed`]; subscriptions end. Every handle is
    /// affected.
    pub fn shutdown(&self) {
        let _ = self.inner.commands.send(Command::Shutdown);
    }

    fn command(&self, command: Command) -> Result<()> {
        self.inner
            .commands
            .send(command)
            .map_err(|_| EventwireError::ClientClosed)
    }
}

impl std::fmt::Debug for EventClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventClient")
            .field("endpoint", &self.inner.endpoint)
            .field("state", &self.connection_state())
            .field("log_level", &self.log_level())
            .finish()
    }
}

/// The eventual response to [`EventClient::submit`].
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug)]
pub struct ResponseFuture {
    state: ResponseState,
}

#[derive(Debug)]
enum ResponseState {
    Waiting(oneshot::Receiver<GraphQLResponse>),
    Failed(Option<EventwireError>),
}

impl ResponseFuture {
    fn waiting(receiver: oneshot::Receiver<GraphQLResponse>) -> Self {
        Self {
            state: ResponseState::Waiting(receiver),
        }
    }

    fn failed(error: EventwireError) -> Self {
        Self {
            state: ResponseState::Failed(Some(error)),
        }
    }
}

impl Future for ResponseFuture {
    type Output = Result<GraphQLResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            ResponseState::Waiting(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|result| result.map_err(|_| EventwireError::ClientClosed)),
            // Polled again after completion: report the client as gone.
            ResponseState::Failed(error) => {
                Poll::Ready(Err(error.take().unwrap_or(EventwireError::ClientClosed)))
            }
        }
    }
}

/// Events of a subscription started with [`EventClient::subscribe_stream`].
///
/// Ends when the client shuts down. Dropping the stream stops delivery but
/// the subscription itself stays registered with the client.
#[derive(Debug)]
pub struct SubscriptionStream {
    receiver: mpsc::UnboundedReceiver<GraphQLResponse>,
}

impl SubscriptionStream {
    /// Get the next event.
    pub async fn next(&mut self) -> Option<GraphQLResponse> {
        self.receiver.recv().await
    }
}

impl Stream for SubscriptionStream {
    type Item = GraphQLResponse;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
