//! WebSocket transport over tokio-tungstenite.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as TungsteniteCloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};

use super::{CloseCode, CloseReason, ConnectRequest, Frame, Transport, TransportEvents};
use crate::error::{EventwireError, Result};

/// Type alias for a connected WebSocket stream.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Command sent to the connection task.
enum Command {
    SendText(String),
    Close,
}

/// A [`Transport`] speaking WebSocket text frames.
///
/// Each `connect` spawns one task that owns the socket for the lifetime of
/// that connection. The task never reconnects on its own; it reports
/// `ConnectFailed`, `Error` or `Closed` and exits, leaving recovery to the
/// client. Ping/pong is answered by tungstenite.
///
/// Must be used from within a tokio runtime.
#[derive(Default)]
pub struct WebSocketTransport {
    command_tx: Option<mpsc::UnboundedSender<Command>>,
}

impl WebSocketTransport {
    /// Create a transport with no connection.
    pub fn new() -> Self {
        Self::default()
    }

    async fn run(
        request: ConnectRequest,
        events: TransportEvents,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let ws_stream = match Self::open(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                events.connect_failed(e.to_string());
                return;
            }
        };

        events.connected();
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(Command::SendText(text)) => {
                            if let Err(e) = write.send(Message::Text(text.into())).await {
                                events.error(e.to_string());
                                return;
                            }
                        }
                        Some(Command::Close) | None => {
                            let close_frame = CloseFrame {
                                code: TungsteniteCloseCode::Normal,
                                reason: "".into(),
                            };
                            let _ = write.send(Message::Close(Some(close_frame))).await;
                            return;
                        }
                    }
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            events.text(text.to_string());
                        }
                        Some(Ok(Message::Binary(data))) => {
                            events.message(Frame::Binary(data.to_vec()));
                        }
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                            // Pong is sent automatically by tungstenite
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame.map(|f| {
                                CloseReason::with_reason(
                                    CloseCode::from_u16(u16::from(f.code)),
                                    f.reason.to_string(),
                                )
                            });
                            events.closed(reason);
                            return;
                        }
                        Some(Err(e)) => {
                            events.error(e.to_string());
                            return;
                        }
                        None => {
                            events.closed(None);
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn open(request: &ConnectRequest) -> Result<WsStream> {
        let handshake = Self::build_request(request)?;
        let connector = match &request.options.tls {
            Some(tls) => Some(Connector::Rustls(tls.client_config()?)),
            None => None,
        };

        let connect =
            tokio_tungstenite::connect_async_tls_with_config(handshake, None, false, connector);
        let (stream, _response) = match request.options.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| EventwireError::Timeout)??,
            None => connect.await?,
        };
        Ok(stream)
    }

    /// Build the handshake request with client and option headers.
    fn build_request(request: &ConnectRequest) -> Result<tungstenite::handshake::client::Request> {
        let mut handshake = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| EventwireError::InvalidUrl(e.to_string()))?;

        let headers = handshake.headers_mut();
        for (name, value) in request.headers.iter().chain(&request.options.headers) {
            let header_name = http::header::HeaderName::try_from(name.as_str())?;
            let header_value = http::header::HeaderValue::try_from(value.as_str())?;
            headers.insert(header_name, header_value);
        }

        Ok(handshake)
    }
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, request: ConnectRequest, events: TransportEvents) {
        self.close();

        let (tx, rx) = mpsc::unbounded_channel();
        self.command_tx = Some(tx);
        tokio::spawn(Self::run(request, events, rx));
    }

    fn send(&mut self, text: String) -> Result<()> {
        let tx = self.command_tx.as_ref().ok_or(EventwireError::NotConnected)?;
        tx.send(Command::SendText(text))
            .map_err(|_| EventwireError::NotConnected)
    }

    fn close(&mut self) {
        // A task still handshaking sees the close once it is connected and
        // exits without reading; its events carry a superseded connection id.
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(Command::Close);
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("connected", &self.command_tx.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportOptions;

    fn request(url: &str) -> ConnectRequest {
        ConnectRequest {
            url: url.to_string(),
            headers: vec![("Origin".into(), "https://app.example.com".into())],
            options: TransportOptions::new().header("X-Client", "eventwire"),
        }
    }

    #[test]
    fn test_build_request_headers() {
        let handshake =
            WebSocketTransport::build_request(&request("wss://events.example.com/prod/api/events"))
                .unwrap();
        assert_eq!(handshake.uri().host(), Some("events.example.com"));
        assert_eq!(handshake.headers()["Origin"], "https://app.example.com");
        assert_eq!(handshake.headers()["X-Client"], "eventwire");
    }

    #[test]
    fn test_build_request_invalid_header() {
        let mut req = request("wss://events.example.com/prod/api/events");
        req.headers.push(("bad header".into(), "x".into()));
        assert!(matches!(
            WebSocketTransport::build_request(&req),
            Err(EventwireError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_send_before_connect_fails() {
        let mut transport = WebSocketTransport::new();
        assert_eq!(
            transport.send("{}".into()),
            Err(EventwireError::NotConnected)
        );
    }
}
