//! WebSocket transport tests against a local server.

use std::time::Duration;

use eventwire::{
    ClientConfig, CloseCode, CloseReason, ConnectionState, EventClient, GraphQLRequest, LogLevel,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

type ServerStream = WebSocketStream<TcpStream>;

/// Accept one connection, reporting the request path and `Authorization`.
async fn accept(
    listener: &TcpListener,
    seen: &mpsc::UnboundedSender<(String, Option<String>)>,
) -> ServerStream {
    let (stream, _) = listener.accept().await.unwrap();
    let seen = seen.clone();
    tokio_tungstenite::accept_hdr_async(stream, move |request: &Request, response: Response| {
        let auth = request
            .headers()
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let _ = seen.send((request.uri().path().to_string(), auth));
        Ok::<_, ErrorResponse>(response)
    })
    .await
    .unwrap()
}

async fn next_envelope(ws: &mut ServerStream) -> Value {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

async fn answer(ws: &mut ServerStream, envelope: &Value, data: Value) {
    let reply = json!({
        "data": data,
        "extensions": {"requestId": envelope["extensions"]["requestId"]}
    });
    ws.send(Message::Text(reply.to_string().into())).await.unwrap();
}

fn config(port: u16) -> ClientConfig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("eventwire=debug")
        .with_test_writer()
        .try_init();

    ClientConfig::new(format!("127.0.0.1:{port}"), "test")
        .insecure()
        .api_key("k-local")
        .log_level(LogLevel::Fine)
}

#[test]
fn test_close_code_conversion() {
    assert_eq!(CloseCode::Normal.as_u16(), 1000);
    assert_eq!(CloseCode::from_u16(1001), CloseCode::GoingAway);
    assert_eq!(CloseCode::from_u16(4001), CloseCode::Application(4001));
    assert_eq!(CloseCode::from_u16(3000), CloseCode::Other(3000));

    let reason = CloseReason::with_reason(CloseCode::GoingAway, "server restarting");
    assert_eq!(reason.code, CloseCode::GoingAway);
    assert_eq!(reason.reason.as_deref(), Some("server restarting"));
}

#[tokio::test]
async fn test_round_trip_over_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (seen_tx, mut seen) = mpsc::unbounded_channel();

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener, &seen_tx).await;
        let envelope = next_envelope(&mut ws).await;
        let query = envelope["query"].clone();
        answer(&mut ws, &envelope, json!({"echo": query})).await;
        // Keep the socket open until the client closes it.
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    });

    let client = EventClient::new(config(port)).unwrap();
    let response = client.submit(GraphQLRequest::query("{ ping }"));
    client.connect().unwrap();

    let response = tokio::time::timeout(Duration::from_secs(10), response)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.data, Some(json!({"echo": "{ ping }"})));
    assert_eq!(response.request_id(), Some("R1"));
    assert_eq!(client.connection_state(), ConnectionState::Connected);

    let (path, auth) = seen.recv().await.unwrap();
    assert_eq!(path, "/test/api/events");
    assert_eq!(auth.as_deref(), Some("Bearer k-local"));

    client.shutdown();
    tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_resend_after_server_drops_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (seen_tx, _seen) = mpsc::unbounded_channel();

    let server = tokio::spawn(async move {
        // First connection: read the request, then hang up without answering.
        let mut ws = accept(&listener, &seen_tx).await;
        let dropped = next_envelope(&mut ws).await;
        ws.close(None).await.unwrap();
        drop(ws);

        let mut ws = accept(&listener, &seen_tx).await;
        let resent = next_envelope(&mut ws).await;
        assert_eq!(resent["query"], dropped["query"]);
        assert_ne!(resent["extensions"]["requestId"], dropped["extensions"]["requestId"]);
        answer(&mut ws, &resent, json!({"ok": true})).await;
        let _ = ws.next().await;
    });

    let client = EventClient::new(config(port)).unwrap();
    client.connect().unwrap();
    let response = client.submit(GraphQLRequest::mutation("mutation { touch }"));

    let response = tokio::time::timeout(Duration::from_secs(10), response)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.data, Some(json!({"ok": true})));
    assert_eq!(response.request_id(), Some("R2"));

    client.shutdown();
    tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .unwrap()
        .unwrap();
}
