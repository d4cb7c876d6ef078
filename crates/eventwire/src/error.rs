//! Error types for the eventwire client.

/// Errors raised by the client, its configuration and its transport.
///
/// Connectivity problems are never reported through this type to callers of
/// [`EventClient::submit`](crate::EventClient::submit): a lost connection only
/// delays an exchange. The variants below surface configuration mistakes,
/// transport-level failures seen by the transport itself, and the shutdown of
/// the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventwireError {
    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Invalid endpoint URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Invalid handshake header name or value.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
    /// WebSocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),
    /// TLS/SSL error.
    #[error("TLS error: {0}")]
    Tls(String),
    /// Connect attempt timed out.
    #[error("Connect timed out")]
    Timeout,
    /// The transport has no live connection.
    #[error("Not connected")]
    NotConnected,
    /// The client was shut down before the exchange resolved.
    #[error("Client has been shut down")]
    ClientClosed,
    /// The server answered a helper lookup with GraphQL errors.
    #[error("GraphQL error: {0}")]
    GraphQL(String),
    /// A helper lookup response lacked the expected field.
    #[error("Missing field in response: {0}")]
    MissingField(String),
}

impl From<url::ParseError> for EventwireError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for EventwireError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for EventwireError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for EventwireError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for EventwireError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

/// A specialized Result type for eventwire operations.
pub type Result<T> = std::result::Result<T, EventwireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            EventwireError::Config("hostname is required".into()).to_string(),
            "Configuration error: hostname is required"
        );
        assert_eq!(EventwireError::ClientClosed.to_string(), "Client has been shut down");
    }

    #[test]
    fn test_from_url_error() {
        let err: EventwireError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, EventwireError::InvalidUrl(_)));
    }

    #[test]
    fn test_from_json_error() {
        let err: EventwireError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, EventwireError::Json(_)));
    }
}
