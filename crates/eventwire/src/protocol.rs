//! Wire envelope encoding.
//!
//! Client to server, one JSON object per text frame:
//!
//! ```text
//! { "query": "...", "operationName": "..." | null,
//!   "variables": { ... } | null, "extensions": { "requestId": "R1" } }
//! ```
//!
//! Server to client frames are arbitrary JSON objects; when
//! `extensions.requestId` is present it echoes the id of the exchange the
//! message belongs to.

use std::borrow::Borrow;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::graphql::{GraphQLRequest, GraphQLResponse};

/// Correlation id assigned to an exchange when it is written to the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(String);

impl RequestId {
    pub(crate) fn from_sequence(sequence: u64) -> Self {
        Self(format!("R{sequence}"))
    }

    /// The id as sent in `extensions.requestId`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RequestId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    query: &'a str,
    #[serde(rename = "operationName")]
    operation_name: Option<&'a str>,
    variables: Option<&'a Map<String, Value>>,
    extensions: OutboundExtensions<'a>,
}

#[derive(Serialize)]
struct OutboundExtensions<'a> {
    #[serde(rename = "requestId")]
    request_id: &'a str,
}

/// Serialize `request` as the outbound envelope tagged with `id`.
pub fn encode(request: &GraphQLRequest, id: &RequestId) -> Result<String> {
    let envelope = OutboundEnvelope {
        query: &request.query,
        operation_name: request.operation_name.as_deref(),
        variables: request.variables.as_ref(),
        extensions: OutboundExtensions {
            request_id: id.as_str(),
        },
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Parse an inbound text frame.
pub fn decode(text: &str) -> Result<GraphQLResponse> {
    Ok(serde_json::from_str(text)?)
}
