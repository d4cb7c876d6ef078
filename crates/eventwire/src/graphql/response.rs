//! Inbound envelopes.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::{EventwireError, Result};

/// One entry of a response's `errors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// Human-readable description.
    #[serde(default)]
    pub message: String,

    /// Field path the error is attached to, as names and list indices.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Value>,

    /// Server-defined error details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,

    /// `locations` and anything else the server sends.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if self.path.is_empty() {
            return Ok(());
        }
        let path: Vec<String> = self
            .path
            .iter()
            .map(|segment| match segment {
                Value::String(name) => name.clone(),
                other => other.to_string(),
            })
            .collect();
        write!(f, " at {}", path.join("."))
    }
}

impl std::error::Error for GraphQLError {}

/// A message pushed by the event service.
///
/// Kept whole: `errors`, `extensions` and any unrecognized top-level members
/// survive deserialization alongside `data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQLResponse {
    /// Operation result, absent or `null` on failure.
    #[serde(default)]
    pub data: Option<Value>,

    /// Execution errors. A response may carry both errors and data.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,

    /// Metadata, including the echoed `requestId`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,

    /// Other top-level members.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl GraphQLResponse {
    /// Correlation id from `extensions.requestId`. Non-string ids count as absent.
    pub fn request_id(&self) -> Option<&str> {
        self.extensions.as_ref()?.get("requestId")?.as_str()
    }

    /// Whether `errors` is non-empty.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// All error messages joined with `"; "`, or `None` when there are none.
    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        Some(messages.join("; "))
    }

    /// `data` as received, without error checks.
    pub fn raw_data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Deserialize `data` into `T`.
    ///
    /// Fails with [`EventwireError::GraphQL`] when the response carries
    /// errors, even if partial data is present.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T> {
        let data = self.checked_data()?;
        T::deserialize(data).map_err(|e| EventwireError::Json(format!("data: {e}")))
    }

    /// Deserialize one top-level member of `data`.
    ///
    /// ```ignore
    /// // { "data": { "setOffset": { "offset": "42" } } }
    /// let ack: OffsetAck = response.field("setOffset")?;
    /// ```
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self
            .checked_data()?
            .get(name)
            .ok_or_else(|| EventwireError::MissingField(name.to_string()))?;
        T::deserialize(value).map_err(|e| EventwireError::Json(format!("{name}: {e}")))
    }

    fn checked_data(&self) -> Result<&Value> {
        if let Some(message) = self.error_message() {
            return Err(EventwireError::GraphQL(message));
        }
        self.data
            .as_ref()
            .ok_or_else(|| EventwireError::MissingField("data".into()))
    }
}
