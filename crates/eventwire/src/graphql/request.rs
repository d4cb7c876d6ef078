//! Outbound operations.

use serde::Serialize;
use serde_json::{Map, Value};

/// Which root type an operation targets.
///
/// The type decides the entry point: queries and mutations go through
/// `EventClient::submit` and resolve once, subscriptions go through
/// `EventClient::subscribe` and receive every pushed result. Each entry point
/// refuses the other kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationType {
    /// Read, answered once.
    #[default]
    Query,
    /// Write, answered once.
    Mutation,
    /// Standing operation, answered repeatedly.
    Subscription,
}

/// Document text plus optional operation name and variables.
///
/// A submitted request is kept as-is and re-serialized for every
/// retransmission.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQLRequest {
    /// Document text, never parsed beyond its leading keyword.
    pub query: String,
    /// Variable bindings in insertion order.
    pub variables: Option<Map<String, Value>>,
    /// Selects one operation of a multi-operation document.
    pub operation_name: Option<String>,
    pub(crate) operation_type: OperationType,
}

impl GraphQLRequest {
    /// A query.
    ///
    /// ```ignore
    /// let status = GraphQLRequest::query("query Status { status { uptime } }");
    /// ```
    pub fn query(query: impl Into<String>) -> Self {
        Self::of(OperationType::Query, query.into())
    }

    /// A mutation.
    pub fn mutation(query: impl Into<String>) -> Self {
        Self::of(OperationType::Mutation, query.into())
    }

    /// A subscription, to be started with `EventClient::subscribe`.
    ///
    /// ```ignore
    /// let orders = GraphQLRequest::subscription(
    ///     "subscription Orders($account: ID!) { orderPlaced(account: $account) { id } }",
    /// )
    /// .variable("account", account_id);
    /// ```
    pub fn subscription(query: impl Into<String>) -> Self {
        Self::of(OperationType::Subscription, query.into())
    }

    /// Build a request whose type is read from the document's leading
    /// keyword. Shorthand `{ ... }` documents are queries.
    pub fn new(query: impl Into<String>) -> Self {
        let query = query.into();
        let kind = leading_keyword(&query);
        Self::of(kind, query)
    }

    fn of(operation_type: OperationType, query: String) -> Self {
        Self {
            query,
            variables: None,
            operation_name: None,
            operation_type,
        }
    }

    /// Bind one variable. A value that cannot be serialized binds `null`.
    pub fn variable(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.variables
            .get_or_insert_with(Map::new)
            .insert(name.into(), value);
        self
    }

    /// Replace every binding with the members of a serializable struct or map.
    /// Non-object values clear the bindings.
    pub fn variables(mut self, variables: impl Serialize) -> Self {
        self.variables = match serde_json::to_value(variables) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        };
        self
    }

    /// Pick the operation to run from a multi-operation document.
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// The root type, fixed at construction.
    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    /// Whether this request must be started with `EventClient::subscribe`.
    pub fn is_subscription(&self) -> bool {
        matches!(self.operation_type, OperationType::Subscription)
    }
}

fn leading_keyword(document: &str) -> OperationType {
    let word: String = document
        .trim_start()
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect();
    match word.as_str() {
        "subscription" => OperationType::Subscription,
        "mutation" => OperationType::Mutation,
        _ => OperationType::Query,
    }
}
