//! Name to id lookups and their per-client memo.
//!
//! Accounts and subscriptions are addressed by human-readable names in
//! application code but by stable ids (UUIDs) on the server. A lookup is one
//! query; its answer never changes, so each client remembers it forever.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{EventwireError, Result};
use crate::graphql::{GraphQLRequest, GraphQLResponse};

const LOOKUP_ACCOUNT: &str = "query LookupAccount($name: String!) { account(name: $name) { id } }";
const LOOKUP_SUBSCRIPTION: &str =
    "query LookupSubscription($name: String!) { subscription(name: $name) { id } }";

/// What kind of object an identifier lookup names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    /// An account.
    Account,
    /// A named event subscription.
    Subscription,
}

impl IdentifierKind {
    /// The `data` field a lookup answer is found under.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Subscription => "subscription",
        }
    }

    /// The query resolving `name` to its stable id.
    pub fn lookup_request(&self, name: &str) -> GraphQLRequest {
        let (document, operation) = match self {
            Self::Account => (LOOKUP_ACCOUNT, "LookupAccount"),
            Self::Subscription => (LOOKUP_SUBSCRIPTION, "LookupSubscription"),
        };
        GraphQLRequest::query(document)
            .operation_name(operation)
            .variable("name", name)
    }

    /// Pull the stable id out of a lookup answer.
    pub fn extract(&self, response: &GraphQLResponse) -> Result<String> {
        if let Some(message) = response.error_message() {
            return Err(EventwireError::GraphQL(message));
        }

        let path = format!("{}.id", self.field());
        let id = response
            .raw_data()
            .and_then(|data| data.get(self.field()))
            .and_then(|object| object.get("id"));

        match id {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(EventwireError::MissingField(path)),
        }
    }
}

/// Resolved identifiers, one map per [`IdentifierKind`].
#[derive(Debug, Default)]
pub(crate) struct IdentifierCache {
    accounts: Mutex<HashMap<String, String>>,
    subscriptions: Mutex<HashMap<String, String>>,
}

impl IdentifierCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn map(&self, kind: IdentifierKind) -> &Mutex<HashMap<String, String>> {
        match kind {
            IdentifierKind::Account => &self.accounts,
            IdentifierKind::Subscription => &self.subscriptions,
        }
    }

    pub(crate) fn get(&self, kind: IdentifierKind, name: &str) -> Option<String> {
        self.map(kind).lock().get(name).cloned()
    }

    pub(crate) fn insert(&self, kind: IdentifierKind, name: impl Into<String>, id: impl Into<String>) {
        self.map(kind).lock().insert(name.into(), id.into());
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn response(value: Value) -> GraphQLResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_lookup_request() {
        let request = IdentifierKind::Account.lookup_request("acme");
        assert_eq!(request.operation_name.as_deref(), Some("LookupAccount"));
        assert_eq!(request.variables.unwrap()["name"], json!("acme"));

        let request = IdentifierKind::Subscription.lookup_request("orders");
        assert!(request.query.contains("subscription(name: $name)"));
        assert!(!request.is_subscription());
    }

    #[test]
    fn test_extract() {
        let ok = response(json!({"data": {"account": {"id": "7f3e"}}}));
        assert_eq!(IdentifierKind::Account.extract(&ok).unwrap(), "7f3e");

        let missing = response(json!({"data": {"account": null}}));
        assert_eq!(
            IdentifierKind::Account.extract(&missing),
            Err(EventwireError::MissingField("account.id".into()))
        );

        let failed = response(json!({"errors": [{"message": "no such subscription"}]}));
        assert_eq!(
            IdentifierKind::Subscription.extract(&failed),
            Err(EventwireError::GraphQL("no such subscription".into()))
        );
    }

    #[test]
    fn test_kinds_are_independent() {
        let cache = IdentifierCache::new();
        cache.insert(IdentifierKind::Account, "acme", "a-1");

        assert_eq!(cache.get(IdentifierKind::Account, "acme").as_deref(), Some("a-1"));
        assert_eq!(cache.get(IdentifierKind::Subscription, "acme"), None);

        cache.insert(IdentifierKind::Subscription, "acme", "s-1");
        assert_eq!(cache.get(IdentifierKind::Account, "acme").as_deref(), Some("a-1"));
    }
}
