//! GraphQL operation and response types carried by the client.
//!
//! The client never interprets documents: a [`GraphQLRequest`] is opaque text
//! plus an optional operation name and variables, and a [`GraphQLResponse`] is
//! whatever JSON object the server sent back.
//!
//! # Example
//!
//! ```ignore
//! use eventwire::graphql::GraphQLRequest;
//!
//! let request = GraphQLRequest::query(r#"
//!     query GetAccount($name: String!) {
//!         account(name: $name) { id }
//!     }
//! "#)
//! .variable("name", "acme");
//!
//! let response = client.submit(request).await?;
//! let account: serde_json::Value = response.field("account")?;
//! ```

mod request;
mod response;

pub use request::{GraphQLRequest, OperationType};
pub use response::{GraphQLError, GraphQLResponse};
