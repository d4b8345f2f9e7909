//! The remote-connection seam.
//!
//! [`Connection`] is the narrow surface everything above the wire depends
//! on: insert a record, run a query, describe an object, deploy the log
//! schema. [`rest::RestConnection`] is the production implementation; tests
//! substitute mocks and fakes.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

use crate::sobject::schema::SchemaBundle;

#[cfg(test)]
use mockall::automock;

pub mod rest;

pub use rest::{RestConfig, RestConnection};

/// An error payload returned by the backend with a non-success status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub status: u16,
    /// Machine-readable code such as `INVALID_FIELD`, when the backend
    /// supplied one.
    pub code: Option<String>,
    pub message: String,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {} (status {})", code, self.message, self.status),
            None => write!(f, "{} (status {})", self.message, self.status),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// The requested object does not exist in the org. Surfaced separately
    /// so provisioning can treat it as "not yet deployed" rather than a
    /// failure.
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Remote error: {0}")]
    Remote(RemoteError),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Unexpected response shape: {0}")]
    UnexpectedResponse(String),
}

/// Outcome of a single record insert.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SaveResult {
    pub id: String,
    pub success: bool,
    pub errors: Vec<String>,
}

/// Result set of a query: the wire shape of the backend's query endpoint.
///
/// Rows are untyped JSON objects; callers deserialize them into whatever
/// row struct matches the columns they selected.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub total_size: u32,
    pub done: bool,
    pub records: Vec<serde_json::Value>,
}

/// Shape of an object as the backend describes it, reduced to what
/// verification needs: the object's name and its field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeResponse {
    pub name: String,
    pub fields: Vec<String>,
}

/// One component the backend rejected during a deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployProblem {
    pub component: String,
    pub message: String,
}

impl fmt::Display for DeployProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.component, self.message)
    }
}

/// Outcome of a schema deploy. `success` is false when any component was
/// rejected; transport failures surface as [`ConnectionError`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployResult {
    pub success: bool,
    pub problems: Vec<DeployProblem>,
}

impl DeployResult {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            problems: Vec::new(),
        }
    }
}

/// Remote operations the logger and provisioner are built on.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Connection: Send + Sync {
    /// Inserts one record into `object`. `fields` must serialize to a JSON
    /// object of field name to value.
    async fn insert(
        &self,
        object: &str,
        fields: serde_json::Value,
    ) -> Result<SaveResult, ConnectionError>;

    /// Runs a SOQL query and returns the raw result set.
    async fn query(&self, soql: &str) -> Result<QueryResponse, ConnectionError>;

    /// Describes `object`, returning [`ConnectionError::NotFound`] when the
    /// org has no such object.
    async fn describe(&self, object: &str) -> Result<DescribeResponse, ConnectionError>;

    /// Deploys the log schema bundle component by component. Already-present
    /// components are skipped, making the operation safe to repeat.
    async fn deploy(&self, bundle: &SchemaBundle) -> Result<DeployResult, ConnectionError>;

    /// The backend user id this connection authenticates as. Permission
    /// grants are assigned to this user.
    fn user_id(&self) -> &str;
}
