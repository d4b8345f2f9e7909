#![warn(rust_2018_idioms)]

//! Client library for application logging backed by a Salesforce org.
//!
//! Records are stored in a custom `AppLog__c` object. The crate splits
//! into:
//!
//! - [`domain`]: levels, records, and thrown-value normalization
//! - [`sobject`]: the backend schema and the row mapping onto it
//! - [`connection`]: the remote seam and its REST implementation
//! - [`provision`]: idempotent schema deployment and access grants
//! - [`logger`]: the facade with per-level writes, retrieval, and setup

pub mod connection;
pub mod domain;
pub mod logger;
pub mod provision;
pub mod sobject;

pub use connection::{
    Connection, ConnectionError, DeployProblem, DeployResult, DescribeResponse, QueryResponse,
    RemoteError, RestConfig, RestConnection, SaveResult,
};
pub use domain::{LogDefaults, LogDraft, LogLevel, LogRecord, StoredLog, Thrown};
pub use logger::{Logger, LoggerBuilder, LoggerError};
pub use provision::{GrantOutcome, Provisioner, SetupError, SetupOutcome, Verification};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
