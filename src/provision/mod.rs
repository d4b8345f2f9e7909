//! Idempotent backend provisioning.
//!
//! [`Provisioner::ensure`] drives the verify → deploy → grant → re-verify
//! protocol: a healthy org is confirmed with a single describe round trip,
//! a bare org gets the schema deployed and access granted, and anything
//! still missing after that is a hard error rather than a silent retry.

use crate::connection::{Connection, ConnectionError};
use crate::sobject::schema::SchemaBundle;
use crate::sobject::soql;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Schema deploy rejected: {0}")]
    Deploy(String),
    #[error("Permission set '{0}' does not exist")]
    GrantMissing(String),
    #[error("Permission set assignment rejected: {0}")]
    Assign(String),
    #[error(
        "Schema verification failed after deploy (object present: {object_found}, \
         missing fields: {missing:?})"
    )]
    VerificationFailed {
        object_found: bool,
        missing: Vec<String>,
    },
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// What `ensure` found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// Schema was already complete; nothing was deployed or assigned.
    AlreadyProvisioned,
    /// Schema was deployed (and access granted) during this call.
    Provisioned,
}

/// Whether the grant step had to do anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    AlreadyAssigned,
    Assigned,
}

/// Result of diffing the described object against the bundled schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub object_found: bool,
    /// Required fields the org does not have. When the object itself is
    /// absent this lists every required field.
    pub missing_fields: Vec<String>,
}

impl Verification {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.object_found && self.missing_fields.is_empty()
    }
}

pub struct Provisioner {
    conn: Arc<dyn Connection>,
    bundle: SchemaBundle,
}

impl Provisioner {
    #[must_use]
    pub fn new(conn: Arc<dyn Connection>) -> Self {
        Self {
            conn,
            bundle: SchemaBundle::bundled(),
        }
    }

    /// Describes the log object and diffs it against the bundle. An absent
    /// object is a normal verification outcome, not an error; any other
    /// connection failure propagates.
    pub async fn verify(&self) -> Result<Verification, SetupError> {
        let object = &self.bundle.object.api_name;
        match self.conn.describe(object).await {
            Ok(described) => {
                let missing_fields = self
                    .bundle
                    .required_field_names()
                    .into_iter()
                    .filter(|name| !described.fields.iter().any(|f| f == name))
                    .map(ToString::to_string)
                    .collect();
                Ok(Verification {
                    object_found: true,
                    missing_fields,
                })
            }
            Err(ConnectionError::NotFound(_)) => Ok(Verification {
                object_found: false,
                missing_fields: self
                    .bundle
                    .required_field_names()
                    .into_iter()
                    .map(ToString::to_string)
                    .collect(),
            }),
            Err(other) => Err(other.into()),
        }
    }

    /// Deploys the bundled schema. Component rejections are collapsed into
    /// one [`SetupError::Deploy`] carrying the full detail text.
    pub async fn deploy_schema(&self) -> Result<(), SetupError> {
        let result = self.conn.deploy(&self.bundle).await?;
        if result.success {
            info!(object = %self.bundle.object.api_name, "log schema deployed");
            Ok(())
        } else {
            let detail: Vec<String> = result.problems.iter().map(ToString::to_string).collect();
            Err(SetupError::Deploy(detail.join("; ")))
        }
    }

    /// Assigns the access permission set to the connection's user. Fails
    /// loudly when the set does not exist; an existing assignment is a
    /// no-op.
    pub async fn ensure_grant(&self) -> Result<GrantOutcome, SetupError> {
        let set_name = &self.bundle.permission_set.api_name;
        let lookup = self
            .conn
            .query(&soql::permission_set_query(set_name))
            .await?;
        let Some(set_id) = first_row_id(&lookup.records) else {
            return Err(SetupError::GrantMissing(set_name.clone()));
        };

        let user_id = self.conn.user_id().to_string();
        let assigned = self
            .conn
            .query(&soql::assignment_query(&set_id, &user_id))
            .await?;
        if !assigned.records.is_empty() {
            return Ok(GrantOutcome::AlreadyAssigned);
        }

        let save = self
            .conn
            .insert(
                "PermissionSetAssignment",
                json!({ "AssigneeId": user_id, "PermissionSetId": set_id }),
            )
            .await?;
        if save.success {
            info!(set = %set_name, user = %user_id, "permission set assigned");
            Ok(GrantOutcome::Assigned)
        } else {
            Err(SetupError::Assign(save.errors.join("; ")))
        }
    }

    /// The full protocol. Safe to call on every startup: a provisioned org
    /// costs one describe and changes nothing.
    pub async fn ensure(&self) -> Result<SetupOutcome, SetupError> {
        let first = self.verify().await?;
        if first.is_ready() {
            info!(object = %self.bundle.object.api_name, "log schema already provisioned");
            return Ok(SetupOutcome::AlreadyProvisioned);
        }
        warn!(
            object_found = first.object_found,
            missing = ?first.missing_fields,
            "log schema incomplete, deploying"
        );

        self.deploy_schema().await?;
        let grant = self.ensure_grant().await?;
        info!(grant = ?grant, "access grant checked");

        let second = self.verify().await?;
        if second.is_ready() {
            Ok(SetupOutcome::Provisioned)
        } else {
            Err(SetupError::VerificationFailed {
                object_found: second.object_found,
                missing: second.missing_fields,
            })
        }
    }
}

/// Pulls the `Id` column out of the first query row, if any. A row without
/// an id means the seam's contract was violated upstream.
fn first_row_id(records: &[Value]) -> Option<String> {
    records
        .first()
        .and_then(|row| row.get("Id"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}
