//! Shared test support: an in-memory stand-in for a Salesforce org.
//!
//! `FakeConnection` behaves like a tiny backend rather than replaying
//! canned responses: inserts assign ids and timestamps, queries filter and
//! order, deploys flip the org from bare to provisioned. That lets the
//! integration tests drive the real facade/provisioner protocols end to
//! end without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use orglog::connection::{
    Connection, ConnectionError, DeployResult, DescribeResponse, QueryResponse, SaveResult,
};
use orglog::sobject::schema::{LOG_OBJECT, SchemaBundle};
use serde_json::{Value, json};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const FAKE_USER_ID: &str = "005000000000042AAA";
const FAKE_SET_ID: &str = "0PS000000000001AAA";

struct StoredRow {
    id: String,
    created: String,
    fields: Value,
}

pub struct FakeConnection {
    user_id: String,
    /// Fields `describe` reports for the log object; `None` means the
    /// object does not exist yet.
    log_object_fields: Mutex<Option<Vec<String>>>,
    permission_set_id: Mutex<Option<String>>,
    assignments: Mutex<Vec<(String, String)>>,
    logs: Mutex<Vec<StoredRow>>,
    fail_next_insert: AtomicBool,
    deploy_calls: AtomicUsize,
    describe_calls: AtomicUsize,
}

impl FakeConnection {
    /// An org with nothing provisioned.
    pub fn new() -> Self {
        Self {
            user_id: FAKE_USER_ID.to_string(),
            log_object_fields: Mutex::new(None),
            permission_set_id: Mutex::new(None),
            assignments: Mutex::new(Vec::new()),
            logs: Mutex::new(Vec::new()),
            fail_next_insert: AtomicBool::new(false),
            deploy_calls: AtomicUsize::new(0),
            describe_calls: AtomicUsize::new(0),
        }
    }

    /// An org where schema and grant already exist.
    pub fn provisioned() -> Self {
        let fake = Self::new();
        *fake.log_object_fields.lock().unwrap() = Some(full_field_list());
        *fake.permission_set_id.lock().unwrap() = Some(FAKE_SET_ID.to_string());
        fake.assignments
            .lock()
            .unwrap()
            .push((FAKE_SET_ID.to_string(), FAKE_USER_ID.to_string()));
        fake
    }

    /// Drops one field from the described object, simulating a partial
    /// deploy.
    pub fn remove_field(&self, name: &str) {
        if let Some(fields) = self.log_object_fields.lock().unwrap().as_mut() {
            fields.retain(|f| f != name);
        }
    }

    /// Makes the next log insert come back with `success: false`.
    pub fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }

    pub fn deploy_count(&self) -> usize {
        self.deploy_calls.load(Ordering::SeqCst)
    }

    pub fn describe_count(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.lock().unwrap().len()
    }

    /// Field objects of every stored log, in insertion order.
    pub fn inserted_log_fields(&self) -> Vec<Value> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .map(|row| row.fields.clone())
            .collect()
    }
}

fn full_field_list() -> Vec<String> {
    ["Id", "CreatedDate", "Level__c", "Message__c", "Stack__c", "System__c", "User__c"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn parse_limit(soql: &str) -> Option<usize> {
    soql.rsplit_once(" LIMIT ")
        .and_then(|(_, n)| n.trim().parse().ok())
}

#[async_trait]
impl Connection for FakeConnection {
    async fn insert(&self, object: &str, fields: Value) -> Result<SaveResult, ConnectionError> {
        if object == "PermissionSetAssignment" {
            let set = fields["PermissionSetId"].as_str().unwrap_or_default().to_string();
            let user = fields["AssigneeId"].as_str().unwrap_or_default().to_string();
            let mut assignments = self.assignments.lock().unwrap();
            assignments.push((set, user));
            return Ok(SaveResult {
                id: format!("0Pa{:012}AAA", assignments.len()),
                success: true,
                errors: vec![],
            });
        }

        if object == LOG_OBJECT {
            if self.fail_next_insert.swap(false, Ordering::SeqCst) {
                return Ok(SaveResult {
                    id: String::new(),
                    success: false,
                    errors: vec!["STORAGE_LIMIT_EXCEEDED: over quota".to_string()],
                });
            }
            let mut logs = self.logs.lock().unwrap();
            let n = logs.len() + 1;
            let row = StoredRow {
                id: format!("a00{n:012}AAA"),
                // Later inserts get later timestamps.
                created: format!("2024-06-01T10:{n:02}:00.000+0000"),
                fields,
            };
            let id = row.id.clone();
            logs.push(row);
            return Ok(SaveResult {
                id,
                success: true,
                errors: vec![],
            });
        }

        Ok(SaveResult {
            id: "000000000000000AAA".to_string(),
            success: true,
            errors: vec![],
        })
    }

    async fn query(&self, soql: &str) -> Result<QueryResponse, ConnectionError> {
        if soql.starts_with("SELECT Id FROM PermissionSetAssignment") {
            let records: Vec<Value> = self
                .assignments
                .lock()
                .unwrap()
                .iter()
                .enumerate()
                .map(|(i, _)| json!({ "Id": format!("0Pa{:012}AAA", i + 1) }))
                .collect();
            return Ok(QueryResponse {
                total_size: records.len() as u32,
                done: true,
                records,
            });
        }

        if soql.starts_with("SELECT Id FROM PermissionSet") {
            let records: Vec<Value> = self
                .permission_set_id
                .lock()
                .unwrap()
                .iter()
                .map(|id| json!({ "Id": id }))
                .collect();
            return Ok(QueryResponse {
                total_size: records.len() as u32,
                done: true,
                records,
            });
        }

        if soql.contains(&format!("FROM {LOG_OBJECT}")) {
            let logs = self.logs.lock().unwrap();
            let mut rows: Vec<&StoredRow> = logs.iter().collect();
            rows.sort_by(|a, b| b.created.cmp(&a.created));
            if let Some(limit) = parse_limit(soql) {
                rows.truncate(limit);
            }
            let records: Vec<Value> = rows
                .into_iter()
                .map(|row| {
                    let mut record = json!({
                        "attributes": { "type": LOG_OBJECT },
                        "Id": row.id,
                        "CreatedDate": row.created,
                    });
                    if let (Some(record), Some(fields)) =
                        (record.as_object_mut(), row.fields.as_object())
                    {
                        for (key, value) in fields {
                            record.insert(key.clone(), value.clone());
                        }
                    }
                    record
                })
                .collect();
            return Ok(QueryResponse {
                total_size: records.len() as u32,
                done: true,
                records,
            });
        }

        Ok(QueryResponse {
            total_size: 0,
            done: true,
            records: vec![],
        })
    }

    async fn describe(&self, object: &str) -> Result<DescribeResponse, ConnectionError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        if object != LOG_OBJECT {
            return Err(ConnectionError::NotFound(object.to_string()));
        }
        match self.log_object_fields.lock().unwrap().clone() {
            Some(fields) => Ok(DescribeResponse {
                name: LOG_OBJECT.to_string(),
                fields,
            }),
            None => Err(ConnectionError::NotFound(object.to_string())),
        }
    }

    async fn deploy(&self, bundle: &SchemaBundle) -> Result<DeployResult, ConnectionError> {
        self.deploy_calls.fetch_add(1, Ordering::SeqCst);
        let mut fields = vec!["Id".to_string(), "CreatedDate".to_string()];
        fields.extend(bundle.required_field_names().iter().map(ToString::to_string));
        *self.log_object_fields.lock().unwrap() = Some(fields);
        *self.permission_set_id.lock().unwrap() = Some(FAKE_SET_ID.to_string());
        Ok(DeployResult::ok())
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }
}
