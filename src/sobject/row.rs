use crate::domain::{LogLevel, LogRecord, StoredLog};
use crate::sobject::schema::{
    MESSAGE_MAX_CHARS, STACK_MAX_CHARS, SYSTEM_MAX_CHARS, USER_MAX_CHARS,
};
use serde::{Deserialize, Serialize};

/// Columns selected when reading logs back, in query order. `Id` and
/// `CreatedDate` are backend-managed; the rest map 1:1 onto [`SfLog`].
pub const LOG_COLUMNS: [&str; 7] = [
    "Id",
    "CreatedDate",
    "Level__c",
    "Message__c",
    "Stack__c",
    "System__c",
    "User__c",
];

/// The write shape of a log record: backend field names, lengths clamped.
///
/// Absent optionals are omitted from the serialized object entirely, so the
/// backend leaves those columns null instead of storing empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SfLog {
    #[serde(rename = "Level__c")]
    pub level: LogLevel,
    #[serde(rename = "Message__c")]
    pub message: String,
    #[serde(rename = "Stack__c", default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(rename = "System__c", default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(rename = "User__c", default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// The read shape: one query row, backend identity plus the logged fields.
/// Extra row keys (the `attributes` object the backend adds) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SfLogRow {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "CreatedDate")]
    pub created_date: String,
    #[serde(flatten)]
    pub log: SfLog,
}

/// Clamps `value` to at most `max` characters. Counts characters, not
/// bytes, so multibyte text is never split mid-character. Already-short
/// values pass through unchanged, which makes the clamp idempotent.
#[must_use]
pub fn truncate_chars(value: String, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => {
            let mut clamped = value;
            clamped.truncate(idx);
            clamped
        }
        None => value,
    }
}

impl From<LogRecord> for SfLog {
    fn from(record: LogRecord) -> Self {
        Self {
            level: record.level,
            message: truncate_chars(record.message, MESSAGE_MAX_CHARS),
            stack: record.stack.map(|s| truncate_chars(s, STACK_MAX_CHARS)),
            system: record.system.map(|s| truncate_chars(s, SYSTEM_MAX_CHARS)),
            user: record.user.map(|u| truncate_chars(u, USER_MAX_CHARS)),
        }
    }
}

impl From<SfLogRow> for StoredLog {
    fn from(row: SfLogRow) -> Self {
        Self {
            id: row.id,
            timestamp: row.created_date,
            level: row.log.level,
            message: row.log.message,
            stack: row.log.stack,
            system: row.log.system,
            user: row.log.user,
        }
    }
}
