//! The logging facade.
//!
//! A [`Logger`] wraps a [`Connection`], merges ambient defaults into each
//! record, and exposes one method per severity plus retrieval and setup.
//! It holds no mutable state, so a single instance can be shared across
//! tasks behind its internal `Arc`.

use crate::connection::{Connection, ConnectionError};
use crate::domain::{LogDefaults, LogDraft, LogLevel, LogRecord, StoredLog, Thrown};
use crate::provision::{Provisioner, SetupError, SetupOutcome};
use crate::sobject::row::{SfLog, SfLogRow};
use crate::sobject::schema::LOG_OBJECT;
use crate::sobject::soql;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    /// The backend accepted the request but rejected the record.
    #[error("Insert rejected by backend: {0}")]
    InsertFailed(String),
    /// A record failed to serialize into its backend field map.
    #[error("Record encode failed: {0}")]
    Encode(serde_json::Error),
    /// A returned row did not match the expected column shape.
    #[error("Row decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

pub struct Logger {
    conn: Arc<dyn Connection>,
    defaults: LogDefaults,
    echo: bool,
}

pub struct LoggerBuilder {
    conn: Arc<dyn Connection>,
    echo: bool,
    system: Option<String>,
    user: Option<String>,
}

impl LoggerBuilder {
    /// Mirror every written record to stdout as one JSON line.
    #[must_use]
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Default `system` value, replacing the detected hostname.
    #[must_use]
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Default `user` value, replacing the detected OS username.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Logger {
        let defaults = LogDefaults {
            system: self.system.or_else(local_hostname),
            user: self.user.or_else(|| Some(whoami::username())),
        };
        Logger {
            conn: self.conn,
            defaults,
            echo: self.echo,
        }
    }
}

fn local_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|h| h.to_str().map(|s| s.to_string()))
}

impl Logger {
    #[must_use]
    pub fn builder(conn: Arc<dyn Connection>) -> LoggerBuilder {
        LoggerBuilder {
            conn,
            echo: false,
            system: None,
            user: None,
        }
    }

    /// Logger with detected defaults and echo off.
    #[must_use]
    pub fn new(conn: Arc<dyn Connection>) -> Self {
        Self::builder(conn).build()
    }

    /// Ensures the backend schema and access grant exist. Call once at
    /// startup; a provisioned org costs a single describe round trip.
    pub async fn setup(&self) -> Result<SetupOutcome, LoggerError> {
        let provisioner = Provisioner::new(Arc::clone(&self.conn));
        Ok(provisioner.ensure().await?)
    }

    /// Writes one record and returns the backend-assigned id.
    ///
    /// Defaults fill unset `system`/`user` fields, over-length text is
    /// clamped by the row mapping, and with echo enabled the merged record
    /// is printed to stdout before the insert.
    pub async fn log(&self, record: LogRecord) -> Result<String, LoggerError> {
        let record = record.with_defaults(&self.defaults);
        if self.echo && let Ok(line) = serde_json::to_string(&record) {
            println!("{line}");
        }
        let row = SfLog::from(record);
        let fields = serde_json::to_value(&row).map_err(LoggerError::Encode)?;
        let save = self.conn.insert(LOG_OBJECT, fields).await?;
        if !save.success {
            return Err(LoggerError::InsertFailed(save.errors.join("; ")));
        }
        debug!(id = %save.id, "log record written");
        Ok(save.id)
    }

    pub async fn trace(&self, message: impl Into<String> + Send) -> Result<String, LoggerError> {
        self.leveled(LogLevel::Trace, message.into(), None).await
    }

    pub async fn trace_with(
        &self,
        message: impl Into<String> + Send,
        extra: LogDraft,
    ) -> Result<String, LoggerError> {
        self.leveled(LogLevel::Trace, message.into(), Some(extra)).await
    }

    pub async fn debug(&self, message: impl Into<String> + Send) -> Result<String, LoggerError> {
        self.leveled(LogLevel::Debug, message.into(), None).await
    }

    pub async fn debug_with(
        &self,
        message: impl Into<String> + Send,
        extra: LogDraft,
    ) -> Result<String, LoggerError> {
        self.leveled(LogLevel::Debug, message.into(), Some(extra)).await
    }

    pub async fn info(&self, message: impl Into<String> + Send) -> Result<String, LoggerError> {
        self.leveled(LogLevel::Info, message.into(), None).await
    }

    pub async fn info_with(
        &self,
        message: impl Into<String> + Send,
        extra: LogDraft,
    ) -> Result<String, LoggerError> {
        self.leveled(LogLevel::Info, message.into(), Some(extra)).await
    }

    pub async fn warn(&self, message: impl Into<String> + Send) -> Result<String, LoggerError> {
        self.leveled(LogLevel::Warn, message.into(), None).await
    }

    pub async fn warn_with(
        &self,
        message: impl Into<String> + Send,
        extra: LogDraft,
    ) -> Result<String, LoggerError> {
        self.leveled(LogLevel::Warn, message.into(), Some(extra)).await
    }

    /// Logs a thrown value at `error` level: the cause chain is flattened
    /// into the message and any stack text lands in the stack field.
    pub async fn error(&self, thrown: Thrown) -> Result<String, LoggerError> {
        self.flattened(LogLevel::Error, &thrown, None).await
    }

    pub async fn error_with(
        &self,
        thrown: Thrown,
        extra: LogDraft,
    ) -> Result<String, LoggerError> {
        self.flattened(LogLevel::Error, &thrown, Some(extra)).await
    }

    pub async fn fatal(&self, thrown: Thrown) -> Result<String, LoggerError> {
        self.flattened(LogLevel::Fatal, &thrown, None).await
    }

    pub async fn fatal_with(
        &self,
        thrown: Thrown,
        extra: LogDraft,
    ) -> Result<String, LoggerError> {
        self.flattened(LogLevel::Fatal, &thrown, Some(extra)).await
    }

    /// Reads logs back, newest first, optionally limited.
    pub async fn get_logs(&self, limit: Option<u32>) -> Result<Vec<StoredLog>, LoggerError> {
        let soql = soql::logs_query(limit);
        let result = self.conn.query(&soql).await?;
        result
            .records
            .into_iter()
            .map(|row| {
                let parsed: SfLogRow = serde_json::from_value(row)?;
                Ok(StoredLog::from(parsed))
            })
            .collect()
    }

    /// Base record at `level`, then the draft on top. The draft wins every
    /// field it sets, including `level` itself.
    async fn leveled(
        &self,
        level: LogLevel,
        message: String,
        extra: Option<LogDraft>,
    ) -> Result<String, LoggerError> {
        let mut record = LogRecord::new(level, message);
        if let Some(extra) = extra {
            record = extra.apply_to(record);
        }
        self.log(record).await
    }

    async fn flattened(
        &self,
        level: LogLevel,
        thrown: &Thrown,
        extra: Option<LogDraft>,
    ) -> Result<String, LoggerError> {
        let parts = thrown.flatten();
        let mut record = LogRecord::new(level, parts.message);
        record.stack = parts.stack;
        if let Some(extra) = extra {
            record = extra.apply_to(record);
        }
        self.log(record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{MockConnection, QueryResponse, SaveResult};
    use serde_json::json;

    fn accepting_save() -> SaveResult {
        SaveResult {
            id: "a00000000000001AAA".to_string(),
            success: true,
            errors: vec![],
        }
    }

    fn logger_with(mock: MockConnection) -> Logger {
        // Pin both defaults so assertions do not depend on the host.
        Logger::builder(Arc::new(mock))
            .system("test-system")
            .user("test-user")
            .build()
    }

    #[tokio::test]
    async fn level_methods_stamp_their_level() {
        let mut mock = MockConnection::new();
        mock.expect_insert()
            .withf(|object, fields| object == "AppLog__c" && fields["Level__c"] == "warn")
            .times(1)
            .returning(|_, _| Ok(accepting_save()));

        let logger = logger_with(mock);
        let id = logger.warn("low disk").await.expect("warn should succeed");
        assert_eq!(id, "a00000000000001AAA");
    }

    #[tokio::test]
    async fn draft_level_overrides_method_level() {
        let mut mock = MockConnection::new();
        mock.expect_insert()
            .withf(|_, fields| fields["Level__c"] == "error" && fields["Message__c"] == "m")
            .times(1)
            .returning(|_, _| Ok(accepting_save()));

        let logger = logger_with(mock);
        logger
            .info_with("m", LogDraft::new().level(LogLevel::Error))
            .await
            .expect("log should succeed");
    }

    #[tokio::test]
    async fn defaults_reach_the_wire() {
        let mut mock = MockConnection::new();
        mock.expect_insert()
            .withf(|_, fields| {
                fields["System__c"] == "test-system" && fields["User__c"] == "test-user"
            })
            .times(1)
            .returning(|_, _| Ok(accepting_save()));

        let logger = logger_with(mock);
        logger.info("hello").await.expect("log should succeed");
    }

    #[tokio::test]
    async fn rejected_save_maps_to_insert_failed() {
        let mut mock = MockConnection::new();
        mock.expect_insert().returning(|_, _| {
            Ok(SaveResult {
                id: String::new(),
                success: false,
                errors: vec!["STORAGE_LIMIT_EXCEEDED: over quota".to_string()],
            })
        });

        let logger = logger_with(mock);
        let err = logger.info("x").await.expect_err("log should fail");
        assert!(matches!(err, LoggerError::InsertFailed(detail) if detail.contains("quota")));
    }

    #[tokio::test]
    async fn get_logs_decodes_rows() {
        let mut mock = MockConnection::new();
        mock.expect_query()
            .withf(|soql: &str| soql.ends_with("LIMIT 1"))
            .returning(|_| {
                Ok(QueryResponse {
                    total_size: 1,
                    done: true,
                    records: vec![json!({
                        "attributes": {"type": "AppLog__c"},
                        "Id": "a00000000000009AAA",
                        "CreatedDate": "2024-06-01T10:30:15.000+0000",
                        "Level__c": "fatal",
                        "Message__c": "kernel panic",
                        "Stack__c": null,
                        "System__c": "web-1",
                        "User__c": null
                    })],
                })
            });

        let logger = logger_with(mock);
        let logs = logger
            .get_logs(Some(1))
            .await
            .expect("get_logs should succeed");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, LogLevel::Fatal);
        assert_eq!(logs[0].message, "kernel panic");
    }

    #[tokio::test]
    async fn get_logs_surfaces_malformed_rows() {
        let mut mock = MockConnection::new();
        mock.expect_query().returning(|_| {
            Ok(QueryResponse {
                total_size: 1,
                done: true,
                records: vec![json!({"Id": "a001"})],
            })
        });

        let logger = logger_with(mock);
        let err = logger
            .get_logs(None)
            .await
            .expect_err("get_logs should fail");
        assert!(matches!(err, LoggerError::Decode(_)));
    }

    #[tokio::test]
    async fn thrown_chain_lands_in_message_and_stack() {
        let mut mock = MockConnection::new();
        mock.expect_insert()
            .withf(|_, fields| {
                fields["Level__c"] == "error"
                    && fields["Message__c"] == "Top | Cause: Root"
                    && fields["Stack__c"] == "top trace"
            })
            .times(1)
            .returning(|_, _| Ok(accepting_save()));

        let logger = logger_with(mock);
        let thrown = Thrown::error("Top")
            .with_stack("top trace")
            .caused_by(Thrown::error("Root"));
        logger.error(thrown).await.expect("error should succeed");
    }

    #[tokio::test]
    async fn draft_overrides_flattened_error_fields() {
        let mut mock = MockConnection::new();
        mock.expect_insert()
            .withf(|_, fields| {
                fields["Level__c"] == "warn"
                    && fields["Message__c"] == "handled"
                    && fields["Stack__c"] == "trace text"
            })
            .times(1)
            .returning(|_, _| Ok(accepting_save()));

        let logger = logger_with(mock);
        let thrown = Thrown::error("boom").with_stack("trace text");
        logger
            .error_with(
                thrown,
                LogDraft::new().level(LogLevel::Warn).message("handled"),
            )
            .await
            .expect("log should succeed");
    }

    #[test]
    fn encode_and_decode_errors_name_their_direction() {
        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let rendered = LoggerError::Encode(bad).to_string();
        assert!(rendered.starts_with("Record encode failed"));

        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let rendered = LoggerError::Decode(bad).to_string();
        assert!(rendered.starts_with("Row decode failed"));
    }
}
