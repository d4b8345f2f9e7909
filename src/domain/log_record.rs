use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A log record ready to be persisted.
///
/// This is the caller-facing shape: field names are plain words, lengths are
/// unconstrained. Backend field naming and length limits are applied by the
/// row mapping in [`crate::sobject`], not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Originating system, typically a hostname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Acting user, an application-level name rather than a backend user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl LogRecord {
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            stack: None,
            system: None,
            user: None,
        }
    }

    /// Fills `system` and `user` from `defaults` where the record left them
    /// unset. Values already present on the record always win.
    #[must_use]
    pub fn with_defaults(mut self, defaults: &LogDefaults) -> Self {
        self.system = self.system.or_else(|| defaults.system.clone());
        self.user = self.user.or_else(|| defaults.user.clone());
        self
    }
}

/// Ambient values merged into every record a [`crate::Logger`] writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogDefaults {
    pub system: Option<String>,
    pub user: Option<String>,
}

/// A partial record: every field optional, applied on top of a base record.
///
/// Used by the per-level logger methods to let callers override individual
/// fields without re-stating the whole record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogDraft {
    pub level: Option<LogLevel>,
    pub message: Option<String>,
    pub stack: Option<String>,
    pub system: Option<String>,
    pub user: Option<String>,
}

impl LogDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    #[must_use]
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Overlays this draft onto `base`. Set fields replace the base value,
    /// unset fields leave it untouched.
    #[must_use]
    pub fn apply_to(self, mut base: LogRecord) -> LogRecord {
        if let Some(level) = self.level {
            base.level = level;
        }
        if let Some(message) = self.message {
            base.message = message;
        }
        if let Some(stack) = self.stack {
            base.stack = Some(stack);
        }
        if let Some(system) = self.system {
            base.system = Some(system);
        }
        if let Some(user) = self.user {
            base.user = Some(user);
        }
        base
    }
}

/// A record read back from the backend, carrying the backend-assigned
/// identity alongside the logged fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredLog {
    pub id: String,
    /// Creation timestamp exactly as the backend returned it.
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl StoredLog {
    /// Parses the backend timestamp. Salesforce renders offsets without a
    /// colon (`+0000`), which strict RFC 3339 parsing rejects, so both forms
    /// are tried. Returns `None` for anything unparseable.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .or_else(|_| DateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f%z"))
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }
}
