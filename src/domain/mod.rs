//! Core domain types: log levels, records, and thrown-value normalization.

pub mod log_level;
pub mod log_record;
pub mod thrown;

pub use log_level::{LogLevel, ParseLogLevelError};
pub use log_record::{LogDefaults, LogDraft, LogRecord, StoredLog};
pub use thrown::{MAX_CAUSE_DEPTH, NON_ERROR_PREFIX, Thrown, ThrownParts};
