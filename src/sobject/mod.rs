//! Backend object mapping: the log schema, the row shapes written to and
//! read from it, and the SOQL used to query it.

pub mod row;
pub mod schema;
pub mod soql;

pub use row::{LOG_COLUMNS, SfLog, SfLogRow, truncate_chars};
pub use schema::{
    FieldKind, FieldSpec, LOG_OBJECT, MESSAGE_MAX_CHARS, ObjectSpec, PERMISSION_SET,
    PermissionSetSpec, STACK_MAX_CHARS, SYSTEM_MAX_CHARS, SchemaBundle, USER_MAX_CHARS,
};
