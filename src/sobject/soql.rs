//! SOQL query builders. Every query string the crate sends is assembled
//! here, so the tests below pin the exact wire text.

use crate::sobject::row::LOG_COLUMNS;
use crate::sobject::schema::LOG_OBJECT;

/// Escapes a value for use inside a single-quoted SOQL string literal.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Query for reading logs back: every column, newest first, optionally
/// limited. Rows with equal timestamps come back in backend-defined order.
#[must_use]
pub fn logs_query(limit: Option<u32>) -> String {
    let mut soql = format!(
        "SELECT {} FROM {} ORDER BY CreatedDate DESC",
        LOG_COLUMNS.join(", "),
        LOG_OBJECT
    );
    if let Some(limit) = limit {
        soql.push_str(&format!(" LIMIT {limit}"));
    }
    soql
}

/// Looks up a permission set by its exact API name.
#[must_use]
pub fn permission_set_query(name: &str) -> String {
    format!("SELECT Id FROM PermissionSet WHERE Name = {}", quote(name))
}

/// Checks whether `user_id` already holds the permission set.
#[must_use]
pub fn assignment_query(permission_set_id: &str, user_id: &str) -> String {
    format!(
        "SELECT Id FROM PermissionSetAssignment WHERE AssigneeId = {} AND PermissionSetId = {}",
        quote(user_id),
        quote(permission_set_id)
    )
}
