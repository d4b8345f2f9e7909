use crate::domain::LogLevel;

/// API name of the custom object log records are stored in.
pub const LOG_OBJECT: &str = "AppLog__c";

/// API name of the permission set granting access to [`LOG_OBJECT`].
pub const PERMISSION_SET: &str = "AppLog_Access";

/// Character limits of the backend text fields. The row mapping truncates
/// to these before writing, so inserts never bounce on length.
pub const MESSAGE_MAX_CHARS: usize = 255;
pub const STACK_MAX_CHARS: usize = 32_768;
pub const SYSTEM_MAX_CHARS: usize = 255;
pub const USER_MAX_CHARS: usize = 80;

/// The complete set of backend components the logger needs: one custom
/// object, its fields, and the permission set that grants access to them.
///
/// [`SchemaBundle::bundled`] is the single source of truth; verification
/// diffs against it and deploys are driven from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaBundle {
    pub object: ObjectSpec,
    pub fields: Vec<FieldSpec>,
    pub permission_set: PermissionSetSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSpec {
    pub api_name: String,
    pub label: String,
    pub plural_label: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub api_name: String,
    pub label: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Restricted picklists reject values outside `values` at the backend.
    Picklist {
        values: Vec<String>,
        restricted: bool,
    },
    Text {
        length: usize,
    },
    LongTextArea {
        length: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSetSpec {
    pub api_name: String,
    pub label: String,
}

impl SchemaBundle {
    /// The schema this crate ships: `AppLog__c` with level, message, stack,
    /// system, and user fields, plus the `AppLog_Access` permission set.
    #[must_use]
    pub fn bundled() -> Self {
        let levels = LogLevel::ALL
            .iter()
            .map(|level| level.as_str().to_string())
            .collect();
        Self {
            object: ObjectSpec {
                api_name: LOG_OBJECT.to_string(),
                label: "App Log".to_string(),
                plural_label: "App Logs".to_string(),
                description: "Application log records written by the orglog client".to_string(),
            },
            fields: vec![
                FieldSpec {
                    api_name: "Level__c".to_string(),
                    label: "Level".to_string(),
                    kind: FieldKind::Picklist {
                        values: levels,
                        restricted: true,
                    },
                },
                FieldSpec {
                    api_name: "Message__c".to_string(),
                    label: "Message".to_string(),
                    kind: FieldKind::Text {
                        length: MESSAGE_MAX_CHARS,
                    },
                },
                FieldSpec {
                    api_name: "Stack__c".to_string(),
                    label: "Stack".to_string(),
                    kind: FieldKind::LongTextArea {
                        length: STACK_MAX_CHARS,
                    },
                },
                FieldSpec {
                    api_name: "System__c".to_string(),
                    label: "System".to_string(),
                    kind: FieldKind::Text {
                        length: SYSTEM_MAX_CHARS,
                    },
                },
                FieldSpec {
                    api_name: "User__c".to_string(),
                    label: "User".to_string(),
                    kind: FieldKind::Text {
                        length: USER_MAX_CHARS,
                    },
                },
            ],
            permission_set: PermissionSetSpec {
                api_name: PERMISSION_SET.to_string(),
                label: "App Log Access".to_string(),
            },
        }
    }

    /// Field API names that must be present for the schema to count as
    /// provisioned. Standard fields like `Id` are backend-managed and not
    /// listed.
    #[must_use]
    pub fn required_field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.api_name.as_str()).collect()
    }
}
