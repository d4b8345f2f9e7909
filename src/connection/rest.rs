//! REST implementation of [`Connection`] over the Salesforce data and
//! Tooling APIs: bearer-authenticated JSON over a pooled `reqwest` client.

use crate::connection::{
    Connection, ConnectionError, DeployProblem, DeployResult, DescribeResponse, QueryResponse,
    RemoteError, SaveResult,
};
use crate::sobject::schema::{FieldKind, FieldSpec, ObjectSpec, SchemaBundle};
use crate::sobject::soql;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::env;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Org instance URL, e.g. `https://acme.my.salesforce.com`.
    pub instance_url: String,
    pub access_token: String,
    /// API version without the `v` prefix, e.g. `62.0`.
    pub api_version: String,
    /// Id of the user the token belongs to; permission grants target it.
    pub user_id: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            instance_url: "https://example.my.salesforce.com".to_string(),
            access_token: String::new(),
            api_version: "62.0".to_string(),
            user_id: String::new(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("orglog/{}", crate::VERSION),
        }
    }
}

impl RestConfig {
    /// Reads the connection settings from the environment:
    /// `SF_INSTANCE_URL`, `SF_ACCESS_TOKEN`, and `SF_USER_ID` are required,
    /// `SF_API_VERSION` optional.
    pub fn from_env() -> Result<Self, ConnectionError> {
        let require = |name: &str| {
            env::var(name)
                .map_err(|_| ConnectionError::InvalidConfiguration(format!("{name} is not set")))
        };
        let mut config = Self {
            instance_url: require("SF_INSTANCE_URL")?,
            access_token: require("SF_ACCESS_TOKEN")?,
            user_id: require("SF_USER_ID")?,
            ..Self::default()
        };
        if let Ok(version) = env::var("SF_API_VERSION") {
            config.api_version = version;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct RestConnection {
    client: Client,
    base: Url,
    config: RestConfig,
}

#[derive(Debug, Deserialize)]
struct RawSaveResult {
    id: Option<String>,
    success: bool,
    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawApiError {
    message: String,
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDescribe {
    name: String,
    fields: Vec<RawDescribeField>,
}

#[derive(Debug, Deserialize)]
struct RawDescribeField {
    name: String,
}

impl RestConnection {
    pub fn new(config: RestConfig) -> Result<Self, ConnectionError> {
        let base = Url::parse(&config.instance_url).map_err(|e| {
            ConnectionError::InvalidConfiguration(format!("invalid instance URL: {e}"))
        })?;
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| {
                ConnectionError::InvalidConfiguration(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            client,
            base,
            config,
        })
    }

    pub fn from_env() -> Result<Self, ConnectionError> {
        Self::new(RestConfig::from_env()?)
    }

    fn data_url(&self, suffix: &str) -> Result<Url, ConnectionError> {
        self.base
            .join(&format!(
                "/services/data/v{}/{suffix}",
                self.config.api_version
            ))
            .map_err(|e| ConnectionError::InvalidConfiguration(format!("failed to build URL: {e}")))
    }

    fn sobject_url(&self, object: &str) -> Result<Url, ConnectionError> {
        self.data_url(&format!("sobjects/{object}"))
    }

    fn tooling_url(&self, component: &str) -> Result<Url, ConnectionError> {
        self.data_url(&format!("tooling/sobjects/{component}"))
    }

    /// POSTs a JSON body and maps the backend's save response.
    async fn create(&self, url: Url, body: &Value) -> Result<SaveResult, ConnectionError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.access_token)
            .json(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ConnectionError::Remote(remote_error(response).await));
        }
        let raw: RawSaveResult = response.json().await?;
        Ok(SaveResult {
            id: raw.id.unwrap_or_default(),
            success: raw.success,
            errors: raw.errors.iter().map(save_error_text).collect(),
        })
    }

    /// Creates one schema component, folding rejections into `problems`.
    /// Components the org already has are skipped, which is what makes a
    /// repeated deploy safe. Transport failures abort the whole deploy.
    async fn deploy_component(
        &self,
        problems: &mut Vec<DeployProblem>,
        component: &str,
        url: Url,
        payload: Value,
    ) -> Result<(), ConnectionError> {
        match self.create(url, &payload).await {
            Ok(save) if save.success => {
                debug!(component, id = %save.id, "deployed schema component");
            }
            Ok(save) => problems.push(DeployProblem {
                component: component.to_string(),
                message: save.errors.join("; "),
            }),
            Err(ConnectionError::Remote(remote)) if already_present(&remote) => {
                debug!(component, "schema component already present");
            }
            Err(ConnectionError::Remote(remote)) => problems.push(DeployProblem {
                component: component.to_string(),
                message: remote.to_string(),
            }),
            Err(other) => return Err(other),
        }
        Ok(())
    }

    /// Creates the permission set, or looks up its id when it already
    /// exists. Returns `None` (with a recorded problem) when the set cannot
    /// be created or found, in which case the permission rows are skipped.
    async fn ensure_permission_set(
        &self,
        problems: &mut Vec<DeployProblem>,
        bundle: &SchemaBundle,
    ) -> Result<Option<String>, ConnectionError> {
        let spec = &bundle.permission_set;
        let payload = json!({ "Name": spec.api_name, "Label": spec.label });
        match self.create(self.sobject_url("PermissionSet")?, &payload).await {
            Ok(save) if save.success => Ok(Some(save.id)),
            Ok(save) => {
                problems.push(DeployProblem {
                    component: spec.api_name.clone(),
                    message: save.errors.join("; "),
                });
                Ok(None)
            }
            Err(ConnectionError::Remote(remote)) if already_present(&remote) => {
                let result = self.query(&soql::permission_set_query(&spec.api_name)).await?;
                let id = result
                    .records
                    .first()
                    .and_then(|row| row.get("Id"))
                    .and_then(Value::as_str)
                    .map(ToString::to_string);
                if id.is_none() {
                    problems.push(DeployProblem {
                        component: spec.api_name.clone(),
                        message: "reported as existing but lookup returned no rows".to_string(),
                    });
                }
                Ok(id)
            }
            Err(ConnectionError::Remote(remote)) => {
                problems.push(DeployProblem {
                    component: spec.api_name.clone(),
                    message: remote.to_string(),
                });
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }
}

#[async_trait]
impl Connection for RestConnection {
    async fn insert(
        &self,
        object: &str,
        fields: Value,
    ) -> Result<SaveResult, ConnectionError> {
        let url = self.sobject_url(object)?;
        let save = self.create(url, &fields).await?;
        debug!(object, id = %save.id, success = save.success, "inserted record");
        Ok(save)
    }

    async fn query(&self, soql: &str) -> Result<QueryResponse, ConnectionError> {
        let url = self.data_url("query")?;
        let response = self
            .client
            .get(url)
            .query(&[("q", soql)])
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ConnectionError::Remote(remote_error(response).await));
        }
        let result: QueryResponse = response.json().await?;
        debug!(rows = result.records.len(), "query returned");
        Ok(result)
    }

    async fn describe(&self, object: &str) -> Result<DescribeResponse, ConnectionError> {
        let url = self.data_url(&format!("sobjects/{object}/describe"))?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(object, "describe returned 404");
            return Err(ConnectionError::NotFound(object.to_string()));
        }
        if !response.status().is_success() {
            return Err(ConnectionError::Remote(remote_error(response).await));
        }
        let raw: RawDescribe = response.json().await?;
        Ok(DescribeResponse {
            name: raw.name,
            fields: raw.fields.into_iter().map(|f| f.name).collect(),
        })
    }

    async fn deploy(&self, bundle: &SchemaBundle) -> Result<DeployResult, ConnectionError> {
        let mut problems = Vec::new();

        self.deploy_component(
            &mut problems,
            &bundle.object.api_name,
            self.tooling_url("CustomObject")?,
            object_payload(&bundle.object),
        )
        .await?;

        for field in &bundle.fields {
            self.deploy_component(
                &mut problems,
                &format!("{}.{}", bundle.object.api_name, field.api_name),
                self.tooling_url("CustomField")?,
                field_payload(&bundle.object.api_name, field),
            )
            .await?;
        }

        if let Some(ps_id) = self.ensure_permission_set(&mut problems, bundle).await? {
            self.deploy_component(
                &mut problems,
                "ObjectPermissions",
                self.sobject_url("ObjectPermissions")?,
                object_permissions_payload(&ps_id, &bundle.object.api_name),
            )
            .await?;
            for field in &bundle.fields {
                self.deploy_component(
                    &mut problems,
                    &format!("FieldPermissions.{}", field.api_name),
                    self.sobject_url("FieldPermissions")?,
                    field_permissions_payload(&ps_id, &bundle.object.api_name, &field.api_name),
                )
                .await?;
            }
        }

        Ok(DeployResult {
            success: problems.is_empty(),
            problems,
        })
    }

    fn user_id(&self) -> &str {
        &self.config.user_id
    }
}

/// Error codes the backend uses for "this component already exists".
fn already_present(remote: &RemoteError) -> bool {
    matches!(
        remote.code.as_deref(),
        Some("DUPLICATE_DEVELOPER_NAME" | "DUPLICATE_VALUE")
    )
}

async fn remote_error(response: Response) -> RemoteError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    if let Ok(mut errors) = serde_json::from_str::<Vec<RawApiError>>(&text)
        && !errors.is_empty()
    {
        let first = errors.remove(0);
        return RemoteError {
            status,
            code: first.error_code,
            message: first.message,
        };
    }
    RemoteError {
        status,
        code: None,
        message: if text.is_empty() {
            "empty error body".to_string()
        } else {
            text
        },
    }
}

/// Renders one entry of a save response's `errors` array.
fn save_error_text(value: &Value) -> String {
    let message = value.get("message").and_then(Value::as_str);
    let code = value
        .get("statusCode")
        .or_else(|| value.get("errorCode"))
        .and_then(Value::as_str);
    match (code, message) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (None, Some(message)) => message.to_string(),
        _ => value.to_string(),
    }
}

fn object_payload(object: &ObjectSpec) -> Value {
    json!({
        "FullName": object.api_name,
        "Metadata": {
            "label": object.label,
            "pluralLabel": object.plural_label,
            "description": object.description,
            "nameField": {
                "type": "AutoNumber",
                "label": "Log Number",
                "displayFormat": "LOG-{00000000}"
            },
            "deploymentStatus": "Deployed",
            "sharingModel": "ReadWrite"
        }
    })
}

fn field_payload(object_api_name: &str, field: &FieldSpec) -> Value {
    let metadata = match &field.kind {
        FieldKind::Picklist { values, restricted } => json!({
            "label": field.label,
            "type": "Picklist",
            "valueSet": {
                "restricted": restricted,
                "valueSetDefinition": {
                    "sorted": false,
                    "value": values
                        .iter()
                        .map(|v| json!({ "fullName": v, "label": v, "default": false }))
                        .collect::<Vec<_>>()
                }
            }
        }),
        FieldKind::Text { length } => json!({
            "label": field.label,
            "type": "Text",
            "length": length
        }),
        FieldKind::LongTextArea { length } => json!({
            "label": field.label,
            "type": "LongTextArea",
            "length": length,
            "visibleLines": 3
        }),
    };
    json!({
        "FullName": format!("{object_api_name}.{}", field.api_name),
        "Metadata": metadata
    })
}

fn object_permissions_payload(permission_set_id: &str, object_api_name: &str) -> Value {
    json!({
        "ParentId": permission_set_id,
        "SobjectType": object_api_name,
        "PermissionsRead": true,
        "PermissionsCreate": true,
        "PermissionsEdit": false,
        "PermissionsDelete": false,
        "PermissionsViewAllRecords": true,
        "PermissionsModifyAllRecords": false
    })
}

fn field_permissions_payload(
    permission_set_id: &str,
    object_api_name: &str,
    field_api_name: &str,
) -> Value {
    json!({
        "ParentId": permission_set_id,
        "SobjectType": object_api_name,
        "Field": format!("{object_api_name}.{field_api_name}"),
        "PermissionsRead": true,
        "PermissionsEdit": true
    })
}
