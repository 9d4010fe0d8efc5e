//! Operation manifest: the pre-parsed description of every API operation whose parameter and
//! payload types should be documented.
//!
//! ```yaml
//! operations:
//!   - path: /users/{id}
//!     method: get
//!     id: get_user
//!     context: crate::handlers::users
//!     parameters:
//!       - { name: id, in: path, type: u64 }
//!     responses:
//!       "200": { type: "Envelope<models::User>", description: The user }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// HTTP methods that an operation can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[serde(alias = "GET")]
    Get,
    #[serde(alias = "POST")]
    Post,
    #[serde(alias = "PUT")]
    Put,
    #[serde(alias = "DELETE")]
    Delete,
    #[serde(alias = "PATCH")]
    Patch,
    #[serde(alias = "OPTIONS")]
    Options,
    #[serde(alias = "HEAD")]
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }
}

/// Location of a parameter in the HTTP request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// Path parameter (e.g., /users/{id})
    Path,
    /// Query parameter (e.g., /users?page=1)
    Query,
    /// Header parameter
    Header,
    Cookie,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationManifest {
    #[serde(default)]
    pub operations: Vec<OperationSpec>,
}

/// One operation, with type references written as Rust types
#[derive(Debug, Clone, Deserialize)]
pub struct OperationSpec {
    pub path: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Module path (`crate::handlers`) or source file whose imports govern the type references
    pub context: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub request_body: Option<BodySpec>,
    /// Responses keyed by status code
    #[serde(default)]
    pub responses: BTreeMap<String, ResponseSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(rename = "type")]
    pub type_ref: String,
    /// Path parameters are always required
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BodySpec {
    #[serde(rename = "type")]
    pub type_ref: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default = "default_true")]
    pub required: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseSpec {
    /// Payload type; a response without one has no content
    #[serde(rename = "type", default)]
    pub type_ref: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "application/json".to_string()
}

fn default_true() -> bool {
    true
}

impl OperationManifest {
    /// Read a manifest; `.json` files are parsed as JSON, anything else as YAML
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading operation manifest {}", path.display());
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read operation manifest: {}", path.display()))?;
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        Self::parse(&text, is_json)
            .with_context(|| format!("Failed to parse operation manifest: {}", path.display()))
    }

    pub fn parse(text: &str, is_json: bool) -> Result<Self> {
        let manifest = if is_json {
            serde_json::from_str(text)?
        } else {
            serde_yaml::from_str(text)?
        };
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_yaml_manifest() {
        let manifest = OperationManifest::parse(
            r#"
operations:
  - path: /users/{id}
    method: GET
    id: get_user
    tags: [users]
    context: crate::handlers
    parameters:
      - { name: id, in: path, type: u64 }
      - { name: verbose, in: query, type: bool, description: Extra detail }
    request_body:
      type: "models::NewUser"
    responses:
      "200": { type: "Vec<models::User>", description: All users }
      "404": {}
"#,
            false,
        )
        .unwrap();

        let op = &manifest.operations[0];
        assert_eq!(op.method, HttpMethod::Get);
        assert_eq!(op.id.as_deref(), Some("get_user"));
        assert_eq!(op.parameters[0].location, ParameterLocation::Path);
        assert_eq!(op.parameters[1].description.as_deref(), Some("Extra detail"));
        let body = op.request_body.as_ref().unwrap();
        assert_eq!(body.content_type, "application/json");
        assert!(body.required);
        assert_eq!(op.responses["200"].type_ref.as_deref(), Some("Vec<models::User>"));
        assert!(op.responses["404"].type_ref.is_none());
    }

    #[test]
    fn test_load_json_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ops.json");
        fs::write(
            &path,
            r#"{"operations": [{"path": "/ping", "method": "head", "context": "crate"}]}"#,
        )
        .unwrap();

        let manifest = OperationManifest::load(&path).unwrap();
        assert_eq!(manifest.operations.len(), 1);
        assert_eq!(manifest.operations[0].method, HttpMethod::Head);
        assert!(manifest.operations[0].responses.is_empty());
    }

    #[test]
    fn test_invalid_manifest() {
        assert!(OperationManifest::parse("operations: [{ path: /x }]", false).is_err());
        assert!(OperationManifest::load(Path::new("/nonexistent/ops.yaml")).is_err());
    }
}
