use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::operations::{HttpMethod, OperationSpec, ParameterLocation};
use crate::pruner;
use crate::schema::Schema;
use crate::schema_generator::SchemaGenerator;

/// OpenAPI document builder
pub struct OpenApiBuilder {
    /// OpenAPI info section
    info: Info,
    /// Paths collection (URL path -> PathItem)
    paths: BTreeMap<String, PathItem>,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title
    pub title: String,
    /// API version
    pub version: String,
    /// API description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
}

impl PathItem {
    /// Operations of this path, in method order
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        [
            &self.get,
            &self.post,
            &self.put,
            &self.delete,
            &self.patch,
            &self.options,
            &self.head,
        ]
        .into_iter()
        .flatten()
    }

    fn slot(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
        }
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Parameters (path, query, header, cookie)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code
    pub responses: BTreeMap<String, Response>,
}

impl Operation {
    /// Every schema the operation mentions directly
    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        let parameters = self.parameters.iter().flatten().map(|p| &p.schema);
        let body = self
            .request_body
            .iter()
            .flat_map(|body| body.content.values().map(|m| &m.schema));
        let responses = self
            .responses
            .values()
            .flat_map(|r| r.content.iter().flat_map(|c| c.values().map(|m| &m.schema)));
        parameters.chain(body).chain(responses)
    }
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    /// Content types and their schemas
    pub content: BTreeMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    /// Schema definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schemas: Option<BTreeMap<String, Schema>>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    /// OpenAPI version
    pub openapi: String,
    pub info: Info,
    pub paths: BTreeMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

impl OpenApiBuilder {
    /// Create a new OpenApiBuilder with default info
    pub fn new() -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            info: Info {
                title: "Generated API".to_string(),
                version: "1.0.0".to_string(),
                description: Some("API documentation generated from Rust declarations".to_string()),
            },
            paths: BTreeMap::new(),
        }
    }

    /// Set custom info for the API
    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.info = Info {
            title,
            version,
            description,
        };
        self
    }

    /// Add an operation, synthesizing the schemas of every type it mentions.
    ///
    /// Type references are resolved against the operation's context module. If any of them
    /// cannot be resolved the operation is not added and the error is returned.
    pub fn add_operation(&mut self, op: &OperationSpec, schema_gen: &mut SchemaGenerator) -> Result<()> {
        debug!("Adding operation: {} {}", op.method.as_str(), op.path);
        let context = schema_gen
            .resolver()
            .registry()
            .find_file(&op.context)
            .ok_or_else(|| Error::Manifest(format!("unknown context `{}` for {}", op.context, op.path)))?;

        let mut parameters = Vec::new();
        for param in &op.parameters {
            parameters.push(Parameter {
                name: param.name.clone(),
                location: param.location,
                required: param.required || param.location == ParameterLocation::Path,
                schema: schema_gen.schema_for_type_ref(&param.type_ref, context)?,
                description: param.description.clone(),
            });
        }

        let request_body = match &op.request_body {
            Some(body) => Some(RequestBody {
                description: body.description.clone(),
                required: body.required,
                content: BTreeMap::from([(
                    body.content_type.clone(),
                    MediaType {
                        schema: schema_gen.schema_for_type_ref(&body.type_ref, context)?,
                    },
                )]),
            }),
            None => None,
        };

        let mut responses = BTreeMap::new();
        for (status, response) in &op.responses {
            let content = match &response.type_ref {
                Some(type_ref) => Some(BTreeMap::from([(
                    response.content_type.clone(),
                    MediaType {
                        schema: schema_gen.schema_for_type_ref(type_ref, context)?,
                    },
                )])),
                None => None,
            };
            responses.insert(
                status.clone(),
                Response {
                    description: response
                        .description
                        .clone()
                        .unwrap_or_else(|| default_description(status)),
                    content,
                },
            );
        }
        if responses.is_empty() {
            // Default response when no payload is declared
            responses.insert(
                "200".to_string(),
                Response {
                    description: "Successful response".to_string(),
                    content: None,
                },
            );
        }

        let operation = Operation {
            tags: op.tags.clone(),
            summary: Some(
                op.summary
                    .clone()
                    .unwrap_or_else(|| format!("{} {}", op.method.as_str(), op.path)),
            ),
            description: op.description.clone(),
            operation_id: op.id.clone(),
            parameters: (!parameters.is_empty()).then_some(parameters),
            request_body,
            responses,
        };

        let path_item = self.paths.entry(convert_path_format(&op.path)).or_default();
        *path_item.slot(op.method) = Some(operation);
        Ok(())
    }

    /// Build the final OpenAPI document, keeping only the definitions the operations reach
    pub fn build(self, schema_gen: SchemaGenerator) -> OpenApiDocument {
        debug!("Building final OpenAPI document");

        let schemas = schema_gen.into_definitions();
        let components = if !schemas.is_empty() {
            Some(Components {
                schemas: Some(schemas),
            })
        } else {
            None
        };

        let mut document = OpenApiDocument {
            openapi: "3.0.0".to_string(),
            info: self.info,
            paths: self.paths,
            components,
        };
        pruner::prune(&mut document);
        document
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_description(status: &str) -> String {
    match status {
        "200" | "201" | "202" | "204" => "Successful response".to_string(),
        "default" => "Default response".to_string(),
        other => format!("Response {}", other),
    }
}

/// Convert path format from :param or {param} to OpenAPI {param} format
fn convert_path_format(path: &str) -> String {
    path.split('/')
        .map(|part| match part.strip_prefix(':') {
            Some(name) => format!("{{{}}}", name),
            None => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}
