//! Serialization of generated documents to YAML or JSON.

use crate::openapi_builder::OpenApiDocument;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes an OpenAPI document to YAML format.
///
/// Maps are ordered, so the same input always yields byte-identical output.
///
/// ```no_run
/// use openapi_from_decls::config::SynthesisConfig;
/// use openapi_from_decls::openapi_builder::OpenApiBuilder;
/// use openapi_from_decls::registry::Registry;
/// use openapi_from_decls::schema_generator::SchemaGenerator;
/// use openapi_from_decls::serializer::serialize_yaml;
/// use openapi_from_decls::type_resolver::TypeResolver;
///
/// let schema_gen = SchemaGenerator::new(TypeResolver::new(Registry::new()), SynthesisConfig::default());
/// let doc = OpenApiBuilder::new().build(schema_gen);
/// println!("{}", serialize_yaml(&doc).unwrap());
/// ```
pub fn serialize_yaml(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize OpenAPI document to YAML")
}

/// Serializes an OpenAPI document to pretty-printed JSON.
pub fn serialize_json(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize OpenAPI document to JSON")
}

/// Writes string content to a file, creating parent directories as needed.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content).with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SynthesisConfig;
    use crate::openapi_builder::{Info, OpenApiBuilder, OpenApiDocument};
    use crate::operations::OperationManifest;
    use crate::parser::SourceFile;
    use crate::registry::Registry;
    use crate::schema_generator::SchemaGenerator;
    use crate::type_resolver::TypeResolver;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    /// Helper function to create a minimal OpenAPI document for testing
    fn create_test_document() -> OpenApiDocument {
        OpenApiDocument {
            openapi: "3.0.0".to_string(),
            info: Info {
                title: "Test API".to_string(),
                version: "1.0.0".to_string(),
                description: Some("A test API".to_string()),
            },
            paths: BTreeMap::new(),
            components: None,
        }
    }

    fn user_document() -> OpenApiDocument {
        let mut registry = Registry::new();
        let source = SourceFile::from_source(
            "src/models.rs",
            "crate::models",
            "pub struct User { pub id: u32, pub name: String }",
        )
        .unwrap();
        registry.index_source(&source);
        let mut schema_gen = SchemaGenerator::new(TypeResolver::new(registry), SynthesisConfig::default());

        let manifest = OperationManifest::parse(
            r#"
operations:
  - path: /users/:id
    method: get
    context: crate::models
    parameters: [{ name: id, in: path, type: u32 }]
    responses: { "200": { type: User } }
"#,
            false,
        )
        .unwrap();
        let mut builder = OpenApiBuilder::new();
        builder.add_operation(&manifest.operations[0], &mut schema_gen).unwrap();
        builder.build(schema_gen)
    }

    #[test]
    fn test_serialize_yaml() {
        let yaml = serialize_yaml(&create_test_document()).unwrap();

        assert!(yaml.contains("openapi: 3.0.0"));
        assert!(yaml.contains("title: Test API"));
        assert!(yaml.contains("description: A test API"));
        assert!(yaml.contains("paths:"));
        assert!(!yaml.contains("components:"));
    }

    #[test]
    fn test_serialize_json_pretty_format() {
        let json = serialize_json(&create_test_document()).unwrap();

        assert!(json.contains('\n'));
        assert!(json.lines().count() > 5, "Pretty printed JSON should have multiple lines");
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["info"]["title"], "Test API");
    }

    #[test]
    fn test_serialize_document_with_definitions() {
        let doc = user_document();

        let parsed: serde_json::Value = serde_json::from_str(&serialize_json(&doc).unwrap()).unwrap();
        let get = &parsed["paths"]["/users/{id}"]["get"];
        assert_eq!(get["parameters"][0]["in"], "path");
        assert_eq!(
            get["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/models.User"
        );
        assert_eq!(
            parsed["components"]["schemas"]["models.User"]["properties"]["id"]["format"],
            "int32"
        );

        let yaml = serialize_yaml(&doc).unwrap();
        assert!(yaml.contains("/users/{id}:"));
        assert!(yaml.contains("models.User:"));
    }

    #[test]
    fn test_output_is_deterministic() {
        assert_eq!(
            serialize_yaml(&user_document()).unwrap(),
            serialize_yaml(&user_document()).unwrap()
        );
    }

    #[test]
    fn test_roundtrip_yaml_serialization() {
        let doc = user_document();
        let deserialized: OpenApiDocument = serde_yaml::from_str(&serialize_yaml(&doc).unwrap()).unwrap();
        assert_eq!(deserialized, doc);
    }

    #[test]
    fn test_write_to_file_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("subdir").join("nested").join("test.yaml");

        write_to_file("initial content", &file_path).unwrap();
        write_to_file("new content", &file_path).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
    }
}
