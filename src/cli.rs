use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::PathBuf;

use crate::config::{NamingStrategy, SynthesisConfig};

/// Generate OpenAPI schemas for the parameter and payload types of a Rust project's operations
#[derive(Parser, Debug)]
#[command(name = "openapi-from-decls")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Rust project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Operation manifest (YAML, or JSON when the file ends in .json)
    #[arg(short = 'm', long = "operations", value_name = "FILE")]
    pub operations: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Property naming strategy for fields without an explicit rename
    #[arg(long = "naming", value_enum, default_value = "verbatim")]
    pub naming: NamingStrategy,

    /// Mark every non-Option field as required
    #[arg(long = "required-by-default")]
    pub required_by_default: bool,

    /// Composite nesting depth above which aliases become named definitions
    #[arg(long = "max-inline-depth", default_value_t = 2)]
    pub max_inline_depth: usize,

    /// Resolve types from dependency crates on demand
    #[arg(long = "parse-dependencies")]
    pub parse_dependencies: bool,

    /// Source directory of a dependency crate, as NAME=PATH
    #[arg(long = "dependency", value_name = "NAME=PATH", value_parser = parse_dependency)]
    pub dependencies: Vec<(String, PathBuf)>,

    /// Directory holding unpacked crates, searched for `name-<version>` folders
    #[arg(long = "dependency-search-dir", value_name = "DIR")]
    pub dependency_search_dirs: Vec<PathBuf>,

    /// API title
    #[arg(long = "title", default_value = "Generated API")]
    pub title: String,

    /// API version
    #[arg(long = "api-version", default_value = "1.0.0")]
    pub api_version: String,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

fn parse_dependency(raw: &str) -> std::result::Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got `{}`", raw)),
    }
}

impl CliArgs {
    pub fn synthesis_config(&self) -> SynthesisConfig {
        SynthesisConfig {
            naming: self.naming,
            required_by_default: self.required_by_default,
            max_inline_depth: self.max_inline_depth,
            parse_dependencies: self.parse_dependencies,
            ..SynthesisConfig::default()
        }
    }
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        bail!("Project path does not exist: {}", args.project_path.display());
    }
    if !args.project_path.is_dir() {
        bail!("Project path is not a directory: {}", args.project_path.display());
    }
    if !args.operations.is_file() {
        bail!("Operation manifest not found: {}", args.operations.display());
    }

    info!("Project path: {}", args.project_path.display());
    info!("Operations: {}", args.operations.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    use crate::loader::DirectoryLoader;
    use crate::openapi_builder::OpenApiBuilder;
    use crate::operations::OperationManifest;
    use crate::parser::AstParser;
    use crate::registry::Registry;
    use crate::scanner::FileScanner;
    use crate::schema_generator::SchemaGenerator;
    use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
    use crate::type_resolver::TypeResolver;

    info!("Starting OpenAPI document generation...");

    // Step 1: Scan directory for Rust files
    info!("Scanning project directory...");
    let scanner = FileScanner::new(args.project_path.clone());
    let scan_result = scanner.scan()?;
    info!("Found {} Rust files", scan_result.units.len());

    if scan_result.units.is_empty() {
        bail!("No Rust files found in the project directory");
    }

    // Step 2: Parse files and index their declarations
    info!("Parsing Rust files...");
    let mut registry = Registry::new();
    let mut parsed = 0;
    for result in AstParser::parse_units(&scan_result.units) {
        match result {
            Ok(source) => {
                registry.index_source(&source);
                parsed += 1;
            }
            Err(e) => debug!("Skipping file due to parse error: {}", e),
        }
    }
    info!("Indexed {} declarations from {} files", registry.len(), parsed);

    if parsed == 0 {
        bail!("No files could be parsed successfully");
    }

    // Step 3: Set up resolution and synthesis
    let mut resolver = TypeResolver::new(registry);
    if args.parse_dependencies {
        let mut loader = DirectoryLoader::new();
        for (name, path) in &args.dependencies {
            loader = loader.with_root(name, path);
        }
        for dir in &args.dependency_search_dirs {
            loader = loader.with_search_dir(dir);
        }
        resolver = resolver.with_loader(Box::new(loader));
    }
    let mut schema_gen = SchemaGenerator::new(resolver, args.synthesis_config());

    // Step 4: Build the document from the operation manifest
    let manifest = OperationManifest::load(&args.operations)?;
    info!("Loaded {} operations", manifest.operations.len());

    let mut builder = OpenApiBuilder::new().with_info(args.title.clone(), args.api_version.clone(), None);
    let mut added = 0;
    for operation in &manifest.operations {
        match builder.add_operation(operation, &mut schema_gen) {
            Ok(()) => added += 1,
            Err(e) => warn!(
                "Skipping {} {}: {}",
                operation.method.as_str(),
                operation.path,
                e
            ),
        }
    }
    let document = builder.build(schema_gen);

    // Step 5: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&document)?,
        OutputFormat::Json => serialize_json(&document)?,
    };

    if let Some(output_path) = &args.output_path {
        write_to_file(&content, output_path)?;
        info!("Successfully wrote OpenAPI document to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    info!("Generation complete!");
    info!("  - Files parsed: {}", parsed);
    info!("  - Operations documented: {}/{}", added, manifest.operations.len());
    info!(
        "  - Definitions: {}",
        document
            .components
            .as_ref()
            .and_then(|c| c.schemas.as_ref())
            .map_or(0, |s| s.len())
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::try_parse_from([
            "openapi-from-decls",
            "./proj",
            "-m",
            "ops.yaml",
            "--naming",
            "camel",
            "--max-inline-depth",
            "3",
            "--parse-dependencies",
            "--dependency",
            "shared-types=../shared",
        ])
        .unwrap();

        let config = args.synthesis_config();
        assert_eq!(config.naming, NamingStrategy::Camel);
        assert_eq!(config.max_inline_depth, 3);
        assert!(config.parse_dependencies);
        assert!(!config.required_by_default);
        assert_eq!(
            args.dependencies,
            vec![("shared-types".to_string(), PathBuf::from("../shared"))]
        );
    }

    #[test]
    fn test_invalid_dependency_flag() {
        let result = CliArgs::try_parse_from(["openapi-from-decls", ".", "-m", "o.yaml", "--dependency", "nopath"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_manifest_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let args = CliArgs::try_parse_from([
            "openapi-from-decls",
            temp_dir.path().to_str().unwrap(),
            "-m",
            "/nonexistent/ops.yaml",
        ])
        .unwrap();
        assert!(parse_args_from_parsed(args).is_err());
    }

    #[test]
    fn test_run_writes_document() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/lib.rs"), "pub mod models;").unwrap();
        fs::write(root.join("src/models.rs"), "pub struct Pet { pub name: String }").unwrap();
        fs::write(
            root.join("ops.yaml"),
            r#"
operations:
  - { path: /pets, method: get, context: crate::models, responses: { "200": { type: "Vec<Pet>" } } }
  - { path: /broken, method: get, context: crate::models, responses: { "200": { type: Missing } } }
"#,
        )
        .unwrap();
        let output = root.join("out/openapi.json");

        let args = CliArgs::try_parse_from([
            "openapi-from-decls",
            root.to_str().unwrap(),
            "-m",
            root.join("ops.yaml").to_str().unwrap(),
            "-f",
            "json",
            "-o",
            output.to_str().unwrap(),
        ])
        .unwrap();
        run(args).unwrap();

        let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert!(doc["paths"]["/pets"]["get"].is_object());
        assert!(doc["paths"]["/broken"].is_null());
        assert_eq!(doc["components"]["schemas"]["models.Pet"]["type"], "object");
    }
}
