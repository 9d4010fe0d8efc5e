//! Declaration resolution and schema synthesis for OpenAPI documents.
//!
//! The library indexes the type declarations of a Rust project, resolves textual type
//! references the way the compiler would see them from a given module, and turns the resulting
//! declarations into OpenAPI schema definitions.
//!
//! # Architecture
//!
//! 1. [`scanner`] - Walks a source tree and maps files to module paths
//! 2. [`parser`] - Parses source files into syntax trees
//! 3. [`declaration`] and [`attrs`] - Lower items and their annotations into declarations
//! 4. [`registry`] - Indexes declarations per package and per file
//! 5. [`type_resolver`], [`generics`] and [`loader`] - Resolve references, instantiate generics
//!    and load dependency crates on demand
//! 6. [`field_parser`] and [`schema_generator`] - Build schemas and shared definitions
//! 7. [`operations`], [`openapi_builder`] and [`pruner`] - Assemble the document
//! 8. [`serializer`] - Writes YAML or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_decls::{
//!     config::SynthesisConfig,
//!     openapi_builder::OpenApiBuilder,
//!     operations::OperationManifest,
//!     parser::AstParser,
//!     registry::Registry,
//!     scanner::FileScanner,
//!     schema_generator::SchemaGenerator,
//!     serializer::serialize_yaml,
//!     type_resolver::TypeResolver,
//! };
//! use std::path::{Path, PathBuf};
//!
//! let scan = FileScanner::new(PathBuf::from("./my-project")).scan().unwrap();
//! let mut registry = Registry::new();
//! for source in AstParser::parse_units(&scan.units).into_iter().flatten() {
//!     registry.index_source(&source);
//! }
//!
//! let mut schema_gen = SchemaGenerator::new(TypeResolver::new(registry), SynthesisConfig::default());
//! let manifest = OperationManifest::load(Path::new("operations.yaml")).unwrap();
//! let mut builder = OpenApiBuilder::new();
//! for operation in &manifest.operations {
//!     builder.add_operation(operation, &mut schema_gen).unwrap();
//! }
//! println!("{}", serialize_yaml(&builder.build(schema_gen)).unwrap());
//! ```

pub mod attrs;
pub mod cli;
pub mod config;
pub mod declaration;
pub mod error;
pub mod field_parser;
pub mod generics;
pub mod loader;
pub mod openapi_builder;
pub mod operations;
pub mod parser;
pub mod pruner;
pub mod registry;
pub mod scanner;
pub mod schema;
pub mod schema_generator;
pub mod serializer;
pub mod type_resolver;
