use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scanner::SourceUnit;

/// AST parser for Rust source files.
///
/// The `AstParser` uses the `syn` crate to parse each source file into a syntax tree and tags it
/// with the module path it defines, so the registry can index it as a package.
///
/// # Example
///
/// ```no_run
/// use openapi_from_decls::parser::AstParser;
/// use std::path::Path;
///
/// let parsed = AstParser::parse_file(Path::new("src/models/user.rs"), "crate::models::user").unwrap();
/// println!("Parsed {} items", parsed.syntax_tree.items.len());
/// ```
pub struct AstParser;

/// A successfully parsed Rust file together with the module it defines.
#[derive(Debug)]
pub struct SourceFile {
    /// Path to the source file
    pub path: PathBuf,
    /// Absolute module path, e.g. `crate::models::user`
    pub module_path: String,
    /// The parsed abstract syntax tree
    pub syntax_tree: syn::File,
}

impl SourceFile {
    /// Builds a source file from in-memory code, mostly useful for tests and for loaders that do
    /// not read from disk.
    pub fn from_source(path: impl Into<PathBuf>, module_path: &str, code: &str) -> Result<Self> {
        let path = path.into();
        let syntax_tree = syn::parse_file(code)
            .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;
        Ok(Self {
            path,
            module_path: module_path.to_string(),
            syntax_tree,
        })
    }
}

impl AstParser {
    /// Parses a single Rust source file into an AST.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file contains invalid Rust syntax
    pub fn parse_file(path: &Path, module_path: &str) -> Result<SourceFile> {
        debug!("Parsing file: {} ({})", path.display(), module_path);

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        SourceFile::from_source(path, module_path, &content)
    }

    /// Parses multiple source units, continuing even if some fail.
    ///
    /// Files that fail to parse are logged as warnings, so a project with a few broken files still
    /// produces a partial document.
    pub fn parse_units(units: &[SourceUnit]) -> Vec<Result<SourceFile>> {
        debug!("Parsing {} files", units.len());

        let results: Vec<Result<SourceFile>> = units
            .iter()
            .map(|unit| {
                Self::parse_file(&unit.path, &unit.module_path).inspect_err(|e| {
                    warn!("Failed to parse {}: {}", unit.path.display(), e);
                })
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }
}
