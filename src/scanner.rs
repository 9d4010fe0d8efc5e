use anyhow::Result;
use log::warn;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File scanner for traversing a crate's source directory.
///
/// The `FileScanner` recursively walks a source root, collects every `.rs` file and derives the
/// module path each file defines. It skips `target` and hidden directories.
///
/// # Example
///
/// ```no_run
/// use openapi_from_decls::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-project"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} Rust files", result.units.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
    crate_ident: String,
}

/// One source file and the module it defines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: PathBuf,
    /// Absolute module path, e.g. `crate::models::user`
    pub module_path: String,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// Discovered `.rs` files, sorted by path
    pub units: Vec<SourceUnit>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl FileScanner {
    /// Creates a scanner for the project at `root_path`, whose modules are rooted at `crate`.
    ///
    /// If the directory contains a `src/` folder, that folder is the source root.
    pub fn new(root_path: PathBuf) -> Self {
        Self::for_crate(root_path, "crate")
    }

    /// Creates a scanner whose module paths start with `crate_ident`, used for dependencies.
    pub fn for_crate(root_path: PathBuf, crate_ident: &str) -> Self {
        Self {
            root_path,
            crate_ident: crate_ident.to_string(),
        }
    }

    /// Directory that module paths are computed against
    pub fn source_root(&self) -> PathBuf {
        let src = self.root_path.join("src");
        if src.is_dir() {
            src
        } else {
            self.root_path.clone()
        }
    }

    /// Scans the directory tree and collects all `.rs` files.
    ///
    /// Inaccessible entries are logged and recorded as warnings; scanning continues.
    pub fn scan(&self) -> Result<ScanResult> {
        let root = self.source_root();
        let mut units = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&root).into_iter().filter_entry(|e| {
            if e.path() == root {
                return true;
            }
            let file_name = e.file_name().to_string_lossy();
            !file_name.starts_with('.') && file_name != "target"
        }) {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("rs") {
                        units.push(SourceUnit {
                            path: path.to_path_buf(),
                            module_path: module_path_for(&root, path, &self.crate_ident),
                        });
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        units.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(ScanResult { units, warnings })
    }
}

/// Module path defined by `file` when `root` is the crate's source root.
///
/// `lib.rs`, `main.rs` and a top-level `mod.rs` define the crate root itself; `a/mod.rs` defines
/// `a`; `a/b.rs` defines `a::b`.
pub fn module_path_for(root: &Path, file: &Path, crate_ident: &str) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let mut segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if let Some(last) = segments.pop() {
        let stem = last.strip_suffix(".rs").unwrap_or(&last).to_string();
        let is_root_file = segments.is_empty() && (stem == "lib" || stem == "main");
        if stem != "mod" && !is_root_file {
            segments.push(stem);
        }
    }

    let mut path = crate_ident.to_string();
    for segment in segments {
        path.push_str("::");
        path.push_str(&segment.replace('-', "_"));
    }
    path
}
