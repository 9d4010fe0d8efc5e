//! On-demand loading of packages that live outside the indexed source tree.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info};

use crate::parser::{AstParser, SourceFile};
use crate::scanner::FileScanner;

/// Source of external crates for the type resolver.
///
/// `load` is called at most once per crate; the resolver memoizes both success and failure.
pub trait PackageLoader {
    /// Parse every source file of `crate_ident`, with module paths rooted at `crate_ident`
    fn load(&mut self, crate_ident: &str) -> Result<Vec<SourceFile>>;
}

/// Loads crates from directories on disk.
///
/// A crate is found either through an explicit `name -> directory` root or by looking for a
/// `name-<version>` (or plain `name`) folder inside one of the search directories, which is the
/// layout of a vendored dependency directory and of cargo's registry source cache.
#[derive(Debug, Default, Clone)]
pub struct DirectoryLoader {
    roots: HashMap<String, PathBuf>,
    search_dirs: Vec<PathBuf>,
}

impl DirectoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, crate_name: &str, dir: impl Into<PathBuf>) -> Self {
        self.roots.insert(crate_ident(crate_name), dir.into());
        self
    }

    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    /// Directory holding the sources of `crate_ident`
    pub fn locate(&self, crate_ident_name: &str) -> Option<PathBuf> {
        if let Some(root) = self.roots.get(crate_ident_name) {
            return Some(root.clone());
        }
        let mut candidates: Vec<PathBuf> = Vec::new();
        for dir in &self.search_dirs {
            let Ok(entries) = fs::read_dir(dir) else {
                debug!("Skipping unreadable search directory {}", dir.display());
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() && dir_matches(&path, crate_ident_name) {
                    candidates.push(path);
                }
            }
        }
        // the lexicographically greatest folder is usually the newest version
        candidates.sort();
        candidates.pop()
    }
}

impl PackageLoader for DirectoryLoader {
    fn load(&mut self, crate_ident_name: &str) -> Result<Vec<SourceFile>> {
        let Some(dir) = self.locate(crate_ident_name) else {
            bail!("no source directory found for crate {}", crate_ident_name);
        };
        info!("Loading external crate {} from {}", crate_ident_name, dir.display());

        let scan = FileScanner::for_crate(dir.clone(), crate_ident_name)
            .scan()
            .with_context(|| format!("Failed to scan {}", dir.display()))?;
        if scan.units.is_empty() {
            bail!("{} contains no Rust sources", dir.display());
        }

        let files: Vec<SourceFile> = AstParser::parse_units(&scan.units)
            .into_iter()
            .filter_map(Result::ok)
            .collect();
        debug!("Parsed {} files of crate {}", files.len(), crate_ident_name);
        Ok(files)
    }
}

/// Crate names are written with `-` in manifests and `_` in paths
pub fn crate_ident(name: &str) -> String {
    name.replace('-', "_")
}

fn dir_matches(path: &Path, crate_ident_name: &str) -> bool {
    let Some(file_name) = path.file_name().map(|n| crate_ident(&n.to_string_lossy())) else {
        return false;
    };
    if file_name == crate_ident_name {
        return true;
    }
    file_name
        .strip_prefix(crate_ident_name)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|version| version.starts_with(|c: char| c.is_ascii_digit()))
}
