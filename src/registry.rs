//! Declaration registry: every type declaration discovered in the source tree and its
//! dependencies, indexed by package and by global full name.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::declaration::{lower_items, package_display_name, DeclId, Declaration, FileId};
use crate::parser::SourceFile;

/// One name brought into scope by a `use` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Name the import is visible under (`*` for globs)
    pub local_name: String,
    /// Path as written, e.g. `["crate", "models", "web"]`
    pub target: Vec<String>,
    /// Bound with `as`
    pub aliased: bool,
    /// `use path::*`
    pub glob: bool,
}

/// An indexed module scope and its immutable import table
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: PathBuf,
    pub package: String,
    pub imports: Vec<Import>,
}

/// All scopes and declarations of one package path
#[derive(Debug, Clone)]
pub struct PackageRecord {
    pub path: String,
    /// Display name, the last segment of the path
    pub name: String,
    pub files: Vec<FileId>,
    pub types: HashMap<String, DeclId>,
}

/// Declarations of one compilation run.
///
/// The registry owns every [`Declaration`]; other components hold [`DeclId`] handles. Full-name
/// collisions across packages make the name ambiguous: it is dropped from the global map for the
/// rest of the run and must be resolved by package-qualified lookup.
#[derive(Debug, Default)]
pub struct Registry {
    decls: Vec<Declaration>,
    files: Vec<FileRecord>,
    packages: BTreeMap<String, PackageRecord>,
    global: HashMap<String, DeclId>,
    ambiguous: HashSet<String>,
    indexed: HashSet<PathBuf>,
    /// Definition names handed out so far; they never change afterwards
    names: HashMap<DeclId, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every declaration of `file` under `package`.
    ///
    /// Idempotent per absolute file path: a file that was already indexed is left alone and
    /// `None` is returned. Inline `mod` blocks become child packages with their own scopes.
    pub fn index(&mut self, package: &str, file: &SourceFile) -> Option<FileId> {
        let key = std::fs::canonicalize(&file.path).unwrap_or_else(|_| file.path.clone());
        if !self.indexed.insert(key) {
            debug!("File {} already indexed", file.path.display());
            return None;
        }
        debug!("Indexing {} as {}", file.path.display(), package);
        Some(self.index_scope(package, &file.path, &file.syntax_tree.items))
    }

    /// Index a parsed file under the module path it was scanned as
    pub fn index_source(&mut self, file: &SourceFile) -> Option<FileId> {
        self.index(&file.module_path, file)
    }

    fn index_scope(&mut self, package: &str, path: &Path, items: &[syn::Item]) -> FileId {
        let file_id = FileId(self.files.len());
        self.files.push(FileRecord {
            path: path.to_path_buf(),
            package: package.to_string(),
            imports: lower_imports(items),
        });
        self.package_entry(package).files.push(file_id);

        for decl in lower_items(items, package, file_id) {
            self.insert(decl);
        }

        for item in items {
            if let syn::Item::Mod(item_mod) = item {
                if let Some((_, content)) = &item_mod.content {
                    let child = format!("{}::{}", package, item_mod.ident);
                    self.index_scope(&child, path, content);
                }
            }
        }
        file_id
    }

    fn package_entry(&mut self, package: &str) -> &mut PackageRecord {
        self.packages
            .entry(package.to_string())
            .or_insert_with(|| PackageRecord {
                path: package.to_string(),
                name: package_display_name(package).to_string(),
                files: Vec::new(),
                types: HashMap::new(),
            })
    }

    /// Register a declaration, applying the collision rules.
    ///
    /// A second declaration with the same name in the same package is ignored and the id of the
    /// first one is returned.
    pub fn insert(&mut self, decl: Declaration) -> DeclId {
        if let Some(existing) = self
            .packages
            .get(&decl.package)
            .and_then(|p| p.types.get(&decl.name))
        {
            debug!("Ignoring duplicate declaration {} in {}", decl.name, decl.package);
            return *existing;
        }

        let id = DeclId(self.decls.len());
        let full_name = decl.full_name();
        let parametrized = decl.is_generic().then(|| decl.parametrized_full_name());
        let package = decl.package.clone();
        self.package_entry(&package).types.insert(decl.name.clone(), id);
        self.decls.push(decl);

        self.register_global(full_name, id);
        if let Some(parametrized) = parametrized {
            self.register_global(parametrized, id);
        }
        id
    }

    fn register_global(&mut self, full_name: String, id: DeclId) {
        if self.ambiguous.contains(&full_name) {
            return;
        }
        match self.global.get(&full_name) {
            Some(&other) if self.decls[other.0].package != self.decls[id.0].package => {
                warn!(
                    "Type name {} is declared in both {} and {}; qualify references to it",
                    full_name, self.decls[other.0].package, self.decls[id.0].package
                );
                self.global.remove(&full_name);
                self.ambiguous.insert(full_name);
            }
            Some(_) => {}
            None => {
                self.global.insert(full_name, id);
            }
        }
    }

    /// Declaration named `name` local to `package`
    pub fn lookup(&self, package: &str, name: &str) -> Option<DeclId> {
        self.packages.get(package)?.types.get(name).copied()
    }

    /// Unambiguous declaration for a full name such as `web.Post`
    pub fn lookup_global(&self, full_name: &str) -> Option<DeclId> {
        self.global.get(full_name).copied()
    }

    pub fn is_ambiguous(&self, full_name: &str) -> bool {
        self.ambiguous.contains(full_name)
    }

    pub fn get(&self, id: DeclId) -> &Declaration {
        &self.decls[id.0]
    }

    pub fn file(&self, id: FileId) -> Option<&FileRecord> {
        self.files.get(id.0)
    }

    pub fn package(&self, path: &str) -> Option<&PackageRecord> {
        self.packages.get(path)
    }

    pub fn packages(&self) -> impl Iterator<Item = &PackageRecord> {
        self.packages.values()
    }

    /// Whether any package of crate `crate_ident` has been indexed
    pub fn has_crate(&self, crate_ident: &str) -> bool {
        let prefix = format!("{}::", crate_ident);
        self.packages
            .keys()
            .any(|p| p == crate_ident || p.starts_with(&prefix))
    }

    /// First scope indexed for `path`, either a file path or a module path
    pub fn find_file(&self, path_or_module: &str) -> Option<FileId> {
        if let Some(package) = self.packages.get(path_or_module) {
            return package.files.first().copied();
        }
        let wanted = Path::new(path_or_module);
        let canonical = std::fs::canonicalize(wanted).ok();
        self.files
            .iter()
            .position(|f| {
                f.path == wanted
                    || f.path.ends_with(wanted)
                    || canonical
                        .as_ref()
                        .is_some_and(|c| std::fs::canonicalize(&f.path).ok().as_ref() == Some(c))
            })
            .map(FileId)
    }

    /// Key of the declaration in the document's definitions table.
    ///
    /// The full name when it is unambiguous, otherwise the name qualified by the whole package
    /// path. The name is fixed the first time it is asked for, so declarations indexed later
    /// (an external load adding a colliding full name) do not rename it.
    pub fn definition_name(&mut self, id: DeclId) -> String {
        if let Some(name) = self.names.get(&id) {
            return name.clone();
        }
        let decl = self.get(id);
        let full_name = decl.full_name();
        let name = if self.lookup_global(&full_name) == Some(id) {
            full_name
        } else {
            decl.full_path_name()
        };
        self.names.insert(id, name.clone());
        name
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

/// Lower the `use` declarations of one scope into its import table
pub fn lower_imports(items: &[syn::Item]) -> Vec<Import> {
    let mut imports = Vec::new();
    for item in items {
        if let syn::Item::Use(item_use) = item {
            collect_use_tree(&item_use.tree, &mut Vec::new(), &mut imports);
        }
    }
    imports
}

fn collect_use_tree(tree: &syn::UseTree, prefix: &mut Vec<String>, imports: &mut Vec<Import>) {
    match tree {
        syn::UseTree::Path(path) => {
            prefix.push(path.ident.to_string());
            collect_use_tree(&path.tree, prefix, imports);
            prefix.pop();
        }
        syn::UseTree::Name(name) => {
            let ident = name.ident.to_string();
            if ident == "self" {
                if let Some(last) = prefix.last() {
                    imports.push(Import {
                        local_name: last.clone(),
                        target: prefix.clone(),
                        aliased: false,
                        glob: false,
                    });
                }
            } else {
                let mut target = prefix.clone();
                target.push(ident.clone());
                imports.push(Import {
                    local_name: ident,
                    target,
                    aliased: false,
                    glob: false,
                });
            }
        }
        syn::UseTree::Rename(rename) => {
            let mut target = prefix.clone();
            if rename.ident != "self" {
                target.push(rename.ident.to_string());
            }
            imports.push(Import {
                local_name: rename.rename.to_string(),
                target,
                aliased: true,
                glob: false,
            });
        }
        syn::UseTree::Glob(_) => imports.push(Import {
            local_name: "*".to_string(),
            target: prefix.clone(),
            aliased: false,
            glob: true,
        }),
        syn::UseTree::Group(group) => {
            for item in &group.items {
                collect_use_tree(item, prefix, imports);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(path: &str, module: &str, code: &str) -> SourceFile {
        SourceFile::from_source(path, module, code).unwrap()
    }

    #[test]
    fn test_index_and_lookup() {
        let mut registry = Registry::new();
        let file = source("src/models.rs", "crate::models", "pub struct User { pub id: u32 }");
        let file_id = registry.index_source(&file).unwrap();

        let id = registry.lookup("crate::models", "User").unwrap();
        assert_eq!(registry.get(id).file, file_id);
        assert_eq!(registry.lookup_global("models.User"), Some(id));
        assert_eq!(registry.lookup("crate::models", "Missing"), None);
        assert_eq!(registry.lookup("crate::other", "User"), None);
        assert_eq!(registry.definition_name(id), "models.User");
    }

    #[test]
    fn test_index_is_idempotent_per_path() {
        let mut registry = Registry::new();
        let file = source("src/models.rs", "crate::models", "pub struct User;");
        assert!(registry.index_source(&file).is_some());
        assert!(registry.index_source(&file).is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.package("crate::models").unwrap().files.len(), 1);
    }

    #[test]
    fn test_collision_across_packages_is_ambiguous() {
        let mut registry = Registry::new();
        registry.index_source(&source("a/pkg_x.rs", "crate::a::pkgx", "pub struct Widget { pub x: i32 }"));
        registry.index_source(&source("b/pkg_x.rs", "crate::b::pkgx", "pub struct Widget { pub y: i32 }"));
        // a third declaration must not revive the removed entry
        registry.index_source(&source("c/pkg_x.rs", "crate::c::pkgx", "pub struct Widget;"));

        assert_eq!(registry.lookup_global("pkgx.Widget"), None);
        assert!(registry.is_ambiguous("pkgx.Widget"));

        let a = registry.lookup("crate::a::pkgx", "Widget").unwrap();
        let b = registry.lookup("crate::b::pkgx", "Widget").unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.definition_name(a), "crate_a_pkgx.Widget");
        assert_eq!(registry.definition_name(b), "crate_b_pkgx.Widget");
    }

    #[test]
    fn test_definition_name_survives_later_collision() {
        let mut registry = Registry::new();
        registry.index_source(&source("src/web.rs", "crate::web", "pub struct Post;"));
        let post = registry.lookup("crate::web", "Post").unwrap();
        assert_eq!(registry.definition_name(post), "web.Post");

        registry.index_source(&source("ext/src/web.rs", "ext::web", "pub struct Post;"));
        let other = registry.lookup("ext::web", "Post").unwrap();
        assert!(registry.is_ambiguous("web.Post"));
        assert_eq!(registry.definition_name(post), "web.Post");
        assert_eq!(registry.definition_name(other), "ext_web.Post");
    }

    #[test]
    fn test_same_package_first_registration_wins() {
        let mut registry = Registry::new();
        registry.index_source(&source(
            "src/models.rs",
            "crate::models",
            "pub struct Widget { pub first: i32 } mod inner {}",
        ));
        let first = registry.lookup("crate::models", "Widget").unwrap();

        let mut dup = registry.get(first).clone();
        dup.doc = Some("second".to_string());
        let returned = registry.insert(dup);

        assert_eq!(returned, first);
        assert_eq!(registry.lookup_global("models.Widget"), Some(first));
        assert!(registry.get(first).doc.is_none());
    }

    #[test]
    fn test_inline_modules_are_child_packages() {
        let mut registry = Registry::new();
        let file = source(
            "src/lib.rs",
            "crate",
            r#"
            use std::collections::HashMap;
            pub mod api {
                use super::shared::Meta;
                pub struct Reply { pub meta: Meta }
            }
            pub mod shared { pub struct Meta; }
            "#,
        );
        registry.index_source(&file);

        let reply = registry.lookup("crate::api", "Reply").unwrap();
        let scope = registry.file(registry.get(reply).file).unwrap();
        assert_eq!(scope.package, "crate::api");
        assert_eq!(scope.imports[0].target, vec!["super", "shared", "Meta"]);
        assert!(registry.lookup("crate::shared", "Meta").is_some());
        assert!(registry.has_crate("crate"));
        assert!(!registry.has_crate("chrono"));
    }

    #[test]
    fn test_generic_registered_under_parametrized_name() {
        let mut registry = Registry::new();
        registry.index_source(&source("src/web.rs", "crate::web", "pub struct Page<T> { pub items: Vec<T> }"));
        let id = registry.lookup("crate::web", "Page").unwrap();
        assert_eq!(registry.lookup_global("web.Page<T>"), Some(id));
        assert_eq!(registry.lookup_global("web.Page"), Some(id));
    }

    #[test]
    fn test_lower_imports() {
        let file = syn::parse_file(
            r#"
            use crate::models::web;
            use crate::models::web as api;
            use crate::shared::*;
            use chrono::{DateTime, Utc as Zone, self};
            "#,
        )
        .unwrap();
        let imports = lower_imports(&file.items);

        assert_eq!(imports.len(), 6);
        assert_eq!(imports[0].local_name, "web");
        assert!(!imports[0].aliased);
        assert_eq!(imports[1].local_name, "api");
        assert!(imports[1].aliased);
        assert_eq!(imports[1].target, vec!["crate", "models", "web"]);
        assert!(imports[2].glob);
        assert_eq!(imports[2].target, vec!["crate", "shared"]);
        assert_eq!(imports[3].target, vec!["chrono", "DateTime"]);
        assert_eq!(imports[4].local_name, "Zone");
        assert_eq!(imports[5].local_name, "chrono");
        assert_eq!(imports[5].target, vec!["chrono"]);
    }

    #[test]
    fn test_find_file_by_module_or_path() {
        let mut registry = Registry::new();
        registry.index_source(&source("src/models/user.rs", "crate::models::user", "pub struct User;"));
        assert_eq!(registry.find_file("crate::models::user"), Some(FileId(0)));
        assert_eq!(registry.find_file("src/models/user.rs"), Some(FileId(0)));
        assert_eq!(registry.find_file("models/user.rs"), Some(FileId(0)));
        assert_eq!(registry.find_file("crate::nope"), None);
    }
}
