use std::collections::HashMap;

use log::{debug, info, warn};

use crate::declaration::{lower_type, package_display_name, DeclId, FileId, PrimitiveType, TypeExpr};
use crate::error::{Error, Result};
use crate::generics;
use crate::loader::PackageLoader;
use crate::registry::{FileRecord, Registry};

/// Re-export chains (`pub use`) are followed at most this deep
const MAX_REEXPORT_DEPTH: usize = 8;

/// Library types documented as scalars without loading their crates
const WELL_KNOWN: &[(&str, &str, Resolution)] = &[
    ("chrono", "DateTime", Resolution::Primitive(PrimitiveType::DateTime)),
    ("chrono", "NaiveDateTime", Resolution::Primitive(PrimitiveType::DateTime)),
    ("chrono", "NaiveDate", Resolution::Primitive(PrimitiveType::Date)),
    ("time", "OffsetDateTime", Resolution::Primitive(PrimitiveType::DateTime)),
    ("time", "Date", Resolution::Primitive(PrimitiveType::Date)),
    ("uuid", "Uuid", Resolution::Primitive(PrimitiveType::Uuid)),
    ("url", "Url", Resolution::Primitive(PrimitiveType::Url)),
    ("rust_decimal", "Decimal", Resolution::Primitive(PrimitiveType::Decimal)),
    ("serde_json", "Value", Resolution::Any),
];

/// What a type reference denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A built-in or well-known scalar; no declaration is involved
    Primitive(PrimitiveType),
    /// An untyped value
    Any,
    Declaration(DeclId),
}

/// Type resolver - maps type references, relative to the file that mentions them, onto
/// registry declarations.
///
/// Qualified references are resolved through the referencing scope's import table, because two
/// files may import the same module under different local names. Packages that are not indexed
/// yet can be pulled in through a [`PackageLoader`], at most once per crate.
pub struct TypeResolver {
    registry: Registry,
    loader: Option<Box<dyn PackageLoader>>,
    /// Outcome of every external load attempted so far
    external_loads: HashMap<String, std::result::Result<(), String>>,
}

impl TypeResolver {
    /// Create a new TypeResolver over a populated registry
    pub fn new(registry: Registry) -> Self {
        debug!("Initializing TypeResolver with {} declarations", registry.len());
        Self {
            registry,
            loader: None,
            external_loads: HashMap::new(),
        }
    }

    pub fn with_loader(mut self, loader: Box<dyn PackageLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Resolve a textual type reference such as `web::Post`, `web.Post` or `Page<models::User>`
    pub fn resolve(&mut self, type_ref: &str, context: FileId, allow_external: bool) -> Result<Resolution> {
        let expr = parse_type_ref(type_ref)?;
        self.resolve_expr(&expr, context, allow_external)
    }

    /// Resolve a named type expression; generic references are instantiated.
    ///
    /// `Option` and pointer wrappers are looked through. Arrays and maps name no declaration and
    /// fail as unresolvable.
    pub fn resolve_expr(&mut self, expr: &TypeExpr, context: FileId, allow_external: bool) -> Result<Resolution> {
        match expr.peel() {
            TypeExpr::Primitive(p) => Ok(Resolution::Primitive(*p)),
            TypeExpr::Interface => Ok(Resolution::Any),
            TypeExpr::Resolved(id) => Ok(Resolution::Declaration(*id)),
            TypeExpr::Named { segments, args } => {
                let resolution = self.resolve_path(segments, context, allow_external)?;
                let Resolution::Declaration(id) = resolution else {
                    return Ok(resolution);
                };
                if args.is_empty() || !self.registry.get(id).is_generic() {
                    return Ok(resolution);
                }
                let bound = args
                    .iter()
                    .map(|arg| self.bind_argument(arg, context, allow_external))
                    .collect::<Result<Vec<_>>>()?;
                generics::instantiate(&mut self.registry, id, &bound).map(Resolution::Declaration)
            }
            other => Err(Error::unresolvable(other.to_string())),
        }
    }

    /// Replace every named type inside a generic argument by what it resolves to. Array and map
    /// structure is kept; `Option` and pointers are dropped.
    pub fn bind_argument(&mut self, expr: &TypeExpr, context: FileId, allow_external: bool) -> Result<TypeExpr> {
        Ok(match expr {
            TypeExpr::Named { .. } => match self.resolve_expr(expr, context, allow_external)? {
                Resolution::Primitive(p) => TypeExpr::Primitive(p),
                Resolution::Any => TypeExpr::Interface,
                Resolution::Declaration(id) => TypeExpr::Resolved(id),
            },
            TypeExpr::Array(inner) => TypeExpr::Array(Box::new(self.bind_argument(inner, context, allow_external)?)),
            TypeExpr::Pointer(inner) | TypeExpr::Optional(inner) => self.bind_argument(inner, context, allow_external)?,
            TypeExpr::Map { key, value } => TypeExpr::Map {
                key: Box::new(self.bind_argument(key, context, allow_external)?),
                value: Box::new(self.bind_argument(value, context, allow_external)?),
            },
            other => other.clone(),
        })
    }

    fn resolve_path(&mut self, segments: &[String], context: FileId, allow_external: bool) -> Result<Resolution> {
        let type_ref = segments.join("::");
        if segments.len() == 1 {
            if let Some(primitive) = PrimitiveType::parse(&segments[0]) {
                return Ok(Resolution::Primitive(primitive));
            }
        }

        let mut tried = Vec::new();
        if let Some(found) = self.lookup_path(segments, context, &mut tried) {
            return Ok(found);
        }
        if !allow_external {
            debug!("Could not resolve type: {}", type_ref);
            return Err(Error::unresolvable(type_ref));
        }

        if let [qualifier @ .., name] = segments {
            if !qualifier.is_empty() {
                if let Some(found) = self.suffix_match(qualifier, name) {
                    debug!("Resolved {} by package suffix", type_ref);
                    return Ok(found);
                }
            }
        }

        let mut load_failure = None;
        for crate_ident in self.unloaded_crates(&tried) {
            match self.load_external(&crate_ident) {
                Ok(true) => {
                    let mut retried = Vec::new();
                    if let Some(found) = self.lookup_path(segments, context, &mut retried) {
                        return Ok(found);
                    }
                }
                Ok(false) => {}
                Err(message) => {
                    load_failure = Some(Error::ExternalLoad {
                        package: crate_ident,
                        message,
                    })
                }
            }
        }

        warn!("Could not resolve type: {}", type_ref);
        Err(load_failure.unwrap_or_else(|| Error::unresolvable(type_ref)))
    }

    fn lookup_path(&self, segments: &[String], context: FileId, tried: &mut Vec<Vec<String>>) -> Option<Resolution> {
        let scope = self.registry.file(context)?;
        match segments {
            [] => None,
            [name] => self.resolve_unqualified(name, scope, tried),
            [qualifier @ .., name] => self.resolve_qualified(qualifier, name, scope, tried),
        }
    }

    fn resolve_unqualified(&self, name: &str, scope: &FileRecord, tried: &mut Vec<Vec<String>>) -> Option<Resolution> {
        // the global entry built from the scope's own package must denote that package
        let full_name = format!("{}.{}", package_display_name(&scope.package), name);
        if let Some(id) = self.registry.lookup_global(&full_name) {
            if self.registry.get(id).package == scope.package {
                return Some(Resolution::Declaration(id));
            }
        }
        if let Some(id) = self.registry.lookup(&scope.package, name) {
            return Some(Resolution::Declaration(id));
        }
        self.resolve_via_imports(name, scope, 0, tried)
    }

    /// Item imports bound to `name` first, then glob imports in declaration order
    fn resolve_via_imports(
        &self,
        name: &str,
        scope: &FileRecord,
        depth: usize,
        tried: &mut Vec<Vec<String>>,
    ) -> Option<Resolution> {
        if depth > MAX_REEXPORT_DEPTH {
            return None;
        }
        for import in scope.imports.iter().filter(|i| !i.glob && i.local_name == name) {
            if let Some(found) = self.try_candidates(&import.target, &scope.package, depth, tried) {
                return Some(found);
            }
        }
        for import in scope.imports.iter().filter(|i| i.glob) {
            let mut target = import.target.clone();
            target.push(name.to_string());
            if let Some(found) = self.try_candidates(&target, &scope.package, depth, tried) {
                return Some(found);
            }
        }
        None
    }

    fn resolve_qualified(
        &self,
        qualifier: &[String],
        name: &str,
        scope: &FileRecord,
        tried: &mut Vec<Vec<String>>,
    ) -> Option<Resolution> {
        let head = qualifier[0].as_str();
        let mut written: Vec<String> = qualifier.to_vec();
        written.push(name.to_string());

        if matches!(head, "crate" | "self" | "super") {
            return self.try_candidates(&written, &scope.package, 0, tried);
        }

        // an explicit alias wins over a display-name match; ties go to the first import
        let aliased = scope.imports.iter().filter(|i| i.aliased && i.local_name == head);
        let by_name = scope
            .imports
            .iter()
            .filter(|i| !i.aliased && !i.glob && i.local_name == head);
        for import in aliased.chain(by_name) {
            let mut target = import.target.clone();
            target.extend_from_slice(&written[1..]);
            if let Some(found) = self.try_candidates(&target, &scope.package, 0, tried) {
                return Some(found);
            }
        }

        for import in scope.imports.iter().filter(|i| i.glob) {
            let mut target = import.target.clone();
            target.extend_from_slice(&written);
            if let Some(found) = self.try_candidates(&target, &scope.package, 0, tried) {
                return Some(found);
            }
        }

        // a child module of the current one, or an extern crate path
        self.try_candidates(&written, &scope.package, 0, tried)
    }

    fn try_candidates(
        &self,
        written: &[String],
        package: &str,
        depth: usize,
        tried: &mut Vec<Vec<String>>,
    ) -> Option<Resolution> {
        for candidate in absolute_candidates(written, package) {
            tried.push(candidate.clone());
            if let Some(found) = self.resolve_absolute(&candidate, depth, tried) {
                return Some(found);
            }
        }
        None
    }

    /// Resolve `crate_ident::module::...::Name`, following re-exports of the final module
    fn resolve_absolute(&self, path: &[String], depth: usize, tried: &mut Vec<Vec<String>>) -> Option<Resolution> {
        let [package_segments @ .., name] = path else {
            return None;
        };
        if package_segments.is_empty() {
            return None;
        }
        if let Some(found) = well_known(package_segments, name) {
            return Some(found);
        }

        let package = self.registry.package(&package_segments.join("::"))?;
        if let Some(id) = package.types.get(name.as_str()) {
            return Some(Resolution::Declaration(*id));
        }
        package
            .files
            .iter()
            .filter_map(|id| self.registry.file(*id))
            .find_map(|scope| self.resolve_via_imports(name, scope, depth + 1, tried))
    }

    /// Best-effort match of `qualifier` against the tail of every known package path
    fn suffix_match(&self, qualifier: &[String], name: &str) -> Option<Resolution> {
        self.registry.packages().find_map(|package| {
            let segments: Vec<&str> = package.path.split("::").collect();
            let matches = segments.len() >= qualifier.len()
                && segments[segments.len() - qualifier.len()..]
                    .iter()
                    .zip(qualifier)
                    .all(|(a, b)| *a == b.as_str());
            if !matches {
                return None;
            }
            package.types.get(name).map(|id| Resolution::Declaration(*id))
        })
    }

    /// External crates named by the candidate paths of a failed lookup, in first-tried order
    fn unloaded_crates(&self, tried: &[Vec<String>]) -> Vec<String> {
        let mut crates: Vec<String> = Vec::new();
        for candidate in tried {
            let Some(head) = candidate.first() else {
                continue;
            };
            if head == "crate" || self.registry.has_crate(head) || crates.contains(head) {
                continue;
            }
            crates.push(head.clone());
        }
        crates
    }

    /// Load `crate_ident` once. Returns whether new declarations were indexed; repeated calls
    /// replay the memoized outcome without touching the loader.
    fn load_external(&mut self, crate_ident: &str) -> std::result::Result<bool, String> {
        if let Some(outcome) = self.external_loads.get(crate_ident) {
            return outcome.clone().map(|_| false);
        }

        let outcome = match self.loader.as_mut() {
            None => Err("external package loading is not configured".to_string()),
            Some(loader) => loader.load(crate_ident).map_err(|e| format!("{:#}", e)),
        };

        match outcome {
            Ok(files) => {
                let indexed = files
                    .iter()
                    .filter_map(|file| self.registry.index_source(file))
                    .count();
                info!("Indexed {} files of external crate {}", indexed, crate_ident);
                self.external_loads.insert(crate_ident.to_string(), Ok(()));
                Ok(true)
            }
            Err(message) => {
                warn!("Failed to load external crate {}: {}", crate_ident, message);
                self.external_loads
                    .insert(crate_ident.to_string(), Err(message.clone()));
                Err(message)
            }
        }
    }
}

/// Parse a textual type reference; the dotted form `web.Post` is accepted for `web::Post`
pub fn parse_type_ref(type_ref: &str) -> Result<TypeExpr> {
    let normalized = if type_ref.contains("::") {
        type_ref.trim().to_string()
    } else {
        type_ref.trim().replace('.', "::")
    };
    let ty: syn::Type = syn::parse_str(&normalized).map_err(|e| Error::InvalidTypeRef {
        type_ref: type_ref.to_string(),
        message: e.to_string(),
    })?;
    Ok(lower_type(&ty, &[]))
}

/// Absolute paths a path written inside `package` may denote, most specific first
pub fn absolute_candidates(written: &[String], package: &str) -> Vec<Vec<String>> {
    let package_segments: Vec<String> = package.split("::").map(str::to_string).collect();
    let Some(head) = written.first() else {
        return Vec::new();
    };

    match head.as_str() {
        "crate" => {
            let mut path = vec![package_segments[0].clone()];
            path.extend_from_slice(&written[1..]);
            vec![path]
        }
        "self" | "super" => {
            let mut path = package_segments;
            let mut rest = written;
            if rest.first().map(String::as_str) == Some("self") {
                rest = &rest[1..];
            }
            while rest.first().map(String::as_str) == Some("super") {
                if path.len() > 1 {
                    path.pop();
                }
                rest = &rest[1..];
            }
            path.extend_from_slice(rest);
            vec![path]
        }
        _ => {
            let mut relative = package_segments;
            relative.extend_from_slice(written);
            vec![relative, written.to_vec()]
        }
    }
}

fn well_known(package_segments: &[String], name: &str) -> Option<Resolution> {
    let crate_ident = package_segments.first()?;
    WELL_KNOWN
        .iter()
        .find(|(krate, type_name, _)| crate_ident == krate && *type_name == name)
        .map(|(_, _, resolution)| *resolution)
}
