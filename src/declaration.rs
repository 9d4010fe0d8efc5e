//! Declarations and type expressions lowered out of `syn` syntax trees.
//!
//! A [`Declaration`] is one type definition found in source. Its shape is the
//! closed [`DeclKind`] enum and every type mentioned inside it is a
//! [`TypeExpr`], so the later phases switch exhaustively over tags instead of
//! inspecting syntax again.

use std::fmt;

use log::warn;

use crate::attrs::{self, ContainerAttrs, FieldTags};

/// Opaque handle of an indexed module scope (a physical file or an inline
/// module inside it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

/// Handle of a declaration owned by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub usize);

/// Built-in scalar types, plus the well-known library types that are
/// documented as scalars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    Char,
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
    Bool,
    DateTime,
    Date,
    Uuid,
    Url,
    Decimal,
}

impl PrimitiveType {
    /// Parse a built-in primitive type name
    pub fn parse(type_name: &str) -> Option<Self> {
        match type_name {
            "String" | "str" => Some(PrimitiveType::String),
            "char" => Some(PrimitiveType::Char),
            "i8" => Some(PrimitiveType::I8),
            "i16" => Some(PrimitiveType::I16),
            "i32" => Some(PrimitiveType::I32),
            "i64" => Some(PrimitiveType::I64),
            "i128" => Some(PrimitiveType::I128),
            "isize" => Some(PrimitiveType::Isize),
            "u8" => Some(PrimitiveType::U8),
            "u16" => Some(PrimitiveType::U16),
            "u32" => Some(PrimitiveType::U32),
            "u64" => Some(PrimitiveType::U64),
            "u128" => Some(PrimitiveType::U128),
            "usize" => Some(PrimitiveType::Usize),
            "f32" => Some(PrimitiveType::F32),
            "f64" => Some(PrimitiveType::F64),
            "bool" => Some(PrimitiveType::Bool),
            _ => None,
        }
    }

    /// Name used when the primitive appears inside a synthesized generic name
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::String => "String",
            PrimitiveType::Char => "char",
            PrimitiveType::I8 => "i8",
            PrimitiveType::I16 => "i16",
            PrimitiveType::I32 => "i32",
            PrimitiveType::I64 => "i64",
            PrimitiveType::I128 => "i128",
            PrimitiveType::Isize => "isize",
            PrimitiveType::U8 => "u8",
            PrimitiveType::U16 => "u16",
            PrimitiveType::U32 => "u32",
            PrimitiveType::U64 => "u64",
            PrimitiveType::U128 => "u128",
            PrimitiveType::Usize => "usize",
            PrimitiveType::F32 => "f32",
            PrimitiveType::F64 => "f64",
            PrimitiveType::Bool => "bool",
            PrimitiveType::DateTime => "DateTime",
            PrimitiveType::Date => "NaiveDate",
            PrimitiveType::Uuid => "Uuid",
            PrimitiveType::Url => "Url",
            PrimitiveType::Decimal => "Decimal",
        }
    }
}

/// A type as written in source, before resolution
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Primitive(PrimitiveType),
    /// A path to a named type, possibly qualified and possibly generic
    Named {
        segments: Vec<String>,
        args: Vec<TypeExpr>,
    },
    /// One of the enclosing declaration's own type parameters
    Param(String),
    Array(Box<TypeExpr>),
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    /// Transparent indirection (`Box`, `Rc`, `Arc`, `Cow`, references)
    Pointer(Box<TypeExpr>),
    Optional(Box<TypeExpr>),
    /// Untyped value: trait objects, tuples, `serde_json::Value`
    Interface,
    Function,
    /// A type argument bound to a concrete declaration by instantiation
    Resolved(DeclId),
}

impl TypeExpr {
    pub fn named(segments: &[&str]) -> Self {
        TypeExpr::Named {
            segments: segments.iter().map(|s| s.to_string()).collect(),
            args: Vec::new(),
        }
    }

    /// Strips `Option` and pointer wrappers
    pub fn peel(&self) -> &TypeExpr {
        match self {
            TypeExpr::Pointer(inner) | TypeExpr::Optional(inner) => inner.peel(),
            other => other,
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            TypeExpr::Optional(_) => true,
            TypeExpr::Pointer(inner) => inner.is_optional(),
            _ => false,
        }
    }

    pub fn contains_param(&self) -> bool {
        match self {
            TypeExpr::Param(_) => true,
            TypeExpr::Named { args, .. } => args.iter().any(TypeExpr::contains_param),
            TypeExpr::Array(inner) | TypeExpr::Pointer(inner) | TypeExpr::Optional(inner) => {
                inner.contains_param()
            }
            TypeExpr::Map { key, value } => key.contains_param() || value.contains_param(),
            _ => false,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeExpr::Primitive(p) => write!(f, "{}", p.name()),
            TypeExpr::Named { segments, args } => {
                write!(f, "{}", segments.join("::"))?;
                if !args.is_empty() {
                    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    write!(f, "<{}>", args.join(", "))?;
                }
                Ok(())
            }
            TypeExpr::Param(name) => write!(f, "{}", name),
            TypeExpr::Array(inner) => write!(f, "Vec<{}>", inner),
            TypeExpr::Map { key, value } => write!(f, "HashMap<{}, {}>", key, value),
            TypeExpr::Pointer(inner) => write!(f, "Box<{}>", inner),
            TypeExpr::Optional(inner) => write!(f, "Option<{}>", inner),
            TypeExpr::Interface => write!(f, "dyn Any"),
            TypeExpr::Function => write!(f, "fn"),
            TypeExpr::Resolved(id) => write!(f, "#{}", id.0),
        }
    }
}

/// One field of a struct declaration
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub exported: bool,
    /// Anonymous inclusion of another declaration's fields (`#[serde(flatten)]`)
    pub embedded: bool,
    pub tags: FieldTags,
    pub doc: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EnumVariant {
    pub name: String,
    pub rename: Option<String>,
    /// Explicit integer discriminant
    pub discriminant: Option<i64>,
    /// Payload of tuple/struct variants
    pub payload: Option<VariantPayload>,
    pub skip: bool,
    pub doc: Option<String>,
}

#[derive(Debug, Clone)]
pub enum VariantPayload {
    Tuple(Vec<TypeExpr>),
    Struct(Vec<FieldDecl>),
}

/// The shape of a declaration
#[derive(Debug, Clone)]
pub enum DeclKind {
    Struct(Vec<FieldDecl>),
    Alias(TypeExpr),
    Enum(Vec<EnumVariant>),
    Interface,
}

/// One type definition found in source
#[derive(Debug, Clone)]
pub struct Declaration {
    /// Defining package path, e.g. `crate::models::web`
    pub package: String,
    pub name: String,
    /// File whose import table governs the references inside this declaration
    pub file: FileId,
    pub type_params: Vec<String>,
    pub kind: DeclKind,
    pub attrs: ContainerAttrs,
    pub doc: Option<String>,
}

impl Declaration {
    /// `<package display name>.<name>`, the global de-duplication key
    pub fn full_name(&self) -> String {
        format!("{}.{}", package_display_name(&self.package), self.name)
    }

    /// Full name that also spells out the type parameters, e.g. `web.Page<T>`
    pub fn parametrized_full_name(&self) -> String {
        if self.type_params.is_empty() {
            self.full_name()
        } else {
            format!("{}<{}>", self.full_name(), self.type_params.join(","))
        }
    }

    /// Name made unique by the whole package path, used when the full name is
    /// ambiguous
    pub fn full_path_name(&self) -> String {
        format!("{}.{}", self.package.replace("::", "_"), self.name)
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

/// Last segment of a package path
pub fn package_display_name(package: &str) -> &str {
    package.rsplit("::").next().unwrap_or(package)
}

/// Extract a [`TypeExpr`] from a `syn::Type`, treating the names in `params`
/// as type parameters
pub fn lower_type(ty: &syn::Type, params: &[String]) -> TypeExpr {
    match ty {
        syn::Type::Path(type_path) => lower_path(&type_path.path, params),
        syn::Type::Reference(reference) => {
            TypeExpr::Pointer(Box::new(lower_type(&reference.elem, params)))
        }
        syn::Type::Slice(slice) => TypeExpr::Array(Box::new(lower_type(&slice.elem, params))),
        syn::Type::Array(array) => TypeExpr::Array(Box::new(lower_type(&array.elem, params))),
        syn::Type::Paren(paren) => lower_type(&paren.elem, params),
        syn::Type::Group(group) => lower_type(&group.elem, params),
        syn::Type::BareFn(_) => TypeExpr::Function,
        _ => TypeExpr::Interface,
    }
}

fn lower_path(path: &syn::Path, params: &[String]) -> TypeExpr {
    let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
    let Some(last) = path.segments.last() else {
        return TypeExpr::Interface;
    };
    let type_name = last.ident.to_string();
    let args: Vec<TypeExpr> = match &last.arguments {
        syn::PathArguments::AngleBracketed(generic) => generic
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(inner) => Some(lower_type(inner, params)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    if segments.len() == 1 && args.is_empty() && params.contains(&type_name) {
        return TypeExpr::Param(type_name);
    }
    if segments.len() == 1 || is_std_path(&segments) {
        if let Some(primitive) = PrimitiveType::parse(&type_name) {
            return TypeExpr::Primitive(primitive);
        }
        let first = args.first().cloned();
        match (type_name.as_str(), first) {
            ("Option", Some(inner)) => return TypeExpr::Optional(Box::new(inner)),
            ("Vec" | "VecDeque" | "HashSet" | "BTreeSet" | "LinkedList" | "IndexSet", Some(inner)) => {
                return TypeExpr::Array(Box::new(inner))
            }
            ("Box" | "Rc" | "Arc" | "Cow" | "RefCell" | "Cell" | "Mutex" | "RwLock", Some(inner)) => {
                return TypeExpr::Pointer(Box::new(inner))
            }
            ("HashMap" | "BTreeMap" | "IndexMap", Some(key)) => {
                let value = args.get(1).cloned().unwrap_or(TypeExpr::Interface);
                return TypeExpr::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                };
            }
            _ => {}
        }
    }

    TypeExpr::Named { segments, args }
}

fn is_std_path(segments: &[String]) -> bool {
    matches!(
        segments.first().map(String::as_str),
        Some("std" | "alloc" | "core" | "indexmap")
    )
}

/// Lower every type-defining item of one module scope.
///
/// Inline `mod` blocks are not descended into; the registry indexes them as
/// their own scopes.
pub fn lower_items(items: &[syn::Item], package: &str, file: FileId) -> Vec<Declaration> {
    items
        .iter()
        .filter_map(|item| lower_item(item, package, file))
        .collect()
}

fn lower_item(item: &syn::Item, package: &str, file: FileId) -> Option<Declaration> {
    let (name, generics, attributes, kind) = match item {
        syn::Item::Struct(item_struct) => {
            let params = type_param_names(&item_struct.generics);
            let kind = lower_struct_fields(&item_struct.fields, &params);
            (&item_struct.ident, &item_struct.generics, &item_struct.attrs, kind)
        }
        syn::Item::Enum(item_enum) => {
            let params = type_param_names(&item_enum.generics);
            let variants = item_enum
                .variants
                .iter()
                .map(|v| lower_variant(v, &params))
                .collect();
            (&item_enum.ident, &item_enum.generics, &item_enum.attrs, DeclKind::Enum(variants))
        }
        syn::Item::Type(item_type) => {
            let params = type_param_names(&item_type.generics);
            let target = lower_type(&item_type.ty, &params);
            (&item_type.ident, &item_type.generics, &item_type.attrs, DeclKind::Alias(target))
        }
        syn::Item::Trait(item_trait) => (
            &item_trait.ident,
            &item_trait.generics,
            &item_trait.attrs,
            DeclKind::Interface,
        ),
        _ => return None,
    };

    Some(Declaration {
        package: package.to_string(),
        name: name.to_string(),
        file,
        type_params: type_param_names(generics),
        kind,
        attrs: attrs::container_attrs(attributes),
        doc: attrs::doc_comment(attributes),
    })
}

fn type_param_names(generics: &syn::Generics) -> Vec<String> {
    generics.type_params().map(|p| p.ident.to_string()).collect()
}

fn lower_struct_fields(fields: &syn::Fields, params: &[String]) -> DeclKind {
    match fields {
        syn::Fields::Named(named) => DeclKind::Struct(lower_named_fields(named, params)),
        syn::Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => {
            DeclKind::Alias(lower_type(&unnamed.unnamed[0].ty, params))
        }
        syn::Fields::Unnamed(unnamed) => DeclKind::Alias(TypeExpr::Array(Box::new(
            tuple_element_type(unnamed, params),
        ))),
        syn::Fields::Unit => DeclKind::Struct(Vec::new()),
    }
}

/// Tuples serialize as arrays; a homogeneous tuple keeps its element type
fn tuple_element_type(unnamed: &syn::FieldsUnnamed, params: &[String]) -> TypeExpr {
    let types: Vec<TypeExpr> = unnamed.unnamed.iter().map(|f| lower_type(&f.ty, params)).collect();
    match types.first() {
        Some(first) if types.iter().all(|t| t == first) => first.clone(),
        _ => TypeExpr::Interface,
    }
}

fn lower_named_fields(named: &syn::FieldsNamed, params: &[String]) -> Vec<FieldDecl> {
    named
        .named
        .iter()
        .filter_map(|field| {
            let ident = field.ident.as_ref()?;
            let name = ident.to_string();
            Some(FieldDecl {
                name: name.strip_prefix("r#").unwrap_or(&name).to_string(),
                ty: lower_type(&field.ty, params),
                exported: !matches!(field.vis, syn::Visibility::Inherited),
                embedded: attrs::is_flatten(&field.attrs),
                tags: attrs::field_tags(&field.attrs),
                doc: attrs::doc_comment(&field.attrs),
            })
        })
        .collect()
}

fn lower_variant(variant: &syn::Variant, params: &[String]) -> EnumVariant {
    let discriminant = variant
        .discriminant
        .as_ref()
        .and_then(|(_, expr)| int_literal(expr))
        .and_then(|value| match i64::try_from(value) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Discriminant {} of {} does not fit in i64; ignoring it", value, variant.ident);
                None
            }
        });
    let payload = match &variant.fields {
        syn::Fields::Unit => None,
        syn::Fields::Named(named) => {
            // variant fields carry the enum's visibility
            let fields = lower_named_fields(named, params)
                .into_iter()
                .map(|field| FieldDecl {
                    exported: true,
                    ..field
                })
                .collect();
            Some(VariantPayload::Struct(fields))
        }
        syn::Fields::Unnamed(unnamed) => Some(VariantPayload::Tuple(
            unnamed.unnamed.iter().map(|f| lower_type(&f.ty, params)).collect(),
        )),
    };
    let tags = attrs::field_tags(&variant.attrs);
    EnumVariant {
        name: variant.ident.to_string(),
        rename: tags.serde_rename.clone(),
        discriminant,
        payload,
        skip: tags.serde_skip,
        doc: attrs::doc_comment(&variant.attrs),
    }
}

fn int_literal(expr: &syn::Expr) -> Option<i128> {
    match expr {
        syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Int(int),
            ..
        }) => int.base10_parse().ok(),
        syn::Expr::Unary(syn::ExprUnary {
            op: syn::UnOp::Neg(_),
            expr,
            ..
        }) => int_literal(expr).map(|v| -v),
        _ => None,
    }
}
