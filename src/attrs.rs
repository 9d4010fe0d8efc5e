//! Attribute extraction for declarations and fields.
//!
//! Attributes are tokenized into raw key/value [`TagEntry`] lists here and
//! interpreted later by [`crate::field_parser`], which knows the base type of
//! the field and can therefore coerce and validate the values.

use log::debug;

/// One `key`, `key = value` or `key(...)` item inside an attribute list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagEntry {
    pub key: String,
    pub value: Option<String>,
    pub nested: Vec<TagEntry>,
}

impl TagEntry {
    /// Value of a nested `key = value` item, e.g. `min` inside `range(min = 1)`
    pub fn nested_value(&self, key: &str) -> Option<&str> {
        self.nested
            .iter()
            .find(|e| e.key == key)
            .and_then(|e| e.value.as_deref())
    }
}

/// Field metadata collected from `serde`, `serde_as`, `schema`, `validate`
/// and `garde` attributes
#[derive(Debug, Clone, Default)]
pub struct FieldTags {
    pub serde_rename: Option<String>,
    pub serde_skip: bool,
    /// The value travels as text even though its type is numeric or boolean
    pub string_encoded: bool,
    pub schema: Vec<TagEntry>,
    pub validate: Vec<TagEntry>,
    pub garde: Vec<TagEntry>,
}

impl FieldTags {
    pub fn schema_entry(&self, key: &str) -> Option<&TagEntry> {
        self.schema.iter().find(|e| e.key == key)
    }

    pub fn schema_value(&self, key: &str) -> Option<&str> {
        self.schema_entry(key).and_then(|e| e.value.as_deref())
    }

    pub fn has_schema_flag(&self, key: &str) -> bool {
        self.schema_entry(key).is_some()
    }

    /// Rules of both validation vocabularies, validator's first
    pub fn validation_rules(&self) -> impl Iterator<Item = &TagEntry> {
        self.validate.iter().chain(self.garde.iter())
    }
}

/// Container-level attributes of a declaration
#[derive(Debug, Clone, Default)]
pub struct ContainerAttrs {
    pub rename_all: Option<String>,
    /// `#[serde(untagged)]` on enums
    pub untagged: bool,
}

/// Extract doc comments from attributes, one line per `///` line
pub fn doc_comment(attrs: &[syn::Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(syn::MetaNameValue {
                value:
                    syn::Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(s),
                        ..
                    }),
                ..
            }) => Some(s.value().trim().to_string()),
            _ => None,
        })
        .collect();

    let text = lines.join("\n").trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub fn is_flatten(attrs: &[syn::Attribute]) -> bool {
    entries_of(attrs, "serde").iter().any(|e| e.key == "flatten")
}

pub fn container_attrs(attrs: &[syn::Attribute]) -> ContainerAttrs {
    let serde = entries_of(attrs, "serde");
    ContainerAttrs {
        rename_all: serde
            .iter()
            .find(|e| e.key == "rename_all")
            .and_then(|e| e.value.clone().or_else(|| e.nested_value("serialize").map(str::to_string))),
        untagged: serde.iter().any(|e| e.key == "untagged"),
    }
}

pub fn field_tags(attrs: &[syn::Attribute]) -> FieldTags {
    let serde = entries_of(attrs, "serde");
    let serde_as = entries_of(attrs, "serde_as");

    let serde_rename = serde.iter().find(|e| e.key == "rename").and_then(|e| {
        e.value
            .clone()
            .or_else(|| e.nested_value("serialize").map(str::to_string))
    });
    let serde_skip = serde
        .iter()
        .any(|e| e.key == "skip" || e.key == "skip_serializing");
    let string_encoded = serde_as
        .iter()
        .any(|e| e.key == "as" && e.value.as_deref().is_some_and(|v| v.contains("DisplayFromStr")))
        || serde.iter().any(|e| {
            e.key == "with" && e.value.as_deref().is_some_and(|v| v.to_lowercase().contains("string"))
        });

    let schema = entries_of(attrs, "schema");
    let string_encoded = string_encoded || schema.iter().any(|e| e.key == "string");

    FieldTags {
        serde_rename,
        serde_skip,
        string_encoded,
        schema,
        validate: entries_of(attrs, "validate"),
        garde: entries_of(attrs, "garde"),
    }
}

/// Entries of every attribute named `name`, in declaration order
fn entries_of(attrs: &[syn::Attribute], name: &str) -> Vec<TagEntry> {
    let mut entries = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident(name)) {
        if !matches!(attr.meta, syn::Meta::List(_)) {
            continue;
        }
        if let Err(e) = attr.parse_nested_meta(|meta| {
            entries.push(parse_entry(&meta)?);
            Ok(())
        }) {
            debug!("Ignoring malformed #[{}] attribute: {}", name, e);
        }
    }
    entries
}

fn parse_entry(meta: &syn::meta::ParseNestedMeta) -> syn::Result<TagEntry> {
    let key = meta
        .path
        .segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::");
    let mut entry = TagEntry {
        key,
        ..TagEntry::default()
    };

    if meta.input.peek(syn::Token![=]) {
        let expr: syn::Expr = meta.value()?.parse()?;
        entry.value = expr_to_string(&expr);
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| {
            entry.nested.push(parse_entry(&inner)?);
            Ok(())
        })?;
    }
    Ok(entry)
}

fn expr_to_string(expr: &syn::Expr) -> Option<String> {
    match expr {
        syn::Expr::Lit(syn::ExprLit { lit, .. }) => match lit {
            syn::Lit::Str(s) => Some(s.value()),
            syn::Lit::Int(i) => Some(i.base10_digits().to_string()),
            syn::Lit::Float(f) => Some(f.base10_digits().to_string()),
            syn::Lit::Bool(b) => Some(b.value.to_string()),
            syn::Lit::Char(c) => Some(c.value().to_string()),
            _ => None,
        },
        syn::Expr::Unary(syn::ExprUnary {
            op: syn::UnOp::Neg(_),
            expr,
            ..
        }) => expr_to_string(expr).map(|v| format!("-{}", v)),
        syn::Expr::Path(path) => Some(
            path.path
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .collect::<Vec<_>>()
                .join("::"),
        ),
        _ => None,
    }
}
