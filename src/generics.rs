//! Generic instantiation: binding a generic declaration's type parameters to concrete arguments
//! and registering the result as an ordinary declaration.

use std::collections::HashMap;

use log::debug;

use crate::declaration::{DeclId, DeclKind, EnumVariant, FieldDecl, TypeExpr, VariantPayload};
use crate::error::{Error, Result};
use crate::registry::Registry;

/// Instantiate `generic` with already-bound `args`.
///
/// The instantiated declaration lives in the generic's package under a name derived from the
/// arguments (`Response-web_Post`), so instantiating the same generic with the same arguments
/// twice yields the same declaration.
pub fn instantiate(registry: &mut Registry, generic: DeclId, args: &[TypeExpr]) -> Result<DeclId> {
    let decl = registry.get(generic).clone();
    if args.len() != decl.type_params.len() {
        return Err(Error::ArityMismatch {
            name: decl.parametrized_full_name(),
            expected: decl.type_params.len(),
            actual: args.len(),
        });
    }

    let name = instantiated_name(registry, &decl.name, args);
    if let Some(existing) = registry.lookup(&decl.package, &name) {
        return Ok(existing);
    }

    let bindings: HashMap<&str, &TypeExpr> = decl
        .type_params
        .iter()
        .map(String::as_str)
        .zip(args.iter())
        .collect();

    let mut instance = decl.clone();
    instance.kind = substitute_kind(&decl.kind, &bindings);
    instance.name = name;
    instance.type_params = Vec::new();

    debug!("Instantiated {} as {}", decl.parametrized_full_name(), instance.full_name());
    Ok(registry.insert(instance))
}

/// `<generic name>-<arg>-<arg>...`
pub fn instantiated_name(registry: &mut Registry, base: &str, args: &[TypeExpr]) -> String {
    let mut name = base.to_string();
    for arg in args {
        name.push('-');
        name.push_str(&argument_name(registry, arg));
    }
    name
}

/// Name fragment an argument contributes; a nested instantiation embeds its own full name
fn argument_name(registry: &mut Registry, arg: &TypeExpr) -> String {
    match arg {
        TypeExpr::Primitive(p) => p.name().to_string(),
        TypeExpr::Resolved(id) => registry.definition_name(*id).replace('.', "_"),
        TypeExpr::Array(inner) => format!("array_{}", argument_name(registry, inner)),
        TypeExpr::Map { key, value } => format!(
            "map_{}_{}",
            argument_name(registry, key),
            argument_name(registry, value)
        ),
        TypeExpr::Pointer(inner) | TypeExpr::Optional(inner) => argument_name(registry, inner),
        TypeExpr::Named { segments, .. } => segments.join("_"),
        TypeExpr::Param(param) => param.clone(),
        TypeExpr::Interface => "any".to_string(),
        TypeExpr::Function => "func".to_string(),
    }
}

fn substitute_kind(kind: &DeclKind, bindings: &HashMap<&str, &TypeExpr>) -> DeclKind {
    match kind {
        DeclKind::Struct(fields) => DeclKind::Struct(substitute_fields(fields, bindings)),
        DeclKind::Alias(target) => DeclKind::Alias(substitute(target, bindings)),
        DeclKind::Enum(variants) => DeclKind::Enum(
            variants
                .iter()
                .map(|variant| EnumVariant {
                    payload: variant.payload.as_ref().map(|payload| match payload {
                        VariantPayload::Tuple(types) => {
                            VariantPayload::Tuple(types.iter().map(|t| substitute(t, bindings)).collect())
                        }
                        VariantPayload::Struct(fields) => {
                            VariantPayload::Struct(substitute_fields(fields, bindings))
                        }
                    }),
                    ..variant.clone()
                })
                .collect(),
        ),
        DeclKind::Interface => DeclKind::Interface,
    }
}

fn substitute_fields(fields: &[FieldDecl], bindings: &HashMap<&str, &TypeExpr>) -> Vec<FieldDecl> {
    fields
        .iter()
        .map(|field| FieldDecl {
            ty: substitute(&field.ty, bindings),
            ..field.clone()
        })
        .collect()
}

/// Replace type parameters at any depth, including inside other generics' arguments
pub fn substitute(expr: &TypeExpr, bindings: &HashMap<&str, &TypeExpr>) -> TypeExpr {
    match expr {
        TypeExpr::Param(name) => bindings
            .get(name.as_str())
            .map(|bound| (*bound).clone())
            .unwrap_or_else(|| expr.clone()),
        TypeExpr::Named { segments, args } => TypeExpr::Named {
            segments: segments.clone(),
            args: args.iter().map(|a| substitute(a, bindings)).collect(),
        },
        TypeExpr::Array(inner) => TypeExpr::Array(Box::new(substitute(inner, bindings))),
        TypeExpr::Pointer(inner) => TypeExpr::Pointer(Box::new(substitute(inner, bindings))),
        TypeExpr::Optional(inner) => TypeExpr::Optional(Box::new(substitute(inner, bindings))),
        TypeExpr::Map { key, value } => TypeExpr::Map {
            key: Box::new(substitute(key, bindings)),
            value: Box::new(substitute(value, bindings)),
        },
        other => other.clone(),
    }
}
