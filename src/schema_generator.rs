use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::{debug, warn};
use serde_json::Value;

use crate::config::{apply_rename_rule, SynthesisConfig};
use crate::declaration::{DeclId, DeclKind, Declaration, EnumVariant, FieldDecl, FileId, TypeExpr, VariantPayload};
use crate::error::{Error, Result};
use crate::field_parser::FieldParser;
use crate::schema::Schema;
use crate::type_resolver::{parse_type_ref, Resolution, TypeResolver};

/// Schema generator - converts declarations to OpenAPI schemas.
///
/// Structs and enums become named definitions and are used through references; aliases are
/// inlined unless their shape is complex. Every declaration is synthesized once: the schema
/// handed out at its use sites is memoized, and a declaration under construction already has a
/// placeholder definition so that self-references terminate.
pub struct SchemaGenerator {
    /// Type resolver for looking up type definitions
    resolver: TypeResolver,
    config: SynthesisConfig,
    /// Named definitions, keyed by definition name
    definitions: BTreeMap<String, Schema>,
    /// Use-site schema of every synthesized declaration
    memo: HashMap<DeclId, Schema>,
    in_progress: HashSet<DeclId>,
    /// Aliases reached through a cycle; they must become named definitions
    forced_refs: HashSet<DeclId>,
    /// Memo entries (and their definitions) added while a top-level synthesis is running, so
    /// that the ones depending on a failed declaration can be undone
    journal: Vec<(DeclId, Option<String>)>,
}

impl SchemaGenerator {
    /// Create a new SchemaGenerator with a TypeResolver
    pub fn new(resolver: TypeResolver, config: SynthesisConfig) -> Self {
        debug!("Initializing SchemaGenerator");
        Self {
            resolver,
            config,
            definitions: BTreeMap::new(),
            memo: HashMap::new(),
            in_progress: HashSet::new(),
            forced_refs: HashSet::new(),
            journal: Vec::new(),
        }
    }

    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    /// Named definitions synthesized so far
    pub fn definitions(&self) -> &BTreeMap<String, Schema> {
        &self.definitions
    }

    pub fn into_definitions(self) -> BTreeMap<String, Schema> {
        self.definitions
    }

    /// Schema for a textual type reference mentioned in `context`
    pub fn schema_for_type_ref(&mut self, type_ref: &str, context: FileId) -> Result<Schema> {
        debug!("Generating schema for type: {}", type_ref);
        let expr = parse_type_ref(type_ref)?;
        self.schema_for_expr(&expr, context)
    }

    /// Schema for a type expression whose names are resolved in `context`
    pub fn schema_for_expr(&mut self, expr: &TypeExpr, context: FileId) -> Result<Schema> {
        match expr {
            TypeExpr::Primitive(p) => Ok(Schema::primitive(*p)),
            TypeExpr::Optional(inner) | TypeExpr::Pointer(inner) => self.schema_for_expr(inner, context),
            TypeExpr::Array(inner) => Ok(Schema::array(self.schema_for_expr(inner, context)?)),
            TypeExpr::Map { value, .. } => Ok(Schema::map(self.schema_for_expr(value, context)?)),
            TypeExpr::Interface | TypeExpr::Function => Ok(Schema::object()),
            TypeExpr::Param(name) => {
                debug!("Unbound type parameter {}, using object placeholder", name);
                Ok(Schema::object())
            }
            TypeExpr::Resolved(id) => self.synthesize(*id),
            TypeExpr::Named { .. } => {
                let allow_external = self.config.parse_dependencies;
                match self.resolver.resolve_expr(expr, context, allow_external)? {
                    Resolution::Primitive(p) => Ok(Schema::primitive(p)),
                    Resolution::Any => Ok(Schema::object()),
                    Resolution::Declaration(id) => self.synthesize(id),
                }
            }
        }
    }

    /// Schema used wherever `id` is referenced: a reference for named declarations, the inline
    /// schema otherwise
    pub fn synthesize(&mut self, id: DeclId) -> Result<Schema> {
        if let Some(schema) = self.memo.get(&id) {
            return Ok(schema.clone());
        }
        let name = self.resolver.registry_mut().definition_name(id);
        if self.in_progress.contains(&id) {
            debug!("Cycle through {}, using a reference", name);
            self.forced_refs.insert(id);
            return Ok(Schema::reference(&name));
        }

        let decl = self.resolver.registry().get(id).clone();
        debug!("Synthesizing {}", name);
        match &decl.kind {
            DeclKind::Alias(target) => self.synthesize_alias(id, &name, &decl, target),
            DeclKind::Interface => Ok(Schema {
                description: decl.doc.clone(),
                ..Schema::object()
            }),
            DeclKind::Struct(_) | DeclKind::Enum(_) => self.synthesize_named(id, name, &decl),
        }
    }

    fn synthesize_named(&mut self, id: DeclId, name: String, decl: &Declaration) -> Result<Schema> {
        let mark = self.journal.len();
        self.definitions.insert(name.clone(), Schema::object());
        self.in_progress.insert(id);
        let body = match &decl.kind {
            DeclKind::Struct(fields) => self.object_schema(fields, decl.attrs.rename_all.as_deref(), decl.file),
            DeclKind::Enum(variants) => self.enum_schema(decl, variants),
            DeclKind::Alias(_) | DeclKind::Interface => Ok(Schema::object()),
        };
        self.in_progress.remove(&id);
        self.forced_refs.remove(&id);

        let body = match body {
            Ok(body) => body,
            Err(e) => {
                // everything synthesized meanwhile may refer to the placeholder
                self.definitions.remove(&name);
                self.rollback(mark, &name);
                return Err(e);
            }
        };
        let reference = Schema::reference(&name);
        self.definitions.insert(
            name.clone(),
            Schema {
                description: body.description.clone().or(decl.doc.clone()),
                ..body
            },
        );
        self.remember(id, reference.clone(), Some(name));
        Ok(reference)
    }

    fn remember(&mut self, id: DeclId, schema: Schema, definition: Option<String>) {
        self.memo.insert(id, schema);
        if self.in_progress.is_empty() {
            self.journal.clear();
        } else {
            self.journal.push((id, definition));
        }
    }

    /// Forget what was synthesized since `mark` and refers, directly or transitively, to the
    /// definition `failed`
    fn rollback(&mut self, mark: usize, failed: &str) {
        let mut dropped = BTreeSet::from([failed.to_string()]);
        let mut kept = self.journal.split_off(mark);
        loop {
            let tainted: Vec<usize> = kept
                .iter()
                .enumerate()
                .filter(|(_, (id, definition))| self.refers_to(*id, definition.as_deref(), &dropped))
                .map(|(i, _)| i)
                .collect();
            if tainted.is_empty() {
                break;
            }
            for i in tainted.into_iter().rev() {
                let (id, definition) = kept.remove(i);
                self.memo.remove(&id);
                if let Some(name) = definition {
                    debug!("Discarding {} after a failed synthesis", name);
                    self.definitions.remove(&name);
                    dropped.insert(name);
                }
            }
        }
        self.journal.extend(kept);
    }

    fn refers_to(&self, id: DeclId, definition: Option<&str>, names: &BTreeSet<String>) -> bool {
        let mut refs = BTreeSet::new();
        if let Some(schema) = self.memo.get(&id) {
            schema.collect_refs(&mut refs);
        }
        if let Some(schema) = definition.and_then(|name| self.definitions.get(name)) {
            schema.collect_refs(&mut refs);
        }
        !refs.is_disjoint(names)
    }

    fn synthesize_alias(&mut self, id: DeclId, name: &str, decl: &Declaration, target: &TypeExpr) -> Result<Schema> {
        self.in_progress.insert(id);
        let body = self.schema_or_placeholder(target, decl.file, &decl.name);
        self.in_progress.remove(&id);
        let mut body = body?;

        let forced = self.forced_refs.remove(&id);
        if !forced && !body.is_complex(self.config.max_inline_depth) {
            self.remember(id, body.clone(), None);
            return Ok(body);
        }

        if !body.is_ref() && body.description.is_none() {
            body.description = decl.doc.clone();
        }
        self.definitions.insert(name.to_string(), body);
        let reference = Schema::reference(name);
        self.remember(id, reference.clone(), Some(name.to_string()));
        Ok(reference)
    }

    /// Schema of a member type; unresolvable types are documented as objects
    fn schema_or_placeholder(&mut self, ty: &TypeExpr, context: FileId, member: &str) -> Result<Schema> {
        match self.schema_for_expr(ty, context) {
            Ok(schema) => Ok(schema),
            Err(e @ Error::AnnotationConflict { .. }) => Err(e),
            Err(e) => {
                warn!("{}: {}; using object placeholder", member, e);
                Ok(Schema::object())
            }
        }
    }

    fn object_schema(&mut self, fields: &[FieldDecl], rename_all: Option<&str>, context: FileId) -> Result<Schema> {
        let config = self.config.clone();
        let parser = FieldParser::new(&config, rename_all);
        let mut properties = BTreeMap::new();
        let mut required: Vec<String> = Vec::new();
        let mut additional_properties = None;

        // flattened fields first, so that direct fields override them
        let (embedded, direct): (Vec<&FieldDecl>, Vec<&FieldDecl>) = fields.iter().partition(|f| f.embedded);
        for field in embedded {
            if parser.should_skip(field) {
                continue;
            }
            let body = self.embedded_body(field, context)?;
            for name in body.required.iter().flatten() {
                if !required.contains(name) {
                    required.push(name.clone());
                }
            }
            if let Some(spliced) = body.properties {
                properties.extend(spliced);
            }
            if body.additional_properties.is_some() {
                additional_properties = body.additional_properties;
            }
        }

        for field in direct {
            if parser.should_skip(field) {
                continue;
            }
            let name = parser.property_name(field);
            let schema = self.schema_or_placeholder(&field.ty, context, &field.name)?;
            let schema = parser.complement(schema, field)?;
            properties.insert(name.clone(), schema);
            required.retain(|r| *r != name);
            if parser.is_required(field) {
                required.push(name);
            }
        }

        Ok(Schema {
            properties: Some(properties),
            required: (!required.is_empty()).then_some(required),
            additional_properties,
            ..Schema::object()
        })
    }

    /// Resolved body of a flattened member, whose properties are spliced into the parent
    fn embedded_body(&mut self, field: &FieldDecl, context: FileId) -> Result<Schema> {
        let schema = self.schema_or_placeholder(&field.ty, context, &field.name)?;
        let body = match schema.ref_name() {
            Some(name) => self.definitions.get(name).cloned().unwrap_or_default(),
            None => schema,
        };
        if body.properties.is_none() && body.additional_properties.is_none() {
            warn!("Flattened field {} has no properties to splice", field.name);
        }
        Ok(body)
    }

    fn enum_schema(&mut self, decl: &Declaration, variants: &[EnumVariant]) -> Result<Schema> {
        let rule = decl.attrs.rename_all.as_deref();
        let variants: Vec<&EnumVariant> = variants.iter().filter(|v| !v.skip).collect();
        let names: Vec<String> = variants.iter().map(|v| variant_name(v, rule)).collect();

        if variants.iter().all(|v| v.payload.is_none()) {
            if variants.iter().any(|v| v.discriminant.is_some()) {
                let mut next = 0i64;
                let values: Vec<Value> = variants
                    .iter()
                    .map(|v| {
                        let value = v.discriminant.unwrap_or(next);
                        next = value.wrapping_add(1);
                        Value::from(value)
                    })
                    .collect();
                let mut schema = Schema {
                    enum_values: Some(values),
                    ..Schema::of_type("integer")
                };
                schema.extensions.insert(
                    "x-enum-varnames".to_string(),
                    Value::Array(names.into_iter().map(Value::String).collect()),
                );
                return Ok(schema);
            }
            return Ok(Schema {
                enum_values: Some(names.into_iter().map(Value::String).collect()),
                ..Schema::of_type("string")
            });
        }

        let mut one_of = Vec::new();
        for (variant, name) in variants.iter().zip(names) {
            let payload = match &variant.payload {
                None => {
                    one_of.push(Schema {
                        enum_values: Some(vec![Value::String(name)]),
                        description: variant.doc.clone(),
                        ..Schema::of_type("string")
                    });
                    continue;
                }
                Some(VariantPayload::Struct(fields)) => self.object_schema(fields, None, decl.file)?,
                Some(VariantPayload::Tuple(types)) => self.tuple_schema(types, decl.file, &variant.name)?,
            };
            if decl.attrs.untagged {
                one_of.push(payload);
            } else {
                one_of.push(Schema {
                    properties: Some(BTreeMap::from([(name.clone(), payload)])),
                    required: Some(vec![name]),
                    description: variant.doc.clone(),
                    ..Schema::object()
                });
            }
        }
        Ok(Schema {
            one_of: Some(one_of),
            ..Schema::default()
        })
    }

    /// A newtype variant carries its inner value; longer tuples serialize as arrays
    fn tuple_schema(&mut self, types: &[TypeExpr], context: FileId, member: &str) -> Result<Schema> {
        let schemas = types
            .iter()
            .map(|ty| self.schema_or_placeholder(ty, context, member))
            .collect::<Result<Vec<_>>>()?;
        match schemas.as_slice() {
            [single] => Ok(single.clone()),
            [first, rest @ ..] => {
                let items = if rest.iter().all(|s| s == first) {
                    first.clone()
                } else {
                    Schema::object()
                };
                let len = schemas.len() as u64;
                Ok(Schema {
                    min_items: Some(len),
                    max_items: Some(len),
                    ..Schema::array(items)
                })
            }
            [] => Ok(Schema::object()),
        }
    }
}

fn variant_name(variant: &EnumVariant, rule: Option<&str>) -> String {
    variant
        .rename
        .clone()
        .or_else(|| rule.and_then(|rule| apply_rename_rule(rule, &variant.name)))
        .unwrap_or_else(|| variant.name.clone())
}
