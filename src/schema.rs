//! Schema model of the generated document.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::declaration::PrimitiveType;

/// Prefix of every reference into the shared definitions table
pub const REF_PREFIX: &str = "#/components/schemas/";

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Reference to a named schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g., "int32", "int64", "date-time")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Properties for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    /// Value schema for map types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    /// Required property names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_number_constraint"
    )]
    pub minimum: Option<f64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_number_constraint"
    )]
    pub maximum: Option<f64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_number_constraint"
    )]
    pub multiple_of: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<Schema>>,
    /// Schemas nested inside this one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definitions: Option<BTreeMap<String, Schema>>,
    /// `x-` extension properties
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

/// Serialize `Option<f64>` as integer when the value has no fractional part.
#[allow(clippy::ref_option)]
fn serialize_number_constraint<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => serializer.serialize_some(&(*v as i64)),
        Some(v) => serializer.serialize_some(v),
        None => serializer.serialize_none(),
    }
}

impl Schema {
    pub fn of_type(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Self::default()
        }
    }

    pub fn object() -> Self {
        Self::of_type("object")
    }

    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of_type("array")
        }
    }

    /// Object with arbitrary keys and values described by `value`
    pub fn map(value: Schema) -> Self {
        Self {
            additional_properties: Some(Box::new(value)),
            ..Self::object()
        }
    }

    /// Reference to the definition named `name`
    pub fn reference(name: &str) -> Self {
        Self {
            reference: Some(format!("{}{}", REF_PREFIX, name)),
            ..Self::default()
        }
    }

    /// Convert a primitive type to an OpenAPI schema
    pub fn primitive(primitive: PrimitiveType) -> Self {
        let (schema_type, format) = match primitive {
            PrimitiveType::String | PrimitiveType::Char => ("string", None),
            PrimitiveType::I8 | PrimitiveType::I16 | PrimitiveType::I32 => ("integer", Some("int32")),
            PrimitiveType::U8 | PrimitiveType::U16 | PrimitiveType::U32 => ("integer", Some("int32")),
            PrimitiveType::I64 | PrimitiveType::I128 | PrimitiveType::Isize => ("integer", Some("int64")),
            PrimitiveType::U64 | PrimitiveType::U128 | PrimitiveType::Usize => ("integer", Some("int64")),
            PrimitiveType::F32 => ("number", Some("float")),
            PrimitiveType::F64 => ("number", Some("double")),
            PrimitiveType::Bool => ("boolean", None),
            PrimitiveType::DateTime => ("string", Some("date-time")),
            PrimitiveType::Date => ("string", Some("date")),
            PrimitiveType::Uuid => ("string", Some("uuid")),
            PrimitiveType::Url => ("string", Some("uri")),
            PrimitiveType::Decimal => ("number", None),
        };
        Self {
            format: format.map(str::to_string),
            ..Self::of_type(schema_type)
        }
    }

    pub fn is_ref(&self) -> bool {
        self.reference.is_some()
    }

    /// Definition name this schema refers to, if it is a reference
    pub fn ref_name(&self) -> Option<&str> {
        self.reference.as_deref().and_then(|r| r.strip_prefix(REF_PREFIX))
    }

    /// Whether the schema deserves a named definition rather than being inlined.
    ///
    /// Complex means: it carries an enum, it nests composites more than `max_depth` levels,
    /// or some level of it is an object (a reference counts as one).
    pub fn is_complex(&self, max_depth: usize) -> bool {
        self.complexity_at(0, max_depth)
    }

    fn complexity_at(&self, depth: usize, max_depth: usize) -> bool {
        if self.enum_values.is_some() || self.is_ref() || self.one_of.is_some() || self.all_of.is_some() {
            return true;
        }
        if self.properties.is_some() || self.additional_properties.is_some() {
            return true;
        }
        match self.schema_type.as_deref() {
            Some("object") => true,
            Some("array") => {
                if depth + 1 > max_depth {
                    return true;
                }
                self.items
                    .as_ref()
                    .is_some_and(|items| items.complexity_at(depth + 1, max_depth))
            }
            _ => false,
        }
    }

    /// Every definition name referenced anywhere inside this schema
    pub fn collect_refs(&self, out: &mut BTreeSet<String>) {
        if let Some(name) = self.ref_name() {
            out.insert(name.to_string());
        }
        let boxed = [&self.items, &self.additional_properties, &self.not];
        for nested in boxed.into_iter().flatten() {
            nested.collect_refs(out);
        }
        let maps = [&self.properties, &self.definitions];
        for map in maps.into_iter().flatten() {
            for schema in map.values() {
                schema.collect_refs(out);
            }
        }
        let branches = [&self.all_of, &self.one_of, &self.any_of];
        for branch in branches.into_iter().flatten() {
            for schema in branch {
                schema.collect_refs(out);
            }
        }
    }
}
