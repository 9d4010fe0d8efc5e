//! Field annotation parser: turns the tags attached to one struct field into property naming,
//! the required flag and the constraints layered onto the field's synthesized schema.

use serde_json::Value;

use crate::attrs::TagEntry;
use crate::config::{apply_rename_rule, SynthesisConfig};
use crate::declaration::FieldDecl;
use crate::error::{Error, Result};
use crate::schema::Schema;

/// Base type of a field, as far as annotations care
#[derive(Debug, Clone, PartialEq)]
pub enum BaseType {
    Integer,
    Number,
    String,
    Boolean,
    Array(Box<BaseType>),
    Object,
}

impl BaseType {
    /// Classify a synthesized schema; references are objects
    pub fn of(schema: &Schema) -> Self {
        match schema.schema_type.as_deref() {
            Some("integer") => BaseType::Integer,
            Some("number") => BaseType::Number,
            Some("string") => BaseType::String,
            Some("boolean") => BaseType::Boolean,
            Some("array") => BaseType::Array(Box::new(
                schema.items.as_deref().map(BaseType::of).unwrap_or(BaseType::Object),
            )),
            _ => BaseType::Object,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, BaseType::Integer | BaseType::Number)
    }

    /// Zero value rendered as text, for fields transmitted as strings
    fn zero_text(&self) -> Option<&'static str> {
        match self {
            BaseType::Integer | BaseType::Number => Some("0"),
            BaseType::Boolean => Some("false"),
            _ => None,
        }
    }
}

/// Interprets field tags for one declaration.
///
/// `rename_all` is the container's `#[serde(rename_all)]` rule; it takes precedence over the
/// run-wide naming strategy.
pub struct FieldParser<'a> {
    config: &'a SynthesisConfig,
    rename_all: Option<&'a str>,
}

impl<'a> FieldParser<'a> {
    pub fn new(config: &'a SynthesisConfig, rename_all: Option<&'a str>) -> Self {
        Self { config, rename_all }
    }

    /// Private fields, ignored fields and fields renamed to `-` are left out
    pub fn should_skip(&self, field: &FieldDecl) -> bool {
        (self.config.skip_private_fields && !field.exported)
            || field.tags.serde_skip
            || field.tags.has_schema_flag("ignore")
            || field.tags.schema_value("rename") == Some("-")
    }

    pub fn property_name(&self, field: &FieldDecl) -> String {
        if let Some(rename) = field.tags.schema_value("rename") {
            return rename.to_string();
        }
        if let Some(rename) = &field.tags.serde_rename {
            return rename.clone();
        }
        self.rename_all
            .and_then(|rule| apply_rename_rule(rule, &field.name))
            .unwrap_or_else(|| self.config.naming.apply(&field.name))
    }

    pub fn is_required(&self, field: &FieldDecl) -> bool {
        let tags = &field.tags;
        if tags.has_schema_flag("optional") {
            return false;
        }
        if tags.has_schema_flag("required") || tags.validation_rules().any(|rule| rule.key == "required") {
            return true;
        }
        self.config.required_by_default && !field.ty.is_optional()
    }

    /// Layer the field's annotations onto `schema`.
    ///
    /// An annotation that does not fit the field's base type is an error for this field only.
    pub fn complement(&self, schema: Schema, field: &FieldDecl) -> Result<Schema> {
        let tags = &field.tags;
        let mut schema = match tags.schema_value("schema_type") {
            Some(custom) => parse_schema_type(custom).ok_or_else(|| {
                Error::conflict(&field.name, format!("unknown schema_type `{}`", custom))
            })?,
            None => schema,
        };

        let mut string_zero = None;
        if tags.string_encoded {
            string_zero = BaseType::of(&schema).zero_text();
            if string_zero.is_some() {
                schema.schema_type = Some("string".to_string());
                schema.format = None;
            }
        }
        let base = BaseType::of(&schema);

        if let Some(title) = tags.schema_value("title") {
            schema.title = Some(title.to_string());
        }
        if let Some(format) = tags.schema_value("format") {
            schema.format = Some(format.to_string());
        } else if let Some(format) = implied_format(tags.validation_rules()) {
            schema.format = Some(format.to_string());
        }

        self.apply_numeric_bounds(&mut schema, &base, field)?;
        self.apply_length_bounds(&mut schema, &base, field)?;

        if let Some(enums) = tags.schema_value("enums") {
            let target = match &base {
                BaseType::Array(item) => item.as_ref(),
                other => other,
            };
            if !target.is_numeric() && *target != BaseType::String {
                return Err(Error::conflict(
                    &field.name,
                    "enums are only supported on numeric and string types",
                ));
            }
            let values = enums
                .split(',')
                .map(|raw| coerce(&field.name, target, raw.trim()))
                .collect::<Result<Vec<_>>>()?;
            match (&base, schema.items.as_mut()) {
                (BaseType::Array(_), Some(items)) => items.enum_values = Some(values),
                _ => schema.enum_values = Some(values),
            }
        }

        if let Some(default) = tags.schema_value("default") {
            schema.default = Some(coerce(&field.name, &base, default)?);
        }
        match tags.schema_value("example") {
            Some(example) => schema.example = Some(coerce(&field.name, &base, example)?),
            None => {
                if let Some(zero) = string_zero {
                    schema.example = Some(Value::String(zero.to_string()));
                }
            }
        }

        if let Some(extensions) = tags.schema_value("extensions") {
            for (key, value) in parse_extensions(&field.name, extensions)? {
                schema.extensions.insert(key, value);
            }
        }

        let description = field.doc.clone();
        let read_only = tags.has_schema_flag("readonly");
        Ok(decorate(schema, description, read_only))
    }

    fn apply_numeric_bounds(&self, schema: &mut Schema, base: &BaseType, field: &FieldDecl) -> Result<()> {
        let tags = &field.tags;
        let range = tags.validation_rules().find(|rule| rule.key == "range");
        let bounds = [
            ("minimum", tags.schema_value("minimum").or_else(|| range.and_then(|r| r.nested_value("min")))),
            ("maximum", tags.schema_value("maximum").or_else(|| range.and_then(|r| r.nested_value("max")))),
            ("multiple_of", tags.schema_value("multiple_of")),
        ];
        for (name, raw) in bounds {
            let Some(raw) = raw else {
                continue;
            };
            if !base.is_numeric() {
                return Err(Error::conflict(
                    &field.name,
                    format!("{} requires a numeric type", name),
                ));
            }
            let value = parse_number(&field.name, raw)?;
            match name {
                "minimum" => schema.minimum = Some(value),
                "maximum" => schema.maximum = Some(value),
                _ => schema.multiple_of = Some(value),
            }
        }
        Ok(())
    }

    fn apply_length_bounds(&self, schema: &mut Schema, base: &BaseType, field: &FieldDecl) -> Result<()> {
        let tags = &field.tags;
        let length = tags.validation_rules().find(|rule| rule.key == "length");
        let min = tags.schema_value("min_length").or_else(|| length.and_then(|r| r.nested_value("min")));
        let max = tags.schema_value("max_length").or_else(|| length.and_then(|r| r.nested_value("max")));
        if min.is_none() && max.is_none() {
            return Ok(());
        }

        let min = min.map(|raw| parse_count(&field.name, raw)).transpose()?;
        let max = max.map(|raw| parse_count(&field.name, raw)).transpose()?;
        match base {
            BaseType::String => {
                schema.min_length = min.or(schema.min_length);
                schema.max_length = max.or(schema.max_length);
            }
            BaseType::Array(_) => {
                schema.min_items = min.or(schema.min_items);
                schema.max_items = max.or(schema.max_items);
            }
            _ => {
                return Err(Error::conflict(
                    &field.name,
                    "length bounds require a string or array type",
                ))
            }
        }
        Ok(())
    }
}

/// Attach description and read-only marker without touching a shared reference
fn decorate(schema: Schema, description: Option<String>, read_only: bool) -> Schema {
    if !schema.is_ref() {
        return Schema {
            description: description.or(schema.description.clone()),
            read_only: read_only.then_some(true).or(schema.read_only),
            ..schema
        };
    }
    if description.is_none() && !read_only {
        return schema;
    }

    let mut all_of = vec![schema];
    if read_only {
        all_of.push(Schema {
            read_only: Some(true),
            ..Schema::default()
        });
    }
    Schema {
        all_of: Some(all_of),
        description,
        ..Schema::default()
    }
}

/// Coerce an annotation literal to the JSON value the base type stands for
pub fn coerce(field: &str, base: &BaseType, raw: &str) -> Result<Value> {
    let invalid = |kind: &str| Error::conflict(field, format!("`{}` is not a valid {}", raw, kind));
    match base {
        BaseType::Integer => raw.trim().parse::<i64>().map(Value::from).map_err(|_| invalid("integer")),
        BaseType::Number => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid("number")),
        BaseType::Boolean => raw.trim().parse::<bool>().map(Value::Bool).map_err(|_| invalid("boolean")),
        BaseType::String => Ok(Value::String(raw.to_string())),
        BaseType::Array(item) => raw
            .split(',')
            .map(|part| coerce(field, item, part.trim()))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        BaseType::Object => serde_json::from_str(raw).map_err(|_| invalid("JSON object")),
    }
}

fn parse_number(field: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| Error::conflict(field, format!("`{}` is not a valid number", raw)))
}

fn parse_count(field: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| Error::conflict(field, format!("`{}` is not a valid length", raw)))
}

fn implied_format<'t>(mut rules: impl Iterator<Item = &'t TagEntry>) -> Option<&'static str> {
    rules.find_map(|rule| match rule.key.as_str() {
        "email" => Some("email"),
        "url" => Some("uri"),
        _ => None,
    })
}

/// `x-a` is `true`, `!x-a` is `false`, `x-a=v` is the string `v`
pub fn parse_extensions(field: &str, raw: &str) -> Result<Vec<(String, Value)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (key, value) = if let Some(negated) = item.strip_prefix('!') {
                (negated.trim(), Value::Bool(false))
            } else if let Some((key, value)) = item.split_once('=') {
                (key.trim(), Value::String(value.trim().to_string()))
            } else {
                (item, Value::Bool(true))
            };
            if !key.starts_with("x-") {
                return Err(Error::conflict(
                    field,
                    format!("extension `{}` must start with `x-`", key),
                ));
            }
            Ok((key.to_string(), value))
        })
        .collect()
}

/// `string`, `array,integer`, `primitive,number`, `object`...
fn parse_schema_type(custom: &str) -> Option<Schema> {
    let parts: Vec<&str> = custom.split(',').map(str::trim).collect();
    parse_schema_parts(&parts)
}

fn parse_schema_parts(parts: &[&str]) -> Option<Schema> {
    match parts {
        ["array", rest @ ..] if !rest.is_empty() => parse_schema_parts(rest).map(Schema::array),
        ["primitive", inner] => parse_schema_parts(&[*inner]),
        [single] => match *single {
            "string" | "integer" | "number" | "boolean" | "object" => Some(Schema::of_type(single)),
            "file" => Some(Schema {
                format: Some("binary".to_string()),
                ..Schema::of_type("string")
            }),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::field_tags;
    use crate::config::NamingStrategy;
    use crate::declaration::{lower_type, PrimitiveType};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn field(attrs: &str, ty: &str) -> FieldDecl {
        let item: syn::ItemStruct =
            syn::parse_str(&format!("struct S {{ {}\n pub created_at: {} }}", attrs, ty)).unwrap();
        let syn::Fields::Named(named) = item.fields else {
            unreachable!()
        };
        let f = &named.named[0];
        FieldDecl {
            name: "created_at".to_string(),
            ty: lower_type(&f.ty, &[]),
            exported: true,
            embedded: false,
            tags: field_tags(&f.attrs),
            doc: crate::attrs::doc_comment(&f.attrs),
        }
    }

    fn complement(attrs: &str, schema: Schema) -> Result<Schema> {
        let config = SynthesisConfig::default();
        FieldParser::new(&config, None).complement(schema, &field(attrs, "i64"))
    }

    #[test]
    fn test_skip_rules() {
        let config = SynthesisConfig::default();
        let parser = FieldParser::new(&config, None);
        assert!(!parser.should_skip(&field("", "i64")));
        assert!(parser.should_skip(&field("#[serde(skip)]", "i64")));
        assert!(parser.should_skip(&field("#[schema(ignore)]", "i64")));
        assert!(parser.should_skip(&field(r#"#[schema(rename = "-")]"#, "i64")));

        let mut private = field("", "i64");
        private.exported = false;
        assert!(parser.should_skip(&private));
        let keep_private = SynthesisConfig {
            skip_private_fields: false,
            ..SynthesisConfig::default()
        };
        assert!(!FieldParser::new(&keep_private, None).should_skip(&private));
    }

    #[test]
    fn test_property_naming() {
        let camel = SynthesisConfig {
            naming: NamingStrategy::Camel,
            ..SynthesisConfig::default()
        };
        assert_eq!(FieldParser::new(&camel, None).property_name(&field("", "i64")), "createdAt");
        assert_eq!(
            FieldParser::new(&camel, Some("SCREAMING_SNAKE_CASE")).property_name(&field("", "i64")),
            "CREATED_AT"
        );
        assert_eq!(
            FieldParser::new(&camel, None).property_name(&field(r#"#[serde(rename = "ts")]"#, "i64")),
            "ts"
        );
        assert_eq!(
            FieldParser::new(&camel, None)
                .property_name(&field(r#"#[serde(rename = "ts")] #[schema(rename = "when")]"#, "i64")),
            "when"
        );
    }

    #[test]
    fn test_required_flag() {
        let config = SynthesisConfig::default();
        let parser = FieldParser::new(&config, None);
        assert!(!parser.is_required(&field("", "i64")));
        assert!(parser.is_required(&field("#[validate(required)]", "Option<i64>")));
        assert!(parser.is_required(&field("#[garde(required)]", "i64")));
        assert!(parser.is_required(&field("#[schema(required)]", "i64")));

        let strict = SynthesisConfig {
            required_by_default: true,
            ..SynthesisConfig::default()
        };
        let parser = FieldParser::new(&strict, None);
        assert!(parser.is_required(&field("", "i64")));
        assert!(!parser.is_required(&field("", "Option<i64>")));
        assert!(!parser.is_required(&field("#[schema(optional)]", "i64")));
    }

    #[test]
    fn test_default_is_coerced() {
        let schema = complement(r#"#[schema(default = "5")]"#, Schema::primitive(PrimitiveType::I64)).unwrap();
        assert_eq!(schema.default, Some(json!(5)));

        let schema = complement(r#"#[schema(default = "1.5")]"#, Schema::primitive(PrimitiveType::F64)).unwrap();
        assert_eq!(schema.default, Some(json!(1.5)));

        let schema = complement(r#"#[schema(default = "true")]"#, Schema::primitive(PrimitiveType::Bool)).unwrap();
        assert_eq!(schema.default, Some(json!(true)));

        let err = complement(r#"#[schema(default = "five")]"#, Schema::primitive(PrimitiveType::I64)).unwrap_err();
        assert!(matches!(err, Error::AnnotationConflict { .. }));
    }

    #[test]
    fn test_enums_are_coerced() {
        let schema = complement(r#"#[schema(enums = "1,2,3")]"#, Schema::primitive(PrimitiveType::I64)).unwrap();
        assert_eq!(schema.enum_values, Some(vec![json!(1), json!(2), json!(3)]));

        let schema = complement(r#"#[schema(enums = "a, b")]"#, Schema::primitive(PrimitiveType::String)).unwrap();
        assert_eq!(schema.enum_values, Some(vec![json!("a"), json!("b")]));

        let schema = complement(
            r#"#[schema(enums = "1,2")]"#,
            Schema::array(Schema::primitive(PrimitiveType::I32)),
        )
        .unwrap();
        assert_eq!(schema.enum_values, None);
        assert_eq!(schema.items.unwrap().enum_values, Some(vec![json!(1), json!(2)]));
    }

    #[test]
    fn test_enums_conflict_with_non_scalar_types() {
        let err = complement(r#"#[schema(enums = "1,2,3")]"#, Schema::primitive(PrimitiveType::Bool)).unwrap_err();
        assert!(matches!(err, Error::AnnotationConflict { ref field, .. } if field == "created_at"));
        assert!(complement(r#"#[schema(enums = "1")]"#, Schema::reference("a.B")).is_err());
        assert!(complement(r#"#[schema(enums = "x")]"#, Schema::primitive(PrimitiveType::I32)).is_err());
    }

    #[test]
    fn test_bounds() {
        let schema = complement(
            "#[schema(minimum = 1, maximum = 10, multiple_of = 2)]",
            Schema::primitive(PrimitiveType::I32),
        )
        .unwrap();
        assert_eq!((schema.minimum, schema.maximum, schema.multiple_of), (Some(1.0), Some(10.0), Some(2.0)));

        let schema = complement(
            "#[validate(range(min = 0, max = 99), length(min = 1))]",
            Schema::primitive(PrimitiveType::I32),
        );
        assert!(schema.is_err(), "length on an integer must conflict");

        let schema = complement("#[garde(length(min = 2, max = 8))]", Schema::primitive(PrimitiveType::String)).unwrap();
        assert_eq!((schema.min_length, schema.max_length), (Some(2), Some(8)));

        let schema = complement(
            "#[schema(min_length = 1)]",
            Schema::array(Schema::primitive(PrimitiveType::String)),
        )
        .unwrap();
        assert_eq!(schema.min_items, Some(1));

        assert!(complement("#[schema(minimum = 1)]", Schema::primitive(PrimitiveType::String)).is_err());
    }

    #[test]
    fn test_string_encoded_fields() {
        let schema = complement(r#"#[serde_as(as = "DisplayFromStr")]"#, Schema::primitive(PrimitiveType::I64)).unwrap();
        assert_eq!(schema.schema_type.as_deref(), Some("string"));
        assert_eq!(schema.format, None);
        assert_eq!(schema.example, Some(json!("0")));

        let schema = complement(
            r#"#[serde_as(as = "DisplayFromStr")] #[schema(example = "42")]"#,
            Schema::primitive(PrimitiveType::I64),
        )
        .unwrap();
        assert_eq!(schema.example, Some(json!("42")));

        let schema = complement("#[schema(string)]", Schema::primitive(PrimitiveType::Bool)).unwrap();
        assert_eq!(schema.example, Some(json!("false")));
    }

    #[test]
    fn test_read_only_reference_is_wrapped() {
        let shared = Schema::reference("web.Post");
        let schema = complement("#[schema(readonly)]", shared.clone()).unwrap();
        assert_eq!(
            schema.all_of,
            Some(vec![
                shared,
                Schema {
                    read_only: Some(true),
                    ..Schema::default()
                }
            ])
        );
        assert!(schema.reference.is_none());

        let schema = complement("#[schema(readonly)]", Schema::primitive(PrimitiveType::I64)).unwrap();
        assert_eq!(schema.read_only, Some(true));
    }

    #[test]
    fn test_extensions() {
        let schema = complement(
            r#"#[schema(extensions = "x-nullable,!x-omitempty,x-owner=team")]"#,
            Schema::primitive(PrimitiveType::I64),
        )
        .unwrap();
        assert_eq!(schema.extensions.get("x-nullable"), Some(&json!(true)));
        assert_eq!(schema.extensions.get("x-omitempty"), Some(&json!(false)));
        assert_eq!(schema.extensions.get("x-owner"), Some(&json!("team")));

        assert!(complement(r#"#[schema(extensions = "nullable")]"#, Schema::primitive(PrimitiveType::I64)).is_err());
    }

    #[test]
    fn test_custom_schema_type_and_format() {
        let schema = complement(r#"#[schema(schema_type = "array,integer")]"#, Schema::object()).unwrap();
        assert_eq!(schema, Schema::array(Schema::of_type("integer")));

        let schema = complement(r#"#[schema(schema_type = "primitive,string", format = "email")]"#, Schema::object())
            .unwrap();
        assert_eq!(schema.schema_type.as_deref(), Some("string"));
        assert_eq!(schema.format.as_deref(), Some("email"));

        assert!(complement(r#"#[schema(schema_type = "tuple")]"#, Schema::object()).is_err());

        let config = SynthesisConfig::default();
        let schema = FieldParser::new(&config, None)
            .complement(Schema::primitive(PrimitiveType::String), &field("#[validate(email)]", "String"))
            .unwrap();
        assert_eq!(schema.format.as_deref(), Some("email"));
    }

    #[test]
    fn test_doc_comment_becomes_description() {
        let config = SynthesisConfig::default();
        let parser = FieldParser::new(&config, None);
        let schema = parser
            .complement(Schema::primitive(PrimitiveType::I64), &field("/// Creation time", "i64"))
            .unwrap();
        assert_eq!(schema.description.as_deref(), Some("Creation time"));

        let schema = parser
            .complement(Schema::reference("a.B"), &field("/// Owner", "i64"))
            .unwrap();
        assert_eq!(schema.all_of, Some(vec![Schema::reference("a.B")]));
        assert_eq!(schema.description.as_deref(), Some("Owner"));
    }
}
