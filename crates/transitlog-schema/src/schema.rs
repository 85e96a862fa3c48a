//! Record schemas in the Avro JSON schema dialect.
//!
//! Only the subset used by transitlog records is understood: records of
//! primitive fields, enums, unions (typically `["null", T]`) and nested
//! records.

use serde_json::{Map, Value};

use crate::SchemaError;

/// The type of a single record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    Enum { name: String, symbols: Vec<String> },
    Union(Vec<FieldType>),
    Record(Box<Schema>),
}

impl FieldType {
    fn parse(value: &Value) -> Result<Self, SchemaError> {
        match value {
            Value::String(name) => Self::primitive(name),
            Value::Array(branches) => {
                if branches.is_empty() {
                    return Err(SchemaError::InvalidSchema("empty union".to_string()));
                }
                branches
                    .iter()
                    .map(Self::parse)
                    .collect::<Result<Vec<_>, _>>()
                    .map(FieldType::Union)
            }
            Value::Object(obj) => match obj.get("type").and_then(Value::as_str) {
                Some("enum") => {
                    let name = required_str(obj, "name")?.to_string();
                    let symbols = obj
                        .get("symbols")
                        .and_then(Value::as_array)
                        .ok_or_else(|| {
                            SchemaError::InvalidSchema(format!("enum {name} has no symbols"))
                        })?
                        .iter()
                        .map(|s| {
                            s.as_str().map(str::to_string).ok_or_else(|| {
                                SchemaError::InvalidSchema(format!(
                                    "enum {name} has a non-string symbol"
                                ))
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(FieldType::Enum { name, symbols })
                }
                Some("record") => Ok(FieldType::Record(Box::new(Schema::from_value(value)?))),
                Some(name) => Self::primitive(name),
                None => Err(SchemaError::InvalidSchema(
                    "complex type without a \"type\" attribute".to_string(),
                )),
            },
            other => Err(SchemaError::InvalidSchema(format!(
                "unsupported type declaration: {other}"
            ))),
        }
    }

    fn primitive(name: &str) -> Result<Self, SchemaError> {
        match name {
            "null" => Ok(FieldType::Null),
            "boolean" => Ok(FieldType::Boolean),
            "int" => Ok(FieldType::Int),
            "long" => Ok(FieldType::Long),
            "float" => Ok(FieldType::Float),
            "double" => Ok(FieldType::Double),
            "string" => Ok(FieldType::String),
            other => Err(SchemaError::InvalidSchema(format!(
                "unsupported primitive type: {other}"
            ))),
        }
    }

    /// Checks `value` against this type. Returns a reason on mismatch.
    fn check(&self, value: &Value, path: &str) -> Result<(), (String, String)> {
        let mismatch = |reason: String| Err((path.to_string(), reason));

        match (self, value) {
            (FieldType::Null, Value::Null)
            | (FieldType::Boolean, Value::Bool(_))
            | (FieldType::String, Value::String(_)) => Ok(()),
            (FieldType::Int, Value::Number(n)) => match n.as_i64() {
                Some(i) if i32::try_from(i).is_ok() => Ok(()),
                _ => mismatch(format!("{n} is not a 32-bit integer")),
            },
            (FieldType::Long, Value::Number(n)) => {
                if n.is_i64() {
                    Ok(())
                } else {
                    mismatch(format!("{n} is not a 64-bit integer"))
                }
            }
            (FieldType::Float | FieldType::Double, Value::Number(_)) => Ok(()),
            (FieldType::Enum { name, symbols }, Value::String(s)) => {
                if symbols.iter().any(|sym| sym == s) {
                    Ok(())
                } else {
                    mismatch(format!("{s:?} is not a symbol of enum {name}"))
                }
            }
            (FieldType::Union(branches), v) => {
                if branches.iter().any(|b| b.check(v, path).is_ok()) {
                    Ok(())
                } else {
                    mismatch(format!("{v} matches no branch of the union"))
                }
            }
            (FieldType::Record(schema), Value::Object(_)) => schema.check(value, path),
            (expected, v) => mismatch(format!("expected {}, found {v}", expected.describe())),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            FieldType::Null => "null",
            FieldType::Boolean => "boolean",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::String => "string",
            FieldType::Enum { .. } => "enum",
            FieldType::Union(_) => "union",
            FieldType::Record(_) => "record",
        }
    }
}

/// A named field of a record schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    /// Value assumed when the field is absent.
    pub default: Option<Value>,
}

/// A record schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    namespace: Option<String>,
    fields: Vec<Field>,
    /// Compact JSON of the source document with sorted keys.
    canonical: String,
}

impl Schema {
    /// Parses a schema from its JSON document.
    pub fn parse(json: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Parses a schema from an already-decoded JSON document.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let obj = value
            .as_object()
            .ok_or_else(|| SchemaError::InvalidSchema("schema must be a JSON object".to_string()))?;

        if obj.get("type").and_then(Value::as_str) != Some("record") {
            return Err(SchemaError::InvalidSchema(
                "top-level schema must be a record".to_string(),
            ));
        }

        let name = required_str(obj, "name")?.to_string();
        let namespace = obj
            .get("namespace")
            .and_then(Value::as_str)
            .map(str::to_string);

        let raw_fields = obj
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| SchemaError::InvalidSchema(format!("record {name} has no fields")))?;

        let mut fields: Vec<Field> = Vec::with_capacity(raw_fields.len());
        for raw in raw_fields {
            let field_obj = raw.as_object().ok_or_else(|| {
                SchemaError::InvalidSchema(format!("record {name} has a non-object field"))
            })?;
            let field_name = required_str(field_obj, "name")?.to_string();
            if fields.iter().any(|f| f.name == field_name) {
                return Err(SchemaError::InvalidSchema(format!(
                    "record {name} declares field {field_name} twice"
                )));
            }
            let field_type = FieldType::parse(field_obj.get("type").ok_or_else(|| {
                SchemaError::InvalidSchema(format!("field {field_name} has no type"))
            })?)?;
            fields.push(Field {
                name: field_name,
                field_type,
                default: field_obj.get("default").cloned(),
            });
        }

        Ok(Self {
            name,
            namespace,
            fields,
            canonical: serde_json::to_string(value)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns `namespace.name`, or just the name without a namespace.
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the canonical JSON form of the schema.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Returns a stable fingerprint of the canonical form.
    pub fn fingerprint(&self) -> [u8; 32] {
        *blake3::hash(self.canonical.as_bytes()).as_bytes()
    }

    /// Validates a JSON document against this schema.
    ///
    /// Every declared field must be present unless it has a default, and no
    /// undeclared field may appear.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaError> {
        self.check(value, "$").map_err(|(path, reason)| SchemaError::Mismatch {
            schema: self.full_name(),
            path,
            reason,
        })
    }

    fn check(&self, value: &Value, path: &str) -> Result<(), (String, String)> {
        let Some(obj) = value.as_object() else {
            return Err((path.to_string(), format!("expected record, found {value}")));
        };

        for field in &self.fields {
            let field_path = format!("{path}.{}", field.name);
            match obj.get(&field.name) {
                Some(v) => field.field_type.check(v, &field_path)?,
                None if field.default.is_some() => {}
                None => return Err((field_path, "missing required field".to_string())),
            }
        }

        if let Some(extra) = obj
            .keys()
            .find(|k| !self.fields.iter().any(|f| &f.name == *k))
        {
            return Err((format!("{path}.{extra}"), "field not declared in schema".to_string()));
        }

        Ok(())
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a str, SchemaError> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::InvalidSchema(format!("missing \"{key}\" attribute")))
}
