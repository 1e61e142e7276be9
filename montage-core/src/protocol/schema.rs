//! Shallow prop-schema validation.

use crate::error::ProtocolError;
use serde_json::Value;
use std::collections::HashMap;

/// What a single prop key is expected to hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// The value itself must have this JSON-ish type name (`"number"`,
    /// `"string"`, `"bool"`, `"object"`, `"array"`).
    Single(&'static str),
    /// The value must be a JSON array whose elements each match one of
    /// these type names, positionally.
    Tuple(Vec<&'static str>),
}

pub type PropSchema = HashMap<&'static str, FieldType>;

fn type_name_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate `props` against `schema`. Missing keys or type mismatches fail
/// with [`ProtocolError::Validation`]; extra keys not named in the schema
/// are ignored.
pub fn validate(props: &Value, schema: &PropSchema) -> Result<(), ProtocolError> {
    let obj = props
        .as_object()
        .ok_or_else(|| ProtocolError::Validation("props must be a JSON object".into()))?;

    for (key, field) in schema {
        let value = obj
            .get(*key)
            .ok_or_else(|| ProtocolError::Validation(format!("missing required field {key:?}")))?;
        match field {
            FieldType::Single(expected) => {
                let got = type_name_of(value);
                if got != *expected {
                    return Err(ProtocolError::Validation(format!(
                        "field {key:?}: expected {expected}, got {got}"
                    )));
                }
            }
            FieldType::Tuple(types) => {
                let items = value.as_array().ok_or_else(|| {
                    ProtocolError::Validation(format!("field {key:?}: expected array"))
                })?;
                if items.len() != types.len() {
                    return Err(ProtocolError::Validation(format!(
                        "field {key:?}: expected {} elements, got {}",
                        types.len(),
                        items.len()
                    )));
                }
                for (item, expected) in items.iter().zip(types.iter()) {
                    let got = type_name_of(item);
                    if got != *expected {
                        return Err(ProtocolError::Validation(format!(
                            "field {key:?}: element expected {expected}, got {got}"
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_required_fields() {
        let mut schema = PropSchema::new();
        schema.insert("range", FieldType::Tuple(vec!["number", "number"]));
        schema.insert("montage", FieldType::Single("string"));

        let ok = json!({"range": [0.0, 10.0], "montage": "default"});
        assert!(validate(&ok, &schema).is_ok());

        let missing = json!({"range": [0.0, 10.0]});
        assert!(validate(&missing, &schema).is_err());

        let wrong_type = json!({"range": [0.0, "ten"], "montage": "default"});
        assert!(validate(&wrong_type, &schema).is_err());
    }
}
