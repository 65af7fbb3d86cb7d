//! Blob column encoding.
//!
//! The blob is a JSON object whose keys are column names and whose values
//! are scalars. Keys are written in name order, so identical maps always
//! produce identical text.

use crate::error::{CodecError, CodecResult};
use crate::value::{ColumnMap, Value};
use serde_json::Value as Json;

/// Text stored in the blob column of a freshly inserted row.
pub const EMPTY_BLOB: &str = "{}";

/// Encode a column map to blob text.
///
/// # Errors
///
/// Returns [`CodecError::NonFiniteFloat`] for NaN or infinite floats, which
/// JSON cannot represent.
pub fn encode_blob(columns: &ColumnMap) -> CodecResult<String> {
    if let Some((column, _)) = columns.iter().find(|(_, v)| !v.is_storable()) {
        return Err(CodecError::NonFiniteFloat {
            column: column.clone(),
        });
    }
    serde_json::to_string(columns).map_err(|e| CodecError::encoding_failed(e.to_string()))
}

/// Decode blob text into a column map.
///
/// Empty text and an empty JSON array both decode to an empty map; older
/// writers used `[]` for "no fields". JSON booleans normalize to 0/1.
///
/// # Errors
///
/// Returns an error if the text is not JSON, is not an object, or holds a
/// composite value.
pub fn decode_blob(text: &str) -> CodecResult<ColumnMap> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(ColumnMap::new());
    }

    let json: Json =
        serde_json::from_str(text).map_err(|e| CodecError::decoding_failed(e.to_string()))?;

    match json {
        Json::Object(fields) => fields
            .into_iter()
            .map(|(column, value)| {
                let value = scalar_from_json(&column, value)?;
                Ok((column, value))
            })
            .collect(),
        Json::Array(items) if items.is_empty() => Ok(ColumnMap::new()),
        other => Err(CodecError::invalid_structure(format!(
            "expected an object, found {}",
            json_kind(&other)
        ))),
    }
}

fn scalar_from_json(column: &str, value: Json) -> CodecResult<Value> {
    match value {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::from(b)),
        Json::String(s) => Ok(Value::Text(s)),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Integer(i))
            } else if n.is_u64() {
                Err(CodecError::IntegerOverflow {
                    column: column.to_string(),
                })
            } else {
                n.as_f64().map(Value::Float).ok_or_else(|| {
                    CodecError::decoding_failed(format!("unreadable number in '{column}'"))
                })
            }
        }
        other => Err(CodecError::invalid_structure(format!(
            "column '{column}' holds a composite {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns;

    #[test]
    fn encoding_is_key_ordered() {
        let map = columns! { "zeta" => 1, "alpha" => "a" };
        assert_eq!(encode_blob(&map).unwrap(), r#"{"alpha":"a","zeta":1}"#);
    }

    #[test]
    fn empty_forms_decode_to_empty_map() {
        assert!(decode_blob("").unwrap().is_empty());
        assert!(decode_blob("[]").unwrap().is_empty());
        assert!(decode_blob(EMPTY_BLOB).unwrap().is_empty());
    }

    #[test]
    fn scalars_survive_a_roundtrip() {
        let map = columns! {
            "n" => 7,
            "neg" => -12,
            "f" => 2.5,
            "whole" => 3.0,
            "s" => "text \"quoted\"",
            "gone" => Value::Null,
        };
        let decoded = decode_blob(&encode_blob(&map).unwrap()).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn json_booleans_normalize() {
        let map = decode_blob(r#"{"on":true,"off":false}"#).unwrap();
        assert_eq!(map["on"], Value::Integer(1));
        assert_eq!(map["off"], Value::Integer(0));
    }

    #[test]
    fn composite_values_are_rejected() {
        let err = decode_blob(r#"{"tags":["a"]}"#).unwrap_err();
        assert!(matches!(err, CodecError::InvalidStructure { .. }));

        let err = decode_blob(r#"{"nested":{"a":1}}"#).unwrap_err();
        assert!(matches!(err, CodecError::InvalidStructure { .. }));
    }

    #[test]
    fn non_object_root_is_rejected() {
        assert!(matches!(
            decode_blob("[1,2]").unwrap_err(),
            CodecError::InvalidStructure { .. }
        ));
        assert!(matches!(
            decode_blob("42").unwrap_err(),
            CodecError::InvalidStructure { .. }
        ));
        assert!(matches!(
            decode_blob("{not json").unwrap_err(),
            CodecError::DecodingFailed { .. }
        ));
    }

    #[test]
    fn oversized_integer_is_rejected() {
        let err = decode_blob(r#"{"big":18446744073709551615}"#).unwrap_err();
        assert_eq!(
            err,
            CodecError::IntegerOverflow {
                column: "big".into()
            }
        );
    }

    #[test]
    fn non_finite_float_cannot_be_encoded() {
        let map = columns! { "ratio" => f64::NAN };
        assert_eq!(
            encode_blob(&map).unwrap_err(),
            CodecError::NonFiniteFloat {
                column: "ratio".into()
            }
        );
    }
}
