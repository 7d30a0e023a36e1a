//! Request parameter shaping for the Ci REST surface.
//!
//! Ci expects lowerCamelCase parameter names while Rust callers naturally
//! write snake_case. Only top-level names are rewritten; values, including
//! nested objects and arrays, pass through untouched. Request structs that
//! need camelCase names below the top level declare them with serde
//! attributes.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind};

/// Convert a snake_case identifier to lowerCamelCase. Already-camelCase
/// input comes back unchanged.
pub(crate) fn camelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Serialize `params` and rewrite its top-level keys for the wire.
///
/// `params` must serialize to a JSON object or to null; null (the unit
/// type, for callers with nothing to send) becomes an empty map.
pub(crate) fn to_wire_params<P>(params: &P) -> Result<Map<String, Value>, Error>
where
    P: Serialize + ?Sized,
{
    let value = serde_json::to_value(params).map_err(|source| {
        Error::with_source(
            ErrorKind::Other,
            "request parameters could not be serialized",
            source,
        )
    })?;

    match value {
        Value::Null => Ok(Map::new()),
        Value::Object(fields) => {
            let mut wire = Map::new();
            for (key, value) in fields {
                wire.insert(camelize(&key), value);
            }
            Ok(wire)
        }
        other => Err(Error::new(
            ErrorKind::Other,
            format!(
                "request parameters must serialize to a JSON object, got {}",
                json_type_name(&other)
            ),
        )),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn camelizes_snake_case_names() {
        assert_eq!(camelize("created_by"), "createdBy");
        assert_eq!(camelize("first_name_initial"), "firstNameInitial");
        assert_eq!(camelize("query"), "query");
    }

    #[test]
    fn camelize_is_a_no_op_on_camel_case_names() {
        assert_eq!(camelize("createdBy"), "createdBy");
        assert_eq!(camelize(&camelize("created_by")), "createdBy");
    }

    #[test]
    fn camelize_swallows_repeated_and_trailing_underscores() {
        assert_eq!(camelize("created__by"), "createdBy");
        assert_eq!(camelize("created_by_"), "createdBy");
    }

    #[test]
    fn rewrites_only_top_level_keys() {
        let wire = to_wire_params(&json!({
            "created_by": "me",
            "filter_spec": { "media_type": "video", "tags": ["a_b"] },
        }))
        .unwrap();

        assert_eq!(wire.get("createdBy"), Some(&json!("me")));
        let nested = wire.get("filterSpec").unwrap();
        assert_eq!(nested.get("media_type"), Some(&json!("video")));
        assert_eq!(nested.get("tags"), Some(&json!(["a_b"])));
    }

    #[test]
    fn unit_params_become_an_empty_map() {
        let wire = to_wire_params(&()).unwrap();
        assert!(wire.is_empty());
    }

    #[test]
    fn non_object_params_are_rejected() {
        let error = to_wire_params(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Other);
        assert!(error.to_string().contains("JSON object"));
    }
}
