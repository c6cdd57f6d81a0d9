//! JSON rendering of values and result groups.
//!
//! Output is deterministic: map keys are sorted, integer keys first.
//!
//! # Examples
//!
//! ```
//! use tally_lang::Value;
//! use tally_lang::output::{to_json, to_json_pretty};
//!
//! let value = Value::Integer(42);
//! assert_eq!(to_json(&value), "42");
//! assert_eq!(to_json_pretty(&value), "42");
//! ```

use crate::{context::ResultGroups, value::Value};

/// Result groups as a JSON object of objects.
pub fn results_to_json(results: &ResultGroups) -> serde_json::Value {
    serde_json::Value::Object(
        results
            .iter()
            .map(|(group, entries)| {
                let entries = entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                (group.clone(), serde_json::Value::Object(entries))
            })
            .collect(),
    )
}

/// Compact JSON text.
pub fn to_json(value: &Value) -> String {
    value.to_json().to_string()
}

/// JSON text with 2-space indentation.
pub fn to_json_pretty(value: &Value) -> String {
    // Serializing a serde_json::Value can't fail.
    serde_json::to_string_pretty(&value.to_json()).unwrap_or_default()
}

/// Renders result groups, compact or pretty.
pub fn render_results(results: &ResultGroups, pretty: bool) -> String {
    let json = results_to_json(results);
    if pretty {
        serde_json::to_string_pretty(&json).unwrap_or_default()
    } else {
        json.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_results_render_sorted() {
        let mut res = BTreeMap::new();
        res.insert("b".to_string(), Value::from(2));
        res.insert("a".to_string(), Value::from("x"));
        let mut groups = ResultGroups::new();
        groups.insert("res".to_string(), res);

        assert_eq!(render_results(&groups, false), r#"{"res":{"a":"x","b":2}}"#);
    }

    #[test]
    fn test_pretty_array() {
        let value = Value::Array(vec![Value::from(1), Value::Nil]);
        assert_eq!(to_json_pretty(&value), "[\n  1,\n  null\n]");
        assert_eq!(to_json(&value), "[1,null]");
    }
}
