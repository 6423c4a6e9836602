//! Content hashing for MSR parameter objects.
//!
//! Two parameter objects that are structurally equal after normalization must
//! hash identically, and any field difference must hash differently, so the
//! digest canonicalizes the JSON form: recursively sorted keys, `,`/`:`
//! separators with no extra whitespace, UTF-8 text kept unescaped.

use serde_json::Value;
use sha1::{Digest, Sha1};

use crate::config::CacheConfig;
use crate::constants::hashing::{FIELD_RESOLUTION, FIELD_VERSION};
use crate::errors::ExtractError;
use crate::request::AggregateSelection;
use crate::types::ParamHash;

/// Merge the fixed resolution and version constants into a selection's
/// parameter object, producing the object that gets hashed and stored on the
/// MSR entry.
pub fn normalized_params(
    selection: &AggregateSelection,
    config: &CacheConfig,
) -> Result<Value, ExtractError> {
    let mut object = match serde_json::to_value(selection)? {
        Value::Object(map) => map,
        other => {
            return Err(ExtractError::MalformedRequest(format!(
                "aggregate selection serialized to non-object JSON: {other}"
            )));
        }
    };
    object.insert(FIELD_RESOLUTION.to_string(), Value::from(config.msr_resolution));
    object.insert(FIELD_VERSION.to_string(), Value::from(config.msr_version));
    Ok(Value::Object(object))
}

/// SHA-1 hex digest of the canonical JSON serialization of `value`.
pub fn param_hash(value: &Value) -> Result<ParamHash, ExtractError> {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical)?;
    let mut hasher = Sha1::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

fn write_canonical(value: &Value, out: &mut String) -> Result<(), ExtractError> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by_key(|(key, _)| *key);
            out.push('{');
            for (idx, (key, nested)) in entries.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(nested, out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        leaf => out.push_str(&serde_json::to_string(leaf)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical(value: &Value) -> String {
        let mut out = String::new();
        write_canonical(value, &mut out).expect("canonical form");
        out
    }

    #[test]
    fn canonical_form_sorts_keys_recursively() {
        let value = json!({
            "b": 1,
            "a": {"z": true, "m": [1, 2]},
            "c": "x"
        });
        assert_eq!(canonical(&value), r#"{"a":{"m":[1,2],"z":true},"b":1,"c":"x"}"#);
    }

    #[test]
    fn canonical_form_uses_compact_separators() {
        let value = json!({"resolution": 0.05, "version": 0.1});
        assert_eq!(canonical(&value), r#"{"resolution":0.05,"version":0.1}"#);
    }

    #[test]
    fn hash_is_deterministic_and_order_independent() {
        let mut forward = serde_json::Map::new();
        forward.insert("dataset".into(), json!("geocoded_aid"));
        forward.insert("sector".into(), json!("110"));
        let mut reversed = serde_json::Map::new();
        reversed.insert("sector".into(), json!("110"));
        reversed.insert("dataset".into(), json!("geocoded_aid"));

        let a = param_hash(&Value::Object(forward)).unwrap();
        let b = param_hash(&Value::Object(reversed)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_changes_when_any_field_changes() {
        let base = json!({"dataset": "geocoded_aid", "sector": "110"});
        let changed = json!({"dataset": "geocoded_aid", "sector": "111"});
        let extended = json!({"dataset": "geocoded_aid", "sector": "110", "year": 2001});
        let digest = param_hash(&base).unwrap();
        assert_ne!(digest, param_hash(&changed).unwrap());
        assert_ne!(digest, param_hash(&extended).unwrap());
    }

    #[test]
    fn normalization_merges_resolution_and_version() {
        let selection: AggregateSelection = serde_json::from_value(json!({
            "dataset": "geocoded_aid",
            "sector": "110"
        }))
        .unwrap();
        let config = CacheConfig::default();
        let params = normalized_params(&selection, &config).unwrap();
        assert_eq!(params["dataset"], "geocoded_aid");
        assert_eq!(params["resolution"], 0.05);
        assert_eq!(params["version"], 0.1);
    }

    #[test]
    fn normalization_is_what_distinguishes_versions() {
        let selection: AggregateSelection =
            serde_json::from_value(json!({"dataset": "geocoded_aid"})).unwrap();
        let current = CacheConfig::default();
        let bumped = CacheConfig {
            msr_version: 0.2,
            ..CacheConfig::default()
        };
        let a = param_hash(&normalized_params(&selection, &current).unwrap()).unwrap();
        let b = param_hash(&normalized_params(&selection, &bumped).unwrap()).unwrap();
        assert_ne!(a, b);
    }
}
