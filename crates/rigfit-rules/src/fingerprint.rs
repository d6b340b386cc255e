use std::collections::BTreeMap;

use rigfit_core::CompatibilityRule;
use serde_json::Value;
use sha2::{Digest, Sha256};

fn sort_json(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map.into_iter().map(|(k, v)| (k, sort_json(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(sort_json).collect()),
        other => other,
    }
}

/// SHA-256 hex over the canonical JSON of `rules`, deduplicated and sorted by id.
///
/// Order of the input does not matter. Any edit to a consulted rule changes the result.
pub fn ruleset_fingerprint<'a>(rules: impl IntoIterator<Item = &'a CompatibilityRule>) -> String {
    let by_id: BTreeMap<&str, &CompatibilityRule> = rules.into_iter().map(|r| (r.id.as_str(), r)).collect();
    let canonical: Vec<Value> = by_id
        .values()
        .map(|r| serde_json::to_value(r).map(sort_json).unwrap_or(Value::Null))
        .collect();
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
