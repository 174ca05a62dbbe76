//! Option merging

use kite_core::domain::Record;
use serde_json::Value;

/// Deep-merge `overrides` into `base`
///
/// Nested objects are merged key by key; any other value in `overrides`
/// replaces the one in `base`.
pub fn merge_options(mut base: Record, overrides: &Record) -> Record {
    for (key, value) in overrides {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                let merged = merge_options(std::mem::take(existing), nested);
                *existing = merged;
            }
            (_, Value::Object(nested)) => {
                base.insert(key.clone(), Value::Object(merge_options(Record::new(), nested)));
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }

    base
}
