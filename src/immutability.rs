//! Payload mutation detection between snapshots.
//!
//! Handlers receive the payload read-only; mutation is reserved for mergers.
//! To catch handlers (or anything else holding a reference) writing through
//! interior mutability, the engine can snapshot the payload before handling
//! and diff it afterwards. The snapshot is a deep serde copy - never the
//! payload itself - so in-place edits cannot produce false negatives.
//!
//! Enforcement is configurable per reactor through
//! [`ImmutabilityControlLevel`]; `NoControl` skips the protocol entirely.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a detected payload mutation is treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImmutabilityControlLevel {
    /// Fastest mode: no snapshot, no comparison.
    #[default]
    NoControl,
    /// Log a warning and continue.
    LogWarn,
    /// Log an error and continue.
    LogError,
    /// Treat the mutation as a handling failure.
    Raise,
}

/// Deep, comparison-capable copy of a payload taken before handling.
#[derive(Clone, Debug)]
pub struct PayloadSnapshot(Value);

/// Take a snapshot of the payload, or `None` if it cannot be serialized.
///
/// An unserializable payload disables the check for that invocation; it never
/// fails the execution.
pub fn take_snapshot<P: Serialize>(payload: &P) -> Option<PayloadSnapshot> {
    match serde_json::to_value(payload) {
        Ok(value) => Some(PayloadSnapshot(value)),
        Err(err) => {
            tracing::warn!(error = %err, "payload snapshot failed; mutation check skipped");
            None
        }
    }
}

/// Compare a snapshot against the current payload state.
///
/// Returns a description naming the first differing field, or `None` when the
/// payload is unchanged.
pub fn diff<P: Serialize>(snapshot: &PayloadSnapshot, payload: &P) -> Option<String> {
    let current = match serde_json::to_value(payload) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "payload re-serialization failed; mutation check skipped");
            return None;
        }
    };
    value_diff(&snapshot.0, &current, "payload")
}

fn value_diff(before: &Value, after: &Value, path: &str) -> Option<String> {
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => {
            for (key, before_value) in b {
                match a.get(key) {
                    Some(after_value) => {
                        if let Some(found) =
                            value_diff(before_value, after_value, &format!("{path}.{key}"))
                        {
                            return Some(found);
                        }
                    }
                    None => return Some(format!("field {path}.{key} removed")),
                }
            }
            for key in a.keys() {
                if !b.contains_key(key) {
                    return Some(format!("field {path}.{key} added"));
                }
            }
            None
        }
        (Value::Array(b), Value::Array(a)) => {
            if b.len() != a.len() {
                return Some(format!(
                    "field {path} length changed: {} -> {}",
                    b.len(),
                    a.len()
                ));
            }
            for (i, (before_value, after_value)) in b.iter().zip(a.iter()).enumerate() {
                if let Some(found) = value_diff(before_value, after_value, &format!("{path}[{i}]"))
                {
                    return Some(found);
                }
            }
            None
        }
        (b, a) if b == a => None,
        (b, a) => Some(format!("field {path} changed: {b} -> {a}")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct Doc {
        title: String,
        tags: Vec<String>,
        meta: serde_json::Map<String, Value>,
    }

    fn doc() -> Doc {
        Doc {
            title: "a".into(),
            tags: vec!["x".into(), "y".into()],
            meta: serde_json::Map::new(),
        }
    }

    #[test]
    fn unchanged_payload_has_no_diff() {
        let payload = doc();
        let snapshot = take_snapshot(&payload).unwrap();
        assert_eq!(diff(&snapshot, &payload), None);
    }

    #[test]
    fn scalar_change_names_the_field() {
        let mut payload = doc();
        let snapshot = take_snapshot(&payload).unwrap();
        payload.title = "b".into();
        let found = diff(&snapshot, &payload).unwrap();
        assert!(found.contains("payload.title"), "diff was: {found}");
    }

    #[test]
    fn array_growth_is_reported_as_length_change() {
        let mut payload = doc();
        let snapshot = take_snapshot(&payload).unwrap();
        payload.tags.push("z".into());
        let found = diff(&snapshot, &payload).unwrap();
        assert!(found.contains("payload.tags"), "diff was: {found}");
        assert!(found.contains("2 -> 3"), "diff was: {found}");
    }

    #[test]
    fn nested_element_change_names_the_index() {
        let mut payload = doc();
        let snapshot = take_snapshot(&payload).unwrap();
        payload.tags[1] = "changed".into();
        let found = diff(&snapshot, &payload).unwrap();
        assert!(found.contains("payload.tags[1]"), "diff was: {found}");
    }

    #[test]
    fn unserializable_payload_disables_the_check() {
        struct Opaque;

        impl Serialize for Opaque {
            fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("not serializable"))
            }
        }

        assert!(take_snapshot(&Opaque).is_none());
    }

    #[test]
    fn added_and_removed_keys_are_reported() {
        let mut payload = doc();
        let snapshot = take_snapshot(&payload).unwrap();
        payload.meta.insert("k".into(), json!(1));
        let found = diff(&snapshot, &payload).unwrap();
        assert!(found.contains("payload.meta.k added"), "diff was: {found}");

        let snapshot = take_snapshot(&payload).unwrap();
        payload.meta.clear();
        let found = diff(&snapshot, &payload).unwrap();
        assert!(found.contains("payload.meta.k removed"), "diff was: {found}");
    }
}
