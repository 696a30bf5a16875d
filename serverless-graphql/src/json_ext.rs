//! Performance oriented JSON manipulation.

use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
pub use serde_json_bytes::Value;

/// A JSON object.
pub type Object = Map<ByteString, Value>;

/// Shallow, ordered, last-write-wins merge of `other` into `target`.
///
/// Nested values are replaced wholesale. Keys already present keep their position.
pub(crate) fn merge_shallow(target: &mut Object, other: Object) {
    for (key, value) in other {
        target.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn merge_overrides_and_keeps_order() {
        let mut target = json!({"a": 1, "b": {"nested": true}, "c": 3})
            .as_object()
            .cloned()
            .unwrap();
        let other = json!({"b": {"other": 1}, "d": 4})
            .as_object()
            .cloned()
            .unwrap();

        merge_shallow(&mut target, other);

        assert_eq!(
            Value::Object(target.clone()),
            json!({"a": 1, "b": {"other": 1}, "c": 3, "d": 4})
        );
        let keys: Vec<&str> = target.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
    }
}
