use serde_json::Value;

use crate::types::Tree;

/// Deep-merge `overlay` on top of `base`.
/// If both sides have a mapping for the same key, recurse.
/// Otherwise, `overlay`'s value wins. Sequences are replaced, never concatenated.
pub fn deep_merge(mut base: Tree, overlay: Tree) -> Tree {
    for (key, overlay_val) in overlay {
        // Merge in place so an overridden key keeps its original position.
        let merged = match (base.get_mut(&key), overlay_val) {
            (Some(Value::Object(base_map)), Value::Object(overlay_map)) => {
                Value::Object(deep_merge(std::mem::take(base_map), overlay_map))
            }
            (_, overlay_val) => overlay_val,
        };
        base.insert(key, merged);
    }
    base
}

/// Same rule as [`deep_merge`] for arbitrary values. A non-mapping overlay
/// replaces the base wholesale instead of failing.
pub fn merge_value(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            Value::Object(deep_merge(base_map, overlay_map))
        }
        (_, overlay) => overlay,
    }
}
