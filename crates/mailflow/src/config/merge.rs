use serde_json::Value;

/// Recursively merges `overlay` into `base`.
///
/// Objects merge key by key; arrays and scalars (including `null`) replace
/// the base value wholesale.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let nested =
                    value.is_object() && matches!(base_map.get(&key), Some(Value::Object(_)));
                if nested {
                    if let Some(existing) = base_map.get_mut(&key) {
                        deep_merge(existing, value);
                    }
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
