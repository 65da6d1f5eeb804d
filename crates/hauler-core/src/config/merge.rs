use serde_json::Value;

/// Recursively merge `patch` into `base`.
///
/// Objects merge key by key; any other value replaces the base value.
/// `null` in the patch is ignored, so a patch can never erase a setting.
pub fn deep_merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                if value.is_null() {
                    continue;
                }
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merges_nested_objects() {
        let mut base = json!({"server": {"url": "http://a", "timeoutSeconds": 30}, "runner": {"concurrency": 1}});
        deep_merge(&mut base, json!({"server": {"url": "http://b"}}));
        assert_eq!(
            base,
            json!({"server": {"url": "http://b", "timeoutSeconds": 30}, "runner": {"concurrency": 1}})
        );
    }

    #[test]
    fn ignores_nulls() {
        let mut base = json!({"server": {"token": "secret"}});
        deep_merge(&mut base, json!({"server": {"token": null}}));
        deep_merge(&mut base, Value::Null);
        assert_eq!(base, json!({"server": {"token": "secret"}}));
    }

    #[test]
    fn arrays_and_scalars_replace() {
        let mut base = json!({"runner": {"jobKindFilter": ["command", "labAnalysis"]}});
        deep_merge(&mut base, json!({"runner": {"jobKindFilter": ["bundleStats"]}}));
        assert_eq!(base["runner"]["jobKindFilter"], json!(["bundleStats"]));
    }

    #[test]
    fn adds_missing_keys() {
        let mut base = json!({});
        deep_merge(&mut base, json!({"log": {"format": "json"}}));
        assert_eq!(base, json!({"log": {"format": "json"}}));
    }
}
