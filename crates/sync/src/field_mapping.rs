use std::collections::HashMap;

/// Configurable remote-field → local-field rename table. Fields
/// absent from the mapping pass through under their remote name.
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    pub rename: HashMap<String, String>,
}

impl FieldMapping {
    pub fn new(rename: HashMap<String, String>) -> Self {
        Self { rename }
    }

    pub fn apply(&self, remote_fields: &serde_json::Value) -> serde_json::Value {
        let Some(object) = remote_fields.as_object() else {
            return remote_fields.clone();
        };
        let mut mapped = serde_json::Map::with_capacity(object.len());
        for (key, value) in object {
            let local_key = self.rename.get(key).cloned().unwrap_or_else(|| key.clone());
            mapped.insert(local_key, value.clone());
        }
        serde_json::Value::Object(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renamed_fields_use_local_name() {
        let mapping = FieldMapping::new(HashMap::from([("Title".to_string(), "title".to_string())]));
        let mapped = mapping.apply(&serde_json::json!({"Title": "Fix the thing", "Notes": "details"}));
        assert_eq!(mapped["title"], "Fix the thing");
        assert_eq!(mapped["Notes"], "details");
    }
}
