//! Key-value entry type

use serde::{Deserialize, Serialize};

/// A key/value pair held by the key-value store.
///
/// Missing fields deserialize to empty strings so that a request body without
/// a `key` reaches the store and is rejected there as an invalid key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default_to_empty() {
        let entry: Entry = serde_json::from_str(r#"{"value":"v"}"#).unwrap();
        assert_eq!(entry, Entry::new("", "v"));
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&Entry::new("test", "testValue")).unwrap();
        assert_eq!(json, r#"{"key":"test","value":"testValue"}"#);
    }
}
