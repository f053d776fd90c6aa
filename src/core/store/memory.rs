//! Process-local store.

use std::collections::HashMap;
use std::sync::RwLock;

use super::SecretStore;
use crate::error::Result;

/// In-memory secret store, used for embedding and tests.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store pre-populated with `values`.
    pub fn with_values<I, K, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new(name);
        {
            let mut map = store.values.write().unwrap_or_else(|e| e.into_inner());
            map.extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
        }
        store
    }

    /// Number of stored secrets.
    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the store holds no secrets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecretStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, secret_id: &str) -> Result<Option<String>> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(secret_id).cloned())
    }

    fn set(&self, secret_id: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(secret_id.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_is_none() {
        let store = MemoryStore::new("mem");
        assert_eq!(store.get("nope").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_then_get() {
        let store = MemoryStore::with_values("mem", [("a", "1")]);
        store.set("a", "2").unwrap();
        store.set("b", "3").unwrap();

        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("3"));
        assert_eq!(store.len(), 2);
    }
}
