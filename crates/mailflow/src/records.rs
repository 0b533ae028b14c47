//! Typed JSON records over a [`KvStore`].
//!
//! Reads never fail: a missing, unreadable or corrupted record degrades to
//! the caller's defaults with a warning.

use std::sync::{Arc, Mutex};

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::merge::deep_merge;
use crate::error::StoreError;
use crate::store::KvStore;

#[derive(Clone)]
pub struct Records {
    store: Arc<dyn KvStore>,
    /// Serializes read-modify-write cycles issued through `update`.
    write_lock: Arc<Mutex<()>>,
}

impl Records {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Reads a record, falling back to `T::default()`.
    pub fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let Some(raw) = self.read_raw(key) else {
            return T::default();
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Record '{}' is corrupted, using defaults: {}", key, e);
                T::default()
            }
        }
    }

    /// Reads a record and deep-merges it over `defaults`, so fields missing
    /// from the stored copy keep their default values.
    pub fn read_merged<T>(&self, key: &str, defaults: &T) -> T
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        let Some(raw) = self.read_raw(key) else {
            return defaults.clone();
        };

        let stored: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Record '{}' is corrupted, using defaults: {}", key, e);
                return defaults.clone();
            }
        };

        let mut merged = match serde_json::to_value(defaults) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize defaults for '{}': {}", key, e);
                return defaults.clone();
            }
        };
        deep_merge(&mut merged, stored);

        serde_json::from_value(merged).unwrap_or_else(|e| {
            warn!("Record '{}' does not match its schema, using defaults: {}", key, e);
            defaults.clone()
        })
    }

    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|e| StoreError::Serialize {
            key: key.to_string(),
            source: e,
        })?;
        self.store.set(key, &raw)
    }

    /// Reads, mutates and writes back a record while holding the write lock.
    pub fn update<T, F, R>(&self, key: &str, f: F) -> Result<R, StoreError>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> R,
    {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut record: T = self.read_or_default(key);
        let out = f(&mut record);
        self.write(key, &record)?;
        Ok(out)
    }

    /// Like [`Records::update`], but reads through [`Records::read_merged`]
    /// and lets `f` fail. Nothing is written when `f` returns an error.
    pub fn try_update_merged<T, E, F>(&self, key: &str, defaults: &T, f: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Clone,
        E: From<StoreError>,
        F: FnOnce(T) -> Result<T, E>,
    {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let next = f(self.read_merged(key, defaults))?;
        self.write(key, &next)?;
        Ok(next)
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(Some(raw)) if !raw.is_empty() => Some(raw),
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to read record '{}', using defaults: {}", key, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(default)]
        name: String,
        #[serde(default)]
        nested: HashMap<String, u32>,
    }

    fn records() -> Records {
        Records::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_missing_record_returns_default() {
        let records = records();
        let value: Sample = records.read_or_default("missing");
        assert_eq!(value, Sample::default());
    }

    #[test]
    fn test_corrupted_record_returns_default() {
        let records = records();
        records.store().set("bad", "{not json").unwrap();
        let value: Sample = records.read_or_default("bad");
        assert_eq!(value, Sample::default());

        let defaults = Sample {
            name: "fallback".into(),
            nested: HashMap::new(),
        };
        assert_eq!(records.read_merged("bad", &defaults), defaults);
    }

    #[test]
    fn test_read_merged_keeps_default_entries() {
        let records = records();
        records
            .store()
            .set("k", r#"{"nested": {"b": 2}}"#)
            .unwrap();

        let defaults = Sample {
            name: "base".into(),
            nested: HashMap::from([("a".to_string(), 1)]),
        };
        let merged = records.read_merged("k", &defaults);
        assert_eq!(merged.name, "base");
        assert_eq!(merged.nested.get("a"), Some(&1));
        assert_eq!(merged.nested.get("b"), Some(&2));
    }

    #[test]
    fn test_update_round_trip() {
        let records = records();
        let len = records
            .update("k", |s: &mut Sample| {
                s.name.push_str("hello");
                s.name.len()
            })
            .unwrap();
        assert_eq!(len, 5);

        let value: Sample = records.read_or_default("k");
        assert_eq!(value.name, "hello");
    }

    #[test]
    fn test_try_update_merged_skips_write_on_error() {
        let records = records();
        let defaults = Sample {
            name: "base".into(),
            nested: HashMap::new(),
        };

        let failed: Result<Sample, StoreError> =
            records.try_update_merged("k", &defaults, |_| Err(StoreError::LockPoisoned));
        assert!(failed.is_err());
        assert_eq!(records.store().get("k").unwrap(), None);

        let saved: Sample = records
            .try_update_merged("k", &defaults, |mut s| {
                s.nested.insert("a".into(), 1);
                Ok::<_, StoreError>(s)
            })
            .unwrap();
        assert_eq!(saved.name, "base");
        assert_eq!(records.read_merged("k", &defaults), saved);
    }
}
