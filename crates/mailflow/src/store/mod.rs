//! Key-value persistence port.
//!
//! Every record the automation core keeps (config, reply state,
//! classification cache, schedule) is a JSON string under a fixed key.
//! Any store satisfying [`KvStore`] can back it.

use crate::error::StoreError;

pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{default_database_path, SqliteStore};

/// Logical record keys.
pub mod keys {
    pub const CONFIG: &str = "mailflow.automation.config";
    pub const STATE: &str = "mailflow.automation.state";
    pub const CLASSIFICATION_CACHE: &str = "mailflow.automation.classification";
    pub const SCHEDULE: &str = "mailflow.automation.schedule";
}

/// A string-keyed store of string values.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: KvStore + ?Sized> KvStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}
