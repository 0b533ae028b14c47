use log::info;
use serde_json::Value;

use crate::config::merge::deep_merge;
use crate::config::schema::AutomationConfig;
use crate::error::ConfigError;
use crate::records::Records;
use crate::store::keys;

/// Reads and writes the persisted [`AutomationConfig`].
#[derive(Clone)]
pub struct ConfigStore {
    records: Records,
}

impl ConfigStore {
    pub fn new(records: Records) -> Self {
        Self { records }
    }

    /// Returns the stored config merged over the built-in defaults.
    pub fn load(&self) -> AutomationConfig {
        self.records
            .read_merged(keys::CONFIG, &AutomationConfig::default())
    }

    /// Sanitizes and persists a full config. Returns what was stored.
    pub fn save(&self, config: AutomationConfig) -> Result<AutomationConfig, ConfigError> {
        let config = config.sanitized();
        self.records.write(keys::CONFIG, &config)?;
        info!(
            "Automation config saved (classification={}, auto_reply={})",
            config.classification.enabled, config.auto_reply.enabled
        );
        Ok(config)
    }

    /// Deep-merges a partial JSON object over the current config and saves.
    pub fn update(&self, partial: Value) -> Result<AutomationConfig, ConfigError> {
        if !partial.is_object() {
            return Err(ConfigError::InvalidPartial);
        }

        let config = self.records.try_update_merged(
            keys::CONFIG,
            &AutomationConfig::default(),
            |current| -> Result<AutomationConfig, ConfigError> {
                let mut value = serde_json::to_value(current)?;
                deep_merge(&mut value, partial);
                let merged: AutomationConfig = serde_json::from_value(value)?;
                Ok(merged.sanitized())
            },
        )?;
        info!(
            "Automation config updated (classification={}, auto_reply={})",
            config.classification.enabled, config.auto_reply.enabled
        );
        Ok(config)
    }
}
