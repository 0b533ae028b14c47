//! Isolated automation instance for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use mailflow::{AutomationConfig, Clock, EmailAutomation, ManualClock, MemoryStore};

use super::doubles::ScriptedClassifier;

pub struct AutomationHarness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub automation: Arc<EmailAutomation>,
}

impl AutomationHarness {
    /// Heuristic classification only.
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_classifier(classifier: Arc<ScriptedClassifier>) -> Self {
        Self::build(Some(classifier))
    }

    fn build(classifier: Option<Arc<ScriptedClassifier>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Self::start()));

        let mut builder = EmailAutomation::builder(store.clone()).clock(clock.clone());
        if let Some(classifier) = classifier {
            builder = builder.classifier(classifier);
        }

        Self {
            store,
            clock,
            automation: Arc::new(builder.build()),
        }
    }

    /// 2026-06-01 09:00 UTC.
    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn save_config(&self, config: AutomationConfig) {
        self.automation
            .save_automation_config(config)
            .expect("config saves");
    }
}
