//! Recording and scripted implementations of the injected capabilities.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use mailflow::{
    ClassificationResult, ClassificationSource, Classifier, ClassifierError, IncomingEmail, Mailer,
    OutgoingMail, SendError,
};

/// Mailer that records every message it accepts.
///
/// Failures can be scripted per call with [`RecordingMailer::fail_next`].
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    attempts: AtomicUsize,
    failures: Mutex<VecDeque<String>>,
    always_fail: Option<String>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            always_fail: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn fail_next(&self, message: &str) {
        self.failures.lock().unwrap().push_back(message.to_string());
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.always_fail {
            return Err(SendError::Rejected(message.clone()));
        }
        if let Some(message) = self.failures.lock().unwrap().pop_front() {
            return Err(SendError::Rejected(message));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

const RELEASED_PERMITS: usize = 1024;

enum Script {
    Tags(Vec<String>, Option<String>),
    Nothing,
    Fail,
}

/// Classifier returning a fixed answer, optionally held until released.
pub struct ScriptedClassifier {
    script: Script,
    calls: AtomicUsize,
    gate: Option<Semaphore>,
}

impl ScriptedClassifier {
    pub fn tagging(tags: &[&str], folder: Option<&str>) -> Self {
        Self {
            script: Script::Tags(
                tags.iter().map(|t| t.to_string()).collect(),
                folder.map(str::to_string),
            ),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            script: Script::Nothing,
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            script: Script::Fail,
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Makes every call wait until [`ScriptedClassifier::release`].
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(RELEASED_PERMITS);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(
        &self,
        _email: &IncomingEmail,
    ) -> Result<Option<ClassificationResult>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| ClassifierError::Timeout)?;
        }

        match &self.script {
            Script::Tags(tags, folder) => Ok(Some(ClassificationResult {
                tags: tags.clone(),
                folder: folder.clone(),
                source: ClassificationSource::Ai,
                created_at: 0,
                confidence: Some(0.9),
                reason: Some("scripted".to_string()),
            })),
            Script::Nothing => Ok(None),
            Script::Fail => Err(ClassifierError::Unavailable("scripted outage".to_string())),
        }
    }
}
