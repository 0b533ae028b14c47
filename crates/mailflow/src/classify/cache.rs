//! Fingerprint-keyed classification cache with request coalescing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use tracing::{info_span, Instrument};

use super::fingerprint::fingerprint;
use super::heuristic::HeuristicClassifier;
use super::result::{
    clamp_confidence, normalize_folder, normalize_tags, ClassificationResult,
    ClassificationSource,
};
use super::Classifier;
use crate::clock::Clock;
use crate::config::AutomationConfig;
use crate::email::{IncomingEmail, PrecomputedClassification};
use crate::records::Records;
use crate::sanitize;
use crate::store::keys;

/// Cached results are trusted for 12 hours.
pub const CLASSIFICATION_TTL_MS: i64 = 12 * 60 * 60 * 1000;

const AI_TAGGED_CONFIDENCE: f32 = 0.75;
const AI_FOLDER_ONLY_CONFIDENCE: f32 = 0.5;

type CacheRecord = HashMap<String, ClassificationResult>;
type SharedClassification = Shared<BoxFuture<'static, ClassificationResult>>;

/// Classification entry point used by the incoming-mail pipeline.
///
/// Cloning is cheap; clones share the in-flight map.
#[derive(Clone)]
pub struct ClassificationCache {
    inner: Arc<Inner>,
}

struct Inner {
    records: Records,
    clock: Arc<dyn Clock>,
    classifier: Option<Arc<dyn Classifier>>,
    heuristic: HeuristicClassifier,
    in_flight: Mutex<HashMap<String, SharedClassification>>,
    ttl_ms: i64,
}

enum Lookup {
    Ready(ClassificationResult),
    Pending(SharedClassification),
}

impl ClassificationCache {
    pub fn new(
        records: Records,
        clock: Arc<dyn Clock>,
        classifier: Option<Arc<dyn Classifier>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                records,
                clock,
                classifier,
                heuristic: HeuristicClassifier::new(),
                in_flight: Mutex::new(HashMap::new()),
                ttl_ms: CLASSIFICATION_TTL_MS,
            }),
        }
    }

    /// Classifies an email, reusing a fresh cached result when one exists.
    ///
    /// Returns `None` only when classification is disabled. Concurrent calls
    /// for the same fingerprint share one computation.
    pub async fn classify(
        &self,
        email: &IncomingEmail,
        config: &AutomationConfig,
    ) -> Option<ClassificationResult> {
        if !config.classification.enabled {
            return None;
        }

        let key = fingerprint(email);
        let now_ms = self.inner.clock.now_millis();

        if let Some(result) = email
            .ai_classification
            .as_ref()
            .and_then(|pre| precomputed_result(pre, now_ms))
        {
            debug!("Using attached classification for {}", key);
            self.inner.store_result(&key, &result);
            return Some(result);
        }

        match self.inner.lookup(&key, email) {
            Lookup::Ready(result) => Some(result),
            Lookup::Pending(pending) => Some(pending.await),
        }
    }

    /// Number of computations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner
            .in_flight
            .lock()
            .map(|m| m.len())
            .unwrap_or_default()
    }
}

impl Inner {
    fn lookup(self: &Arc<Self>, key: &str, email: &IncomingEmail) -> Lookup {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(pending) = in_flight.get(key) {
            debug!("Joining in-flight classification for {}", key);
            return Lookup::Pending(pending.clone());
        }

        // Checked under the lock: a computation writes the cache before it
        // leaves the in-flight map.
        if let Some(hit) = self.cached(key, self.clock.now_millis()) {
            debug!("Classification cache hit for {}", key);
            return Lookup::Ready(hit);
        }

        let span = info_span!("classify", fingerprint = %key);
        let pending = Arc::clone(self)
            .compute(key.to_string(), email.clone())
            .instrument(span)
            .boxed()
            .shared();
        in_flight.insert(key.to_string(), pending.clone());
        Lookup::Pending(pending)
    }

    fn cached(&self, key: &str, now_ms: i64) -> Option<ClassificationResult> {
        let cache: CacheRecord = self.records.read_or_default(keys::CLASSIFICATION_CACHE);
        cache
            .get(key)
            .filter(|result| result.is_fresh(now_ms, self.ttl_ms))
            .cloned()
    }

    async fn compute(self: Arc<Self>, key: String, email: IncomingEmail) -> ClassificationResult {
        let _guard = InFlightGuard {
            in_flight: &self.in_flight,
            key: &key,
        };

        let heuristic = self.heuristic.classify(
            email.subject_str(),
            email.body_str(),
            self.clock.now_millis(),
        );

        let external = match &self.classifier {
            Some(classifier) => match classifier.classify(&email).await {
                Ok(Some(result)) => normalize_external(result),
                Ok(None) => None,
                Err(e) => {
                    warn!(
                        "Classifier failed for {} (from {}), using heuristic: {}",
                        key,
                        sanitize::redact_address(email.from.as_deref().unwrap_or("")),
                        e
                    );
                    None
                }
            },
            None => None,
        };

        let mut result = match external {
            Some(ai) => merge_with_heuristic(ai, &heuristic),
            None => {
                debug!("No external classification for {}, using heuristic", key);
                heuristic
            }
        };
        result.created_at = self.clock.now_millis();

        self.store_result(&key, &result);
        result
    }

    fn store_result(&self, key: &str, result: &ClassificationResult) {
        let stored = self
            .records
            .update(keys::CLASSIFICATION_CACHE, |cache: &mut CacheRecord| {
                cache.insert(key.to_string(), result.clone());
            });
        if let Err(e) = stored {
            warn!("Failed to cache classification for {}: {}", key, e);
        }
    }
}

/// Clears the in-flight marker once the computation settles or panics.
///
/// The map holds its own clone of the shared future, so a caller that stops
/// waiting does not drop the computation; the next caller for the same
/// fingerprint resumes it.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashMap<String, SharedClassification>>,
    key: &'a str,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.remove(self.key);
    }
}

fn precomputed_result(
    pre: &PrecomputedClassification,
    now_ms: i64,
) -> Option<ClassificationResult> {
    let tags = normalize_tags(&pre.tags);
    let folder = normalize_folder(pre.folder.as_deref());
    if tags.is_empty() && folder.is_none() {
        return None;
    }

    Some(ClassificationResult {
        tags,
        folder,
        source: ClassificationSource::Ai,
        created_at: now_ms,
        confidence: clamp_confidence(pre.confidence),
        reason: pre.reason.clone(),
    })
}

/// Cleans up an external result; `None` when it carries no tags or folder.
fn normalize_external(result: ClassificationResult) -> Option<ClassificationResult> {
    let tags = normalize_tags(&result.tags);
    let folder = normalize_folder(result.folder.as_deref());
    if tags.is_empty() && folder.is_none() {
        return None;
    }

    let confidence = clamp_confidence(result.confidence).unwrap_or(if tags.is_empty() {
        AI_FOLDER_ONLY_CONFIDENCE
    } else {
        AI_TAGGED_CONFIDENCE
    });

    Some(ClassificationResult {
        tags,
        folder,
        source: ClassificationSource::Ai,
        created_at: result.created_at,
        confidence: Some(confidence),
        reason: result
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
    })
}

/// External tags come first, heuristic tags fill in; a missing external
/// folder is taken from the heuristic.
fn merge_with_heuristic(
    ai: ClassificationResult,
    heuristic: &ClassificationResult,
) -> ClassificationResult {
    ClassificationResult {
        tags: normalize_tags(ai.tags.iter().chain(heuristic.tags.iter())),
        folder: ai.folder.or_else(|| heuristic.folder.clone()),
        source: ClassificationSource::Ai,
        created_at: ai.created_at,
        confidence: ai.confidence.or(heuristic.confidence),
        reason: ai.reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ClassifierError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClassifier {
        calls: AtomicUsize,
        response: Option<ClassificationResult>,
        fail: bool,
    }

    impl FixedClassifier {
        fn returning(response: Option<ClassificationResult>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: None,
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(
            &self,
            _email: &IncomingEmail,
        ) -> Result<Option<ClassificationResult>, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ClassifierError::Unavailable("offline".into()));
            }
            Ok(self.response.clone())
        }
    }

    fn ai_result(tags: &[&str], folder: Option<&str>) -> ClassificationResult {
        ClassificationResult {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            folder: folder.map(str::to_string),
            source: ClassificationSource::Heuristic,
            created_at: 0,
            confidence: None,
            reason: None,
        }
    }

    fn setup(
        classifier: Option<Arc<FixedClassifier>>,
    ) -> (ClassificationCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap(),
        ));
        let records = Records::new(Arc::new(MemoryStore::new()));
        let cache = ClassificationCache::new(
            records,
            clock.clone(),
            classifier.map(|c| c as Arc<dyn Classifier>),
        );
        (cache, clock)
    }

    fn email(id: &str, subject: &str) -> IncomingEmail {
        IncomingEmail {
            id: Some(id.to_string()),
            from: Some("Ana <ana@example.com>".into()),
            subject: Some(subject.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_returns_none() {
        let (cache, _) = setup(None);
        let mut config = AutomationConfig::default();
        config.classification.enabled = false;
        assert!(cache.classify(&email("1", "RSVP"), &config).await.is_none());
    }

    #[tokio::test]
    async fn test_heuristic_without_classifier() {
        let (cache, _) = setup(None);
        let result = cache
            .classify(&email("1", "RSVP confirmación"), &AutomationConfig::default())
            .await
            .unwrap();
        assert!(result.tags.contains(&"RSVP".to_string()));
        assert_eq!(result.folder.as_deref(), Some("RSVP"));
        assert_eq!(result.source, ClassificationSource::Heuristic);
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_fresh_result_is_reused_and_stale_is_recomputed() {
        let classifier = Arc::new(FixedClassifier::returning(Some(ai_result(
            &["Proveedor"],
            None,
        ))));
        let (cache, clock) = setup(Some(classifier.clone()));
        let config = AutomationConfig::default();
        let mail = email("m-1", "Catálogo");

        let first = cache.classify(&mail, &config).await.unwrap();
        clock.advance(Duration::hours(11));
        let second = cache.classify(&mail, &config).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::hours(2));
        let third = cache.classify(&mail, &config).await.unwrap();
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
        assert!(third.created_at > first.created_at);
    }

    #[tokio::test]
    async fn test_classifier_failure_falls_back_to_heuristic() {
        let classifier = Arc::new(FixedClassifier::failing());
        let (cache, _) = setup(Some(classifier.clone()));

        let result = cache
            .classify(&email("1", "Factura enero"), &AutomationConfig::default())
            .await
            .unwrap();
        assert_eq!(result.source, ClassificationSource::Heuristic);
        assert_eq!(result.folder.as_deref(), Some("Facturas"));
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_empty_external_result_falls_back() {
        let classifier = Arc::new(FixedClassifier::returning(Some(ai_result(&["  "], None))));
        let (cache, _) = setup(Some(classifier));

        let result = cache
            .classify(&email("1", "Reunión el martes"), &AutomationConfig::default())
            .await
            .unwrap();
        assert_eq!(result.source, ClassificationSource::Heuristic);
        assert_eq!(result.tags, vec!["Reuniones"]);
    }

    #[tokio::test]
    async fn test_external_result_merges_heuristic() {
        let classifier = Arc::new(FixedClassifier::returning(Some(ai_result(
            &["Proveedor", " VIP "],
            None,
        ))));
        let (cache, _) = setup(Some(classifier));

        let result = cache
            .classify(&email("1", "Factura del catering"), &AutomationConfig::default())
            .await
            .unwrap();
        assert_eq!(result.source, ClassificationSource::Ai);
        assert_eq!(result.tags, vec!["Proveedor", "VIP", "Facturas"]);
        assert_eq!(result.folder.as_deref(), Some("Facturas"));
        assert_eq!(result.confidence, Some(AI_TAGGED_CONFIDENCE));
    }

    #[tokio::test]
    async fn test_attached_classification_short_circuits() {
        let classifier = Arc::new(FixedClassifier::failing());
        let (cache, _) = setup(Some(classifier.clone()));

        let mut mail = email("1", "Hola");
        mail.ai_classification = Some(PrecomputedClassification {
            tags: vec!["Invitado".into()],
            folder: None,
            confidence: Some(2.0),
            reason: None,
        });

        let result = cache
            .classify(&mail, &AutomationConfig::default())
            .await
            .unwrap();
        assert_eq!(result.tags, vec!["Invitado"]);
        assert_eq!(result.confidence, Some(1.0));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }
}
