//! Email classification: heuristic rules, an optional external classifier,
//! and a TTL cache keyed by email fingerprint.

use async_trait::async_trait;

use crate::email::IncomingEmail;
use crate::error::ClassifierError;

pub mod cache;
pub mod fingerprint;
pub mod heuristic;
pub mod result;

pub use cache::{ClassificationCache, CLASSIFICATION_TTL_MS};
pub use fingerprint::fingerprint;
pub use heuristic::HeuristicClassifier;
pub use result::{ClassificationResult, ClassificationSource};

/// External classification capability (e.g. a remote model behind HTTP).
///
/// Returning `Ok(None)` or an error makes the cache fall back to the
/// heuristic result.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        email: &IncomingEmail,
    ) -> Result<Option<ClassificationResult>, ClassifierError>;
}
