use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Correlation ID binding an outbound REQUEST to its ACK, RESPONSE or ERROR.
///
/// Carried in-band as a plain string field of the frame and opaque to
/// everything except the call index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    // ---

    /// Generate a new random correlation ID (UUID v4).
    pub fn generate() -> Self {
        // ---
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the correlation ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Source of fresh correlation IDs.
///
/// The broker only requires that an ID is not handed out again while a call
/// holding it is still live; it re-asks the generator when it sees a clash.
pub trait IdGenerator: Send + Sync {
    /// Produce the next ID.
    fn next_id(&self) -> CorrelationId;
}

/// Shared ID generator pointer.
pub type IdGeneratorPtr = Arc<dyn IdGenerator>;

/// Random UUID v4 IDs. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> CorrelationId {
        CorrelationId::generate()
    }
}

/// Prefixed counter IDs: `u1`, `u2`, ...
///
/// Deterministic, which makes recorded frames easy to assert on.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        // ---
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> CorrelationId {
        // ---
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        CorrelationId(format!("{}{n}", self.prefix))
    }
}
