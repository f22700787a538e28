//! Shared progress helpers: identifiers and timestamps.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

static SIGNALER_COUNTER: AtomicU64 = AtomicU64::new(1);
static SCOPE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a signaler. Clones of a signaler share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalerId(u64);

impl SignalerId {
    /// Allocate the next process-unique signaler id.
    pub fn next() -> Self {
        SignalerId(SIGNALER_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SignalerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sig-{}", self.0)
    }
}

/// Allocate the next process-unique scope id.
pub fn new_scope_id() -> u64 {
    SCOPE_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Current wall-clock time for event stamps.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
