//! Event schema for progress signaling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::types::{now, SignalerId};

/// What a single event reports about its signaler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Emitted once when a signaler is created, before any step.
    Registered {
        expected_steps: Option<u64>,
        weight: f64,
    },
    /// `amount` steps completed.
    Step,
    /// Message-only update; the count does not move.
    Message,
    /// The signaler is done; its progress jumps to its total.
    Finished,
}

/// Immutable description of one progress increment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub signaler: SignalerId,
    #[serde(flatten)]
    pub kind: EventKind,
    pub amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Per-signaler sequence number, starting at 1.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(
        signaler: SignalerId,
        kind: EventKind,
        amount: u64,
        message: Option<String>,
        seq: u64,
    ) -> Self {
        Self {
            signaler,
            kind,
            amount,
            message,
            label: None,
            seq,
            timestamp: now(),
        }
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    /// True for events that move the step count.
    pub fn is_step(&self) -> bool {
        matches!(self.kind, EventKind::Step)
    }

    pub fn is_registration(&self) -> bool {
        matches!(self.kind, EventKind::Registered { .. })
    }
}
