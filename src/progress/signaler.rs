//! Signalers: handles that emit progress events into their scope.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::error::ProgressError;
use crate::progress::events::{EventKind, ProgressEvent};
use crate::progress::routing::bus::ScopeBus;
use crate::progress::scope::current_bus;
use crate::progress::types::SignalerId;

/// Create a signaler in the scope active on this thread.
pub fn create_signaler(expected_steps: Option<u64>) -> Result<Signaler, ProgressError> {
    SignalerBuilder::current()?.steps(expected_steps).build()
}

/// Configures a signaler before it registers with its scope.
#[derive(Debug, Clone)]
pub struct SignalerBuilder {
    bus: ScopeBus,
    expected_steps: Option<u64>,
    label: Option<String>,
    weight: f64,
    auto_finish: bool,
}

impl SignalerBuilder {
    pub(crate) fn new(bus: ScopeBus) -> Self {
        Self {
            bus,
            expected_steps: None,
            label: None,
            weight: 1.0,
            auto_finish: true,
        }
    }

    /// Builder bound to the scope active on this thread.
    pub fn current() -> Result<Self, ProgressError> {
        current_bus()
            .map(Self::new)
            .ok_or(ProgressError::NoActiveScope)
    }

    pub fn steps(mut self, expected_steps: Option<u64>) -> Self {
        self.expected_steps = expected_steps;
        self
    }

    /// One step per element of `items`.
    pub fn steps_along<T>(self, items: &[T]) -> Self {
        self.steps(Some(items.len() as u64))
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Share of the display under the weighted strategy.
    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Emit a finish event automatically once the expected steps are reached.
    pub fn auto_finish(mut self, auto_finish: bool) -> Self {
        self.auto_finish = auto_finish;
        self
    }

    /// Register the signaler with its scope.
    pub fn build(self) -> Result<Signaler, ProgressError> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(ProgressError::InvalidWeight(self.weight));
        }
        let signaler = Signaler {
            inner: Arc::new(SignalerInner {
                id: SignalerId::next(),
                expected_steps: self.expected_steps,
                auto_finish: self.auto_finish,
                bus: self.bus,
                count: AtomicU64::new(0),
                seq: AtomicU64::new(0),
                finished: AtomicBool::new(false),
            }),
        };
        let registration = ProgressEvent::new(
            signaler.inner.id,
            EventKind::Registered {
                expected_steps: self.expected_steps,
                weight: self.weight,
            },
            0,
            None,
            0,
        )
        .with_label(self.label);
        signaler.inner.send(registration);
        Ok(signaler)
    }
}

struct SignalerInner {
    id: SignalerId,
    expected_steps: Option<u64>,
    auto_finish: bool,
    bus: ScopeBus,
    count: AtomicU64,
    seq: AtomicU64,
    finished: AtomicBool,
}

impl SignalerInner {
    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn emit(&self, kind: EventKind, amount: u64, message: Option<&str>) {
        let event = ProgressEvent::new(
            self.id,
            kind,
            amount,
            message.map(str::to_string),
            self.next_seq(),
        );
        self.send(event);
    }

    fn send(&self, event: ProgressEvent) {
        // Progress is best-effort: a closed scope must never fail the caller.
        if self.bus.emit(event).is_err() {
            trace!(
                signaler = %self.id,
                scope_id = self.bus.scope_id(),
                "progress event dropped: scope closed"
            );
        }
    }
}

/// Emits progress events into the scope it was created in.
///
/// Cloning is cheap; clones share identity and step count, and may be moved
/// into worker threads or tasks.
#[derive(Clone)]
pub struct Signaler {
    inner: Arc<SignalerInner>,
}

impl std::fmt::Debug for Signaler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signaler")
            .field("id", &self.inner.id)
            .field("scope_id", &self.inner.bus.scope_id())
            .field("expected_steps", &self.inner.expected_steps)
            .field("count", &self.count())
            .finish()
    }
}

impl Signaler {
    pub fn id(&self) -> SignalerId {
        self.inner.id
    }

    pub fn scope_id(&self) -> u64 {
        self.inner.bus.scope_id()
    }

    pub fn expected_steps(&self) -> Option<u64> {
        self.inner.expected_steps
    }

    /// Steps emitted so far through this signaler and its clones.
    pub fn count(&self) -> u64 {
        self.inner.count.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::Relaxed)
    }

    /// One step, optionally with a message.
    pub fn signal(&self, message: Option<&str>) {
        self.signal_amount(1, message);
    }

    /// One step without a message.
    pub fn tick(&self) {
        self.signal_amount(1, None);
    }

    /// `amount` steps at once.
    pub fn signal_amount(&self, amount: u64, message: Option<&str>) {
        let before = self.inner.count.fetch_add(amount, Ordering::Relaxed);
        self.inner.emit(EventKind::Step, amount, message);

        if self.inner.auto_finish {
            if let Some(total) = self.inner.expected_steps {
                let after = before.saturating_add(amount);
                if before < total && after >= total {
                    self.finish();
                }
            }
        }
    }

    /// Update the message without moving the count.
    pub fn update_message(&self, message: &str) {
        self.inner.emit(EventKind::Message, 0, Some(message));
    }

    /// Mark this signaler complete. Only the first call emits.
    pub fn finish(&self) {
        if !self.inner.finished.swap(true, Ordering::AcqRel) {
            self.inner.emit(EventKind::Finished, 0, None);
        }
    }
}
