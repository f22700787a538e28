//! Listener loop: drains the bus, aggregates, and fans out to handlers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::HandlerError;
use crate::progress::aggregate::{AggregateState, Aggregator};
use crate::progress::events::ProgressEvent;
use crate::progress::handlers::Handler;
use crate::progress::routing::bus::ScopeMessage;

/// Latest aggregate, readable while the scope is live.
pub type SharedSnapshot = Arc<Mutex<AggregateState>>;

struct HandlerSlot {
    handler: Box<dyn Handler>,
    consecutive_failures: u32,
    disabled: bool,
}

pub struct Dispatcher {
    scope_id: u64,
    receiver: Receiver<ScopeMessage>,
    aggregator: Aggregator,
    slots: Vec<HandlerSlot>,
    snapshot: SharedSnapshot,
    max_handler_failures: u32,
}

impl Dispatcher {
    pub fn new(
        scope_id: u64,
        receiver: Receiver<ScopeMessage>,
        aggregator: Aggregator,
        handlers: Vec<Box<dyn Handler>>,
        snapshot: SharedSnapshot,
        max_handler_failures: u32,
    ) -> Self {
        let slots = handlers
            .into_iter()
            .map(|handler| HandlerSlot {
                handler,
                consecutive_failures: 0,
                disabled: false,
            })
            .collect();
        Self {
            scope_id,
            receiver,
            aggregator,
            slots,
            snapshot,
            max_handler_failures,
        }
    }

    /// Run until `Close` (or until every sender is gone), then finalize all
    /// handlers and return the final aggregate.
    pub fn run(mut self) -> AggregateState {
        let mut closing = false;
        while !closing {
            let first = match self.receiver.recv() {
                Ok(ScopeMessage::Event(event)) => event,
                Ok(ScopeMessage::Close) | Err(_) => break,
            };

            // Coalesce whatever else is already queued into one render.
            let mut latest = self.apply(first);
            loop {
                match self.receiver.try_recv() {
                    Ok(ScopeMessage::Event(event)) => {
                        if let Some(event) = self.apply(event) {
                            latest = Some(event);
                        }
                    }
                    Ok(ScopeMessage::Close) | Err(TryRecvError::Disconnected) => {
                        closing = true;
                        break;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }

            let state = self.publish();
            if let Some(event) = latest {
                self.render(&event, &state);
            }
        }

        self.discard_late();
        let state = self.publish();
        self.finalize(&state);
        debug!(
            scope_id = self.scope_id,
            events = state.events_received,
            ignored = state.ignored_events,
            "progress dispatcher finished"
        );
        state
    }

    /// Events that slipped in behind `Close` are not aggregated. Returns how
    /// many were thrown away.
    fn discard_late(&self) -> usize {
        let late = self
            .receiver
            .try_iter()
            .filter(|m| matches!(m, ScopeMessage::Event(_)))
            .count();
        if late > 0 {
            trace!(
                scope_id = self.scope_id,
                late,
                "progress events dropped after scope close"
            );
        }
        late
    }

    fn apply(&mut self, event: ProgressEvent) -> Option<ProgressEvent> {
        if self.aggregator.apply(&event) {
            Some(event)
        } else {
            None
        }
    }

    fn publish(&self) -> AggregateState {
        let state = self.aggregator.state();
        *self.snapshot.lock() = state.clone();
        state
    }

    fn render(&mut self, event: &ProgressEvent, state: &AggregateState) {
        let scope_id = self.scope_id;
        let max_failures = self.max_handler_failures;
        for slot in self.slots.iter_mut().filter(|s| !s.disabled) {
            let result = guarded(|| slot.handler.render(event, state));
            match result {
                Ok(()) => slot.consecutive_failures = 0,
                Err(err) => {
                    slot.consecutive_failures += 1;
                    warn!(
                        scope_id,
                        handler = slot.handler.name(),
                        failures = slot.consecutive_failures,
                        error = %err,
                        "progress handler failed to render"
                    );
                    if max_failures > 0 && slot.consecutive_failures >= max_failures {
                        slot.disabled = true;
                        warn!(
                            scope_id,
                            handler = slot.handler.name(),
                            "progress handler disabled for the rest of the scope"
                        );
                    }
                }
            }
        }
    }

    fn finalize(&mut self, state: &AggregateState) {
        let scope_id = self.scope_id;
        for slot in self.slots.iter_mut() {
            if let Err(err) = guarded(|| slot.handler.finalize(state)) {
                warn!(
                    scope_id,
                    handler = slot.handler.name(),
                    error = %err,
                    "progress handler failed to finalize"
                );
            }
        }
    }
}

fn guarded<F>(f: F) -> Result<(), HandlerError>
where
    F: FnOnce() -> Result<(), HandlerError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(HandlerError::Panicked(msg))
        }
    }
}
