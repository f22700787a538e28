//! Handler that reports every update through `tracing`.

use tracing::{debug, info};

use crate::error::HandlerError;
use crate::progress::aggregate::AggregateState;
use crate::progress::events::ProgressEvent;
use crate::progress::handlers::Handler;

#[derive(Debug, Default)]
pub struct DebugHandler {
    renders: u64,
}

impl DebugHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }
}

impl Handler for DebugHandler {
    fn name(&self) -> &str {
        "debug"
    }

    fn render(&mut self, event: &ProgressEvent, state: &AggregateState) -> Result<(), HandlerError> {
        self.renders += 1;
        debug!(
            signaler = %event.signaler,
            seq = event.seq,
            amount = event.amount,
            message = ?event.message,
            done = state.done,
            total = ?state.total,
            percent = ?state.percent(),
            "progress update"
        );
        Ok(())
    }

    fn finalize(&mut self, state: &AggregateState) -> Result<(), HandlerError> {
        info!(
            done = state.done,
            total = ?state.total,
            events = state.events_received,
            ignored = state.ignored_events,
            finished = state.finished,
            "progress finished"
        );
        Ok(())
    }
}
