//! Handler that discards everything.

use crate::error::HandlerError;
use crate::progress::aggregate::AggregateState;
use crate::progress::events::ProgressEvent;
use crate::progress::handlers::Handler;

#[derive(Debug, Default, Clone, Copy)]
pub struct VoidHandler;

impl Handler for VoidHandler {
    fn name(&self) -> &str {
        "void"
    }

    fn render(&mut self, _event: &ProgressEvent, _state: &AggregateState) -> Result<(), HandlerError> {
        Ok(())
    }

    fn finalize(&mut self, _state: &AggregateState) -> Result<(), HandlerError> {
        Ok(())
    }
}
