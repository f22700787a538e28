//! Handlers: pluggable sinks that render aggregated progress.

pub mod beep;
pub mod debug;
pub mod text_bar;
pub mod throttle;
pub mod void;
pub mod webhook;

use crate::error::HandlerError;
use crate::progress::aggregate::AggregateState;
use crate::progress::events::ProgressEvent;

pub use beep::BeepHandler;
pub use debug::DebugHandler;
pub use text_bar::TextBarHandler;
pub use throttle::{RenderThrottle, ThrottleConfig};
pub use void::VoidHandler;
pub use webhook::WebhookHandler;

/// A renderer for progress updates.
///
/// Handlers run on the scope's dispatcher thread. Errors are logged by the
/// dispatcher and never reach the computation being observed.
pub trait Handler: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Render the latest event against the current aggregate.
    fn render(&mut self, event: &ProgressEvent, state: &AggregateState)
        -> Result<(), HandlerError>;

    /// Called exactly once when the scope exits, with the final aggregate.
    fn finalize(&mut self, state: &AggregateState) -> Result<(), HandlerError>;
}

impl std::fmt::Debug for dyn Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler").field("name", &self.name()).finish()
    }
}

/// Builds fresh handler instances for each scope.
///
/// Registries hold factories rather than handlers so that every scope gets
/// its own handler state.
pub trait HandlerFactory: Send + Sync {
    fn name(&self) -> &str;

    fn build(&self) -> Box<dyn Handler>;
}

/// Factory backed by a closure.
pub struct FnHandlerFactory<F> {
    name: String,
    build: F,
}

impl<F> FnHandlerFactory<F>
where
    F: Fn() -> Box<dyn Handler> + Send + Sync,
{
    pub fn new(name: impl Into<String>, build: F) -> Self {
        Self {
            name: name.into(),
            build,
        }
    }
}

impl<F> HandlerFactory for FnHandlerFactory<F>
where
    F: Fn() -> Box<dyn Handler> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self) -> Box<dyn Handler> {
        (self.build)()
    }
}
