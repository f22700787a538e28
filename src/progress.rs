//! Progress domain: signalers, listener scopes, aggregation, handlers, routing.

mod types;

pub mod aggregate;
pub mod events;
pub mod handlers;
pub mod registry;
pub mod routing;
pub mod scope;
pub mod signaler;

pub use aggregate::{AggregateState, AggregationStrategy, Aggregator};
pub use events::{EventKind, ProgressEvent};
pub use handlers::{Handler, HandlerFactory};
pub use registry::{
    default_handlers, reset_default_handlers, set_default_handlers, HandlerRegistry, HandlerSpec,
};
pub use scope::{
    current_scope_id, enter_scope, try_with_progress, with_progress, without_progress,
    ScopeGuard, ScopeOptions, ScopeReport,
};
pub use signaler::{create_signaler, Signaler, SignalerBuilder};
pub use types::{new_scope_id, now, SignalerId};
