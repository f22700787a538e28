//! Proscope: Scoped Progress Notification
//!
//! A small framework that lets deeply nested, possibly parallel computations
//! report progress without knowing how it is displayed. Computations create
//! [`Signaler`]s inside a listener scope; the scope aggregates their events
//! and fans them out to pluggable [`Handler`]s such as a terminal bar, a bell
//! or a webhook.
//!
//! ```no_run
//! use proscope::{create_signaler, with_progress, ScopeOptions};
//!
//! let (sum, report) = with_progress(ScopeOptions::new(), |_scope| {
//!     let p = create_signaler(Some(10)).unwrap();
//!     (0..10u64).map(|i| { p.tick(); i }).sum::<u64>()
//! })
//! .unwrap();
//! assert_eq!(sum, 45);
//! assert_eq!(report.state.done, 10);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod progress;

pub use error::{HandlerError, ProgressError};
pub use progress::{
    create_signaler, current_scope_id, default_handlers, enter_scope, reset_default_handlers,
    set_default_handlers, try_with_progress, with_progress, without_progress, AggregateState,
    AggregationStrategy, EventKind, Handler, HandlerFactory, HandlerRegistry, HandlerSpec,
    ProgressEvent, ScopeGuard, ScopeOptions, ScopeReport, Signaler, SignalerBuilder,
};
