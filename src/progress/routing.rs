//! Worker-to-listener routing: the bounded bus and the dispatcher loop.

pub mod bus;
pub mod dispatcher;

pub use bus::{BusClosed, ScopeBus, ScopeMessage};
pub use dispatcher::{Dispatcher, SharedSnapshot};
