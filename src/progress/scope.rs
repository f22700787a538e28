//! Listener scopes: the dynamic extent in which signalers are valid.
//!
//! At most one scope is active per thread. Entering a scope spawns a
//! dispatcher thread that owns the aggregation state and the handlers;
//! signalers created in the scope send to it over a bounded bus. Leaving the
//! scope, on any path including unwinding, drains queued events and
//! finalizes every handler.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ProgressConfig;
use crate::error::ProgressError;
use crate::progress::aggregate::{AggregateState, AggregationStrategy, Aggregator};
use crate::progress::handlers::Handler;
use crate::progress::registry::{default_handlers, HandlerRegistry};
use crate::progress::routing::bus::ScopeBus;
use crate::progress::routing::dispatcher::{Dispatcher, SharedSnapshot};
use crate::progress::signaler::{Signaler, SignalerBuilder};
use crate::progress::types::new_scope_id;

thread_local! {
    static ACTIVE_SCOPE: RefCell<Option<ScopeBus>> = const { RefCell::new(None) };
}

/// Bus of the scope active on this thread, if any.
pub(crate) fn current_bus() -> Option<ScopeBus> {
    ACTIVE_SCOPE.with(|slot| slot.borrow().clone())
}

/// Id of the scope active on this thread, if any.
pub fn current_scope_id() -> Option<u64> {
    ACTIVE_SCOPE.with(|slot| slot.borrow().as_ref().map(ScopeBus::scope_id))
}

/// Settings fixed at scope entry.
pub struct ScopeOptions {
    /// Explicit handlers; take precedence over any registry.
    pub handlers: Option<Vec<Box<dyn Handler>>>,
    /// Registry to build handlers from; the process default when `None`.
    pub registry: Option<HandlerRegistry>,
    pub strategy: AggregationStrategy,
    /// A disabled scope accepts signalers but discards their events.
    pub enable: bool,
    pub channel_capacity: usize,
    /// Upper bound on how long exit waits for the dispatcher to drain.
    pub drain_timeout: Duration,
    /// Consecutive render failures before a handler is disabled (0 = never).
    pub max_handler_failures: u32,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self::from_config(&ProgressConfig::default())
    }
}

impl std::fmt::Debug for ScopeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeOptions")
            .field("handlers", &self.handlers.as_ref().map(|h| h.len()))
            .field("registry", &self.registry)
            .field("strategy", &self.strategy)
            .field("enable", &self.enable)
            .field("channel_capacity", &self.channel_capacity)
            .field("drain_timeout", &self.drain_timeout)
            .field("max_handler_failures", &self.max_handler_failures)
            .finish()
    }
}

impl ScopeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ProgressConfig) -> Self {
        Self {
            handlers: None,
            registry: config.registry(),
            strategy: config.strategy,
            enable: config.enable,
            channel_capacity: config.channel_capacity,
            drain_timeout: Duration::from_millis(config.drain_timeout_ms),
            max_handler_failures: config.max_handler_failures,
        }
    }

    pub fn with_handlers(mut self, handlers: Vec<Box<dyn Handler>>) -> Self {
        self.handlers = Some(handlers);
        self
    }

    pub fn with_handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handlers
            .get_or_insert_with(Vec::new)
            .push(Box::new(handler));
        self
    }

    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_strategy(mut self, strategy: AggregationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn enabled(mut self, enable: bool) -> Self {
        self.enable = enable;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_max_handler_failures(mut self, max: u32) -> Self {
        self.max_handler_failures = max;
        self
    }
}

/// Outcome of a closed scope.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeReport {
    pub scope_id: u64,
    pub strategy: AggregationStrategy,
    pub state: AggregateState,
    pub elapsed_ms: u128,
    /// The dispatcher did not finish within the drain timeout; `state` is the
    /// last published snapshot.
    pub timed_out: bool,
}

struct DispatcherHandle {
    thread: JoinHandle<()>,
    done: Receiver<AggregateState>,
    snapshot: SharedSnapshot,
}

/// Active listener scope. Exiting it (via [`ScopeGuard::close`] or drop)
/// finalizes all handlers and frees the thread for another scope.
pub struct ScopeGuard {
    id: u64,
    strategy: AggregationStrategy,
    bus: ScopeBus,
    dispatcher: Option<DispatcherHandle>,
    drain_timeout: Duration,
    started: Instant,
    closed: bool,
    // Bound to the thread whose scope slot it occupies.
    _not_send: PhantomData<*const ()>,
}

impl std::fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("id", &self.id)
            .field("strategy", &self.strategy)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Enter a listener scope on the current thread.
///
/// Fails with [`ProgressError::ScopeAlreadyActive`] when this thread already
/// has one.
pub fn enter_scope(options: ScopeOptions) -> Result<ScopeGuard, ProgressError> {
    if let Some(active) = current_scope_id() {
        return Err(ProgressError::ScopeAlreadyActive(active));
    }

    let id = new_scope_id();
    let ScopeOptions {
        handlers,
        registry,
        strategy,
        enable,
        channel_capacity,
        drain_timeout,
        max_handler_failures,
    } = options;

    let (bus, dispatcher) = if enable {
        let handlers = match handlers {
            Some(handlers) => handlers,
            None => registry.unwrap_or_else(default_handlers).build(),
        };
        let handler_count = handlers.len();
        let (bus, receiver) = ScopeBus::bounded(id, channel_capacity);
        let snapshot = SharedSnapshot::default();
        let (done_tx, done_rx) = mpsc::channel();
        let dispatcher = Dispatcher::new(
            id,
            receiver,
            Aggregator::new(strategy),
            handlers,
            snapshot.clone(),
            max_handler_failures,
        );
        let thread = std::thread::Builder::new()
            .name(format!("proscope-dispatch-{}", id))
            .spawn(move || {
                let state = dispatcher.run();
                let _ = done_tx.send(state);
            })?;
        debug!(
            scope_id = id,
            strategy = strategy.as_str(),
            handlers = handler_count,
            "progress scope entered"
        );
        (
            bus,
            Some(DispatcherHandle {
                thread,
                done: done_rx,
                snapshot,
            }),
        )
    } else {
        debug!(scope_id = id, "disabled progress scope entered");
        (ScopeBus::disabled(id), None)
    };

    ACTIVE_SCOPE.with(|slot| *slot.borrow_mut() = Some(bus.clone()));

    Ok(ScopeGuard {
        id,
        strategy,
        bus,
        dispatcher,
        drain_timeout,
        started: Instant::now(),
        closed: false,
        _not_send: PhantomData,
    })
}

impl ScopeGuard {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn strategy(&self) -> AggregationStrategy {
        self.strategy
    }

    pub fn is_enabled(&self) -> bool {
        self.bus.is_enabled()
    }

    /// Signaler with `expected_steps` in this scope.
    pub fn signaler(&self, expected_steps: Option<u64>) -> Result<Signaler, ProgressError> {
        self.builder().steps(expected_steps).build()
    }

    /// Builder for a signaler in this scope.
    pub fn builder(&self) -> SignalerBuilder {
        SignalerBuilder::new(self.bus.clone())
    }

    /// Latest aggregate published by the dispatcher.
    pub fn snapshot(&self) -> AggregateState {
        self.dispatcher
            .as_ref()
            .map(|d| d.snapshot.lock().clone())
            .unwrap_or_default()
    }

    /// Exit the scope and return its final report.
    pub fn close(mut self) -> ScopeReport {
        self.shutdown()
    }

    fn shutdown(&mut self) -> ScopeReport {
        self.closed = true;
        ACTIVE_SCOPE.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.as_ref().map(ScopeBus::scope_id) == Some(self.id) {
                *slot = None;
            }
        });

        let deadline = Instant::now() + self.drain_timeout;
        let mut timed_out = false;
        let state = match self.dispatcher.take() {
            None => AggregateState::default(),
            Some(handle) => {
                if self.bus.close(deadline).is_err() {
                    warn!(scope_id = self.id, "progress bus did not accept close in time");
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                match handle.done.recv_timeout(remaining) {
                    Ok(state) => {
                        let _ = handle.thread.join();
                        state
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        timed_out = true;
                        warn!(
                            scope_id = self.id,
                            timeout_ms = self.drain_timeout.as_millis() as u64,
                            "progress dispatcher did not drain in time; detaching"
                        );
                        handle.snapshot.lock().clone()
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        warn!(scope_id = self.id, "progress dispatcher exited abnormally");
                        handle.snapshot.lock().clone()
                    }
                }
            }
        };

        let report = ScopeReport {
            scope_id: self.id,
            strategy: self.strategy,
            state,
            elapsed_ms: self.started.elapsed().as_millis(),
            timed_out,
        };
        debug!(
            scope_id = self.id,
            done = report.state.done,
            total = ?report.state.total,
            events = report.state.events_received,
            timed_out,
            "progress scope exited"
        );
        report
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if !self.closed {
            self.shutdown();
        }
    }
}

/// Run `f` inside a scope and return its value with the scope report.
pub fn with_progress<T, F>(options: ScopeOptions, f: F) -> Result<(T, ScopeReport), ProgressError>
where
    F: FnOnce(&ScopeGuard) -> T,
{
    let guard = enter_scope(options)?;
    let value = f(&guard);
    Ok((value, guard.close()))
}

/// Like [`with_progress`] for fallible work; handlers are finalized on the
/// error path as well.
pub fn try_with_progress<T, E, F>(options: ScopeOptions, f: F) -> Result<(T, ScopeReport), E>
where
    E: From<ProgressError>,
    F: FnOnce(&ScopeGuard) -> Result<T, E>,
{
    let guard = enter_scope(options)?;
    let value = f(&guard)?;
    Ok((value, guard.close()))
}

/// Run `f` with progress suppressed on this thread.
///
/// Signalers created inside succeed but their events go nowhere. Any scope
/// already active is restored afterwards.
pub fn without_progress<T, F>(f: F) -> T
where
    F: FnOnce() -> T,
{
    struct Restore(Option<ScopeBus>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0.take();
            ACTIVE_SCOPE.with(|slot| *slot.borrow_mut() = previous);
        }
    }

    let silent = ScopeBus::disabled(new_scope_id());
    let previous = ACTIVE_SCOPE.with(|slot| slot.borrow_mut().replace(silent));
    let _restore = Restore(previous);
    f()
}
