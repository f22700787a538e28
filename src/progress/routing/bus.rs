//! Bounded in-process bus carrying signaler events to a scope's dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::progress::events::ProgressEvent;

/// Message consumed by the dispatcher loop.
#[derive(Debug)]
pub enum ScopeMessage {
    Event(ProgressEvent),
    /// Stop after everything queued before this message.
    Close,
}

/// Returned when the scope behind the bus is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusClosed;

/// Sending side of a scope. Cheap to clone and safe to share across threads.
#[derive(Debug, Clone)]
pub struct ScopeBus {
    scope_id: u64,
    // `None` for disabled scopes: every emit is accepted and discarded.
    sender: Option<SyncSender<ScopeMessage>>,
    // Set on close so late emits fail fast even while the dispatcher drains.
    closed: Arc<AtomicBool>,
}

impl ScopeBus {
    pub fn bounded(scope_id: u64, capacity: usize) -> (Self, Receiver<ScopeMessage>) {
        let (sender, receiver) = sync_channel(capacity.max(1));
        (
            Self {
                scope_id,
                sender: Some(sender),
                closed: Arc::new(AtomicBool::new(false)),
            },
            receiver,
        )
    }

    pub fn disabled(scope_id: u64) -> Self {
        Self {
            scope_id,
            sender: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn scope_id(&self) -> u64 {
        self.scope_id
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queue an event. Blocks only while the buffer is full.
    ///
    /// An emit racing with `close` can pass the flag check and still land
    /// behind the close marker; the dispatcher discards such events and
    /// traces the count.
    pub fn emit(&self, event: ProgressEvent) -> Result<(), BusClosed> {
        match &self.sender {
            Some(_) if self.closed.load(Ordering::Acquire) => Err(BusClosed),
            Some(sender) => sender.send(ScopeMessage::Event(event)).map_err(|_| BusClosed),
            None => Ok(()),
        }
    }

    /// Queue the close marker, giving up at `deadline` if the buffer stays full.
    pub fn close(&self, deadline: Instant) -> Result<(), BusClosed> {
        let Some(sender) = &self.sender else {
            return Ok(());
        };
        self.closed.store(true, Ordering::Release);
        loop {
            match sender.try_send(ScopeMessage::Close) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Disconnected(_)) => return Err(BusClosed),
                Err(TrySendError::Full(_)) => {
                    if Instant::now() >= deadline {
                        return Err(BusClosed);
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }
}
