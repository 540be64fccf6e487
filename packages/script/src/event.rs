//! Cross-thread event submission.

use tokio::sync::mpsc;

use crate::error::{Result, ScriptError};
use crate::interp::Interp;

/// Work queued for the interpreter's thread.
pub type Event = Box<dyn FnOnce(&Interp) + Send>;

/// Queues events for an interpreter's event loop from any thread.
///
/// Queuing an event also wakes a loop that is blocked waiting for work.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Event>,
}

impl Notifier {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    /// Queue `event` to run on the interpreter's thread.
    ///
    /// Fails once the interpreter has been destroyed.
    pub fn queue_event<F>(&self, event: F) -> Result<()>
    where
        F: FnOnce(&Interp) + Send + 'static,
    {
        self.tx
            .send(Box::new(event))
            .map_err(|_| ScriptError::new("event loop has exited"))
    }

    /// Whether the interpreter behind this notifier is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("closed", &self.is_closed())
            .finish()
    }
}
