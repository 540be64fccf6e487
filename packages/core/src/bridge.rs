//! Cross-thread call bridge.
//!
//! A requesting thread wraps its work in a [`PendingCall`], pushes it onto
//! the bounded call queue and queues a service event on the interpreter's
//! event loop. The owning thread pops exactly one call per service event, so
//! calls run in the order they were queued. Each call carries its own
//! one-shot completion channel; the requester blocks on it until the result
//! arrives.
//!
//! The owning thread's state (interpreter, registry, error filter) lives in
//! a [`Core`] kept in a thread-local table keyed by interpreter id. Nothing
//! in a `Core` is ever touched from another thread.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tether_script::{Interp, Notifier};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, trace, warn};

use crate::dispatch::panic_message;
use crate::error::{Error, Result};
use crate::registry::Registry;

/// Post-processes errors from bridged operations.
///
/// Returning `None` suppresses the error; the operation then succeeds with
/// the zero value of its result.
pub type ErrorFilter = Arc<dyn Fn(Error) -> Option<Error> + Send + Sync>;

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CORES: RefCell<HashMap<u64, Rc<Core>>> = RefCell::new(HashMap::new());
}

/// Lifecycle of a pending call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallState {
    Created,
    Queued,
    Running,
    Completed,
}

type Action = Box<dyn FnOnce(&Core) + Send>;

/// One in-flight request from a requesting thread.
pub(crate) struct PendingCall {
    id: u64,
    state: CallState,
    action: Action,
}

/// The requester's side of a pending call.
pub(crate) struct Completion<T> {
    id: u64,
    rx: oneshot::Receiver<Result<T>>,
}

impl PendingCall {
    pub(crate) fn new<T, F>(action: F) -> (Self, Completion<T>)
    where
        T: Send + 'static,
        F: FnOnce(&Core) -> Result<T> + Send + 'static,
    {
        let id = NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let call = Self {
            id,
            state: CallState::Created,
            action: Box::new(move |core| {
                // The requester may have gone away; nothing to report then.
                let _ = tx.send(action(core));
            }),
        };
        (call, Completion { id, rx })
    }

    fn advance(&mut self, next: CallState) {
        trace!(call = self.id, from = ?self.state, to = ?next, "call state");
        self.state = next;
    }

    fn run(mut self, core: &Core) {
        self.advance(CallState::Running);
        let Self { id, state, action } = self;
        action(core);
        trace!(call = id, from = ?state, to = ?CallState::Completed, "call state");
    }
}

impl<T> Completion<T> {
    /// Block until the owning thread has run the call.
    pub(crate) fn wait(self) -> Result<T> {
        match self.rx.blocking_recv() {
            Ok(result) => result,
            Err(_) => {
                trace!(call = self.id, "call dropped without running");
                Err(Error::Closed)
            }
        }
    }
}

/// Producer side of the call queue, shared by all handles.
pub(crate) struct CallQueue {
    interpreter_id: u64,
    tx: mpsc::Sender<PendingCall>,
    notifier: Notifier,
}

impl CallQueue {
    pub(crate) fn new(interpreter_id: u64, tx: mpsc::Sender<PendingCall>, notifier: Notifier) -> Self {
        Self {
            interpreter_id,
            tx,
            notifier,
        }
    }

    /// Queue a call and wake the owning thread.
    ///
    /// A full queue blocks the caller until the owning thread makes room.
    pub(crate) fn submit(&self, mut call: PendingCall) -> Result<()> {
        call.advance(CallState::Queued);
        match self.tx.try_send(call) {
            Ok(()) => {}
            Err(TrySendError::Full(call)) => {
                warn!(
                    interpreter = self.interpreter_id,
                    capacity = self.tx.max_capacity(),
                    "call queue is full, waiting for the interpreter thread"
                );
                self.tx.blocking_send(call).map_err(|_| Error::Closed)?;
            }
            Err(TrySendError::Closed(_)) => return Err(Error::Closed),
        }

        let id = self.interpreter_id;
        self.notifier
            .queue_event(move |_: &Interp| Core::service(id))
            .map_err(|_| Error::Closed)
    }
}

/// Owning-thread state of one interpreter.
pub(crate) struct Core {
    // Dropped first so command deleters still find the registry.
    pub(crate) interp: Interp,
    pub(crate) registry: Rc<Registry>,
    calls: RefCell<mpsc::Receiver<PendingCall>>,
    error_filter: RefCell<Option<ErrorFilter>>,
    filtering: Cell<bool>,
}

struct FilterGuard<'a>(&'a Cell<bool>);

impl Drop for FilterGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Core {
    pub(crate) fn new(interp: Interp, calls: mpsc::Receiver<PendingCall>) -> Self {
        Self {
            interp,
            registry: Registry::new(),
            calls: RefCell::new(calls),
            error_filter: RefCell::new(None),
            filtering: Cell::new(false),
        }
    }

    pub(crate) fn install(id: u64, core: Rc<Core>) {
        CORES.with(|cores| cores.borrow_mut().insert(id, core));
    }

    pub(crate) fn remove(id: u64) -> Option<Rc<Core>> {
        CORES.with(|cores| cores.borrow_mut().remove(&id))
    }

    /// The core for interpreter `id`, if it belongs to the current thread and
    /// its loop has not exited.
    pub(crate) fn lookup(id: u64) -> Option<Rc<Core>> {
        CORES.with(|cores| cores.borrow().get(&id).cloned())
    }

    /// Run the oldest queued call.
    fn service(id: u64) {
        let Some(core) = Core::lookup(id) else {
            return;
        };
        let call = core.calls.borrow_mut().try_recv();
        match call {
            Ok(call) => call.run(&core),
            Err(err) => trace!(interpreter = id, error = %err, "service event without a call"),
        }
    }

    pub(crate) fn set_error_filter(&self, filter: Option<ErrorFilter>) {
        *self.error_filter.borrow_mut() = filter;
    }

    /// Pass a failed result through the error filter.
    ///
    /// The filter is skipped while it is itself running, so bridged calls it
    /// makes report their errors unfiltered. A panicking filter is logged and
    /// the original error is returned.
    pub(crate) fn filter<T>(&self, result: Result<T>, suppressed: impl FnOnce() -> T) -> Result<T> {
        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if self.filtering.get() {
            return Err(err);
        }
        let Some(filter) = self.error_filter.borrow().clone() else {
            return Err(err);
        };

        self.filtering.set(true);
        let _guard = FilterGuard(&self.filtering);
        match panic::catch_unwind(AssertUnwindSafe(|| filter(err.clone()))) {
            Ok(Some(err)) => Err(err),
            Ok(None) => {
                trace!("error suppressed by filter");
                Ok(suppressed())
            }
            Err(payload) => {
                error!(panic = %panic_message(payload.as_ref()), "error filter panicked");
                Err(err)
            }
        }
    }
}
