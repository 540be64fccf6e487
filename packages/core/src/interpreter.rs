//! The public interpreter handle.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::task::{Context, Poll};
use std::thread::{self, ThreadId};

use bytes::Bytes;
use tether_script::Interp;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::bridge::{CallQueue, Core, ErrorFilter, PendingCall};
use crate::callable::{IntoCallable, MethodSet};
use crate::config::InterpreterConfig;
use crate::error::{Error, Result};
use crate::image::{self, PixelSource, RgbaImage};
use crate::value::{from_runtime_value, to_runtime_value, Native, NativeType, NativeValue, ToNative};

static NEXT_INTERPRETER_ID: AtomicU64 = AtomicU64::new(1);

type InitCallback = Box<dyn FnOnce(&Interpreter) -> Result<()> + Send>;

/// What to run on the owning thread before the event loop starts.
#[derive(Default)]
pub enum Init {
    #[default]
    None,
    /// A script evaluated in the fresh interpreter.
    Script(String),
    /// A callback receiving the interpreter handle. Calls made through the
    /// handle from inside the callback run inline.
    Callback(InitCallback),
}

impl Init {
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(&Interpreter) -> Result<()> + Send + 'static,
    {
        Init::Callback(Box::new(f))
    }

    fn run(self, interpreter: &Interpreter) -> Result<()> {
        match self {
            Init::None => Ok(()),
            Init::Script(script) => interpreter.evaluate(&script),
            Init::Callback(callback) => callback(interpreter),
        }
    }
}

impl From<&str> for Init {
    fn from(script: &str) -> Self {
        Init::Script(script.to_string())
    }
}

impl From<String> for Init {
    fn from(script: String) -> Self {
        Init::Script(script)
    }
}

impl fmt::Debug for Init {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Init::None => write!(f, "Init::None"),
            Init::Script(script) => f.debug_tuple("Init::Script").field(script).finish(),
            Init::Callback(_) => write!(f, "Init::Callback(..)"),
        }
    }
}

/// Resolves when the interpreter's event loop has exited.
///
/// [`Done::wait`] blocks the current thread; `Done` is also a `Future` for
/// hosts running an async runtime.
#[derive(Debug)]
pub struct Done {
    rx: oneshot::Receiver<()>,
    finished: bool,
}

impl Done {
    fn new(rx: oneshot::Receiver<()>) -> Self {
        Self { rx, finished: false }
    }

    /// Block until the event loop exits. Must not be called from inside an
    /// async runtime.
    pub fn wait(self) {
        if !self.finished {
            let _ = self.rx.blocking_recv();
        }
    }

    /// Whether the event loop has exited, without blocking.
    pub fn is_done(&mut self) -> bool {
        if !self.finished {
            self.finished = !matches!(
                self.rx.try_recv(),
                Err(oneshot::error::TryRecvError::Empty)
            );
        }
        self.finished
    }
}

impl Future for Done {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.finished {
            return Poll::Ready(());
        }
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(_) => {
                self.finished = true;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

struct Shared {
    id: u64,
    owner: ThreadId,
    queue: CallQueue,
}

/// Handle to an interpreter running on its own thread.
///
/// Every operation is synchronous. Called from the owning thread it runs
/// inline; called from any other thread it is queued, the owning thread's
/// event loop is woken, and the caller blocks until the result is ready.
/// Queued calls run in submission order.
///
/// Requesting threads block with a plain thread wait, so calls must not be
/// made from inside an async runtime's worker threads (use
/// `spawn_blocking`).
#[derive(Clone)]
pub struct Interpreter {
    shared: Arc<Shared>,
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("id", &self.shared.id)
            .field("owner", &self.shared.owner)
            .finish()
    }
}

impl Interpreter {
    /// Start an interpreter on a new thread.
    ///
    /// `init` runs on that thread before the event loop starts; if it fails
    /// the thread exits and the error is returned here. The returned [`Done`]
    /// resolves once the event loop exits (script `exit`).
    pub fn spawn(config: InterpreterConfig, init: impl Into<Init>) -> Result<(Self, Done)> {
        config.validate()?;
        let init = init.into();
        let (init_tx, init_rx) = std_mpsc::channel();
        let (done_tx, done_rx) = oneshot::channel();

        thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run_owner(config, init, init_tx, done_tx))
            .map_err(|e| Error::Spawn {
                message: e.to_string(),
            })?;

        let interpreter = init_rx.recv().map_err(|_| Error::Spawn {
            message: "interpreter thread exited during startup".to_string(),
        })??;
        Ok((interpreter, Done::new(done_rx)))
    }

    /// Whether the calling thread is the interpreter's owning thread.
    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.shared.owner
    }

    /// Run `action` on the owning thread: inline when already there,
    /// otherwise through the call queue.
    fn run<T, F>(&self, action: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Core) -> Result<T> + Send + 'static,
    {
        if self.is_owner_thread() {
            let core = Core::lookup(self.shared.id).ok_or(Error::Closed)?;
            return action(&core);
        }
        let (call, completion) = PendingCall::new(action);
        self.shared.queue.submit(call)?;
        completion.wait()
    }

    /// Evaluate a script.
    pub fn evaluate(&self, script: &str) -> Result<()> {
        self.evaluate_bytes(Bytes::copy_from_slice(script.as_bytes()))
    }

    /// Evaluate a script given as raw bytes.
    pub fn evaluate_bytes(&self, script: impl Into<Bytes>) -> Result<()> {
        let script = script.into();
        self.run(move |core| {
            let result = core.interp.eval(&script).map_err(Error::from);
            core.filter(result, || ())
        })
    }

    /// Evaluate a script and convert its result to `target`.
    pub fn evaluate_into(&self, target: NativeType, script: &str) -> Result<NativeValue> {
        let script = Bytes::copy_from_slice(script.as_bytes());
        self.run(move |core| {
            let result = core
                .interp
                .eval(&script)
                .map_err(Error::from)
                .and_then(|()| from_runtime_value(&core.interp.result(), &target));
            core.filter(result, || target.zero())
        })
    }

    /// Evaluate a script and convert its result to `T`.
    pub fn evaluate_as<T: Native>(&self, script: &str) -> Result<T> {
        let value = self.evaluate_into(T::native_type(), script)?;
        let kind = value.kind();
        T::from_native(value).ok_or_else(|| {
            Error::conversion(format!("cannot read a {} value as {}", kind, T::native_type()))
        })
    }

    /// Set a global variable.
    pub fn set(&self, name: &str, value: impl ToNative) -> Result<()> {
        let name = name.to_string();
        let value = value.to_native();
        self.run(move |core| {
            let result = to_runtime_value(&value).and_then(|obj| {
                core.interp.set_var(&name, obj)?;
                Ok(())
            });
            core.filter(result, || ())
        })
    }

    /// Install an error filter. Every error from a later operation passes
    /// through it exactly once, on the owning thread.
    pub fn set_error_filter<F>(&self, filter: F) -> Result<()>
    where
        F: Fn(Error) -> Option<Error> + Send + Sync + 'static,
    {
        let filter: ErrorFilter = Arc::new(filter);
        self.run(move |core| {
            core.set_error_filter(Some(filter));
            Ok(())
        })
    }

    pub fn clear_error_filter(&self) -> Result<()> {
        self.run(|core| {
            core.set_error_filter(None);
            Ok(())
        })
    }

    /// Copy `source` into the photo image `name`, creating it if needed.
    ///
    /// The pixels are converted to RGBA on the calling thread.
    pub fn upload_image<S: PixelSource + ?Sized>(&self, name: &str, source: &S) -> Result<()> {
        let name = name.to_string();
        let converted = RgbaImage::from_source(source);
        self.run(move |core| {
            let result = converted.and_then(|rgba| image::put_image(&core.interp, &name, &rgba));
            core.filter(result, || ())
        })
    }

    /// Expose a host function as the command `name`.
    pub fn register_command<Args>(&self, name: &str, f: impl IntoCallable<Args>) -> Result<()> {
        let name = name.to_string();
        let callable = f.into_callable();
        self.run(move |core| {
            let result = core.registry.register_command(&core.interp, &name, callable);
            core.filter(result, || ())
        })
    }

    /// Expose the `TCL`-prefixed methods of `receiver` as `namespace::Name`
    /// commands.
    pub fn register_commands<R: MethodSet>(&self, namespace: &str, receiver: R) -> Result<()> {
        let namespace = namespace.to_string();
        self.run(move |core| {
            let result = core
                .registry
                .register_commands(&core.interp, &namespace, receiver);
            core.filter(result, || ())
        })
    }

    pub fn unregister_command(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.run(move |core| {
            let result = core.registry.unregister_command(&core.interp, &name);
            core.filter(result, || ())
        })
    }

    /// Remove every command of a method set. All commands are attempted even
    /// if one fails; the first failure is returned and the namespace is
    /// released either way.
    pub fn unregister_commands(&self, namespace: &str) -> Result<()> {
        let namespace = namespace.to_string();
        self.run(move |core| {
            let result = core.registry.unregister_commands(&core.interp, &namespace);
            core.filter(result, || ())
        })
    }
}

fn run_owner(
    config: InterpreterConfig,
    init: Init,
    init_tx: std_mpsc::Sender<Result<Interpreter>>,
    done_tx: oneshot::Sender<()>,
) {
    let id = NEXT_INTERPRETER_ID.fetch_add(1, Ordering::Relaxed);
    let (calls_tx, calls_rx) = mpsc::channel(config.queue_capacity);
    let interp = Interp::new();
    let queue = CallQueue::new(id, calls_tx, interp.notifier());
    let core = Rc::new(Core::new(interp, calls_rx));
    Core::install(id, core.clone());

    let interpreter = Interpreter {
        shared: Arc::new(Shared {
            id,
            owner: thread::current().id(),
            queue,
        }),
    };
    debug!(
        interpreter = id,
        thread = %config.thread_name,
        queue_capacity = config.queue_capacity,
        "interpreter starting"
    );

    if let Err(err) = init.run(&interpreter) {
        error!(interpreter = id, error = %err, "interpreter initialization failed");
        Core::remove(id);
        let _ = init_tx.send(Err(err));
        return;
    }
    if init_tx.send(Ok(interpreter)).is_err() {
        Core::remove(id);
        return;
    }

    core.interp.run_event_loop();

    // Dropping the core closes the call queue; anything still queued is
    // released with `Error::Closed`.
    Core::remove(id);
    drop(core);
    debug!(interpreter = id, "interpreter stopped");
    let _ = done_tx.send(());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn() -> (Interpreter, Done) {
        Interpreter::spawn(InterpreterConfig::default(), Init::None).unwrap()
    }

    #[test]
    fn evaluate_from_another_thread() {
        let (interp, done) = spawn();
        assert!(!interp.is_owner_thread());
        interp.evaluate("set greeting hello").unwrap();
        assert_eq!(interp.evaluate_as::<String>("set greeting").unwrap(), "hello");
        interp.evaluate("exit").unwrap();
        done.wait();
    }

    #[test]
    fn init_script_runs_before_the_loop() {
        let (interp, done) =
            Interpreter::spawn(InterpreterConfig::default(), "set ready 1").unwrap();
        assert!(interp.evaluate_as::<bool>("set ready").unwrap());
        interp.evaluate("exit").unwrap();
        done.wait();
    }

    #[test]
    fn failing_init_is_reported() {
        let err = Interpreter::spawn(InterpreterConfig::default(), "nosuchcommand").unwrap_err();
        assert_eq!(err.to_string(), "invalid command name \"nosuchcommand\"");
    }

    #[test]
    fn init_callback_runs_inline_on_the_owning_thread() {
        let (interp, done) = Interpreter::spawn(
            InterpreterConfig::default().with_thread_name("owner-test"),
            Init::callback(|interp| {
                assert!(interp.is_owner_thread());
                assert_eq!(thread::current().name(), Some("owner-test"));
                interp.set("x", 42i64)
            }),
        )
        .unwrap();
        assert_eq!(interp.evaluate_as::<i64>("set x").unwrap(), 42);
        interp.evaluate("exit").unwrap();
        done.wait();
    }

    #[test]
    fn calls_after_exit_fail_with_closed() {
        let (interp, done) = spawn();
        interp.evaluate("exit").unwrap();
        done.wait();
        assert!(matches!(interp.evaluate("set x 1"), Err(Error::Closed)));
    }

    #[test]
    fn invalid_config_is_rejected_before_spawning() {
        let err = Interpreter::spawn(
            InterpreterConfig::default().with_queue_capacity(0),
            Init::None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn is_done_polls_without_blocking() {
        let (interp, mut done) = spawn();
        assert!(!done.is_done());
        interp.evaluate("exit").unwrap();
        while !done.is_done() {
            thread::yield_now();
        }
        done.wait();
    }
}
