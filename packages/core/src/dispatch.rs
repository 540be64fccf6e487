//! Command procedures for registered callables.
//!
//! Runs on the owning thread whenever script code invokes a registered name.
//! Arguments are marshalled positionally; parameters the script leaves out
//! get their zero value and extra script arguments are ignored. A failed
//! conversion aborts the invocation before the host function runs and is
//! reported through the runtime's own error result.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tether_script::{Interp, Obj, ScriptError};
use tracing::{error, trace};

use crate::callable::{Callable, Method};
use crate::error::{Error, Result};
use crate::value::{from_runtime_value, NativeType, NativeValue};

/// Build the native argument vector for `params` from script arguments.
pub(crate) fn marshal_args(params: &[NativeType], args: &[Obj]) -> Result<Vec<NativeValue>> {
    params
        .iter()
        .enumerate()
        .map(|(index, ty)| match args.get(index) {
            Some(obj) => from_runtime_value(obj, ty),
            None => Ok(ty.zero()),
        })
        .collect()
}

/// The runtime-visible form of a dispatch failure.
fn script_error(err: Error) -> ScriptError {
    match err {
        Error::Conversion { message } => ScriptError::new(message),
        other => ScriptError::new(other.to_string()),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run a host function, turning a panic into a script error so the event
/// loop survives.
fn guarded(name: &str, call: impl FnOnce() -> Result<()>) -> std::result::Result<(), ScriptError> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result.map_err(script_error),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(command = %name, panic = %message, "host command panicked");
            Err(ScriptError::new(format!(
                "host command \"{}\" panicked: {}",
                name, message
            )))
        }
    }
}

/// Command procedure for a plain registered callable.
pub(crate) fn command_proc(
    name: String,
    callable: Rc<Callable>,
) -> impl Fn(&Interp, &[Obj]) -> std::result::Result<Obj, ScriptError> {
    move |_interp, objv| {
        let args = marshal_args(callable.params(), &objv[1..]).map_err(script_error)?;
        trace!(command = %name, argc = objv.len() - 1, "dispatch");
        guarded(&name, || callable.call(args))?;
        Ok(Obj::empty())
    }
}

/// Command procedure for one method of a method set. The receiver is bound
/// here; script argument `i` fills method parameter `i + 1`.
pub(crate) fn method_proc<R: 'static>(
    name: String,
    receiver: Rc<R>,
    method: Rc<Method<R>>,
) -> impl Fn(&Interp, &[Obj]) -> std::result::Result<Obj, ScriptError> {
    move |_interp, objv| {
        let args = marshal_args(method.params(), &objv[1..]).map_err(script_error)?;
        trace!(command = %name, method = method.name(), "dispatch");
        guarded(&name, || method.call(&receiver, args))?;
        Ok(Obj::empty())
    }
}
