//! # tether-repl
//!
//! An interactive shell for a tether interpreter.
//!
//! The interpreter runs on its own thread; the shell reads lines on the
//! terminal thread and evaluates them through the interpreter's bridged
//! handle, the same way any embedding host would.
//!
//! ## Usage
//!
//! ```bash
//! # Interactive shell
//! tether
//!
//! # Evaluate a script first, then stay interactive
//! tether --init setup.tcl
//!
//! # One-shot evaluation
//! tether -e 'set x [incr counter 2]'
//! ```

pub mod commands;
pub mod completer;
pub mod config;
pub mod host;
pub mod io;
pub mod repl;

use tether::{Done, Interpreter};

pub use config::{load_config, ReplError};
pub use io::ExitReason;
pub use repl::ReplCore;

/// Run the interactive shell on the terminal until the user leaves or the
/// interpreter exits, then stop the interpreter and wait for its thread.
pub fn run(interp: Interpreter, done: Done, force_vi: bool) -> Result<ExitReason, ReplError> {
    let mut host = host::TerminalHost::new(interp.clone(), force_vi)?;
    let mut core = ReplCore::new(interp.clone());
    let reason = core.run(&mut host)?;
    shutdown(&interp, done);
    Ok(reason)
}

/// Ask the interpreter to exit if it is still running, then wait for it.
pub fn shutdown(interp: &Interpreter, done: Done) {
    match interp.evaluate("exit") {
        Ok(()) | Err(tether::Error::Closed) => {}
        Err(err) => tracing::warn!(error = %err, "interpreter did not accept exit"),
    }
    done.wait();
}
