//! Platform-independent shell core.

use tether::Interpreter;
use tracing::debug;

use crate::commands::{self, CommandResult};
use crate::io::{ExitReason, IoError, IoHost, Output, PromptConfig, Signal};

/// The shell loop. Talks to the user only through an [`IoHost`] and to the
/// interpreter only through its bridged handle, so it runs on any thread.
pub struct ReplCore {
    interp: Interpreter,
    line_number: usize,
    last_failed: bool,
}

impl ReplCore {
    pub fn new(interp: Interpreter) -> Self {
        Self {
            interp,
            line_number: 0,
            last_failed: false,
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interp
    }

    /// Run the shell until the user leaves or the interpreter exits.
    pub fn run(&mut self, io: &mut impl IoHost) -> Result<ExitReason, IoError> {
        io.write_output(Output::banner(BANNER))?;

        loop {
            io.write_prompt(PromptConfig {
                line_number: self.line_number,
                last_failed: self.last_failed,
            })?;
            io.wait_for_input()?;

            if let Some(signal) = io.read_signal()? {
                match signal {
                    Signal::Eof => {
                        io.write_output(Output::info("Goodbye!"))?;
                        io.flush()?;
                        return Ok(ExitReason::Eof);
                    }
                    Signal::Interrupt => {
                        io.write_output(Output::info("^C (use :quit to leave)"))?;
                        continue;
                    }
                }
            }

            let input = match io.read_input()? {
                Some(input) => input,
                None => continue,
            };

            self.line_number += 1;
            self.last_failed = false;
            match commands::execute(&input.line, &self.interp) {
                CommandResult::Ok { display: None } => {}
                CommandResult::Ok {
                    display: Some(output),
                } => io.write_output(Output::normal(output))?,
                CommandResult::Error(msg) => {
                    self.last_failed = true;
                    io.write_output(Output::error(msg))?;
                }
                CommandResult::Help => io.write_output(Output::normal(commands::format_help()))?,
                CommandResult::Exit => {
                    io.write_output(Output::info("Goodbye!"))?;
                    io.flush()?;
                    return Ok(ExitReason::UserExit);
                }
                CommandResult::Closed => return self.interpreter_exited(io),
            }

            if !self.interpreter_alive() {
                return self.interpreter_exited(io);
            }
            io.flush()?;
        }
    }

    /// Whether the interpreter's event loop is still running.
    ///
    /// The loop stops right after the event that requested it, before any
    /// later call is serviced, so an empty evaluation fails with `Closed`
    /// exactly when a previous line ran `exit`.
    fn interpreter_alive(&self) -> bool {
        !matches!(self.interp.evaluate(""), Err(tether::Error::Closed))
    }

    fn interpreter_exited(&self, io: &mut impl IoHost) -> Result<ExitReason, IoError> {
        debug!(lines = self.line_number, "interpreter exited");
        io.write_output(Output::info("Interpreter exited."))?;
        io.flush()?;
        Ok(ExitReason::InterpreterExit)
    }
}

const BANNER: &str = "tether shell. Type :help for help, :quit to leave.";
