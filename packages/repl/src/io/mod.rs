//! Line-oriented terminal surface of the shell.
//!
//! [`ReplCore`](crate::repl::ReplCore) never talks to a terminal directly.
//! It pulls script lines and key signals from an [`IoHost`] and pushes
//! results back, so tests can drive it from a scripted host.

pub mod types;

#[cfg(test)]
pub mod test_host;

pub use types::*;

#[cfg(test)]
pub use test_host::TestHost;

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("terminal failure: {0}")]
    Io(String),
}

/// Where script lines come from and where results go.
pub trait IoHost {
    /// Block until the user has entered a line or pressed an interrupt key.
    ///
    /// The line or signal is then handed out by `read_input` or
    /// `read_signal`.
    fn wait_for_input(&mut self) -> Result<(), IoError>;

    fn read_input(&mut self) -> Result<Option<InputLine>, IoError>;

    /// Ctrl+C or Ctrl+D seen by the last wait, if any.
    fn read_signal(&mut self) -> Result<Option<Signal>, IoError>;

    /// Print a script result, an error or a shell message.
    fn write_output(&mut self, output: Output) -> Result<(), IoError>;

    /// Set up the prompt shown for the next script line.
    fn write_prompt(&mut self, config: PromptConfig) -> Result<(), IoError>;

    fn flush(&mut self) -> Result<(), IoError> {
        Ok(())
    }
}
