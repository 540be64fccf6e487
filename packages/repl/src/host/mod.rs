//! Host implementations for the shell.

pub mod terminal;

pub use terminal::TerminalHost;
