//! Values exchanged between the shell and its [`IoHost`](super::IoHost).

use serde::{Deserialize, Serialize};

/// One script line as typed, without the trailing newline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputLine {
    pub line: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "lowercase")]
pub enum Signal {
    /// Ctrl+C: drop the current line and keep the interpreter running.
    Interrupt,
    /// Ctrl+D: leave the shell.
    Eof,
}

/// Text for the host to print, tagged with how to render it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub text: String,
    #[serde(default)]
    pub style: OutputStyle,
}

impl Output {
    fn styled(text: impl Into<String>, style: OutputStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn normal(text: impl Into<String>) -> Self {
        Self::styled(text, OutputStyle::Normal)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::styled(text, OutputStyle::Error)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::styled(text, OutputStyle::Info)
    }

    pub fn banner(text: impl Into<String>) -> Self {
        Self::styled(text, OutputStyle::Banner)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    /// The value a script line evaluated to.
    #[default]
    Normal,
    /// A script error, printed behind a red `Error:` label.
    Error,
    /// Messages from the shell itself.
    Info,
    Banner,
}

/// What the host needs to draw the next prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptConfig {
    /// Script lines evaluated so far.
    pub line_number: usize,
    /// The last script line raised an error.
    pub last_failed: bool,
}

/// Why [`ReplCore::run`](crate::repl::ReplCore::run) returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// `:quit` was entered.
    UserExit,
    Eof,
    /// A script ran `exit` and the interpreter thread finished.
    InterpreterExit,
}
