//! Error type for script evaluation.

use thiserror::Error;

/// A failed evaluation.
///
/// The message is what script code sees through `catch` and what the
/// interpreter leaves in its result after a failing `eval`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The standard arity complaint: `wrong # args: should be "usage"`.
    pub fn wrong_args(usage: &str) -> Self {
        Self::new(format!("wrong # args: should be \"{}\"", usage))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type Result<T> = std::result::Result<T, ScriptError>;
