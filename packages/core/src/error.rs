//! Error types for the bridge, marshaller and registry.

use std::fmt;

use tether_script::ScriptError;
use thiserror::Error;

/// What kind of registry entry an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Command,
    MethodSet,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Command => write!(f, "command"),
            EntryKind::MethodSet => write!(f, "method set"),
        }
    }
}

/// Errors returned by [`Interpreter`](crate::Interpreter) operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A native value of a kind the runtime cannot represent.
    #[error("unsupported type: {type_name}")]
    UnsupportedType { type_name: String },

    /// A runtime value could not be converted to the requested native type.
    #[error("conversion error: {message}")]
    Conversion { message: String },

    #[error("{kind} with name {name:?} already exists")]
    DuplicateRegistration { kind: EntryKind, name: String },

    /// The callable cannot be bound as a command.
    #[error("invalid callable: {message}")]
    InvalidCallable { message: String },

    #[error("{kind} with name {name:?} does not exist")]
    NotFound { kind: EntryKind, name: String },

    /// Script evaluation failed. Carries the runtime's diagnostic.
    #[error("{message}")]
    Script { message: String },

    /// An error rewritten by the error filter.
    #[error("{message}")]
    Filtered {
        message: String,
        #[source]
        source: Box<Error>,
    },

    /// The interpreter's event loop has exited.
    #[error("interpreter event loop has exited")]
    Closed,

    /// The interpreter thread could not be started.
    #[error("failed to start interpreter thread: {message}")]
    Spawn { message: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("image error: {message}")]
    Image { message: String },
}

impl Error {
    pub fn conversion(message: impl Into<String>) -> Self {
        Error::Conversion {
            message: message.into(),
        }
    }

    pub fn unsupported(type_name: impl Into<String>) -> Self {
        Error::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    pub fn invalid_callable(message: impl Into<String>) -> Self {
        Error::InvalidCallable {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }

    /// Wrap `source` with a new message. Intended for error filters.
    pub fn filtered(message: impl Into<String>, source: Error) -> Self {
        Error::Filtered {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, looking through any filter wrapping.
    pub fn root(&self) -> &Error {
        match self {
            Error::Filtered { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<ScriptError> for Error {
    fn from(err: ScriptError) -> Self {
        Error::Script {
            message: err.message,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_errors_keep_runtime_text() {
        let err: Error = ScriptError::new("invalid command name \"x\"").into();
        assert_eq!(err.to_string(), "invalid command name \"x\"");
    }

    #[test]
    fn filtered_errors_expose_their_source() {
        let inner = Error::conversion("expected integer but got \"a\"");
        let outer = Error::filtered("while loading config", inner);
        assert_eq!(outer.to_string(), "while loading config");
        assert!(matches!(outer.root(), Error::Conversion { .. }));
        let source = std::error::Error::source(&outer).map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("conversion error: expected integer but got \"a\"")
        );
    }

    #[test]
    fn registry_errors_name_the_entry() {
        let err = Error::DuplicateRegistration {
            kind: EntryKind::MethodSet,
            name: "ns".into(),
        };
        assert_eq!(err.to_string(), "method set with name \"ns\" already exists");
        let err = Error::NotFound {
            kind: EntryKind::Command,
            name: "cmd".into(),
        };
        assert_eq!(err.to_string(), "command with name \"cmd\" does not exist");
    }
}
