//! Interpreter configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of calls that may wait in the call queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Default name of the interpreter's owning thread.
pub const DEFAULT_THREAD_NAME: &str = "tether-interp";

// Largest capacity the underlying channel accepts.
const MAX_QUEUE_CAPACITY: usize = usize::MAX >> 3;

/// Configuration for [`Interpreter::spawn`](crate::Interpreter::spawn).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Calls that may be queued before requesting threads have to wait.
    pub queue_capacity: usize,

    /// Name given to the owning thread.
    pub thread_name: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl InterpreterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::invalid_config("queue_capacity must be at least 1"));
        }
        if self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(Error::invalid_config(format!(
                "queue_capacity must be at most {}",
                MAX_QUEUE_CAPACITY
            )));
        }
        if self.thread_name.trim().is_empty() {
            return Err(Error::invalid_config("thread_name cannot be empty"));
        }
        Ok(())
    }
}
