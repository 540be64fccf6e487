//! # tether
//!
//! Run an embedded command interpreter on its own thread and drive it
//! synchronously from anywhere else.
//!
//! This crate re-exports the public surface of `tether-core`. The runtime
//! itself is available as [`script`] for code that runs on the owning
//! thread.
//!
//! ```rust
//! use tether::{Init, Interpreter, InterpreterConfig};
//!
//! let (interp, done) = Interpreter::spawn(InterpreterConfig::default(), Init::None)?;
//! interp.evaluate("set greeting {hello world}")?;
//! assert_eq!(interp.evaluate_as::<String>("set greeting")?, "hello world");
//! interp.evaluate("exit")?;
//! done.wait();
//! # Ok::<(), tether::Error>(())
//! ```

pub use tether_core::*;

pub use tether_script as script;
