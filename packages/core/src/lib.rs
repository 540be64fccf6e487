//! tether-core: drive a tether-script interpreter from any thread
//!
//! An [`Interpreter`] owns a single-threaded script runtime on a dedicated
//! thread. The handle is `Send + Sync` and cheap to clone; every operation on
//! it is synchronous, runs inline on the owning thread, and is otherwise
//! queued in FIFO order while the caller blocks for the result.
//!
//! Host functions are exposed to scripts as commands, either one at a time
//! ([`Interpreter::register_command`]) or as a namespace built from a
//! receiver's exposed methods ([`MethodSet`]). Arguments are converted from
//! runtime values to host types with the rules in [`value`].
//!
//! # Example
//!
//! ```rust
//! use tether_core::{Init, Interpreter, InterpreterConfig};
//!
//! let (interp, done) = Interpreter::spawn(InterpreterConfig::default(), Init::None).unwrap();
//! interp.register_command("add", |a: i64, b: i64| println!("{}", a + b)).unwrap();
//! interp.set("x", 40i64).unwrap();
//! interp.evaluate("incr x 2").unwrap();
//! assert_eq!(interp.evaluate_as::<i64>("set x").unwrap(), 42);
//!
//! interp.evaluate("exit").unwrap();
//! done.wait();
//! ```

mod bridge;
pub mod callable;
pub mod config;
mod dispatch;
pub mod error;
pub mod image;
mod interpreter;
mod registry;
pub mod value;

pub use bridge::ErrorFilter;
pub use callable::{exposed_suffix, Callable, IntoCallable, IntoMethod, Method, MethodSet, Prebuilt};
pub use config::{InterpreterConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_THREAD_NAME};
pub use error::{EntryKind, Error, Result};
pub use image::{GrayImage, PixelSource, RgbImage, RgbaImage, RgbaView};
pub use interpreter::{Done, Init, Interpreter};
pub use value::{from_runtime_value, to_runtime_value, Native, NativeType, NativeValue, ToNative};
