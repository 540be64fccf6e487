//! tether-script: an embeddable, single-threaded command language
//!
//! The runtime is a small Tcl-flavoured interpreter. Scripts are sequences of
//! commands; every value is a byte string, optionally carrying an internal
//! number or boolean representation ([`Obj`]).
//!
//! An [`Interp`] belongs to the thread that created it. Other threads hand it
//! work by queuing events through a [`Notifier`]; the owning thread runs
//! [`Interp::run_event_loop`] to service them.
//!
//! # Example
//!
//! ```rust
//! use tether_script::{Interp, Obj};
//!
//! let interp = Interp::new();
//! interp.create_command("double", |_, objv| {
//!     let n = objv[1].get_wide_int()?;
//!     Ok(Obj::from_wide_int(n * 2))
//! }, None);
//! interp.eval(b"set x [double 21]").unwrap();
//! assert_eq!(interp.result().get_wide_int().unwrap(), 42);
//! ```

mod builtins;
mod error;
mod event;
mod interp;
mod obj;
mod parser;
mod photo;

pub use error::{Result, ScriptError};
pub use event::{Event, Notifier};
pub use interp::{CommandProc, DeleteProc, Interp};
pub use obj::Obj;
pub use photo::{PhotoBlock, PhotoHandle};

pub use bytes::Bytes;
