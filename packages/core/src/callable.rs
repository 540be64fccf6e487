//! Host callables and method sets.
//!
//! A [`Callable`] is an ordered list of parameter types plus a thunk that
//! unpacks a marshalled argument vector and calls the host function. Both are
//! built once, when a closure or function is converted with
//! [`IntoCallable`]. Dispatch never inspects the host function again.
//!
//! Return values of host functions are discarded.

use std::fmt;

use crate::error::{Error, Result};
use crate::value::{Native, NativeType, NativeValue};

type Thunk = Box<dyn Fn(Vec<NativeValue>) -> Result<()> + Send>;
type MethodThunk<R> = Box<dyn Fn(&R, Vec<NativeValue>) -> Result<()> + Send>;

/// A host function that can be bound as a runtime command.
pub struct Callable {
    params: Vec<NativeType>,
    thunk: Thunk,
}

impl Callable {
    /// Build a callable from an explicit parameter list.
    ///
    /// `f` receives one value per parameter, each of its declared type.
    pub fn new<F>(params: Vec<NativeType>, f: F) -> Self
    where
        F: Fn(Vec<NativeValue>) + Send + 'static,
    {
        Self {
            params,
            thunk: Box::new(move |args| {
                f(args);
                Ok(())
            }),
        }
    }

    fn from_thunk(params: Vec<NativeType>, thunk: Thunk) -> Self {
        Self { params, thunk }
    }

    pub fn params(&self) -> &[NativeType] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_params(&self.params)
    }

    pub(crate) fn call(&self, args: Vec<NativeValue>) -> Result<()> {
        (self.thunk)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

fn validate_params(params: &[NativeType]) -> Result<()> {
    match params.iter().position(|ty| !ty.is_supported()) {
        Some(index) => Err(Error::invalid_callable(format!(
            "parameter {} has unsupported type {}",
            index, params[index]
        ))),
        None => Ok(()),
    }
}

fn extract<T: Native>(args: &mut impl Iterator<Item = NativeValue>, index: &mut usize) -> Result<T> {
    let position = *index;
    *index += 1;
    args.next().and_then(T::from_native).ok_or_else(|| {
        Error::conversion(format!(
            "argument {} is not a {}",
            position,
            T::native_type()
        ))
    })
}

/// Conversion of host functions into [`Callable`]s.
///
/// Implemented for `Callable` itself and for every `Fn` of up to eight
/// [`Native`] parameters. `Args` only disambiguates the implementations.
pub trait IntoCallable<Args>: Send + 'static {
    fn into_callable(self) -> Callable;
}

/// Marker for callables that were already built.
pub struct Prebuilt;

impl IntoCallable<Prebuilt> for Callable {
    fn into_callable(self) -> Callable {
        self
    }
}

/// A host function bound to a receiver of type `R`.
pub struct Method<R> {
    name: String,
    params: Vec<NativeType>,
    thunk: MethodThunk<R>,
}

impl<R: 'static> Method<R> {
    /// Wrap `f`, whose first parameter is the receiver.
    pub fn new<Args>(name: impl Into<String>, f: impl IntoMethod<R, Args>) -> Self {
        let (params, thunk) = f.into_parts();
        Self {
            name: name.into(),
            params,
            thunk,
        }
    }

    /// Build a method from an explicit parameter list, not counting the
    /// receiver.
    pub fn dynamic<F>(name: impl Into<String>, params: Vec<NativeType>, f: F) -> Self
    where
        F: Fn(&R, Vec<NativeValue>) + Send + 'static,
    {
        Self {
            name: name.into(),
            params,
            thunk: Box::new(move |receiver, args| {
                f(receiver, args);
                Ok(())
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter types after the receiver.
    pub fn params(&self) -> &[NativeType] {
        &self.params
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_params(&self.params).map_err(|err| match err {
            Error::InvalidCallable { message } => {
                Error::invalid_callable(format!("method {}: {}", self.name, message))
            }
            other => other,
        })
    }

    pub(crate) fn call(&self, receiver: &R, args: Vec<NativeValue>) -> Result<()> {
        (self.thunk)(receiver, args)
    }
}

impl<R> fmt::Debug for Method<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Conversion of `Fn(&R, ...)` into a method thunk.
pub trait IntoMethod<R, Args>: Send + 'static {
    fn into_parts(self) -> (Vec<NativeType>, MethodThunk<R>);
}

/// A receiver type whose methods can be exposed as a namespace of commands.
///
/// Only methods whose names start with `TCL` or `TCL_` are exposed; the
/// prefix is stripped, so `TCLOpen` in namespace `file` becomes the command
/// `file::Open`.
///
/// ```rust
/// use std::cell::Cell;
/// use tether_core::{Method, MethodSet};
///
/// struct Counter {
///     value: Cell<i64>,
/// }
///
/// impl MethodSet for Counter {
///     fn methods() -> Vec<Method<Self>> {
///         vec![
///             Method::new("TCLAdd", |c: &Counter, n: i64| c.value.set(c.value.get() + n)),
///             Method::new("TCL_Reset", |c: &Counter| c.value.set(0)),
///             Method::new("helper", |_: &Counter| {}),
///         ]
///     }
/// }
/// ```
pub trait MethodSet: Sized + Send + 'static {
    fn methods() -> Vec<Method<Self>>;
}

/// The command suffix for an exposed method name, or `None` if the method
/// is not exposed.
pub fn exposed_suffix(name: &str) -> Option<&str> {
    let suffix = name
        .strip_prefix("TCL_")
        .or_else(|| name.strip_prefix("TCL"))?;
    (!suffix.is_empty()).then_some(suffix)
}

macro_rules! impl_callables {
    ($($arg:ident),*) => {
        impl<F, Ret, $($arg,)*> IntoCallable<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> Ret + Send + 'static,
            $($arg: Native,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_callable(self) -> Callable {
                let params = vec![$($arg::native_type()),*];
                Callable::from_thunk(
                    params,
                    Box::new(move |args: Vec<NativeValue>| {
                        let mut args = args.into_iter();
                        let mut index = 0;
                        $(let $arg: $arg = extract(&mut args, &mut index)?;)*
                        let _ = (self)($($arg),*);
                        Ok(())
                    }),
                )
            }
        }

        impl<R, F, Ret, $($arg,)*> IntoMethod<R, ($($arg,)*)> for F
        where
            R: 'static,
            F: Fn(&R, $($arg),*) -> Ret + Send + 'static,
            $($arg: Native,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_parts(self) -> (Vec<NativeType>, MethodThunk<R>) {
                let params = vec![$($arg::native_type()),*];
                let thunk: MethodThunk<R> = Box::new(move |receiver: &R, args: Vec<NativeValue>| {
                    let mut args = args.into_iter();
                    let mut index = 1;
                    $(let $arg: $arg = extract(&mut args, &mut index)?;)*
                    let _ = (self)(receiver, $($arg),*);
                    Ok(())
                });
                (params, thunk)
            }
        }
    };
}

impl_callables!();
impl_callables!(A1);
impl_callables!(A1, A2);
impl_callables!(A1, A2, A3);
impl_callables!(A1, A2, A3, A4);
impl_callables!(A1, A2, A3, A4, A5);
impl_callables!(A1, A2, A3, A4, A5, A6);
impl_callables!(A1, A2, A3, A4, A5, A6, A7);
impl_callables!(A1, A2, A3, A4, A5, A6, A7, A8);
