//! Value marshalling between host values and runtime objects.
//!
//! ## Type mapping
//!
//! | Native type | `NativeValue` | Runtime accessor |
//! |-------------|---------------|------------------|
//! | `i8`..`i64`, `isize` | `Int(i64)` | wide integer |
//! | `u8`..`u64`, `usize` | `Uint(u64)` | wide integer |
//! | `f32`, `f64` | `Float(f64)` | double |
//! | `bool` | `Bool(bool)` | boolean |
//! | `String` | `Str(String)` | string (must be UTF-8) |
//! | `Bytes`, `Vec<u8>` | `Bytes(Bytes)` | string (any bytes) |
//!
//! Integers narrower than 64 bits are range checked on the way in. `u64`
//! values travel through the runtime's signed wide integer by two's
//! complement, so `u64::MAX` reads as `-1` from script code but converts back
//! to `u64::MAX`.

use std::fmt;

use bytes::Bytes;
use tether_script::{Obj, ScriptError};

use crate::error::{Error, Result};

/// Describes the native type of a parameter or conversion target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeType {
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Bool,
    String,
    Bytes,
    /// Describes list-shaped values. The runtime has no mapping for these.
    List(Box<NativeType>),
}

impl NativeType {
    /// Whether values of this type can cross into the runtime.
    pub fn is_supported(&self) -> bool {
        !matches!(self, NativeType::List(_))
    }

    /// The zero value used for parameters a script call leaves out.
    pub fn zero(&self) -> NativeValue {
        match self {
            NativeType::I8
            | NativeType::I16
            | NativeType::I32
            | NativeType::I64
            | NativeType::Isize => NativeValue::Int(0),
            NativeType::U8
            | NativeType::U16
            | NativeType::U32
            | NativeType::U64
            | NativeType::Usize => NativeValue::Uint(0),
            NativeType::F32 | NativeType::F64 => NativeValue::Float(0.0),
            NativeType::Bool => NativeValue::Bool(false),
            NativeType::String => NativeValue::Str(String::new()),
            NativeType::Bytes => NativeValue::Bytes(Bytes::new()),
            NativeType::List(_) => NativeValue::List(Vec::new()),
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::I8 => write!(f, "i8"),
            NativeType::I16 => write!(f, "i16"),
            NativeType::I32 => write!(f, "i32"),
            NativeType::I64 => write!(f, "i64"),
            NativeType::Isize => write!(f, "isize"),
            NativeType::U8 => write!(f, "u8"),
            NativeType::U16 => write!(f, "u16"),
            NativeType::U32 => write!(f, "u32"),
            NativeType::U64 => write!(f, "u64"),
            NativeType::Usize => write!(f, "usize"),
            NativeType::F32 => write!(f, "f32"),
            NativeType::F64 => write!(f, "f64"),
            NativeType::Bool => write!(f, "bool"),
            NativeType::String => write!(f, "string"),
            NativeType::Bytes => write!(f, "bytes"),
            NativeType::List(inner) => write!(f, "list<{}>", inner),
        }
    }
}

/// A host value in marshallable form.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Str(String),
    Bytes(Bytes),
    List(Vec<NativeValue>),
}

impl NativeValue {
    pub fn kind(&self) -> &'static str {
        match self {
            NativeValue::Int(_) => "int",
            NativeValue::Uint(_) => "uint",
            NativeValue::Float(_) => "float",
            NativeValue::Bool(_) => "bool",
            NativeValue::Str(_) => "string",
            NativeValue::Bytes(_) => "bytes",
            NativeValue::List(_) => "list",
        }
    }
}

/// Convert a host value into a runtime object.
pub fn to_runtime_value(value: &NativeValue) -> Result<Obj> {
    match value {
        NativeValue::Int(v) => Ok(Obj::from_wide_int(*v)),
        NativeValue::Uint(v) => Ok(Obj::from_wide_int(*v as i64)),
        NativeValue::Float(v) => Ok(Obj::from_double(*v)),
        NativeValue::Bool(v) => Ok(Obj::from_boolean(*v)),
        NativeValue::Str(s) => Ok(Obj::from(s.clone())),
        NativeValue::Bytes(b) => Ok(Obj::from_bytes(b.clone())),
        NativeValue::List(_) => Err(Error::unsupported("list")),
    }
}

fn accessor_failed(err: ScriptError) -> Error {
    Error::conversion(err.message)
}

fn out_of_range(value: i64, target: &NativeType) -> Error {
    Error::conversion(format!("integer value {} out of range for {}", value, target))
}

fn signed(obj: &Obj, target: &NativeType, fits: impl Fn(i64) -> bool) -> Result<NativeValue> {
    let value = obj.get_wide_int().map_err(accessor_failed)?;
    if !fits(value) {
        return Err(out_of_range(value, target));
    }
    Ok(NativeValue::Int(value))
}

fn unsigned(obj: &Obj, target: &NativeType, max: u64) -> Result<NativeValue> {
    let value = obj.get_wide_int().map_err(accessor_failed)?;
    if max == u64::MAX {
        return Ok(NativeValue::Uint(value as u64));
    }
    match u64::try_from(value) {
        Ok(v) if v <= max => Ok(NativeValue::Uint(v)),
        _ => Err(out_of_range(value, target)),
    }
}

/// Convert a runtime object into a host value of the target type.
///
/// The runtime decides whether the object is syntactically a number or
/// boolean; its diagnostic becomes the conversion error.
pub fn from_runtime_value(obj: &Obj, target: &NativeType) -> Result<NativeValue> {
    let value = match target {
        NativeType::I8 => signed(obj, target, |v| i8::try_from(v).is_ok())?,
        NativeType::I16 => signed(obj, target, |v| i16::try_from(v).is_ok())?,
        NativeType::I32 => signed(obj, target, |v| i32::try_from(v).is_ok())?,
        NativeType::I64 => signed(obj, target, |_| true)?,
        NativeType::Isize => signed(obj, target, |v| isize::try_from(v).is_ok())?,
        NativeType::U8 => unsigned(obj, target, u8::MAX.into())?,
        NativeType::U16 => unsigned(obj, target, u16::MAX.into())?,
        NativeType::U32 => unsigned(obj, target, u32::MAX.into())?,
        NativeType::U64 => unsigned(obj, target, u64::MAX)?,
        NativeType::Usize => unsigned(obj, target, usize::MAX as u64)?,
        NativeType::F32 | NativeType::F64 => NativeValue::Float(obj.get_double().map_err(accessor_failed)?),
        NativeType::Bool => NativeValue::Bool(obj.get_boolean().map_err(accessor_failed)?),
        NativeType::String => {
            let bytes = obj.as_bytes();
            let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
                Error::conversion(format!("string is not valid UTF-8: {}", e))
            })?;
            NativeValue::Str(text)
        }
        NativeType::Bytes => NativeValue::Bytes(obj.as_bytes()),
        NativeType::List(_) => return Err(Error::unsupported(target.to_string())),
    };
    Ok(value)
}

/// Host values that can be handed to the runtime.
pub trait ToNative {
    fn to_native(self) -> NativeValue;
}

/// Host types that can be extracted from the runtime.
///
/// Implemented for the primitive integers, `f32`, `f64`, `bool`, `String`,
/// `Bytes` and `Vec<u8>`. These are the types callable parameters may have.
pub trait Native: ToNative + Sized + Send + 'static {
    fn native_type() -> NativeType;

    /// Extract from a value produced for [`Native::native_type`]. Returns
    /// `None` when the value has a different shape.
    fn from_native(value: NativeValue) -> Option<Self>;
}

impl ToNative for NativeValue {
    fn to_native(self) -> NativeValue {
        self
    }
}

macro_rules! native_signed {
    ($($ty:ty => $tag:ident),* $(,)?) => {$(
        impl ToNative for $ty {
            fn to_native(self) -> NativeValue {
                NativeValue::Int(self as i64)
            }
        }

        impl Native for $ty {
            fn native_type() -> NativeType {
                NativeType::$tag
            }

            fn from_native(value: NativeValue) -> Option<Self> {
                match value {
                    NativeValue::Int(v) => <$ty>::try_from(v).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

macro_rules! native_unsigned {
    ($($ty:ty => $tag:ident),* $(,)?) => {$(
        impl ToNative for $ty {
            fn to_native(self) -> NativeValue {
                NativeValue::Uint(self as u64)
            }
        }

        impl Native for $ty {
            fn native_type() -> NativeType {
                NativeType::$tag
            }

            fn from_native(value: NativeValue) -> Option<Self> {
                match value {
                    NativeValue::Uint(v) => <$ty>::try_from(v).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

native_signed!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, isize => Isize);
native_unsigned!(u8 => U8, u16 => U16, u32 => U32, u64 => U64, usize => Usize);

impl ToNative for f32 {
    fn to_native(self) -> NativeValue {
        NativeValue::Float(f64::from(self))
    }
}

impl Native for f32 {
    fn native_type() -> NativeType {
        NativeType::F32
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Float(v) => Some(v as f32),
            _ => None,
        }
    }
}

impl ToNative for f64 {
    fn to_native(self) -> NativeValue {
        NativeValue::Float(self)
    }
}

impl Native for f64 {
    fn native_type() -> NativeType {
        NativeType::F64
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl ToNative for bool {
    fn to_native(self) -> NativeValue {
        NativeValue::Bool(self)
    }
}

impl Native for bool {
    fn native_type() -> NativeType {
        NativeType::Bool
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl ToNative for String {
    fn to_native(self) -> NativeValue {
        NativeValue::Str(self)
    }
}

impl ToNative for &str {
    fn to_native(self) -> NativeValue {
        NativeValue::Str(self.to_string())
    }
}

impl Native for String {
    fn native_type() -> NativeType {
        NativeType::String
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl ToNative for Bytes {
    fn to_native(self) -> NativeValue {
        NativeValue::Bytes(self)
    }
}

impl Native for Bytes {
    fn native_type() -> NativeType {
        NativeType::Bytes
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl ToNative for Vec<u8> {
    fn to_native(self) -> NativeValue {
        NativeValue::Bytes(Bytes::from(self))
    }
}

impl Native for Vec<u8> {
    fn native_type() -> NativeType {
        NativeType::Bytes
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Bytes(b) => Some(b.to_vec()),
            _ => None,
        }
    }
}
