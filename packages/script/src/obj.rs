//! Runtime values.
//!
//! Every value in the language is a byte string. An [`Obj`] may additionally
//! carry an internal integer, double or boolean representation; the string
//! form of such an object is produced on demand and parses back to the same
//! value.

use std::fmt;

use bytes::Bytes;

use crate::error::{Result, ScriptError};

/// An immutable runtime value. Cloning is cheap.
#[derive(Clone)]
pub struct Obj {
    repr: Repr,
}

#[derive(Clone)]
enum Repr {
    Bytes(Bytes),
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl Obj {
    /// The empty string.
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// Wrap a byte string. No terminator is assumed, so embedded NUL bytes
    /// are preserved.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            repr: Repr::Bytes(bytes.into()),
        }
    }

    pub fn from_wide_int(value: i64) -> Self {
        Self {
            repr: Repr::Int(value),
        }
    }

    pub fn from_double(value: f64) -> Self {
        Self {
            repr: Repr::Double(value),
        }
    }

    pub fn from_boolean(value: bool) -> Self {
        Self {
            repr: Repr::Bool(value),
        }
    }

    /// The string representation as bytes.
    ///
    /// For string objects this shares the underlying buffer.
    pub fn as_bytes(&self) -> Bytes {
        match &self.repr {
            Repr::Bytes(bytes) => bytes.clone(),
            Repr::Int(value) => Bytes::from(value.to_string()),
            Repr::Double(value) => Bytes::from(format_double(*value)),
            Repr::Bool(true) => Bytes::from_static(b"1"),
            Repr::Bool(false) => Bytes::from_static(b"0"),
        }
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.as_bytes()).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        match &self.repr {
            Repr::Bytes(bytes) => bytes.is_empty(),
            _ => false,
        }
    }

    /// Interpret the value as a 64-bit integer.
    ///
    /// Accepts optional surrounding whitespace, a sign, and the `0x`, `0o`
    /// and `0b` radix prefixes.
    pub fn get_wide_int(&self) -> Result<i64> {
        match &self.repr {
            Repr::Int(value) => Ok(*value),
            Repr::Bool(value) => Ok(i64::from(*value)),
            _ => parse_wide_int(&self.as_bytes()),
        }
    }

    /// Interpret the value as a double.
    pub fn get_double(&self) -> Result<f64> {
        match &self.repr {
            Repr::Double(value) => Ok(*value),
            Repr::Int(value) => Ok(*value as f64),
            Repr::Bool(value) => Ok(if *value { 1.0 } else { 0.0 }),
            Repr::Bytes(bytes) => parse_double(bytes),
        }
    }

    /// Interpret the value as a boolean.
    ///
    /// Numbers are true when non-zero. The words `true`, `yes`, `on`,
    /// `false`, `no` and `off` are accepted case-insensitively, as are their
    /// unambiguous prefixes.
    pub fn get_boolean(&self) -> Result<bool> {
        match &self.repr {
            Repr::Bool(value) => Ok(*value),
            Repr::Int(value) => Ok(*value != 0),
            Repr::Double(value) => Ok(*value != 0.0),
            Repr::Bytes(bytes) => parse_boolean(bytes),
        }
    }
}

fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Inf" } else { "-Inf" }.to_string()
    } else {
        // Debug keeps the trailing ".0" on integral values.
        format!("{:?}", value)
    }
}

fn trimmed(bytes: &[u8]) -> Option<&str> {
    std::str::from_utf8(bytes)
        .ok()
        .map(|text| text.trim_matches(|c: char| c.is_ascii_whitespace()))
}

fn split_radix(digits: &str) -> (u32, &str) {
    let lower = digits.get(..2).map(str::to_ascii_lowercase);
    match lower.as_deref() {
        Some("0x") => (16, &digits[2..]),
        Some("0o") => (8, &digits[2..]),
        Some("0b") => (2, &digits[2..]),
        _ => (10, digits),
    }
}

fn parse_wide_int(bytes: &[u8]) -> Result<i64> {
    let invalid = || {
        ScriptError::new(format!(
            "expected integer but got \"{}\"",
            String::from_utf8_lossy(bytes)
        ))
    };
    let too_large = || ScriptError::new("integer value too large to represent");

    let text = trimmed(bytes).ok_or_else(invalid)?;
    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = split_radix(unsigned);
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }

    let magnitude = u64::from_str_radix(digits, radix).map_err(|_| too_large())?;
    if negative {
        if magnitude > i64::MAX as u64 + 1 {
            return Err(too_large());
        }
        Ok((magnitude as i64).wrapping_neg())
    } else {
        i64::try_from(magnitude).map_err(|_| too_large())
    }
}

fn parse_double(bytes: &[u8]) -> Result<f64> {
    let invalid = || {
        ScriptError::new(format!(
            "expected floating-point number but got \"{}\"",
            String::from_utf8_lossy(bytes)
        ))
    };

    if let Ok(value) = parse_wide_int(bytes) {
        return Ok(value as f64);
    }
    let text = trimmed(bytes).ok_or_else(invalid)?;
    let value: f64 = text.parse().map_err(|_| invalid())?;
    if value.is_nan() {
        return Err(ScriptError::new("floating point value is Not a Number"));
    }
    Ok(value)
}

const BOOLEAN_WORDS: [(&str, bool, usize); 6] = [
    ("true", true, 1),
    ("yes", true, 1),
    ("on", true, 2),
    ("false", false, 1),
    ("no", false, 1),
    ("off", false, 2),
];

fn parse_boolean(bytes: &[u8]) -> Result<bool> {
    let invalid = || {
        ScriptError::new(format!(
            "expected boolean value but got \"{}\"",
            String::from_utf8_lossy(bytes)
        ))
    };

    if let Ok(value) = parse_wide_int(bytes) {
        return Ok(value != 0);
    }
    let text = trimmed(bytes).ok_or_else(invalid)?.to_ascii_lowercase();
    for (word, value, min_len) in BOOLEAN_WORDS {
        if text.len() >= min_len && word.starts_with(text.as_str()) {
            return Ok(value);
        }
    }
    let numeric_start = text
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-'));
    if numeric_start {
        if let Ok(value) = text.parse::<f64>() {
            return Ok(value != 0.0);
        }
    }
    Err(invalid())
}

impl PartialEq for Obj {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Display for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Obj").field(&self.to_string_lossy()).finish()
    }
}

impl Default for Obj {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for Obj {
    fn from(s: &str) -> Self {
        Self::from_bytes(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Obj {
    fn from(s: String) -> Self {
        Self::from_bytes(s)
    }
}

impl From<&[u8]> for Obj {
    fn from(b: &[u8]) -> Self {
        Self::from_bytes(Bytes::copy_from_slice(b))
    }
}

impl From<Vec<u8>> for Obj {
    fn from(b: Vec<u8>) -> Self {
        Self::from_bytes(b)
    }
}

impl From<Bytes> for Obj {
    fn from(b: Bytes) -> Self {
        Self::from_bytes(b)
    }
}

impl From<i64> for Obj {
    fn from(v: i64) -> Self {
        Self::from_wide_int(v)
    }
}

impl From<f64> for Obj {
    fn from(v: f64) -> Self {
        Self::from_double(v)
    }
}

impl From<bool> for Obj {
    fn from(v: bool) -> Self {
        Self::from_boolean(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_parse_with_radix_and_sign() {
        assert_eq!(Obj::from(" 42 ").get_wide_int().unwrap(), 42);
        assert_eq!(Obj::from("-17").get_wide_int().unwrap(), -17);
        assert_eq!(Obj::from("0x1F").get_wide_int().unwrap(), 31);
        assert_eq!(Obj::from("0b101").get_wide_int().unwrap(), 5);
        assert_eq!(Obj::from("0o17").get_wide_int().unwrap(), 15);
        assert_eq!(
            Obj::from("-9223372036854775808").get_wide_int().unwrap(),
            i64::MIN
        );
    }

    #[test]
    fn non_integers_are_rejected_with_runtime_text() {
        let err = Obj::from("abc").get_wide_int().unwrap_err();
        assert_eq!(err.message(), "expected integer but got \"abc\"");

        let err = Obj::from("1.5").get_wide_int().unwrap_err();
        assert_eq!(err.message(), "expected integer but got \"1.5\"");

        let err = Obj::from("").get_wide_int().unwrap_err();
        assert_eq!(err.message(), "expected integer but got \"\"");
    }

    #[test]
    fn oversized_integers_are_rejected() {
        let err = Obj::from("9223372036854775808").get_wide_int().unwrap_err();
        assert_eq!(err.message(), "integer value too large to represent");
    }

    #[test]
    fn doubles_accept_integers_and_floats() {
        assert_eq!(Obj::from("2.5").get_double().unwrap(), 2.5);
        assert_eq!(Obj::from("0x10").get_double().unwrap(), 16.0);
        assert_eq!(Obj::from("1e3").get_double().unwrap(), 1000.0);
        assert!(Obj::from("Inf").get_double().unwrap().is_infinite());

        let err = Obj::from("x1").get_double().unwrap_err();
        assert_eq!(err.message(), "expected floating-point number but got \"x1\"");
    }

    #[test]
    fn double_string_form_parses_back() {
        for value in [0.1, -2.0, 1e300, f64::MIN_POSITIVE] {
            let text = Obj::from_double(value).as_bytes();
            assert_eq!(Obj::from_bytes(text).get_double().unwrap(), value);
        }
        assert_eq!(Obj::from_double(42.0).to_string(), "42.0");
    }

    #[test]
    fn booleans_accept_words_prefixes_and_numbers() {
        for truthy in ["1", "true", "TRUE", "t", "yes", "y", "on", "7", "0.5"] {
            assert!(Obj::from(truthy).get_boolean().unwrap(), "{}", truthy);
        }
        for falsy in ["0", "false", "f", "no", "n", "off", "of", "0.0"] {
            assert!(!Obj::from(falsy).get_boolean().unwrap(), "{}", falsy);
        }

        let err = Obj::from("o").get_boolean().unwrap_err();
        assert_eq!(err.message(), "expected boolean value but got \"o\"");
    }

    #[test]
    fn embedded_nul_bytes_survive() {
        let obj = Obj::from(&b"a\0b\xff"[..]);
        assert_eq!(&obj.as_bytes()[..], b"a\0b\xff");
        assert_eq!(obj.as_bytes().len(), 4);
    }

    #[test]
    fn internal_reps_have_string_forms() {
        assert_eq!(Obj::from_wide_int(-3).to_string(), "-3");
        assert_eq!(Obj::from_boolean(true).to_string(), "1");
        assert_eq!(Obj::from_boolean(false), Obj::from("0"));
    }
}
