//! Script parsing and substitution.
//!
//! Parsing and evaluation are interleaved: each command is split into words,
//! substitutions are performed as the words are read, and the command runs
//! before the next one is parsed. A bracketed substitution is only run once
//! its closing bracket has been found.

use crate::error::{Result, ScriptError};
use crate::interp::Interp;
use crate::obj::Obj;

pub(crate) struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

/// Accumulates the pieces of one word.
///
/// A word consisting of exactly one substitution keeps the substituted
/// object, so integer and double values are not forced through a string.
#[derive(Default)]
struct Word {
    buf: Vec<u8>,
    sole: Option<Obj>,
    pieces: usize,
}

impl Word {
    fn push_obj(&mut self, obj: Obj) {
        self.pieces += 1;
        self.buf.extend_from_slice(&obj.as_bytes());
        self.sole = (self.pieces == 1).then_some(obj);
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.pieces += 1;
        self.buf.extend_from_slice(bytes);
        self.sole = None;
    }

    fn finish(self) -> Obj {
        match self.sole {
            Some(obj) if self.pieces == 1 => obj,
            _ => Obj::from(self.buf),
        }
    }
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a [u8]) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    /// Evaluate commands until the end of input, or until the closing
    /// bracket when `nested` is set. Returns the result of the last command.
    pub(crate) fn eval_commands(&mut self, interp: &Interp, nested: bool) -> Result<Obj> {
        let mut result = Obj::empty();
        loop {
            self.skip_separators();
            match self.peek() {
                None if nested => return Err(ScriptError::new("missing close-bracket")),
                None => return Ok(result),
                Some(b']') if nested => {
                    self.pos += 1;
                    return Ok(result);
                }
                Some(b'#') => {
                    self.skip_comment();
                    continue;
                }
                Some(_) => {}
            }

            let words = self.parse_words(interp, nested)?;
            if !words.is_empty() {
                result = interp.invoke(&words)?;
            }
        }
    }

    fn skip_separators(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' | b'\r' | b'\n' | b';' => self.pos += 1,
                b'\\' if self.peek_at(1) == Some(b'\n') => self.pos += 2,
                _ => break,
            }
        }
    }

    fn skip_blanks(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'\\' if self.peek_at(1) == Some(b'\n') => self.pos += 2,
                _ => break,
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                b'\\' => self.pos += 1,
                b'\n' => break,
                _ => {}
            }
        }
    }

    fn parse_words(&mut self, interp: &Interp, nested: bool) -> Result<Vec<Obj>> {
        let mut words = Vec::new();
        loop {
            self.skip_blanks();
            match self.peek() {
                None => return Ok(words),
                Some(b'\n' | b';') => {
                    self.pos += 1;
                    return Ok(words);
                }
                Some(b']') if nested => return Ok(words),
                Some(b'{') => words.push(self.parse_braced(nested)?),
                Some(b'"') => words.push(self.parse_quoted(interp, nested)?),
                Some(_) => words.push(self.parse_bare(interp, nested)?),
            }
        }
    }

    fn at_word_end(&self, nested: bool) -> bool {
        match self.peek() {
            None | Some(b' ' | b'\t' | b'\r' | b'\n' | b';') => true,
            Some(b']') => nested,
            Some(b'\\') => self.peek_at(1) == Some(b'\n'),
            Some(_) => false,
        }
    }

    fn parse_braced(&mut self, nested: bool) -> Result<Obj> {
        let start = self.pos + 1;
        let mut depth = 0usize;
        let mut i = self.pos;
        while i < self.src.len() {
            match self.src[i] {
                b'\\' => {
                    i += 2;
                    continue;
                }
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let body = &self.src[start..i];
                        self.pos = i + 1;
                        if !self.at_word_end(nested) {
                            return Err(ScriptError::new("extra characters after close-brace"));
                        }
                        return Ok(Obj::from(join_continued_lines(body)));
                    }
                }
                _ => {}
            }
            i += 1;
        }
        Err(ScriptError::new("missing close-brace"))
    }

    fn parse_quoted(&mut self, interp: &Interp, nested: bool) -> Result<Obj> {
        self.pos += 1;
        let mut word = Word::default();
        loop {
            match self.peek() {
                None => return Err(ScriptError::new("missing \"")),
                Some(b'"') => {
                    self.pos += 1;
                    if !self.at_word_end(nested) {
                        return Err(ScriptError::new("extra characters after close-quote"));
                    }
                    return Ok(word.finish());
                }
                Some(b'$') => self.substitute_var(interp, &mut word)?,
                Some(b'[') => self.substitute_command(interp, &mut word)?,
                Some(b'\\') => self.substitute_backslash(&mut word),
                Some(_) => {
                    let start = self.pos;
                    while let Some(c) = self.peek() {
                        if matches!(c, b'"' | b'$' | b'[' | b'\\') {
                            break;
                        }
                        self.pos += 1;
                    }
                    word.push_bytes(&self.src[start..self.pos]);
                }
            }
        }
    }

    fn parse_bare(&mut self, interp: &Interp, nested: bool) -> Result<Obj> {
        let mut word = Word::default();
        while !self.at_word_end(nested) {
            match self.peek() {
                Some(b'$') => self.substitute_var(interp, &mut word)?,
                Some(b'[') => self.substitute_command(interp, &mut word)?,
                Some(b'\\') => self.substitute_backslash(&mut word),
                _ => {
                    let start = self.pos;
                    while !self.at_word_end(nested)
                        && !matches!(self.peek(), Some(b'$' | b'[' | b'\\'))
                    {
                        self.pos += 1;
                    }
                    word.push_bytes(&self.src[start..self.pos]);
                }
            }
        }
        Ok(word.finish())
    }

    fn substitute_var(&mut self, interp: &Interp, word: &mut Word) -> Result<()> {
        let rest = &self.src[self.pos + 1..];
        if rest.first() == Some(&b'{') {
            let close = rest
                .iter()
                .position(|&b| b == b'}')
                .ok_or_else(|| ScriptError::new("missing close-brace for variable name"))?;
            let name = String::from_utf8_lossy(&rest[1..close]).into_owned();
            self.pos += close + 2;
            word.push_obj(interp.get_var(&name)?);
            return Ok(());
        }

        let len = var_name_len(rest);
        if len == 0 {
            self.pos += 1;
            word.push_bytes(b"$");
            return Ok(());
        }
        let name = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += 1 + len;
        word.push_obj(interp.get_var(&name)?);
        Ok(())
    }

    fn substitute_command(&mut self, interp: &Interp, word: &mut Word) -> Result<()> {
        self.pos += 1;
        if find_close_bracket(self.src, self.pos).is_none() {
            return Err(ScriptError::new("missing close-bracket"));
        }
        let _guard = interp.enter()?;
        let result = self.eval_commands(interp, true)?;
        word.push_obj(result);
        Ok(())
    }

    fn substitute_backslash(&mut self, word: &mut Word) {
        let (bytes, consumed) = backslash_sequence(&self.src[self.pos..]);
        self.pos += consumed;
        word.push_bytes(&bytes);
    }
}

fn var_name_len(rest: &[u8]) -> usize {
    let mut i = 0;
    while i < rest.len() {
        if rest[i].is_ascii_alphanumeric() || rest[i] == b'_' {
            i += 1;
        } else if rest[i] == b':' && rest.get(i + 1) == Some(&b':') {
            i += 2;
        } else {
            break;
        }
    }
    i
}

/// Backslash-newline plus any following blanks becomes a single space.
/// Index of the `]` closing a substitution whose body starts at `i`.
///
/// Braced and quoted words are skipped with the same word-start rules the
/// parser applies, so a `]` inside them does not count.
fn find_close_bracket(src: &[u8], mut i: usize) -> Option<usize> {
    let mut word_start = true;
    while let Some(&b) = src.get(i) {
        match b {
            b'\\' => {
                i += 2;
                word_start = false;
                continue;
            }
            b']' => return Some(i),
            b'[' => {
                i = find_close_bracket(src, i + 1)? + 1;
                word_start = false;
                continue;
            }
            b'{' if word_start => {
                i = skip_braced(src, i)?;
                word_start = false;
                continue;
            }
            b'"' if word_start => {
                i = skip_quoted(src, i)?;
                word_start = false;
                continue;
            }
            b' ' | b'\t' | b'\n' | b'\r' | b';' => word_start = true,
            _ => word_start = false,
        }
        i += 1;
    }
    None
}

/// Position just past the brace matching the one at `i`.
fn skip_braced(src: &[u8], mut i: usize) -> Option<usize> {
    let mut depth = 0usize;
    while let Some(&b) = src.get(i) {
        match b {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Position just past the quote closing the one at `i`.
fn skip_quoted(src: &[u8], mut i: usize) -> Option<usize> {
    i += 1;
    while let Some(&b) = src.get(i) {
        match b {
            b'\\' => i += 2,
            b'"' => return Some(i + 1),
            b'[' => i = find_close_bracket(src, i + 1)? + 1,
            _ => i += 1,
        }
    }
    None
}

fn join_continued_lines(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        if body[i] == b'\\' && body.get(i + 1) == Some(&b'\n') {
            i += 2;
            while matches!(body.get(i), Some(b' ' | b'\t')) {
                i += 1;
            }
            out.push(b' ');
        } else {
            out.push(body[i]);
            i += 1;
        }
    }
    out
}

fn take_digits(src: &[u8], radix: u32, max: usize) -> (u32, usize) {
    let mut value = 0u32;
    let mut count = 0;
    while count < max {
        match src.get(count).and_then(|&b| (b as char).to_digit(radix)) {
            Some(digit) => {
                value = value * radix + digit;
                count += 1;
            }
            None => break,
        }
    }
    (value, count)
}

/// Decode the escape at the start of `src` (which begins with a backslash).
/// Returns the substituted bytes and how many input bytes were consumed.
fn backslash_sequence(src: &[u8]) -> (Vec<u8>, usize) {
    let Some(&c) = src.get(1) else {
        return (vec![b'\\'], 1);
    };
    match c {
        b'a' => (vec![0x07], 2),
        b'b' => (vec![0x08], 2),
        b'f' => (vec![0x0c], 2),
        b'n' => (vec![b'\n'], 2),
        b'r' => (vec![b'\r'], 2),
        b't' => (vec![b'\t'], 2),
        b'v' => (vec![0x0b], 2),
        b'\n' => {
            let mut consumed = 2;
            while matches!(src.get(consumed), Some(b' ' | b'\t')) {
                consumed += 1;
            }
            (vec![b' '], consumed)
        }
        b'x' => match take_digits(&src[2..], 16, 2) {
            (_, 0) => (vec![b'x'], 2),
            (value, n) => (vec![value as u8], 2 + n),
        },
        b'u' => match take_digits(&src[2..], 16, 4) {
            (_, 0) => (vec![b'u'], 2),
            (value, n) => {
                let ch = char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER);
                let mut buf = [0u8; 4];
                (ch.encode_utf8(&mut buf).as_bytes().to_vec(), 2 + n)
            }
        },
        b'0'..=b'7' => {
            let (value, n) = take_digits(&src[1..], 8, 3);
            (vec![(value & 0xff) as u8], 1 + n)
        }
        other => (vec![other], 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_decode() {
        assert_eq!(backslash_sequence(b"\\n"), (vec![b'\n'], 2));
        assert_eq!(backslash_sequence(b"\\x41rest"), (vec![b'A'], 4));
        assert_eq!(backslash_sequence(b"\\0"), (vec![0], 2));
        assert_eq!(backslash_sequence(b"\\101"), (vec![b'A'], 4));
        assert_eq!(backslash_sequence(b"\\u00e9"), ("é".as_bytes().to_vec(), 6));
        assert_eq!(backslash_sequence(b"\\$"), (vec![b'$'], 2));
        assert_eq!(backslash_sequence(b"\\\n   x"), (vec![b' '], 5));
    }

    #[test]
    fn variable_names_stop_at_punctuation() {
        assert_eq!(var_name_len(b"abc def"), 3);
        assert_eq!(var_name_len(b"ns::x."), 5);
        assert_eq!(var_name_len(b"a:b"), 1);
        assert_eq!(var_name_len(b" x"), 0);
    }

    #[test]
    fn close_bracket_skips_braces_quotes_and_escapes() {
        assert_eq!(find_close_bracket(b"set a b] tail", 0), Some(7));
        assert_eq!(find_close_bracket(b"set a [x]]", 0), Some(9));
        assert_eq!(find_close_bracket(b"set a {]}]", 0), Some(9));
        assert_eq!(find_close_bracket(b"set a \"]\"]", 0), Some(9));
        assert_eq!(find_close_bracket(b"set a \\]]", 0), Some(8));
        assert_eq!(find_close_bracket(b"set a x{]", 0), Some(8));
        assert_eq!(find_close_bracket(b"incr c", 0), None);
        assert_eq!(find_close_bracket(b"set a {]", 0), None);
    }

    #[test]
    fn continued_lines_collapse_inside_braces() {
        assert_eq!(join_continued_lines(b"a\\\n    b"), b"a b".to_vec());
        assert_eq!(join_continued_lines(b"a\\nb"), b"a\\nb".to_vec());
    }
}
