use std::borrow::Cow;

use serde::de;

use crate::alloc::AllocRef;
use crate::array::Array;
use crate::error::{Errc, Error};
use crate::object::Object;
use crate::string::Str;
use crate::value::Value;

/// Options of the tolerant reader. Everything defaults off, except for the
/// nesting ceiling.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    /// Hard ceiling on nested array and object depth; exceeding it fails
    /// with [`Errc::MaxDepth`].
    pub max_depth: usize,
    /// Keep strings containing invalid code points (lone surrogates and
    /// noncharacters) instead of failing.
    pub accept_invalid_code_points: bool,
    /// With `accept_invalid_code_points`, store U+FFFD in place of each
    /// invalid code point rather than the original.
    pub replace_invalid_code_points: bool,
    /// Allow one comma after the last array element or object member.
    pub accept_trailing_commas: bool,
    /// Allow `//…` and `/*…*/` comments wherever whitespace is allowed.
    pub accept_comments: bool,
    /// Allow duplicate object keys; later duplicates overwrite in place.
    pub accept_duplicate_keys: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            max_depth: 250,
            accept_invalid_code_points: false,
            replace_invalid_code_points: false,
            accept_trailing_commas: false,
            accept_comments: false,
            accept_duplicate_keys: false,
        }
    }
}

/// Parses one JSON value from `input`, building it with `alloc`. Returns
/// the value and the cursor one past the consumed text; trailing bytes are
/// left for the caller. On failure the error carries the offset of the
/// byte that first failed to parse.
pub fn read_value<'alloc>(
    input: &[u8],
    alloc: AllocRef<'alloc>,
    options: &ReadOptions,
) -> Result<(Value<'alloc>, usize), Error> {
    let mut reader = Reader {
        input,
        pos: 0,
        options,
    };
    let value = reader.read_value_inner(alloc)?;
    Ok((value, reader.pos))
}

/// Reads the literal `null`.
pub fn read_null(input: &[u8], options: &ReadOptions) -> Result<((), usize), Error> {
    let mut reader = Reader {
        input,
        pos: 0,
        options,
    };
    reader.expect_literal(b"null")?;
    Ok(((), reader.pos))
}

/// Reads the literal `true` or `false`.
pub fn read_bool(input: &[u8], options: &ReadOptions) -> Result<(bool, usize), Error> {
    let mut reader = Reader {
        input,
        pos: 0,
        options,
    };
    let value = reader.read_bool_inner()?;
    Ok((value, reader.pos))
}

/// Reads a signed 64-bit integer, stopping before any fraction or
/// exponent. Overflow fails with [`Errc::NumberOutOfRange`].
pub fn read_int(input: &[u8], options: &ReadOptions) -> Result<(i64, usize), Error> {
    let mut reader = Reader {
        input,
        pos: 0,
        options,
    };
    let value = reader.read_int_inner()?;
    Ok((value, reader.pos))
}

/// Reads any RFC 8259 number as binary64.
pub fn read_float(input: &[u8], options: &ReadOptions) -> Result<(f64, usize), Error> {
    let mut reader = Reader {
        input,
        pos: 0,
        options,
    };
    let value = reader.read_float_inner()?;
    Ok((value, reader.pos))
}

/// Reads a quoted string into a new [`Str`].
pub fn read_string<'alloc>(
    input: &[u8],
    alloc: AllocRef<'alloc>,
    options: &ReadOptions,
) -> Result<(Str<'alloc>, usize), Error> {
    let mut reader = Reader {
        input,
        pos: 0,
        options,
    };
    let value = reader.read_string_inner(alloc)?;
    Ok((value, reader.pos))
}

/// Reads an array, with leading whitespace permitted.
pub fn read_array<'alloc>(
    input: &[u8],
    alloc: AllocRef<'alloc>,
    options: &ReadOptions,
) -> Result<(Array<'alloc>, usize), Error> {
    let mut reader = Reader {
        input,
        pos: 0,
        options,
    };
    reader.consume_space()?;
    if reader.peek() != Some(b'[') {
        return Err(reader.err(Errc::UnexpectedToken));
    }
    match reader.read_value_inner(alloc)? {
        Value::Array(array) => Ok((array, reader.pos)),
        _ => unreachable!("a leading '[' always parses to an array"),
    }
}

/// Reads an object, with leading whitespace permitted.
pub fn read_object<'alloc>(
    input: &[u8],
    alloc: AllocRef<'alloc>,
    options: &ReadOptions,
) -> Result<(Object<'alloc>, usize), Error> {
    let mut reader = Reader {
        input,
        pos: 0,
        options,
    };
    reader.consume_space()?;
    if reader.peek() != Some(b'{') {
        return Err(reader.err(Errc::UnexpectedToken));
    }
    match reader.read_value_inner(alloc)? {
        Value::Object(object) => Ok((object, reader.pos)),
        _ => unreachable!("a leading '{{' always parses to an object"),
    }
}

struct Reader<'de, 'opts> {
    input: &'de [u8],
    pos: usize,
    options: &'opts ReadOptions,
}

enum Number {
    Int(i64),
    Float(f64),
}

/// One open container during the value loop. The loop drives an explicit
/// stack so that `max_depth` is the sole nesting limit, independent of the
/// host stack.
enum Frame<'alloc> {
    Array(Array<'alloc>),
    Object {
        object: Object<'alloc>,
        key: Option<Str<'alloc>>,
    },
}

impl<'de, 'opts> Reader<'de, 'opts> {
    #[inline]
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    #[inline]
    fn err(&self, errc: Errc) -> Error {
        Error::new(errc, self.pos)
    }

    /// Skips the whitespace set, and comments when those are enabled.
    fn consume_space(&mut self) -> Result<(), Error> {
        while let Some(&byte) = self.input.get(self.pos) {
            match byte {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                b'/' if self.options.accept_comments => self.consume_comment()?,
                _ => break,
            }
        }
        Ok(())
    }

    /// Consumes `//…` through its newline, or `/*…*/` through its
    /// terminator. The cursor is at the opening slash.
    fn consume_comment(&mut self) -> Result<(), Error> {
        self.pos += 1;
        match self.peek() {
            Some(b'/') => {
                self.pos += 1;
                while let Some(&byte) = self.input.get(self.pos) {
                    self.pos += 1;
                    if byte == b'\n' {
                        break;
                    }
                }
                Ok(())
            }
            Some(b'*') => {
                self.pos += 1;
                while self.pos < self.input.len() {
                    if self.input[self.pos] == b'*' && self.input.get(self.pos + 1) == Some(&b'/') {
                        self.pos += 2;
                        return Ok(());
                    }
                    self.pos += 1;
                }
                Err(Error::new(Errc::UnexpectedToken, self.input.len()))
            }
            _ => Err(self.err(Errc::UnexpectedToken)),
        }
    }

    fn expect_literal(&mut self, literal: &[u8]) -> Result<(), Error> {
        for &expect in literal {
            if self.input.get(self.pos) != Some(&expect) {
                return Err(self.err(Errc::UnexpectedToken));
            }
            self.pos += 1;
        }
        Ok(())
    }

    fn read_bool_inner(&mut self) -> Result<bool, Error> {
        match self.peek() {
            Some(b't') => {
                self.expect_literal(b"true")?;
                Ok(true)
            }
            Some(b'f') => {
                self.expect_literal(b"false")?;
                Ok(false)
            }
            _ => Err(self.err(Errc::UnexpectedToken)),
        }
    }

    /// Consumes one number token per RFC 8259, returning its start offset
    /// and whether a fraction or exponent made it a float.
    fn scan_number(&mut self) -> Result<(usize, bool), Error> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }

        // Integer part: a lone 0, or 1-9 followed by digits.
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => {
                while matches!(self.peek(), Some(b'0'..=b'9')) {
                    self.pos += 1;
                }
            }
            _ => return Err(self.err(Errc::UnexpectedToken)),
        }

        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.err(Errc::UnexpectedToken));
            }
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.err(Errc::UnexpectedToken));
            }
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        Ok((start, is_float))
    }

    fn parse_float_token(&self, start: usize) -> Result<f64, Error> {
        // The token is ASCII by construction of scan_number.
        let text = unsafe { std::str::from_utf8_unchecked(&self.input[start..self.pos]) };
        let value: f64 = text
            .parse()
            .map_err(|_| Error::new(Errc::UnexpectedToken, start))?;
        if !value.is_finite() {
            return Err(Error::new(Errc::NumberOutOfRange, start));
        }
        Ok(value)
    }

    /// Reads a number as either an integer (no fraction, no exponent) or a
    /// correctly rounded binary64.
    fn read_number(&mut self) -> Result<Number, Error> {
        let (start, is_float) = self.scan_number()?;
        if is_float {
            Ok(Number::Float(self.parse_float_token(start)?))
        } else {
            parse_int_token(&self.input[start..self.pos], start).map(Number::Int)
        }
    }

    /// Reads an integer token only, leaving any fraction or exponent
    /// unconsumed.
    fn read_int_inner(&mut self) -> Result<i64, Error> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => {
                while matches!(self.peek(), Some(b'0'..=b'9')) {
                    self.pos += 1;
                }
            }
            _ => return Err(self.err(Errc::UnexpectedToken)),
        }
        parse_int_token(&self.input[start..self.pos], start)
    }

    /// Reads any number token as binary64, regardless of form.
    fn read_float_inner(&mut self) -> Result<f64, Error> {
        let (start, _) = self.scan_number()?;
        self.parse_float_token(start)
    }

    /// Reads a quoted string. The cursor must be at the opening quote.
    fn read_string_inner<'alloc>(&mut self, alloc: AllocRef<'alloc>) -> Result<Str<'alloc>, Error> {
        if self.peek() != Some(b'"') {
            return Err(self.err(Errc::UnexpectedToken));
        }
        self.pos += 1;

        let mut out = Str::new_in(alloc);
        loop {
            // Copy a run of plain ASCII wholesale.
            let run = self.pos;
            while let Some(&byte) = self.input.get(self.pos) {
                if byte == b'"' || byte == b'\\' || byte < 0x20 || byte >= 0x80 {
                    break;
                }
                self.pos += 1;
            }
            if self.pos > run {
                out.append(&self.input[run..self.pos])
                    .map_err(|errc| Error::new(errc, run))?;
            }

            match self.peek() {
                None => return Err(self.err(Errc::UnexpectedToken)),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => self.read_escape(&mut out)?,
                Some(byte) if byte < 0x20 => return Err(self.err(Errc::UnexpectedToken)),
                Some(_) => {
                    let at = self.pos;
                    let code_point = self.decode_multibyte()?;
                    self.append_code_point(&mut out, code_point, at)?;
                }
            }
        }
    }

    /// Expands one escape sequence. The cursor is at the backslash.
    fn read_escape(&mut self, out: &mut Str<'_>) -> Result<(), Error> {
        let escape_at = self.pos;
        self.pos += 1;
        let Some(selector) = self.peek() else {
            return Err(self.err(Errc::UnexpectedToken));
        };

        let byte = match selector {
            b'"' => b'"',
            b'\\' => b'\\',
            b'/' => b'/',
            b'b' => 0x08,
            b'f' => 0x0C,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'u' => {
                self.pos += 1;
                let hi = self.read_hex4()?;
                let code_point = if (0xD800..0xDC00).contains(&hi)
                    && self.input.get(self.pos) == Some(&b'\\')
                    && self.input.get(self.pos + 1) == Some(&b'u')
                {
                    // Only a well-formed low surrogate consumes the second
                    // escape; anything else is left for the next turn.
                    let mark = self.pos;
                    self.pos += 2;
                    match self.read_hex4() {
                        Ok(lo) if (0xDC00..0xE000).contains(&lo) => {
                            ((hi - 0xD800) << 10) + (lo - 0xDC00) + 0x10000
                        }
                        _ => {
                            self.pos = mark;
                            hi
                        }
                    }
                } else {
                    hi
                };
                return self.append_code_point(out, code_point, escape_at);
            }
            _ => return Err(self.err(Errc::UnexpectedToken)),
        };
        self.pos += 1;
        out.push(byte).map_err(|errc| Error::new(errc, escape_at))
    }

    fn read_hex4(&mut self) -> Result<u32, Error> {
        let mut value = 0u32;
        for _ in 0..4 {
            let Some(&byte) = self.input.get(self.pos) else {
                return Err(self.err(Errc::UnexpectedToken));
            };
            let digit = match byte {
                b'0'..=b'9' => byte - b'0',
                b'a'..=b'f' => byte - b'a' + 10,
                b'A'..=b'F' => byte - b'A' + 10,
                _ => return Err(self.err(Errc::UnexpectedToken)),
            };
            value = value << 4 | digit as u32;
            self.pos += 1;
        }
        Ok(value)
    }

    /// Decodes one unescaped multi-byte UTF-8 sequence, advancing past it.
    /// Malformed shapes, overlong forms, and values beyond U+10FFFF are
    /// invalid encoding; surrogates decode structurally and are judged as
    /// code points by the caller.
    fn decode_multibyte(&mut self) -> Result<u32, Error> {
        let start = self.pos;
        let b1 = self.input[self.pos] as u32;

        let (len, min, mut code_point) = if b1 >> 5 == 0b110 {
            (2, 0x80, b1 & 0x1F)
        } else if b1 >> 4 == 0b1110 {
            (3, 0x800, b1 & 0x0F)
        } else if b1 >> 3 == 0b11110 {
            (4, 0x10000, b1 & 0x07)
        } else {
            return Err(Error::new(Errc::InvalidEncoding, start));
        };

        for index in 1..len {
            let Some(&byte) = self.input.get(start + index) else {
                return Err(Error::new(Errc::InvalidEncoding, self.input.len()));
            };
            if byte >> 6 != 0b10 {
                return Err(Error::new(Errc::InvalidEncoding, start + index));
            }
            code_point = code_point << 6 | (byte as u32 & 0x3F);
        }
        if code_point < min || code_point > 0x10FFFF {
            return Err(Error::new(Errc::InvalidEncoding, start));
        }
        self.pos = start + len;
        Ok(code_point)
    }

    /// Re-encodes one decoded code point into `out`, applying the invalid
    /// code point options. `at` keys any error to the source position.
    fn append_code_point(
        &self,
        out: &mut Str<'_>,
        code_point: u32,
        at: usize,
    ) -> Result<(), Error> {
        let mut code_point = code_point;
        if is_surrogate(code_point) || is_noncharacter(code_point) {
            if !self.options.accept_invalid_code_points {
                return Err(Error::new(Errc::InvalidEscape, at));
            }
            if self.options.replace_invalid_code_points {
                code_point = 0xFFFD;
            }
        }
        let mut buf = [0u8; 4];
        let len = encode_utf8(code_point, &mut buf);
        out.append(&buf[..len]).map_err(|errc| Error::new(errc, at))
    }

    /// Reads the key and colon of an object member. The caller has already
    /// consumed leading whitespace. Duplicate keys fail here, with the
    /// cursor at the key's opening quote, unless duplicates are accepted.
    fn read_member_key<'alloc>(
        &mut self,
        object: &Object<'alloc>,
        alloc: AllocRef<'alloc>,
    ) -> Result<Str<'alloc>, Error> {
        let key_at = self.pos;
        let key = self.read_string_inner(alloc)?;
        if !self.options.accept_duplicate_keys && object.contains_key(key.as_bytes()) {
            return Err(Error::new(Errc::DuplicateKey, key_at));
        }
        self.consume_space()?;
        if self.peek() != Some(b':') {
            return Err(self.err(Errc::UnexpectedToken));
        }
        self.pos += 1;
        Ok(key)
    }

    fn read_value_inner<'alloc>(&mut self, alloc: AllocRef<'alloc>) -> Result<Value<'alloc>, Error> {
        let mut stack: Vec<Frame<'alloc>> = Vec::new();

        'value: loop {
            self.consume_space()?;
            let Some(byte) = self.peek() else {
                return Err(self.err(Errc::UnexpectedToken));
            };

            let mut completed = match byte {
                b'n' => {
                    self.expect_literal(b"null")?;
                    Value::Null(alloc)
                }
                b't' | b'f' => Value::Bool(self.read_bool_inner()?, alloc),
                b'-' | b'0'..=b'9' => match self.read_number()? {
                    Number::Int(value) => Value::Int(value, alloc),
                    Number::Float(value) => Value::Float(value, alloc),
                },
                b'"' => Value::String(self.read_string_inner(alloc)?),
                b'[' => {
                    if stack.len() >= self.options.max_depth {
                        return Err(self.err(Errc::MaxDepth));
                    }
                    self.pos += 1;
                    self.consume_space()?;
                    if self.peek() == Some(b']') {
                        self.pos += 1;
                        Value::Array(Array::new_in(alloc))
                    } else {
                        stack.push(Frame::Array(Array::new_in(alloc)));
                        continue 'value;
                    }
                }
                b'{' => {
                    if stack.len() >= self.options.max_depth {
                        return Err(self.err(Errc::MaxDepth));
                    }
                    self.pos += 1;
                    self.consume_space()?;
                    if self.peek() == Some(b'}') {
                        self.pos += 1;
                        Value::Object(Object::new_in(alloc))
                    } else {
                        let object = Object::new_in(alloc);
                        let key = self.read_member_key(&object, alloc)?;
                        stack.push(Frame::Object {
                            object,
                            key: Some(key),
                        });
                        continue 'value;
                    }
                }
                _ => return Err(self.err(Errc::UnexpectedToken)),
            };

            // Attach the completed value into the enclosing containers,
            // closing as many as end here.
            loop {
                let Some(frame) = stack.last_mut() else {
                    return Ok(completed);
                };
                match frame {
                    Frame::Array(array) => {
                        array.push(completed).map_err(|errc| self.err(errc))?;
                        self.consume_space()?;
                        match self.peek() {
                            Some(b',') => {
                                self.pos += 1;
                                self.consume_space()?;
                                if !(self.options.accept_trailing_commas
                                    && self.peek() == Some(b']'))
                                {
                                    continue 'value;
                                }
                                self.pos += 1;
                            }
                            Some(b']') => self.pos += 1,
                            _ => return Err(self.err(Errc::UnexpectedToken)),
                        }
                    }
                    Frame::Object { object, key } => {
                        let key_taken = key
                            .take()
                            .expect("a completed value always follows a member key");
                        object
                            .insert_owned(key_taken, completed)
                            .map_err(|errc| self.err(errc))?;
                        self.consume_space()?;
                        match self.peek() {
                            Some(b',') => {
                                self.pos += 1;
                                self.consume_space()?;
                                if !(self.options.accept_trailing_commas
                                    && self.peek() == Some(b'}'))
                                {
                                    *key = Some(self.read_member_key(object, alloc)?);
                                    continue 'value;
                                }
                                self.pos += 1;
                            }
                            Some(b'}') => self.pos += 1,
                            _ => return Err(self.err(Errc::UnexpectedToken)),
                        }
                    }
                }
                match stack.pop() {
                    Some(Frame::Array(array)) => completed = Value::Array(array),
                    Some(Frame::Object { object, .. }) => completed = Value::Object(object),
                    None => unreachable!(),
                }
            }
        }
    }
}

fn parse_int_token(token: &[u8], start: usize) -> Result<i64, Error> {
    let (digits, negative) = match token.split_first() {
        Some((&b'-', digits)) => (digits, true),
        _ => (token, false),
    };
    let offset = start + token.len() - digits.len();

    // Accumulate negated: i64::MIN has no positive counterpart.
    let mut value: i64 = 0;
    for (index, &byte) in digits.iter().enumerate() {
        let digit = (byte - b'0') as i64;
        value = value
            .checked_mul(10)
            .and_then(|value| value.checked_sub(digit))
            .ok_or(Error::new(Errc::NumberOutOfRange, offset + index))?;
    }
    if negative {
        Ok(value)
    } else {
        value
            .checked_neg()
            .ok_or(Error::new(Errc::NumberOutOfRange, offset + digits.len() - 1))
    }
}

// Unicode 15.0 §3.4: surrogates and the 66 noncharacters are not scalar
// values and never appear in well-formed interchange.
fn is_surrogate(code_point: u32) -> bool {
    (0xD800..=0xDFFF).contains(&code_point)
}

fn is_noncharacter(code_point: u32) -> bool {
    (0xFDD0..=0xFDEF).contains(&code_point)
        || (code_point <= 0x10FFFF && (code_point & 0xFFFF == 0xFFFE || code_point & 0xFFFF == 0xFFFF))
}

fn encode_utf8(code_point: u32, buf: &mut [u8; 4]) -> usize {
    if code_point < 0x80 {
        buf[0] = code_point as u8;
        1
    } else if code_point < 0x800 {
        buf[0] = 0xC0 | (code_point >> 6) as u8;
        buf[1] = 0x80 | (code_point & 0x3F) as u8;
        2
    } else if code_point < 0x10000 {
        buf[0] = 0xE0 | (code_point >> 12) as u8;
        buf[1] = 0x80 | ((code_point >> 6) & 0x3F) as u8;
        buf[2] = 0x80 | (code_point & 0x3F) as u8;
        3
    } else {
        buf[0] = 0xF0 | (code_point >> 18) as u8;
        buf[1] = 0x80 | ((code_point >> 12) & 0x3F) as u8;
        buf[2] = 0x80 | ((code_point >> 6) & 0x3F) as u8;
        buf[3] = 0x80 | (code_point & 0x3F) as u8;
        4
    }
}

impl<'alloc> Value<'alloc> {
    /// Deserializes a `Value` from any serde data format, building it with
    /// the provided allocator.
    ///
    /// ```
    /// use dom::{system_allocator, Value};
    ///
    /// let mut deser = serde_json::Deserializer::from_str(r#"{"hello": "world", "one": 2}"#);
    /// let value = Value::from_serde(&mut deser, system_allocator()).unwrap();
    /// assert_eq!(value.as_object().unwrap().len(), 2);
    /// ```
    pub fn from_serde<'de, D>(deserializer: D, alloc: AllocRef<'alloc>) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor { alloc })
    }
}

struct ValueVisitor<'alloc> {
    alloc: AllocRef<'alloc>,
}

impl<'de, 'alloc> de::Visitor<'de> for ValueVisitor<'alloc> {
    type Value = Value<'alloc>;

    fn expecting(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "any JSON value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Value::Bool(v, self.alloc))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Value::Int(v, self.alloc))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        // There is no unsigned representation; values past i64 widen.
        match i64::try_from(v) {
            Ok(v) => Ok(Value::Int(v, self.alloc)),
            Err(_) => Ok(Value::Float(v as f64, self.alloc)),
        }
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Value::Float(v, self.alloc))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Str::from_bytes(v.as_bytes(), self.alloc)
            .map(Value::String)
            .map_err(E::custom)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(Value::Null(self.alloc))
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(Value::Null(self.alloc))
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<V>(self, mut v: V) -> Result<Self::Value, V::Error>
    where
        V: de::SeqAccess<'de>,
    {
        let Self { alloc } = self;
        let mut array = Array::with_capacity_in(v.size_hint().unwrap_or_default(), alloc)
            .map_err(de::Error::custom)?;

        while let Some(child) = v.next_element_seed(ValueVisitor { alloc })? {
            array.push(child).map_err(de::Error::custom)?;
        }
        Ok(Value::Array(array))
    }

    fn visit_map<V>(self, mut v: V) -> Result<Self::Value, V::Error>
    where
        V: de::MapAccess<'de>,
    {
        let Self { alloc } = self;
        let mut object = Object::new_in(alloc);

        // A `Cow` is required: keys containing escapes cannot be borrowed
        // from the input.
        while let Some(property) = v.next_key::<Cow<'_, str>>()? {
            let value = v.next_value_seed(ValueVisitor { alloc })?;
            // Later duplicates overwrite in place.
            object
                .insert(property.as_ref().as_bytes(), value)
                .map_err(de::Error::custom)?;
        }
        Ok(Value::Object(object))
    }
}

impl<'de, 'alloc> de::DeserializeSeed<'de> for ValueVisitor<'alloc> {
    type Value = Value<'alloc>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::alloc::system_allocator;

    fn parse(input: &str) -> Result<(Value<'static>, usize), Error> {
        read_value(input.as_bytes(), system_allocator(), &ReadOptions::default())
    }

    fn parse_with(input: &str, options: &ReadOptions) -> Result<(Value<'static>, usize), Error> {
        read_value(input.as_bytes(), system_allocator(), options)
    }

    #[test]
    fn test_scalars() {
        let alloc = system_allocator();
        assert_eq!(parse("null").unwrap(), (Value::Null(alloc), 4));
        assert_eq!(parse("true").unwrap(), (Value::Bool(true, alloc), 4));
        assert_eq!(parse("false").unwrap(), (Value::Bool(false, alloc), 5));
        assert_eq!(parse("42").unwrap(), (Value::Int(42, alloc), 2));
        assert_eq!(parse("-42").unwrap(), (Value::Int(-42, alloc), 3));
        assert_eq!(parse("0").unwrap(), (Value::Int(0, alloc), 1));
        assert_eq!(parse("-0").unwrap(), (Value::Int(0, alloc), 2));
        assert_eq!(parse("56.789").unwrap(), (Value::Float(56.789, alloc), 6));
        assert_eq!(parse("-1e3").unwrap(), (Value::Float(-1000.0, alloc), 4));
        assert_eq!(parse("0.5").unwrap(), (Value::Float(0.5, alloc), 3));
        assert_eq!(parse("2E+2").unwrap(), (Value::Float(200.0, alloc), 4));
    }

    #[test]
    fn test_cursor_stops_after_value() {
        let alloc = system_allocator();
        // A leading zero terminates the integer; the rest is left over.
        assert_eq!(parse("0123").unwrap(), (Value::Int(0, alloc), 1));
        assert_eq!(parse("[1] tail").unwrap().1, 3);
        assert_eq!(parse("  17 ").unwrap(), (Value::Int(17, alloc), 4));
    }

    #[test]
    fn test_malformed_tokens() {
        for (input, offset) in [
            ("", 0),
            ("nul", 3),
            ("nulL", 3),
            ("truE", 3),
            ("fals", 4),
            ("-", 1),
            ("-x", 1),
            ("1.", 2),
            ("1e", 2),
            ("1e+", 3),
            (".5", 0),
            ("hello", 0),
            ("[1 2]", 3),
            ("[1,", 3),
            ("{\"a\" 1}", 5),
            ("{\"a\":1,", 7),
            ("{1: 2}", 1),
        ] {
            let err = parse(input).unwrap_err();
            assert_eq!(err.errc, Errc::UnexpectedToken, "input {input:?}");
            assert_eq!(err.offset, offset, "input {input:?}");
        }
    }

    #[test]
    fn test_array_of_ints() {
        let (value, cursor) = parse("[1,2,3]").unwrap();
        assert_eq!(cursor, 7);
        let array = value.as_array().unwrap();
        let ints: Vec<i64> = array.iter().filter_map(Value::as_int).collect();
        assert_eq!(ints, vec![1, 2, 3]);
    }

    #[test]
    fn test_nested_containers() {
        let (value, _) =
            parse(r#" { "outer" : [ { "a" : [ 1 , true ] } , null , "s" ] , "b" : {} } "#).unwrap();
        let outer = value.as_object().unwrap();
        assert_eq!(outer.len(), 2);
        let items = outer.get(b"outer").unwrap().as_array().unwrap();
        assert_eq!(items.len(), 3);
        let inner = items[0].as_object().unwrap();
        assert_eq!(inner.get(b"a").unwrap().as_array().unwrap().len(), 2);
        assert!(items[1].is_null());
        assert!(outer.get(b"b").unwrap().as_object().unwrap().is_empty());
    }

    #[test]
    fn test_int_range() {
        let alloc = system_allocator();
        assert_eq!(
            parse("9223372036854775807").unwrap().0,
            Value::Int(i64::MAX, alloc)
        );
        assert_eq!(
            parse("-9223372036854775808").unwrap().0,
            Value::Int(i64::MIN, alloc)
        );

        let err = parse("9223372036854775808").unwrap_err();
        assert_eq!(err.errc, Errc::NumberOutOfRange);

        let err = parse("1e999").unwrap_err();
        assert_eq!(err.errc, Errc::NumberOutOfRange);
        assert_eq!(err.offset, 0);

        // Underflow quietly rounds to zero.
        assert_eq!(parse("1e-999").unwrap().0, Value::Float(0.0, alloc));
    }

    #[test]
    fn test_string_escapes() {
        let (value, _) = parse(r#""q\" bs\\ sl\/ b\b f\f n\n r\r t\t""#).unwrap();
        assert_eq!(
            value.as_str().unwrap().as_bytes(),
            b"q\" bs\\ sl/ b\x08 f\x0C n\n r\r t\t"
        );

        let (value, _) = parse(r#""Aé世""#).unwrap();
        assert_eq!(value.as_str().unwrap().as_str().unwrap(), "Aé世");

        let err = parse(r#""\x""#).unwrap_err();
        assert_eq!(err, Error::new(Errc::UnexpectedToken, 2));

        let err = parse(r#""\u12g4""#).unwrap_err();
        assert_eq!(err, Error::new(Errc::UnexpectedToken, 5));

        let err = parse("\"unterminated").unwrap_err();
        assert_eq!(err, Error::new(Errc::UnexpectedToken, 13));

        // Raw control bytes must be escaped.
        let err = parse("\"a\x01b\"").unwrap_err();
        assert_eq!(err, Error::new(Errc::UnexpectedToken, 2));
    }

    #[test]
    fn test_surrogate_pair() {
        let (value, _) = parse(r#""😀""#).unwrap();
        assert_eq!(value.as_str().unwrap().as_bytes(), &[0xF0, 0x9F, 0x98, 0x80]);
    }

    #[test]
    fn test_lone_surrogates() {
        let err = parse(r#""\uD800""#).unwrap_err();
        assert_eq!(err, Error::new(Errc::InvalidEscape, 1));

        // A high surrogate followed by a non-low escape stays lone.
        let err = parse(r#""\uD800A""#).unwrap_err();
        assert_eq!(err, Error::new(Errc::InvalidEscape, 1));

        let lenient = ReadOptions {
            accept_invalid_code_points: true,
            replace_invalid_code_points: true,
            ..ReadOptions::default()
        };
        let (value, _) = parse_with(r#""\uD800A""#, &lenient).unwrap();
        assert_eq!(value.as_str().unwrap().as_str().unwrap(), "\u{FFFD}A");
    }

    #[test]
    fn test_utf8_validation() {
        let alloc = system_allocator();
        let options = ReadOptions::default();

        // Well-formed two-, three-, and four-byte sequences pass through.
        let (value, _) = read_value("\"é世🙂\"".as_bytes(), alloc, &options).unwrap();
        assert_eq!(value.as_str().unwrap().as_str().unwrap(), "é世🙂");

        // A bare continuation byte.
        let err = read_value(b"\"\x80\"", alloc, &options).unwrap_err();
        assert_eq!(err, Error::new(Errc::InvalidEncoding, 1));

        // A lead byte with a malformed continuation.
        let err = read_value(b"\"\xC3\x28\"", alloc, &options).unwrap_err();
        assert_eq!(err, Error::new(Errc::InvalidEncoding, 2));

        // Truncated by the end of input.
        let err = read_value(b"\"\xE4\xB8", alloc, &options).unwrap_err();
        assert_eq!(err, Error::new(Errc::InvalidEncoding, 3));

        // Overlong encoding of '/'.
        let err = read_value(b"\"\xC0\xAF\"", alloc, &options).unwrap_err();
        assert_eq!(err, Error::new(Errc::InvalidEncoding, 1));

        // Beyond U+10FFFF.
        let err = read_value(b"\"\xF4\x90\x80\x80\"", alloc, &options).unwrap_err();
        assert_eq!(err, Error::new(Errc::InvalidEncoding, 1));

        // Encoding errors are never subject to code point leniency.
        let lenient = ReadOptions {
            accept_invalid_code_points: true,
            replace_invalid_code_points: true,
            ..ReadOptions::default()
        };
        let err = read_value(b"\"\x80\"", alloc, &lenient).unwrap_err();
        assert_eq!(err.errc, Errc::InvalidEncoding);
    }

    #[test]
    fn test_noncharacters() {
        let alloc = system_allocator();

        // U+FFFE, encoded EF BF BE: structurally valid, not a character.
        let err = read_value(b"\"\xEF\xBF\xBE\"", alloc, &ReadOptions::default()).unwrap_err();
        assert_eq!(err, Error::new(Errc::InvalidEscape, 1));

        let keep = ReadOptions {
            accept_invalid_code_points: true,
            ..ReadOptions::default()
        };
        let (value, _) = read_value(b"\"\xEF\xBF\xBE\"", alloc, &keep).unwrap();
        assert_eq!(value.as_str().unwrap().as_bytes(), &[0xEF, 0xBF, 0xBE]);

        let replace = ReadOptions {
            replace_invalid_code_points: true,
            ..keep
        };
        let (value, _) = read_value(b"\"\xEF\xBF\xBE\"", alloc, &replace).unwrap();
        assert_eq!(value.as_str().unwrap().as_str().unwrap(), "\u{FFFD}");

        // The escape route reaches the same judgement.
        let err = parse(r#""\uFDD0""#).unwrap_err();
        assert_eq!(err, Error::new(Errc::InvalidEscape, 1));
    }

    #[test]
    fn test_bom_rejected() {
        let err = parse("\u{FEFF}1").unwrap_err();
        assert_eq!(err, Error::new(Errc::UnexpectedToken, 0));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let err = parse(r#"{"a":1,"a":2}"#).unwrap_err();
        assert_eq!(err, Error::new(Errc::DuplicateKey, 7));
    }

    #[test]
    fn test_duplicate_keys_accepted() {
        let options = ReadOptions {
            accept_duplicate_keys: true,
            ..ReadOptions::default()
        };
        let (value, _) = parse_with(r#"{"a":1,"b":2,"a":3}"#, &options).unwrap();
        let object = value.as_object().unwrap();

        // The later duplicate overwrote in place: order [a, b], values [3, 2].
        let entries: Vec<(String, i64)> = object
            .iter()
            .map(|entry| {
                (
                    String::from_utf8_lossy(entry.key().as_bytes()).into_owned(),
                    entry.value().as_int().unwrap(),
                )
            })
            .collect();
        assert_eq!(entries, vec![("a".to_string(), 3), ("b".to_string(), 2)]);
    }

    #[test]
    fn test_trailing_commas() {
        assert_eq!(parse("[1,2,]").unwrap_err().errc, Errc::UnexpectedToken);
        assert_eq!(
            parse(r#"{"a":1,}"#).unwrap_err().errc,
            Errc::UnexpectedToken
        );

        let options = ReadOptions {
            accept_trailing_commas: true,
            ..ReadOptions::default()
        };
        let (value, _) = parse_with("[1,2,]", &options).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);

        let (value, _) = parse_with(r#"{"a":1,}"#, &options).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 1);

        // One trailing comma, not an empty slot.
        assert_eq!(parse_with("[,]", &options).unwrap_err().errc, Errc::UnexpectedToken);
        assert_eq!(parse_with("[1,,]", &options).unwrap_err().errc, Errc::UnexpectedToken);
    }

    #[test]
    fn test_comments() {
        let input = r#"
            // leading note
            { "a" /* inline */ : [1, // trailing
                2] /* closing
                     note */ }
        "#;
        assert_eq!(parse(input).unwrap_err().errc, Errc::UnexpectedToken);

        let options = ReadOptions {
            accept_comments: true,
            ..ReadOptions::default()
        };
        let (value, _) = parse_with(input, &options).unwrap();
        assert_eq!(
            value
                .as_object()
                .unwrap()
                .get(b"a")
                .unwrap()
                .as_array()
                .unwrap()
                .len(),
            2
        );

        let err = parse_with("/* runs off", &options).unwrap_err();
        assert_eq!(err, Error::new(Errc::UnexpectedToken, 11));

        let err = parse_with("[1 /* runs off", &options).unwrap_err();
        assert_eq!(err, Error::new(Errc::UnexpectedToken, 14));
    }

    #[test]
    fn test_max_depth() {
        let options = ReadOptions {
            max_depth: 3,
            ..ReadOptions::default()
        };
        assert!(parse_with("[[[1]]]", &options).is_ok());

        let err = parse_with("[[[[1]]]]", &options).unwrap_err();
        assert_eq!(err, Error::new(Errc::MaxDepth, 3));

        // Mixed nesting counts arrays and objects alike.
        let err = parse_with(r#"[{"a":[{"b":1}]}]"#, &options).unwrap_err();
        assert_eq!(err.errc, Errc::MaxDepth);
    }

    #[test]
    fn test_default_max_depth() {
        let mut deep = String::new();
        for _ in 0..251 {
            deep.push('[');
        }
        let err = parse(&deep).unwrap_err();
        assert_eq!(err, Error::new(Errc::MaxDepth, 250));

        let mut ok = "[".repeat(250);
        ok.push('1');
        ok.push_str(&"]".repeat(250));
        assert!(parse(&ok).is_ok());
    }

    #[test]
    fn test_granular_readers() {
        let options = ReadOptions::default();
        let alloc = system_allocator();

        assert_eq!(read_null(b"null", &options).unwrap(), ((), 4));
        assert_eq!(read_bool(b"false", &options).unwrap(), (false, 5));
        assert_eq!(read_int(b"-17", &options).unwrap(), (-17, 3));

        // The integer reader stops before a fraction.
        assert_eq!(read_int(b"123.5", &options).unwrap(), (123, 3));

        // The float reader takes any number form, including integers past
        // the i64 range.
        assert_eq!(read_float(b"123.5", &options).unwrap(), (123.5, 5));
        assert_eq!(
            read_float(b"9223372036854775808", &options).unwrap(),
            (9.223372036854776e18, 19)
        );

        let (s, cursor) = read_string(b"\"hi\" tail", alloc, &options).unwrap();
        assert_eq!(s.as_bytes(), b"hi");
        assert_eq!(cursor, 4);

        let (array, _) = read_array(b" [true] ", alloc, &options).unwrap();
        assert_eq!(array.len(), 1);
        let err = read_array(b"{}", alloc, &options).unwrap_err();
        assert_eq!(err.errc, Errc::UnexpectedToken);

        let (object, _) = read_object(br#" {"k": null} "#, alloc, &options).unwrap();
        assert_eq!(object.len(), 1);
        let err = read_object(b"[]", alloc, &options).unwrap_err();
        assert_eq!(err.errc, Errc::UnexpectedToken);
    }

    #[test]
    fn test_from_serde() {
        let alloc = system_allocator();
        let mut deser =
            serde_json::Deserializer::from_str(r#"{"nested": {"list": [1, -2, 3.5]}, "t": true}"#);
        let value = Value::from_serde(&mut deser, alloc).unwrap();

        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 2);
        let list = object
            .get(b"nested")
            .unwrap()
            .as_object()
            .unwrap()
            .get(b"list")
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[1], Value::Int(-2, alloc));
        assert_eq!(list[2], Value::Float(3.5, alloc));
    }
}
