use std::cmp;

use crate::array::Array;
use crate::error::{Errc, Error};
use crate::object::{self, Object};
use crate::string::Str;
use crate::value::Value;

/// Options of the writer.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /// 0 renders compact, with no whitespace at all. A positive value
    /// pretty-prints with that many spaces per nesting level, a newline
    /// after each structural token (except the opening of an empty
    /// container), and a space after each member colon.
    pub indent_size: usize,
}

/// Renders `value` into `out`, returning the count of bytes written. When
/// the remaining space cannot hold the next token the writer stops at the
/// last fully written token and fails with [`Errc::NotEnoughMemory`], the
/// error offset holding the bytes written so far. Tokens are emitted
/// all-or-nothing, so the output never ends inside a literal, a number, an
/// escape, or a multi-byte UTF-8 sequence. There is no size probe: a caller
/// that needs one renders twice, first into a scratch buffer.
pub fn write_value(out: &mut [u8], value: &Value<'_>, options: &WriteOptions) -> Result<usize, Error> {
    let mut writer = Writer {
        out,
        pos: 0,
        depth: 0,
        options,
    };
    let mut frames = Vec::new();
    writer.emit(&mut frames, value)?;
    Ok(writer.pos)
}

/// Writes the literal `null`.
pub fn write_null(out: &mut [u8], options: &WriteOptions) -> Result<usize, Error> {
    let mut writer = Writer {
        out,
        pos: 0,
        depth: 0,
        options,
    };
    writer.put_slice(b"null")?;
    Ok(writer.pos)
}

/// Writes the literal `true` or `false`.
pub fn write_bool(out: &mut [u8], value: bool, options: &WriteOptions) -> Result<usize, Error> {
    let mut writer = Writer {
        out,
        pos: 0,
        depth: 0,
        options,
    };
    writer.put_slice(if value { &b"true"[..] } else { &b"false"[..] })?;
    Ok(writer.pos)
}

/// Writes a decimal integer.
pub fn write_int(out: &mut [u8], value: i64, options: &WriteOptions) -> Result<usize, Error> {
    let mut writer = Writer {
        out,
        pos: 0,
        depth: 0,
        options,
    };
    writer.write_int_token(value)?;
    Ok(writer.pos)
}

/// Writes a float in its shortest round-trip form. Non-finite values fail
/// with [`Errc::NumberOutOfRange`]: JSON cannot represent them.
pub fn write_float(out: &mut [u8], value: f64, options: &WriteOptions) -> Result<usize, Error> {
    let mut writer = Writer {
        out,
        pos: 0,
        depth: 0,
        options,
    };
    writer.write_float_token(value)?;
    Ok(writer.pos)
}

/// Writes a quoted, escaped string.
pub fn write_string(out: &mut [u8], value: &Str<'_>, options: &WriteOptions) -> Result<usize, Error> {
    let mut writer = Writer {
        out,
        pos: 0,
        depth: 0,
        options,
    };
    writer.write_string_token(value)?;
    Ok(writer.pos)
}

/// Writes an array.
pub fn write_array(out: &mut [u8], value: &Array<'_>, options: &WriteOptions) -> Result<usize, Error> {
    let mut writer = Writer {
        out,
        pos: 0,
        depth: 0,
        options,
    };
    let mut frames = Vec::new();
    match writer.open_array(&mut frames, value)? {
        Some(first) => writer.emit(&mut frames, first)?,
        None => {}
    }
    Ok(writer.pos)
}

/// Writes an object, members in insertion order.
pub fn write_object(out: &mut [u8], value: &Object<'_>, options: &WriteOptions) -> Result<usize, Error> {
    let mut writer = Writer {
        out,
        pos: 0,
        depth: 0,
        options,
    };
    let mut frames = Vec::new();
    match writer.open_object(&mut frames, value)? {
        Some(first) => writer.emit(&mut frames, first)?,
        None => {}
    }
    Ok(writer.pos)
}

struct Writer<'out, 'opts> {
    out: &'out mut [u8],
    pos: usize,
    depth: usize,
    options: &'opts WriteOptions,
}

/// One open container during emission: the not-yet-written remainder of
/// its elements. The writer drives an explicit stack, mirroring the
/// reader, so document depth never taxes the host stack.
enum Frame<'v, 'alloc> {
    Array(std::slice::Iter<'v, Value<'alloc>>),
    Object(object::Iter<'v, 'alloc>),
}

impl<'out, 'opts> Writer<'out, 'opts> {
    #[inline]
    fn overflow(&self) -> Error {
        Error::new(Errc::NotEnoughMemory, self.pos)
    }

    fn put(&mut self, byte: u8) -> Result<(), Error> {
        if self.pos < self.out.len() {
            self.out[self.pos] = byte;
            self.pos += 1;
            Ok(())
        } else {
            Err(self.overflow())
        }
    }

    /// Writes all of `bytes`, or nothing.
    fn put_slice(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.out.len() - self.pos < bytes.len() {
            return Err(self.overflow());
        }
        self.out[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    fn newline(&mut self) -> Result<(), Error> {
        if self.options.indent_size > 0 {
            self.put(b'\n')
        } else {
            Ok(())
        }
    }

    /// Writes the full indentation run for the current depth, or nothing.
    fn indent(&mut self) -> Result<(), Error> {
        let count = self.depth * self.options.indent_size;
        if self.out.len() - self.pos < count {
            return Err(self.overflow());
        }
        self.out[self.pos..self.pos + count].fill(b' ');
        self.pos += count;
        Ok(())
    }

    fn name_sep(&mut self) -> Result<(), Error> {
        if self.options.indent_size > 0 {
            self.put_slice(b": ")
        } else {
            self.put(b':')
        }
    }

    fn write_int_token(&mut self, value: i64) -> Result<(), Error> {
        let mut buf = itoa::Buffer::new();
        self.put_slice(buf.format(value).as_bytes())
    }

    fn write_float_token(&mut self, value: f64) -> Result<(), Error> {
        if !value.is_finite() {
            return Err(Error::new(Errc::NumberOutOfRange, self.pos));
        }
        let mut buf = ryu::Buffer::new();
        self.put_slice(buf.format_finite(value).as_bytes())
    }

    fn write_string_token(&mut self, value: &Str<'_>) -> Result<(), Error> {
        const HEX: &[u8; 16] = b"0123456789abcdef";

        self.put(b'"')?;
        let bytes = value.as_bytes();
        let mut index = 0;
        while index < bytes.len() {
            let byte = bytes[index];
            match byte {
                b'"' => self.put_slice(b"\\\"")?,
                b'\\' => self.put_slice(b"\\\\")?,
                0x08 => self.put_slice(b"\\b")?,
                b'\t' => self.put_slice(b"\\t")?,
                b'\n' => self.put_slice(b"\\n")?,
                0x0C => self.put_slice(b"\\f")?,
                b'\r' => self.put_slice(b"\\r")?,
                _ if byte < 0x20 => {
                    let escape = [
                        b'\\',
                        b'u',
                        b'0',
                        b'0',
                        HEX[(byte >> 4) as usize],
                        HEX[(byte & 0xF) as usize],
                    ];
                    self.put_slice(&escape)?;
                }
                _ => {
                    // Emit whole multi-byte sequences atomically, so a full
                    // buffer never splits one. The trailing bytes must all
                    // be continuations: a lenient parse can leave arbitrary
                    // bytes behind a lead-shaped one, and whatever follows
                    // it then re-enters classification so an embedded quote
                    // or control byte keeps its escape. An invalid lead
                    // byte passes through alone.
                    let len = match byte {
                        0xC0..=0xDF => 2,
                        0xE0..=0xEF => 3,
                        0xF0..=0xF7 => 4,
                        _ => 1,
                    };
                    let mut end = cmp::min(index + len, bytes.len());
                    if !bytes[index + 1..end].iter().all(|b| (0x80..=0xBF).contains(b)) {
                        end = index + 1;
                    }
                    self.put_slice(&bytes[index..end])?;
                    index = end;
                    continue;
                }
            }
            index += 1;
        }
        self.put(b'"')
    }

    /// Opens a non-empty array, pushing its frame and returning its first
    /// element; renders an empty one outright.
    fn open_array<'v, 'alloc>(
        &mut self,
        frames: &mut Vec<Frame<'v, 'alloc>>,
        array: &'v Array<'alloc>,
    ) -> Result<Option<&'v Value<'alloc>>, Error> {
        let mut iter = array.iter();
        match iter.next() {
            None => {
                self.put_slice(b"[]")?;
                Ok(None)
            }
            Some(first) => {
                self.put(b'[')?;
                self.depth += 1;
                self.newline()?;
                self.indent()?;
                frames.push(Frame::Array(iter));
                Ok(Some(first))
            }
        }
    }

    /// Opens a non-empty object, writing its first key and returning the
    /// matching value; renders an empty one outright.
    fn open_object<'v, 'alloc>(
        &mut self,
        frames: &mut Vec<Frame<'v, 'alloc>>,
        object: &'v Object<'alloc>,
    ) -> Result<Option<&'v Value<'alloc>>, Error> {
        let mut iter = object.iter();
        match iter.next() {
            None => {
                self.put_slice(b"{}")?;
                Ok(None)
            }
            Some(first) => {
                self.put(b'{')?;
                self.depth += 1;
                self.newline()?;
                self.indent()?;
                self.write_string_token(first.key())?;
                self.name_sep()?;
                frames.push(Frame::Object(iter));
                Ok(Some(first.value()))
            }
        }
    }

    /// Renders `start` and then drains `frames`, closing containers as
    /// their iterators run out.
    fn emit<'v, 'alloc>(
        &mut self,
        frames: &mut Vec<Frame<'v, 'alloc>>,
        start: &'v Value<'alloc>,
    ) -> Result<(), Error> {
        let mut pending = start;

        'emit: loop {
            match pending {
                Value::Null(_) => self.put_slice(b"null")?,
                Value::Bool(true, _) => self.put_slice(b"true")?,
                Value::Bool(false, _) => self.put_slice(b"false")?,
                Value::Int(value, _) => self.write_int_token(*value)?,
                Value::Float(value, _) => self.write_float_token(*value)?,
                Value::String(value) => self.write_string_token(value)?,
                Value::Array(array) => {
                    if let Some(first) = self.open_array(frames, array)? {
                        pending = first;
                        continue 'emit;
                    }
                }
                Value::Object(object) => {
                    if let Some(first) = self.open_object(frames, object)? {
                        pending = first;
                        continue 'emit;
                    }
                }
            }

            loop {
                let Some(frame) = frames.last_mut() else {
                    return Ok(());
                };
                match frame {
                    Frame::Array(iter) => match iter.next() {
                        Some(next) => {
                            self.put(b',')?;
                            self.newline()?;
                            self.indent()?;
                            pending = next;
                            continue 'emit;
                        }
                        None => {
                            self.newline()?;
                            self.depth -= 1;
                            self.indent()?;
                            self.put(b']')?;
                        }
                    },
                    Frame::Object(iter) => match iter.next() {
                        Some(entry) => {
                            self.put(b',')?;
                            self.newline()?;
                            self.indent()?;
                            self.write_string_token(entry.key())?;
                            self.name_sep()?;
                            pending = entry.value();
                            continue 'emit;
                        }
                        None => {
                            self.newline()?;
                            self.depth -= 1;
                            self.indent()?;
                            self.put(b'}')?;
                        }
                    },
                }
                frames.pop();
            }
        }
    }
}

impl serde::Serialize for Str<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.as_str() {
            Ok(text) => serializer.serialize_str(text),
            // Lenient parses can hold raw non-UTF-8 bytes.
            Err(_) => serializer.serialize_bytes(self.as_bytes()),
        }
    }
}

impl serde::Serialize for Value<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Value::Null(_) => serializer.serialize_unit(),
            Value::Bool(value, _) => serializer.serialize_bool(*value),
            Value::Int(value, _) => serializer.serialize_i64(*value),
            Value::Float(value, _) => serializer.serialize_f64(*value),
            Value::String(value) => value.serialize(serializer),
            Value::Array(value) => serializer.collect_seq(value.iter()),
            Value::Object(value) => {
                serializer.collect_map(value.iter().map(|entry| (entry.key(), entry.value())))
            }
        }
    }
}
