//! JSON body encoding shared by every command kind.
//!
//! The peer was written against bodies shaped like `{"a": 1, "b": [1, 2]}`:
//! a space after every `,` and `:`, and non-ASCII characters escaped as
//! `\uXXXX`. Keeping the encoded body pure ASCII also means the advertised
//! `body_size` never depends on how the peer decodes text.

use crate::error::command::CommandError;

use common::ErrorLocation;

use std::io::{self, Write};

use serde::Serialize;
use serde_json::Serializer;
use serde_json::ser::Formatter;

/// `serde_json` formatter producing `", "` / `": "` separators and ASCII-only output.
#[derive(Debug, Default, Clone, Copy)]
pub struct AsciiJsonFormatter;

impl Formatter for AsciiJsonFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }

        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// Encode a command body with [`AsciiJsonFormatter`].
#[track_caller]
pub fn encode_body<T>(body: &T) -> Result<String, CommandError>
where
    T: ?Sized + Serialize,
{
    let mut buffer = Vec::with_capacity(128);
    let mut serializer = Serializer::with_formatter(&mut buffer, AsciiJsonFormatter);
    body.serialize(&mut serializer)?;

    String::from_utf8(buffer).map_err(|e| CommandError::Encode {
        message: format!("encoded body is not UTF-8: {e}"),
        location: ErrorLocation::here(),
    })
}
