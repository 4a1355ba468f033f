//! JSON form of the value tree
//!
//! [`ModelNode`] implements [`Serialize`]. Undefined nodes become `null`,
//! bytes, expressions and type values are wrapped in single-key objects
//! (`BYTES_VALUE`, `EXPRESSION_VALUE`, `TYPE_MODEL_VALUE`) and big numbers are
//! written verbatim. [`ModelNode::to_json_string`] renders with `" : "` between
//! keys and values and escapes `/` as well as C0, C1 and U+2000..U+20FF
//! characters as uppercase `\uXXXX`.

use std::io::{self, Write};

use base64::Engine;
use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};
use serde_json::ser::{CharEscape, Formatter};
use serde_json::value::RawValue;

use crate::error::{DmrError, DmrResult};
use crate::model::{ModelNode, ModelValue};

const BYTES_VALUE: &str = "BYTES_VALUE";
const EXPRESSION_VALUE: &str = "EXPRESSION_VALUE";
const TYPE_MODEL_VALUE: &str = "TYPE_MODEL_VALUE";

const TAB: &[u8] = b"  ";

impl Serialize for ModelNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value() {
            ModelValue::Undefined => serializer.serialize_unit(),
            ModelValue::Boolean(b) => serializer.serialize_bool(*b),
            ModelValue::Int(i) => serializer.serialize_i32(*i),
            ModelValue::Long(l) => serializer.serialize_i64(*l),
            ModelValue::Double(d) if !d.is_finite() => serializer.serialize_unit(),
            ModelValue::Double(d) => serializer.serialize_f64(*d),
            ModelValue::BigInteger(b) => raw_number(serializer, b.to_string()),
            ModelValue::BigDecimal(d) => raw_number(serializer, d.to_string()),
            ModelValue::Bytes(bytes) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                single_entry(serializer, BYTES_VALUE, &encoded)
            }
            ModelValue::String(s) => serializer.serialize_str(s),
            ModelValue::Expression(s) => single_entry(serializer, EXPRESSION_VALUE, s),
            ModelValue::Type(t) => single_entry(serializer, TYPE_MODEL_VALUE, t.name()),
            ModelValue::List(list) => serializer.collect_seq(list),
            ModelValue::Object(map) => serializer.collect_map(map),
            ModelValue::Property(p) => single_entry(serializer, p.name(), p.value()),
        }
    }
}

fn raw_number<S: Serializer>(serializer: S, digits: String) -> Result<S::Ok, S::Error> {
    RawValue::from_string(digits)
        .map_err(S::Error::custom)?
        .serialize(serializer)
}

fn single_entry<S, V>(serializer: S, key: &str, value: &V) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize + ?Sized,
{
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, value)?;
    map.end()
}

impl ModelNode {
    /// JSON rendering, pretty printed with two-space indentation unless
    /// `compact` is set.
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::Encode`] if a big number does not render as a JSON
    /// number.
    pub fn to_json_string(&self, compact: bool) -> DmrResult<String> {
        let mut out = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut out, DmrFormatter::new(!compact));
        self.serialize(&mut serializer)
            .map_err(|e| DmrError::encode(e.to_string()))?;
        String::from_utf8(out).map_err(|e| DmrError::encode(e.to_string()))
    }
}

/// `serde_json` formatter for the DMR flavour of JSON
#[derive(Debug, Clone, Default)]
struct DmrFormatter {
    pretty: bool,
    depth: usize,
    has_value: bool,
}

impl DmrFormatter {
    fn new(pretty: bool) -> Self {
        Self {
            pretty,
            ..Self::default()
        }
    }

    fn open<W: ?Sized + Write>(&mut self, writer: &mut W, bracket: &[u8]) -> io::Result<()> {
        self.depth += 1;
        self.has_value = false;
        writer.write_all(bracket)
    }

    fn close<W: ?Sized + Write>(&mut self, writer: &mut W, bracket: &[u8]) -> io::Result<()> {
        self.depth = self.depth.saturating_sub(1);
        if self.pretty && self.has_value {
            newline(writer, self.depth)?;
        }
        writer.write_all(bracket)
    }

    fn separate<W: ?Sized + Write>(&self, writer: &mut W, first: bool) -> io::Result<()> {
        if !first {
            writer.write_all(b",")?;
        }
        if self.pretty {
            newline(writer, self.depth)
        } else if !first {
            writer.write_all(b" ")
        } else {
            Ok(())
        }
    }
}

fn newline<W: ?Sized + Write>(writer: &mut W, depth: usize) -> io::Result<()> {
    writer.write_all(b"\n")?;
    for _ in 0..depth {
        writer.write_all(TAB)?;
    }
    Ok(())
}

fn needs_unicode_escape(c: char) -> bool {
    matches!(c, '\u{7f}'..='\u{9f}' | '\u{2000}'..='\u{20ff}')
}

impl Formatter for DmrFormatter {
    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.open(writer, b"[")
    }

    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.close(writer, b"]")
    }

    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.separate(writer, first)
    }

    fn end_array_value<W: ?Sized + Write>(&mut self, _writer: &mut W) -> io::Result<()> {
        self.has_value = true;
        Ok(())
    }

    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.open(writer, b"{")
    }

    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.close(writer, b"}")
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.separate(writer, first)
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b" : ")
    }

    fn end_object_value<W: ?Sized + Write>(&mut self, _writer: &mut W) -> io::Result<()> {
        self.has_value = true;
        Ok(())
    }

    // serde_json escapes quotes, backslashes and C0 controls itself
    fn write_string_fragment<W: ?Sized + Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if c == '/' || needs_unicode_escape(c) {
                writer.write_all(fragment[start..i].as_bytes())?;
                if c == '/' {
                    writer.write_all(b"\\/")?;
                } else {
                    write!(writer, "\\u{:04X}", u32::from(c))?;
                }
                start = i + c.len_utf8();
            }
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn write_char_escape<W: ?Sized + Write>(&mut self, writer: &mut W, char_escape: CharEscape) -> io::Result<()> {
        let escape: &[u8] = match char_escape {
            CharEscape::Quote => b"\\\"",
            CharEscape::ReverseSolidus => b"\\\\",
            CharEscape::Solidus => b"\\/",
            CharEscape::Backspace => b"\\b",
            CharEscape::FormFeed => b"\\f",
            CharEscape::LineFeed => b"\\n",
            CharEscape::CarriageReturn => b"\\r",
            CharEscape::Tab => b"\\t",
            CharEscape::AsciiControl(byte) => return write!(writer, "\\u{byte:04X}"),
        };
        writer.write_all(escape)
    }
}
