//! DMR binary wire format
//!
//! Each node is written as one ASCII type byte followed by a type specific
//! payload. All integers are big-endian; strings use the modified UTF-8 form
//! with an unsigned 16-bit length prefix.
//!
//! | tag | payload                                  |
//! |-----|------------------------------------------|
//! | `Z` | one byte, 0 or 1                         |
//! | `I` | i32                                      |
//! | `J` | i64                                      |
//! | `D` | f64                                      |
//! | `i` | i32 length + two's complement bytes      |
//! | `d` | i32 length + unscaled bytes + i32 scale  |
//! | `b` | i32 length + bytes                       |
//! | `s` | utf                                      |
//! | `e` | utf                                      |
//! | `t` | type tag byte                            |
//! | `l` | i32 count + count nodes                  |
//! | `o` | i32 count + count × (utf key, node)      |
//! | `p` | utf name + node                          |
//! | `u` | nothing                                  |
//!
//! Over HTTP the binary form travels base64 encoded with content type
//! [`CONTENT_TYPE`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::{Buf, BufMut, BytesMut};
use indexmap::IndexMap;
use num_bigint::BigInt;

use crate::error::{DmrError, DmrResult};
use crate::model::{BigDecimal, ModelNode, ModelType, ModelValue, Property};

/// Content type of base64 encoded DMR payloads
pub const CONTENT_TYPE: &str = "application/dmr-encoded";

/// Nesting limit applied while decoding untrusted input
const MAX_DEPTH: usize = 256;

impl ModelNode {
    /// Encode to the binary wire format
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::Encode`] if a string exceeds 65535 encoded bytes or a
    /// collection exceeds `i32::MAX` elements.
    pub fn to_bytes(&self) -> DmrResult<Vec<u8>> {
        let mut buf = BytesMut::new();
        encode(self, &mut buf)?;
        Ok(buf.to_vec())
    }

    /// Decode from the binary wire format
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::Decode`] for truncated input, unknown type tags, invalid
    /// strings, excessive nesting or trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> DmrResult<Self> {
        let mut reader = Reader { buf: bytes };
        let node = reader.node(0)?;
        if reader.buf.has_remaining() {
            return Err(DmrError::decode(format!(
                "{} trailing bytes after value",
                reader.buf.remaining()
            )));
        }
        Ok(node)
    }

    /// Encode to base64 of the binary wire format
    ///
    /// # Errors
    ///
    /// Same as [`to_bytes`](Self::to_bytes).
    pub fn to_base64(&self) -> DmrResult<String> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }

    /// Decode from base64 of the binary wire format. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::Decode`] for invalid base64 or an invalid payload.
    pub fn from_base64(encoded: &str) -> DmrResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| DmrError::decode(format!("invalid base64: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

fn encode(node: &ModelNode, buf: &mut BytesMut) -> DmrResult<()> {
    buf.put_u8(node.model_type().tag());
    match node.value() {
        ModelValue::Undefined => {}
        ModelValue::Boolean(b) => buf.put_u8(u8::from(*b)),
        ModelValue::Int(i) => buf.put_i32(*i),
        ModelValue::Long(l) => buf.put_i64(*l),
        ModelValue::Double(d) => buf.put_f64(*d),
        ModelValue::BigInteger(b) => put_sized(buf, &b.to_signed_bytes_be())?,
        ModelValue::BigDecimal(d) => {
            put_sized(buf, &d.unscaled().to_signed_bytes_be())?;
            buf.put_i32(d.scale());
        }
        ModelValue::Bytes(bytes) => put_sized(buf, bytes)?,
        ModelValue::String(s) | ModelValue::Expression(s) => put_utf(buf, s)?,
        ModelValue::Type(t) => buf.put_u8(t.tag()),
        ModelValue::List(list) => {
            put_len(buf, list.len())?;
            for item in list {
                encode(item, buf)?;
            }
        }
        ModelValue::Object(map) => {
            put_len(buf, map.len())?;
            for (key, value) in map {
                put_utf(buf, key)?;
                encode(value, buf)?;
            }
        }
        ModelValue::Property(p) => {
            put_utf(buf, p.name())?;
            encode(p.value(), buf)?;
        }
    }
    Ok(())
}

fn put_len(buf: &mut BytesMut, len: usize) -> DmrResult<()> {
    let len = i32::try_from(len)
        .map_err(|_| DmrError::encode(format!("length {len} exceeds i32::MAX")))?;
    buf.put_i32(len);
    Ok(())
}

fn put_sized(buf: &mut BytesMut, bytes: &[u8]) -> DmrResult<()> {
    put_len(buf, bytes.len())?;
    buf.put_slice(bytes);
    Ok(())
}

fn put_utf(buf: &mut BytesMut, s: &str) -> DmrResult<()> {
    let encoded = encode_modified_utf8(s);
    let len = u16::try_from(encoded.len()).map_err(|_| {
        DmrError::encode(format!(
            "string of {} encoded bytes exceeds 65535",
            encoded.len()
        ))
    })?;
    buf.put_u16(len);
    buf.put_slice(&encoded);
    Ok(())
}

/// Modified UTF-8: NUL takes two bytes and supplementary characters are
/// written as two three-byte surrogates.
fn encode_modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

fn decode_modified_utf8(raw: &[u8]) -> DmrResult<String> {
    let mut units = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let lead = u16::from(raw[i]);
        if lead & 0x80 == 0 {
            units.push(lead);
            i += 1;
        } else if lead & 0xE0 == 0xC0 {
            let b = continuation(raw, i + 1)?;
            units.push(((lead & 0x1F) << 6) | b);
            i += 2;
        } else if lead & 0xF0 == 0xE0 {
            let b = continuation(raw, i + 1)?;
            let c = continuation(raw, i + 2)?;
            units.push(((lead & 0x0F) << 12) | (b << 6) | c);
            i += 3;
        } else {
            return Err(DmrError::decode(format!(
                "invalid modified UTF-8 lead byte 0x{lead:02x}"
            )));
        }
    }
    String::from_utf16(&units).map_err(|e| DmrError::decode(e.to_string()))
}

fn continuation(raw: &[u8], index: usize) -> DmrResult<u16> {
    match raw.get(index) {
        Some(b) if b & 0xC0 == 0x80 => Ok(u16::from(b & 0x3F)),
        _ => Err(DmrError::decode("truncated modified UTF-8 sequence")),
    }
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl Reader<'_> {
    fn need(&self, n: usize) -> DmrResult<()> {
        if self.buf.remaining() < n {
            Err(DmrError::decode(format!(
                "unexpected end of input: need {n} bytes, {} left",
                self.buf.remaining()
            )))
        } else {
            Ok(())
        }
    }

    fn u8(&mut self) -> DmrResult<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> DmrResult<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    fn i32(&mut self) -> DmrResult<i32> {
        self.need(4)?;
        Ok(self.buf.get_i32())
    }

    fn i64(&mut self) -> DmrResult<i64> {
        self.need(8)?;
        Ok(self.buf.get_i64())
    }

    fn f64(&mut self) -> DmrResult<f64> {
        self.need(8)?;
        Ok(self.buf.get_f64())
    }

    fn len(&mut self) -> DmrResult<usize> {
        let len = self.i32()?;
        usize::try_from(len).map_err(|_| DmrError::decode(format!("negative length {len}")))
    }

    fn bytes(&mut self, len: usize) -> DmrResult<Vec<u8>> {
        self.need(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head.to_vec())
    }

    fn sized(&mut self) -> DmrResult<Vec<u8>> {
        let len = self.len()?;
        self.bytes(len)
    }

    fn utf(&mut self) -> DmrResult<String> {
        let len = usize::from(self.u16()?);
        let raw = self.bytes(len)?;
        decode_modified_utf8(&raw)
    }

    fn node(&mut self, depth: usize) -> DmrResult<ModelNode> {
        if depth > MAX_DEPTH {
            return Err(DmrError::decode(format!(
                "nesting deeper than {MAX_DEPTH} levels"
            )));
        }
        let tag = self.u8()?;
        let model_type = ModelType::from_tag(tag)
            .ok_or_else(|| DmrError::decode(format!("unknown type tag 0x{tag:02x}")))?;
        let value = match model_type {
            ModelType::Undefined => ModelValue::Undefined,
            ModelType::Boolean => ModelValue::Boolean(self.u8()? != 0),
            ModelType::Int => ModelValue::Int(self.i32()?),
            ModelType::Long => ModelValue::Long(self.i64()?),
            ModelType::Double => ModelValue::Double(self.f64()?),
            ModelType::BigInteger => {
                ModelValue::BigInteger(BigInt::from_signed_bytes_be(&self.sized()?))
            }
            ModelType::BigDecimal => {
                let unscaled = BigInt::from_signed_bytes_be(&self.sized()?);
                ModelValue::BigDecimal(BigDecimal::new(unscaled, self.i32()?))
            }
            ModelType::Bytes => ModelValue::Bytes(self.sized()?),
            ModelType::String => ModelValue::String(self.utf()?),
            ModelType::Expression => ModelValue::Expression(self.utf()?),
            ModelType::Type => {
                let tag = self.u8()?;
                ModelValue::Type(ModelType::from_tag(tag).ok_or_else(|| {
                    DmrError::decode(format!("unknown type value 0x{tag:02x}"))
                })?)
            }
            ModelType::List => {
                let count = self.len()?;
                let mut list = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    list.push(self.node(depth + 1)?);
                }
                ModelValue::List(list)
            }
            ModelType::Object => {
                let count = self.len()?;
                let mut map = IndexMap::with_capacity(count.min(1024));
                for _ in 0..count {
                    let key = self.utf()?;
                    map.insert(key, self.node(depth + 1)?);
                }
                ModelValue::Object(map)
            }
            ModelType::Property => {
                let name = self.utf()?;
                ModelValue::Property(Box::new(Property::new(name, self.node(depth + 1)?)))
            }
        };
        Ok(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_scalar_layout() {
        assert_eq!(ModelNode::from(true).to_bytes().unwrap(), vec![b'Z', 1]);
        assert_eq!(
            ModelNode::from(1i64).to_bytes().unwrap(),
            vec![b'J', 0, 0, 0, 0, 0, 0, 0, 1]
        );
        assert_eq!(
            ModelNode::from("ab").to_bytes().unwrap(),
            vec![b's', 0, 2, b'a', b'b']
        );
        assert_eq!(ModelNode::new().to_bytes().unwrap(), vec![b'u']);
    }

    #[test]
    fn test_object_layout_preserves_order() {
        let mut node = ModelNode::new();
        node.get("b").unwrap().set(1).unwrap();
        node.get("a").unwrap().set(ModelType::Long).unwrap();
        let bytes = node.to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![
                b'o', 0, 0, 0, 2, //
                0, 1, b'b', b'I', 0, 0, 0, 1, //
                0, 1, b'a', b't', b'J',
            ]
        );
        let decoded = ModelNode::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.keys().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn test_full_tag_set_survives() {
        let mut node = ModelNode::new();
        node.get("undefined").unwrap();
        node.get("bool").unwrap().set(false).unwrap();
        node.get("int").unwrap().set(-3).unwrap();
        node.get("long").unwrap().set(i64::MIN).unwrap();
        node.get("double").unwrap().set(0.25).unwrap();
        node.get("big-int")
            .unwrap()
            .set(BigInt::from(-123_456_789_012_345_678_i64) * BigInt::from(1000))
            .unwrap();
        node.get("big-dec")
            .unwrap()
            .set("-1.005".parse::<BigDecimal>().unwrap())
            .unwrap();
        node.get("bytes").unwrap().set(vec![0u8, 1, 254]).unwrap();
        node.get("expr").unwrap().set(ModelNode::expression("${a:b}")).unwrap();
        node.get("type").unwrap().set(ModelType::Object).unwrap();
        node.get("list").unwrap().add(1).unwrap().add("two").unwrap();
        node.get("prop").unwrap().set_property("name", 2i64).unwrap();

        let decoded = ModelNode::from_base64(&node.to_base64().unwrap()).unwrap();
        assert_eq!(decoded, node);
        assert_eq!(
            decoded.child("big-dec").unwrap().as_big_decimal().unwrap().to_string(),
            "-1.005"
        );
    }

    #[test]
    fn test_modified_utf8_special_cases() {
        assert_eq!(encode_modified_utf8("\0"), vec![0xC0, 0x80]);
        // U+1F600 becomes a surrogate pair of two three byte sequences
        let encoded = encode_modified_utf8("\u{1F600}");
        assert_eq!(encoded.len(), 6);
        assert_eq!(decode_modified_utf8(&encoded).unwrap(), "\u{1F600}");
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            ModelNode::from_bytes(&[b'x']),
            Err(DmrError::Decode(_))
        ));
        assert!(matches!(
            ModelNode::from_bytes(&[b'J', 0, 0]),
            Err(DmrError::Decode(_))
        ));
        assert!(matches!(
            ModelNode::from_bytes(&[b'l', 0xFF, 0xFF, 0xFF, 0xFF]),
            Err(DmrError::Decode(_))
        ));
        assert!(matches!(
            ModelNode::from_bytes(&[b'u', b'u']),
            Err(DmrError::Decode(_))
        ));
        assert!(matches!(
            ModelNode::from_base64("not base64!"),
            Err(DmrError::Decode(_))
        ));
    }

    #[test]
    fn test_too_long_string_fails_to_encode() {
        let long = "x".repeat(70_000);
        assert!(matches!(
            ModelNode::from(long).to_bytes(),
            Err(DmrError::Encode(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_strings_survive_modified_utf8(s in "\\PC{0,64}") {
            let node = ModelNode::from(s.clone());
            let decoded = ModelNode::from_bytes(&node.to_bytes().unwrap()).unwrap();
            prop_assert_eq!(decoded.as_str(), Some(s.as_str()));
        }
    }
}
