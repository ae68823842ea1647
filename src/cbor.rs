//! Canonical CBOR for CTAP2.
//!
//! Implements the bounded subset of RFC 8949 that CTAP2 messages use:
//! integers, byte strings, text strings, arrays, maps and booleans, with
//! the CTAP2 "deterministic encoding" rules on emission. Tags, floats and
//! indefinite-length items are outside the subset and rejected.
//!
//! The codec is pure: no state survives a call, and the only allocations
//! are the result buffers.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::str;

pub type Result<T> = core::result::Result<T, Error>;

/// Nesting ceiling for decoded arrays and maps.
///
/// CTAP2 payloads are shallow; the bound exists so untrusted input cannot
/// recurse the decoder off the stack.
pub const MAX_NESTING_DEPTH: usize = 16;

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;
const MAJOR_SIMPLE: u8 = 7;

const SIMPLE_FALSE: u8 = 20;
const SIMPLE_TRUE: u8 = 21;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Malformed input: truncation, reserved additional-info codes,
    /// invalid UTF-8, duplicate map keys, nesting beyond
    /// [`MAX_NESTING_DEPTH`]. The offset is the byte position where the
    /// defect was detected.
    InvalidCbor { offset: usize },
    /// Well-formed CBOR outside the supported subset: tags, floats,
    /// simple values other than the booleans, indefinite-length items,
    /// negative integers below `i64::MIN`.
    Unsupported { offset: usize },
    /// Encoder-side: a `Value::Negative` holding a non-negative payload.
    OutOfRange,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCbor { offset } => write!(f, "invalid CBOR at offset {}", offset),
            Error::Unsupported { offset } => write!(f, "unsupported CBOR item at offset {}", offset),
            Error::OutOfRange => f.write_str("integer out of encodable range"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// A decoded CBOR data item.
///
/// Map entries are kept in insertion order; the encoder sorts them into
/// canonical order on emission, so two maps with permuted entries encode
/// to identical bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Value {
    Unsigned(u64),
    /// Always strictly negative. Encoding a non-negative payload fails
    /// with [`Error::OutOfRange`].
    Negative(i64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Bool(bool),
}

impl Value {
    /// An empty map, the implicit argument of a bare CTAP2 command byte.
    pub fn empty_map() -> Self {
        Value::Map(Vec::new())
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    /// Look up a map entry by key. Returns `None` for non-maps.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Unsigned(n)
    }
}

impl From<u8> for Value {
    fn from(n: u8) -> Self {
        Value::Unsigned(n.into())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Unsigned(n as u64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        if n < 0 {
            Value::Negative(n)
        } else {
            Value::Unsigned(n as u64)
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        i64::from(n).into()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.into())
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.into())
    }
}

/// Encode a value into its canonical byte representation.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_into(value, &mut out)?;
    Ok(out)
}

fn encode_into(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Unsigned(n) => write_head(out, MAJOR_UNSIGNED, *n),
        Value::Negative(n) => {
            if *n >= 0 {
                return Err(Error::OutOfRange);
            }
            // argument is -1 - n, which for two's complement is !n
            write_head(out, MAJOR_NEGATIVE, !*n as u64);
        }
        Value::Bytes(bytes) => {
            write_head(out, MAJOR_BYTES, bytes.len() as u64);
            out.extend_from_slice(bytes);
        }
        Value::Text(text) => {
            write_head(out, MAJOR_TEXT, text.len() as u64);
            out.extend_from_slice(text.as_bytes());
        }
        Value::Array(items) => {
            write_head(out, MAJOR_ARRAY, items.len() as u64);
            for item in items {
                encode_into(item, out)?;
            }
        }
        Value::Map(entries) => {
            write_head(out, MAJOR_MAP, entries.len() as u64);
            // Byte-wise order of the encoded keys is exactly the CTAP2
            // canonical order: major type, then length, then lexicographic.
            let mut encoded = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let mut k = Vec::new();
                encode_into(key, &mut k)?;
                let mut v = Vec::new();
                encode_into(value, &mut v)?;
                encoded.push((k, v));
            }
            encoded.sort_by(|a, b| a.0.cmp(&b.0));
            for (k, v) in encoded {
                out.extend_from_slice(&k);
                out.extend_from_slice(&v);
            }
        }
        Value::Bool(b) => {
            let simple = if *b { SIMPLE_TRUE } else { SIMPLE_FALSE };
            out.push(MAJOR_SIMPLE << 5 | simple);
        }
    }
    Ok(())
}

/// Write a head with the shortest argument form that fits.
fn write_head(out: &mut Vec<u8>, major: u8, arg: u64) {
    let mt = major << 5;
    if arg < 24 {
        out.push(mt | arg as u8);
    } else if arg <= u8::MAX as u64 {
        out.push(mt | 24);
        out.push(arg as u8);
    } else if arg <= u16::MAX as u64 {
        out.push(mt | 25);
        out.extend_from_slice(&(arg as u16).to_be_bytes());
    } else if arg <= u32::MAX as u64 {
        out.push(mt | 26);
        out.extend_from_slice(&(arg as u32).to_be_bytes());
    } else {
        out.push(mt | 27);
        out.extend_from_slice(&arg.to_be_bytes());
    }
}

/// Decode a single data item from the front of `input`.
///
/// Returns the item and the number of bytes consumed; trailing bytes are
/// left for the caller.
pub fn decode(input: &[u8]) -> Result<(Value, usize)> {
    let mut decoder = Decoder { input, pos: 0 };
    let value = decoder.item(0)?;
    Ok((value, decoder.pos))
}

/// Decode a single data item and require that it spans the entire input.
pub fn decode_all(input: &[u8]) -> Result<Value> {
    let (value, consumed) = decode(input)?;
    if consumed != input.len() {
        return Err(Error::InvalidCbor { offset: consumed });
    }
    Ok(value)
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .input
            .get(self.pos)
            .ok_or(Error::InvalidCbor { offset: self.pos })?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.input.len())
            .ok_or(Error::InvalidCbor { offset: self.input.len() })?;
        let bytes = &self.input[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Read a head and return `(major, argument)`.
    fn head(&mut self) -> Result<(u8, u64)> {
        let offset = self.pos;
        let initial = self.byte()?;
        let major = initial >> 5;
        let arg = match initial & 0x1f {
            small @ 0..=23 => small as u64,
            24 => self.byte()? as u64,
            25 => u16::from_be_bytes(self.take(2)?.try_into().unwrap()) as u64,
            26 => u32::from_be_bytes(self.take(4)?.try_into().unwrap()) as u64,
            27 => u64::from_be_bytes(self.take(8)?.try_into().unwrap()),
            28..=30 => return Err(Error::InvalidCbor { offset }),
            // indefinite length
            _ => return Err(Error::Unsupported { offset }),
        };
        Ok((major, arg))
    }

    fn length(&self, arg: u64) -> Result<usize> {
        usize::try_from(arg).map_err(|_| Error::InvalidCbor { offset: self.pos })
    }

    fn item(&mut self, depth: usize) -> Result<Value> {
        let offset = self.pos;
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::InvalidCbor { offset });
        }
        let (major, arg) = self.head()?;
        Ok(match major {
            MAJOR_UNSIGNED => Value::Unsigned(arg),
            MAJOR_NEGATIVE => {
                let n = i64::try_from(arg).map_err(|_| Error::Unsupported { offset })?;
                Value::Negative(-1 - n)
            }
            MAJOR_BYTES => {
                let len = self.length(arg)?;
                Value::Bytes(self.take(len)?.into())
            }
            MAJOR_TEXT => {
                let len = self.length(arg)?;
                let payload_offset = self.pos;
                let bytes = self.take(len)?;
                let text = str::from_utf8(bytes)
                    .map_err(|_| Error::InvalidCbor { offset: payload_offset })?;
                Value::Text(text.into())
            }
            MAJOR_ARRAY => {
                let count = self.length(arg)?;
                let mut items = Vec::new();
                for _ in 0..count {
                    items.push(self.item(depth + 1)?);
                }
                Value::Array(items)
            }
            MAJOR_MAP => {
                let count = self.length(arg)?;
                let mut entries: Vec<(Value, Value)> = Vec::new();
                for _ in 0..count {
                    let key_offset = self.pos;
                    let key = self.item(depth + 1)?;
                    if entries.iter().any(|(k, _)| *k == key) {
                        return Err(Error::InvalidCbor { offset: key_offset });
                    }
                    let value = self.item(depth + 1)?;
                    entries.push((key, value));
                }
                Value::Map(entries)
            }
            MAJOR_TAG => return Err(Error::Unsupported { offset }),
            _ => match arg {
                arg if arg == SIMPLE_FALSE as u64 => Value::Bool(false),
                arg if arg == SIMPLE_TRUE as u64 => Value::Bool(true),
                // null, undefined, other simples, floats
                _ => return Err(Error::Unsupported { offset }),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn roundtrip(value: Value) -> Vec<u8> {
        let encoded = encode(&value).unwrap();
        assert_eq!(decode_all(&encoded).unwrap(), value);
        encoded
    }

    #[test]
    fn integer_vectors() {
        assert_eq!(roundtrip(Value::from(0u64)), hex!("00"));
        assert_eq!(roundtrip(Value::from(23u64)), hex!("17"));
        assert_eq!(roundtrip(Value::from(24u64)), hex!("1818"));
        assert_eq!(roundtrip(Value::from(1000u64)), hex!("1903e8"));
        assert_eq!(roundtrip(Value::from(-1i64)), hex!("20"));
        assert_eq!(roundtrip(Value::from(-1000i64)), hex!("3903e7"));
        assert_eq!(
            roundtrip(Value::from(u64::MAX)),
            hex!("1bffffffffffffffff")
        );
    }

    #[test]
    fn minimal_heads_at_boundaries() {
        assert_eq!(roundtrip(Value::from(255u64)), hex!("18ff"));
        assert_eq!(roundtrip(Value::from(256u64)), hex!("190100"));
        assert_eq!(roundtrip(Value::from(65535u64)), hex!("19ffff"));
        assert_eq!(roundtrip(Value::from(65536u64)), hex!("1a00010000"));
        assert_eq!(roundtrip(Value::from(u32::MAX as u64)), hex!("1affffffff"));
        assert_eq!(
            roundtrip(Value::from(u32::MAX as u64 + 1)),
            hex!("1b0000000100000000")
        );
        assert_eq!(roundtrip(Value::from(i64::MIN)), hex!("3b7fffffffffffffff"));
    }

    #[test]
    fn strings_and_arrays() {
        assert_eq!(roundtrip(Value::from("")), hex!("60"));
        assert_eq!(roundtrip(Value::from("IETF")), hex!("6449455446"));
        assert_eq!(roundtrip(Value::from(&b"\x01\x02\x03\x04"[..])), hex!("4401020304"));
        assert_eq!(
            roundtrip(Value::Array(vec![Value::from(1u64), Value::from(2u64)])),
            hex!("820102")
        );
        assert_eq!(roundtrip(Value::Bool(false)), hex!("f4"));
        assert_eq!(roundtrip(Value::Bool(true)), hex!("f5"));
    }

    #[test]
    fn text_map_vector() {
        let map = Value::Map(vec![
            (Value::from("a"), Value::from("A")),
            (Value::from("b"), Value::from("B")),
            (Value::from("c"), Value::from("C")),
            (Value::from("d"), Value::from("D")),
            (Value::from("e"), Value::from("E")),
        ]);
        assert_eq!(
            roundtrip(map),
            hex!("a56161614161626142616361436164614461656145")
        );
    }

    #[test]
    fn map_encoding_is_order_independent() {
        let forward = Value::Map(vec![
            (Value::from(1u64), Value::from("x")),
            (Value::from(3u64), Value::from("y")),
            (Value::from("b"), Value::from(0u64)),
            (Value::from("aa"), Value::from(1u64)),
        ]);
        let shuffled = Value::Map(vec![
            (Value::from("aa"), Value::from(1u64)),
            (Value::from(3u64), Value::from("y")),
            (Value::from("b"), Value::from(0u64)),
            (Value::from(1u64), Value::from("x")),
        ]);
        let bytes = encode(&forward).unwrap();
        assert_eq!(bytes, encode(&shuffled).unwrap());
        // integers before strings, shorter strings before longer
        assert_eq!(bytes, hex!("a4016178036179616200626161 01"));
    }

    #[test]
    fn negative_integer_keys_sort_by_magnitude() {
        let map = Value::Map(vec![
            (Value::from(-1000i64), Value::from(0u64)),
            (Value::from(-1i64), Value::from(1u64)),
            (Value::from(2u64), Value::from(2u64)),
        ]);
        assert_eq!(encode(&map).unwrap(), hex!("a302022001 3903e7 00"));
    }

    #[test]
    fn encode_rejects_non_negative_negative() {
        assert_eq!(encode(&Value::Negative(0)), Err(Error::OutOfRange));
        assert_eq!(encode(&Value::Negative(7)), Err(Error::OutOfRange));
    }

    #[test]
    fn decode_reports_offsets() {
        // truncated argument
        assert_eq!(decode(&hex!("19 03")), Err(Error::InvalidCbor { offset: 2 }));
        // truncated string payload
        assert_eq!(decode(&hex!("62 61")), Err(Error::InvalidCbor { offset: 2 }));
        // reserved additional-information code
        assert_eq!(decode(&hex!("1c")), Err(Error::InvalidCbor { offset: 0 }));
        // missing map value
        assert_eq!(decode(&hex!("a1 01")), Err(Error::InvalidCbor { offset: 2 }));
        // second element of the array is a tag
        assert_eq!(decode(&hex!("82 01 c0")), Err(Error::Unsupported { offset: 2 }));
    }

    #[test]
    fn decode_rejects_unsupported_items() {
        // tag 2 (bignum)
        assert!(matches!(decode(&hex!("c2 41 01")), Err(Error::Unsupported { .. })));
        // null, undefined
        assert!(matches!(decode(&hex!("f6")), Err(Error::Unsupported { .. })));
        assert!(matches!(decode(&hex!("f7")), Err(Error::Unsupported { .. })));
        // half float
        assert!(matches!(decode(&hex!("f93c00")), Err(Error::Unsupported { .. })));
        // indefinite-length byte string
        assert!(matches!(decode(&hex!("5f")), Err(Error::Unsupported { .. })));
        // negative integer below i64::MIN
        assert!(matches!(
            decode(&hex!("3b8000000000000000")),
            Err(Error::Unsupported { .. })
        ));
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        assert_eq!(decode(&hex!("62 ff fe")), Err(Error::InvalidCbor { offset: 1 }));
    }

    #[test]
    fn decode_rejects_duplicate_map_keys() {
        assert_eq!(
            decode(&hex!("a2 01 00 01 01")),
            Err(Error::InvalidCbor { offset: 3 })
        );
    }

    #[test]
    fn decode_rejects_runaway_nesting() {
        let mut nested = vec![0x81u8; MAX_NESTING_DEPTH + 2];
        nested.push(0x00);
        assert!(matches!(decode(&nested), Err(Error::InvalidCbor { .. })));
    }

    #[test]
    fn decode_all_rejects_trailing_bytes() {
        assert_eq!(decode_all(&hex!("00 00")), Err(Error::InvalidCbor { offset: 1 }));
        let (value, consumed) = decode(&hex!("00 00")).unwrap();
        assert_eq!(value, Value::Unsigned(0));
        assert_eq!(consumed, 1);
    }

    #[test]
    fn non_canonical_input_reencodes_canonically() {
        // 24 with a two-byte head, map in reverse order
        let (value, _) = decode(&hex!("a2 6162 190018 6161 00")).unwrap();
        assert_eq!(encode(&value).unwrap(), hex!("a2 6161 00 6162 1818"));
    }
}
