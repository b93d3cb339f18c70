//! Wire-side values of the CQL native protocol
//!
//! `WireValue` is what the session transport sends and receives. The
//! `[value]` framing (`[int] length` + bytes, `-1` for null) lives here too
//! so a transport only needs to move bytes.

use crate::core::{CodecError, Numeric};
use bytes::{Buf, BufMut, BytesMut};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Counter(i64),
    Float(f32),
    Double(f64),
    Ascii(String),
    Text(String),
    Blob(Vec<u8>),
    Uuid(Uuid),
    TimeUuid(Uuid),
    /// Milliseconds since 1970-01-01 UTC
    Timestamp(i64),
    /// Days since 1970-01-01, biased by 2^31
    Date(u32),
    /// Nanoseconds since midnight
    Time(i64),
    Inet(IpAddr),
    /// Big-endian two's-complement unscaled value plus scale
    Decimal { unscaled: Vec<u8>, scale: i32 },
    Varint(Vec<u8>),
    Custom(Vec<u8>),
}

/// Protocol type of a column, as named in `system_schema`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKind {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Counter,
    Float,
    Double,
    Ascii,
    Text,
    Blob,
    Uuid,
    TimeUuid,
    Timestamp,
    Date,
    Time,
    Inet,
    Decimal,
    Varint,
    Custom,
}

impl WireKind {
    /// Kind for a CQL type name; anything unrecognised is `Custom`.
    #[must_use]
    pub fn from_cql_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "boolean" => Self::Boolean,
            "tinyint" => Self::TinyInt,
            "smallint" => Self::SmallInt,
            "int" => Self::Int,
            "bigint" => Self::BigInt,
            "counter" => Self::Counter,
            "float" => Self::Float,
            "double" => Self::Double,
            "ascii" => Self::Ascii,
            "text" | "varchar" => Self::Text,
            "blob" => Self::Blob,
            "uuid" => Self::Uuid,
            "timeuuid" => Self::TimeUuid,
            "timestamp" => Self::Timestamp,
            "date" => Self::Date,
            "time" => Self::Time,
            "inet" => Self::Inet,
            "decimal" => Self::Decimal,
            "varint" => Self::Varint,
            _ => Self::Custom,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::TinyInt => "tinyint",
            Self::SmallInt => "smallint",
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Counter => "counter",
            Self::Float => "float",
            Self::Double => "double",
            Self::Ascii => "ascii",
            Self::Text => "text",
            Self::Blob => "blob",
            Self::Uuid => "uuid",
            Self::TimeUuid => "timeuuid",
            Self::Timestamp => "timestamp",
            Self::Date => "date",
            Self::Time => "time",
            Self::Inet => "inet",
            Self::Decimal => "decimal",
            Self::Varint => "varint",
            Self::Custom => "custom",
        }
    }
}

impl WireValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// `None` for NULL
    #[must_use]
    pub const fn kind(&self) -> Option<WireKind> {
        let kind = match self {
            Self::Null => return None,
            Self::Boolean(_) => WireKind::Boolean,
            Self::TinyInt(_) => WireKind::TinyInt,
            Self::SmallInt(_) => WireKind::SmallInt,
            Self::Int(_) => WireKind::Int,
            Self::BigInt(_) => WireKind::BigInt,
            Self::Counter(_) => WireKind::Counter,
            Self::Float(_) => WireKind::Float,
            Self::Double(_) => WireKind::Double,
            Self::Ascii(_) => WireKind::Ascii,
            Self::Text(_) => WireKind::Text,
            Self::Blob(_) => WireKind::Blob,
            Self::Uuid(_) => WireKind::Uuid,
            Self::TimeUuid(_) => WireKind::TimeUuid,
            Self::Timestamp(_) => WireKind::Timestamp,
            Self::Date(_) => WireKind::Date,
            Self::Time(_) => WireKind::Time,
            Self::Inet(_) => WireKind::Inet,
            Self::Decimal { .. } => WireKind::Decimal,
            Self::Varint(_) => WireKind::Varint,
            Self::Custom(_) => WireKind::Custom,
        };
        Some(kind)
    }

    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self.kind() {
            Some(kind) => kind.name(),
            None => "null",
        }
    }

    /// Append the `[value]` encoding: `[int] n` followed by `n` bytes, or `-1` for null.
    pub fn write_to(&self, buf: &mut BytesMut) {
        let mut body = BytesMut::new();
        match self {
            Self::Null => {
                buf.put_i32(-1);
                return;
            }
            Self::Boolean(b) => body.put_u8(u8::from(*b)),
            Self::TinyInt(n) => body.put_i8(*n),
            Self::SmallInt(n) => body.put_i16(*n),
            Self::Int(n) => body.put_i32(*n),
            Self::BigInt(n) | Self::Counter(n) | Self::Timestamp(n) | Self::Time(n) => body.put_i64(*n),
            Self::Float(f) => body.put_f32(*f),
            Self::Double(f) => body.put_f64(*f),
            Self::Ascii(s) | Self::Text(s) => body.put_slice(s.as_bytes()),
            Self::Blob(b) | Self::Varint(b) | Self::Custom(b) => body.put_slice(b),
            Self::Uuid(u) | Self::TimeUuid(u) => body.put_slice(u.as_bytes()),
            Self::Date(d) => body.put_u32(*d),
            Self::Inet(IpAddr::V4(ip)) => body.put_slice(&ip.octets()),
            Self::Inet(IpAddr::V6(ip)) => body.put_slice(&ip.octets()),
            Self::Decimal { unscaled, scale } => {
                body.put_i32(*scale);
                body.put_slice(unscaled);
            }
        }
        buf.put_i32(body.len() as i32);
        buf.put_slice(&body);
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.write_to(&mut buf);
        buf.to_vec()
    }

    /// Parse one `[value]` of the given kind from the front of `buf`.
    pub fn read_from(kind: WireKind, buf: &mut &[u8]) -> Result<Self, CodecError> {
        if buf.remaining() < 4 {
            return Err(CodecError::Malformed("truncated value length".to_string()));
        }
        let len = buf.get_i32();
        if len < 0 {
            return Ok(Self::Null);
        }
        let len = len as usize;
        if buf.remaining() < len {
            return Err(CodecError::Malformed(format!(
                "value declares {len} bytes, {} available",
                buf.remaining()
            )));
        }
        let slice: &[u8] = *buf;
        let (body, rest) = slice.split_at(len);
        *buf = rest;
        Self::decode_body(kind, body)
    }

    fn decode_body(kind: WireKind, body: &[u8]) -> Result<Self, CodecError> {
        let fixed = |expected: usize| -> Result<(), CodecError> {
            if body.len() == expected {
                Ok(())
            } else {
                Err(CodecError::Malformed(format!(
                    "{} expects {expected} bytes, got {}",
                    kind.name(),
                    body.len()
                )))
            }
        };
        let mut cur = body;
        let value = match kind {
            WireKind::Boolean => {
                fixed(1)?;
                Self::Boolean(cur.get_u8() != 0)
            }
            WireKind::TinyInt => {
                fixed(1)?;
                Self::TinyInt(cur.get_i8())
            }
            WireKind::SmallInt => {
                fixed(2)?;
                Self::SmallInt(cur.get_i16())
            }
            WireKind::Int => {
                fixed(4)?;
                Self::Int(cur.get_i32())
            }
            WireKind::BigInt => {
                fixed(8)?;
                Self::BigInt(cur.get_i64())
            }
            WireKind::Counter => {
                fixed(8)?;
                Self::Counter(cur.get_i64())
            }
            WireKind::Timestamp => {
                fixed(8)?;
                Self::Timestamp(cur.get_i64())
            }
            WireKind::Time => {
                fixed(8)?;
                Self::Time(cur.get_i64())
            }
            WireKind::Float => {
                fixed(4)?;
                Self::Float(cur.get_f32())
            }
            WireKind::Double => {
                fixed(8)?;
                Self::Double(cur.get_f64())
            }
            WireKind::Date => {
                fixed(4)?;
                Self::Date(cur.get_u32())
            }
            WireKind::Ascii | WireKind::Text => {
                let s = std::str::from_utf8(body)
                    .map_err(|e| CodecError::Malformed(format!("invalid UTF-8: {e}")))?
                    .to_string();
                if kind == WireKind::Ascii {
                    Self::Ascii(s)
                } else {
                    Self::Text(s)
                }
            }
            WireKind::Blob => Self::Blob(body.to_vec()),
            WireKind::Varint => Self::Varint(body.to_vec()),
            WireKind::Custom => Self::Custom(body.to_vec()),
            WireKind::Uuid | WireKind::TimeUuid => {
                let uuid = Uuid::from_slice(body).map_err(|e| CodecError::Malformed(e.to_string()))?;
                if kind == WireKind::Uuid {
                    Self::Uuid(uuid)
                } else {
                    Self::TimeUuid(uuid)
                }
            }
            WireKind::Inet => match body.len() {
                4 => Self::Inet(IpAddr::V4(Ipv4Addr::new(body[0], body[1], body[2], body[3]))),
                16 => {
                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(body);
                    Self::Inet(IpAddr::V6(Ipv6Addr::from(octets)))
                }
                n => return Err(CodecError::Malformed(format!("inet expects 4 or 16 bytes, got {n}"))),
            },
            WireKind::Decimal => {
                if body.len() < 4 {
                    return Err(CodecError::Malformed("decimal is missing its scale".to_string()));
                }
                let scale = cur.get_i32();
                Self::Decimal {
                    unscaled: cur.to_vec(),
                    scale,
                }
            }
        };
        Ok(value)
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::TinyInt(n) => write!(f, "{n}"),
            Self::SmallInt(n) => write!(f, "{n}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::BigInt(n) | Self::Counter(n) | Self::Timestamp(n) | Self::Time(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Double(n) => write!(f, "{n}"),
            Self::Ascii(s) | Self::Text(s) => write!(f, "{s}"),
            Self::Blob(b) | Self::Custom(b) => write!(f, "0x{}", hex::encode(b)),
            Self::Uuid(u) | Self::TimeUuid(u) => write!(f, "{u}"),
            Self::Date(d) => write!(f, "{d}"),
            Self::Inet(ip) => write!(f, "{ip}"),
            Self::Decimal { unscaled, scale } => {
                write!(f, "{}", Numeric::from_signed_bytes_be(unscaled, *scale))
            }
            Self::Varint(b) => write!(f, "{}", Numeric::from_signed_bytes_be(b, 0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_minus_one_length() {
        assert_eq!(WireValue::Null.to_bytes(), vec![0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_int_layout() {
        assert_eq!(WireValue::Int(7).to_bytes(), vec![0, 0, 0, 4, 0, 0, 0, 7]);
        assert_eq!(WireValue::SmallInt(-1).to_bytes(), vec![0, 0, 0, 2, 0xFF, 0xFF]);
    }

    #[test]
    fn test_decimal_layout_is_scale_then_unscaled() {
        let value = WireValue::Decimal {
            unscaled: vec![0x30, 0x39],
            scale: 2,
        };
        assert_eq!(value.to_bytes(), vec![0, 0, 0, 6, 0, 0, 0, 2, 0x30, 0x39]);
        assert_eq!(value.to_string(), "123.45");
    }

    #[test]
    fn test_read_sequence_of_values() {
        let mut buf = BytesMut::new();
        WireValue::Text("hi".to_string()).write_to(&mut buf);
        WireValue::Null.write_to(&mut buf);
        WireValue::Date(1 << 31).write_to(&mut buf);
        let bytes = buf.to_vec();

        let mut cur = bytes.as_slice();
        assert_eq!(WireValue::read_from(WireKind::Text, &mut cur).unwrap(), WireValue::Text("hi".to_string()));
        assert_eq!(WireValue::read_from(WireKind::Int, &mut cur).unwrap(), WireValue::Null);
        assert_eq!(WireValue::read_from(WireKind::Date, &mut cur).unwrap(), WireValue::Date(1 << 31));
        assert!(cur.is_empty());
    }

    #[test]
    fn test_read_rejects_bad_lengths() {
        let mut short: &[u8] = &[0, 0];
        assert!(WireValue::read_from(WireKind::Int, &mut short).is_err());

        let mut truncated: &[u8] = &[0, 0, 0, 8, 1, 2];
        assert!(WireValue::read_from(WireKind::BigInt, &mut truncated).is_err());

        let mut wrong_width: &[u8] = &[0, 0, 0, 2, 1, 2];
        assert!(WireValue::read_from(WireKind::Int, &mut wrong_width).is_err());

        let mut bad_inet: &[u8] = &[0, 0, 0, 3, 1, 2, 3];
        assert!(WireValue::read_from(WireKind::Inet, &mut bad_inet).is_err());
    }

    #[test]
    fn test_inet_both_families() {
        let v4 = WireValue::Inet("10.0.0.1".parse().unwrap());
        assert_eq!(v4.to_bytes(), vec![0, 0, 0, 4, 10, 0, 0, 1]);
        let v6 = WireValue::Inet("::1".parse().unwrap());
        let bytes = v6.to_bytes();
        assert_eq!(bytes.len(), 20);
        let mut cur = bytes.as_slice();
        assert_eq!(WireValue::read_from(WireKind::Inet, &mut cur).unwrap(), v6);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(WireKind::from_cql_name("VARCHAR"), WireKind::Text);
        assert_eq!(WireKind::from_cql_name("map<text, int>"), WireKind::Custom);
        assert_eq!(WireValue::Counter(1).kind_name(), "counter");
        assert_eq!(WireValue::Null.kind_name(), "null");
    }
}
