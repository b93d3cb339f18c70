//! Typed value codec between relational values and CQL wire values
//!
//! Conversions are looked up in a table keyed by [`DataType`], built once.
//! Each entry pairs a decode and an encode function so every type can be
//! exercised on its own.
//!
//! Module structure:
//! - `wire`: protocol value model and `[value]` framing
//! - `temporal`: epoch/bias/unit arithmetic for timestamp, date and time

pub mod temporal;
pub mod wire;

pub use wire::{WireKind, WireValue};

use crate::core::{CodecError, DataType, Numeric, Value};
use std::collections::HashMap;
use std::sync::LazyLock;

pub type DecodeFn = fn(&WireValue) -> Result<Value, CodecError>;
pub type EncodeFn = fn(&Value) -> Result<WireValue, CodecError>;

/// Decode/encode pair for one semantic type
#[derive(Clone, Copy)]
pub struct TypeCodec {
    pub data_type: DataType,
    pub decode: DecodeFn,
    pub encode: EncodeFn,
}

impl std::fmt::Debug for TypeCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeCodec").field("data_type", &self.data_type).finish_non_exhaustive()
    }
}

const CODEC_TABLE: &[TypeCodec] = &[
    TypeCodec { data_type: DataType::Boolean, decode: decode_bool, encode: encode_bool },
    TypeCodec { data_type: DataType::SmallInt, decode: decode_int16, encode: encode_int16 },
    TypeCodec { data_type: DataType::Integer, decode: decode_int32, encode: encode_int32 },
    TypeCodec { data_type: DataType::BigInt, decode: decode_int64, encode: encode_int64 },
    TypeCodec { data_type: DataType::Real, decode: decode_float32, encode: encode_float32 },
    TypeCodec { data_type: DataType::DoublePrecision, decode: decode_float64, encode: encode_float64 },
    TypeCodec { data_type: DataType::Numeric, decode: decode_decimal, encode: encode_decimal },
    TypeCodec { data_type: DataType::Text, decode: decode_text, encode: encode_text },
    TypeCodec { data_type: DataType::Varchar, decode: decode_text, encode: encode_text },
    TypeCodec { data_type: DataType::Char, decode: decode_text, encode: encode_text },
    TypeCodec { data_type: DataType::Bytea, decode: decode_blob, encode: encode_blob },
    TypeCodec { data_type: DataType::Uuid, decode: decode_uuid, encode: encode_uuid },
    TypeCodec { data_type: DataType::Inet, decode: decode_inet, encode: encode_inet },
    TypeCodec { data_type: DataType::Timestamp, decode: decode_timestamp, encode: encode_timestamp },
    TypeCodec { data_type: DataType::TimestampTz, decode: decode_timestamptz, encode: encode_timestamp },
    TypeCodec { data_type: DataType::Date, decode: decode_date, encode: encode_date },
    TypeCodec { data_type: DataType::Time, decode: decode_time, encode: encode_time },
    TypeCodec { data_type: DataType::Json, decode: decode_text, encode: encode_text },
    TypeCodec { data_type: DataType::Other, decode: decode_text, encode: encode_text },
];

static CODECS: LazyLock<HashMap<DataType, TypeCodec>> =
    LazyLock::new(|| CODEC_TABLE.iter().map(|c| (c.data_type, *c)).collect());

const TEXT_CODEC: TypeCodec = TypeCodec {
    data_type: DataType::Text,
    decode: decode_text,
    encode: encode_text,
};

/// Codec entry for a type; types without an entry use the text codec.
#[must_use]
pub fn codec_for(data_type: DataType) -> &'static TypeCodec {
    CODECS.get(&data_type).unwrap_or(&TEXT_CODEC)
}

/// Wire value → relational value. NULL maps to [`Value::Null`].
pub fn decode(wire: &WireValue, data_type: DataType) -> Result<Value, CodecError> {
    if wire.is_null() {
        return Ok(Value::Null);
    }
    (codec_for(data_type).decode)(wire)
}

/// Relational value → bound parameter. NULL maps to [`WireValue::Null`].
pub fn encode(value: &Value, data_type: DataType) -> Result<WireValue, CodecError> {
    if value.is_null() {
        return Ok(WireValue::Null);
    }
    (codec_for(data_type).encode)(value)
}

fn wire_mismatch(expected: &str, wire: &WireValue) -> CodecError {
    CodecError::mismatch(expected, wire.kind_name())
}

fn value_mismatch(expected: &str, value: &Value) -> CodecError {
    CodecError::mismatch(expected, value.type_name())
}

/// Integer payload of any integral wire kind
fn wire_int(wire: &WireValue) -> Option<i64> {
    match wire {
        WireValue::TinyInt(n) => Some(i64::from(*n)),
        WireValue::SmallInt(n) => Some(i64::from(*n)),
        WireValue::Int(n) => Some(i64::from(*n)),
        WireValue::BigInt(n) | WireValue::Counter(n) => Some(*n),
        _ => None,
    }
}

fn int_out_of_range(value: i64, ty: &str) -> CodecError {
    CodecError::OutOfRange(format!("{value} does not fit {ty}"))
}

// Boolean

fn decode_bool(wire: &WireValue) -> Result<Value, CodecError> {
    match wire {
        WireValue::Boolean(b) => Ok(Value::Boolean(*b)),
        other => Err(wire_mismatch("boolean", other)),
    }
}

fn encode_bool(value: &Value) -> Result<WireValue, CodecError> {
    match value {
        Value::Boolean(b) => Ok(WireValue::Boolean(*b)),
        other => Err(value_mismatch("boolean", other)),
    }
}

// Fixed-width integers

fn decode_int16(wire: &WireValue) -> Result<Value, CodecError> {
    let n = wire_int(wire).ok_or_else(|| wire_mismatch("smallint", wire))?;
    i16::try_from(n).map(Value::SmallInt).map_err(|_| int_out_of_range(n, "smallint"))
}

fn decode_int32(wire: &WireValue) -> Result<Value, CodecError> {
    let n = wire_int(wire).ok_or_else(|| wire_mismatch("int", wire))?;
    i32::try_from(n).map(Value::Integer).map_err(|_| int_out_of_range(n, "int"))
}

fn decode_int64(wire: &WireValue) -> Result<Value, CodecError> {
    wire_int(wire)
        .map(Value::BigInt)
        .ok_or_else(|| wire_mismatch("bigint", wire))
}

fn encode_int16(value: &Value) -> Result<WireValue, CodecError> {
    let n = value.as_int().ok_or_else(|| value_mismatch("smallint", value))?;
    i16::try_from(n).map(WireValue::SmallInt).map_err(|_| int_out_of_range(n, "smallint"))
}

fn encode_int32(value: &Value) -> Result<WireValue, CodecError> {
    let n = value.as_int().ok_or_else(|| value_mismatch("int", value))?;
    i32::try_from(n).map(WireValue::Int).map_err(|_| int_out_of_range(n, "int"))
}

fn encode_int64(value: &Value) -> Result<WireValue, CodecError> {
    value
        .as_int()
        .map(WireValue::BigInt)
        .ok_or_else(|| value_mismatch("bigint", value))
}

// IEEE floats

fn decode_float32(wire: &WireValue) -> Result<Value, CodecError> {
    match wire {
        WireValue::Float(f) => Ok(Value::Real(*f)),
        other => Err(wire_mismatch("float", other)),
    }
}

fn decode_float64(wire: &WireValue) -> Result<Value, CodecError> {
    match wire {
        WireValue::Double(f) => Ok(Value::Double(*f)),
        WireValue::Float(f) => Ok(Value::Double(f64::from(*f))),
        other => Err(wire_mismatch("double", other)),
    }
}

fn encode_float32(value: &Value) -> Result<WireValue, CodecError> {
    match value {
        Value::Real(f) => Ok(WireValue::Float(*f)),
        other => other
            .as_f64()
            .map(|f| WireValue::Float(f as f32))
            .ok_or_else(|| value_mismatch("float", other)),
    }
}

fn encode_float64(value: &Value) -> Result<WireValue, CodecError> {
    value
        .as_f64()
        .map(WireValue::Double)
        .ok_or_else(|| value_mismatch("double", value))
}

// Arbitrary precision

fn decode_decimal(wire: &WireValue) -> Result<Value, CodecError> {
    match wire {
        WireValue::Decimal { unscaled, scale } => Ok(Value::Numeric(Numeric::from_signed_bytes_be(
            unscaled,
            Numeric::check_scale(*scale)?,
        ))),
        WireValue::Varint(bytes) => Ok(Value::Numeric(Numeric::from_signed_bytes_be(bytes, 0))),
        other => wire_int(other)
            .map(|n| Value::Numeric(Numeric::from(n)))
            .ok_or_else(|| wire_mismatch("decimal", other)),
    }
}

fn encode_decimal(value: &Value) -> Result<WireValue, CodecError> {
    let numeric = match value {
        Value::Numeric(n) => n.clone(),
        Value::Text(s) => s.parse()?,
        Value::Real(_) | Value::Double(_) => value.to_string().parse()?,
        other => other
            .as_int()
            .map(Numeric::from)
            .ok_or_else(|| value_mismatch("decimal", other))?,
    };
    Ok(WireValue::Decimal {
        unscaled: numeric.to_signed_bytes_be(),
        scale: numeric.scale(),
    })
}

// Text and the text fallback for unmapped types

fn decode_text(wire: &WireValue) -> Result<Value, CodecError> {
    match wire {
        WireValue::Text(s) | WireValue::Ascii(s) => Ok(Value::Text(s.clone())),
        other => Ok(Value::Text(other.to_string())),
    }
}

fn encode_text(value: &Value) -> Result<WireValue, CodecError> {
    match value {
        Value::Text(s) => Ok(WireValue::Text(s.clone())),
        other => Ok(WireValue::Text(other.to_string())),
    }
}

// Binary

fn decode_blob(wire: &WireValue) -> Result<Value, CodecError> {
    match wire {
        WireValue::Blob(b) | WireValue::Custom(b) => Ok(Value::Bytea(b.clone())),
        other => Err(wire_mismatch("blob", other)),
    }
}

fn encode_blob(value: &Value) -> Result<WireValue, CodecError> {
    match value {
        Value::Bytea(b) => Ok(WireValue::Blob(b.clone())),
        other => Err(value_mismatch("blob", other)),
    }
}

// UUID and network address

fn decode_uuid(wire: &WireValue) -> Result<Value, CodecError> {
    match wire {
        WireValue::Uuid(u) | WireValue::TimeUuid(u) => Ok(Value::Uuid(*u)),
        other => Err(wire_mismatch("uuid", other)),
    }
}

fn encode_uuid(value: &Value) -> Result<WireValue, CodecError> {
    match value {
        Value::Uuid(u) => Ok(WireValue::Uuid(*u)),
        other => Err(value_mismatch("uuid", other)),
    }
}

fn decode_inet(wire: &WireValue) -> Result<Value, CodecError> {
    match wire {
        WireValue::Inet(ip) => Ok(Value::Inet(*ip)),
        WireValue::Text(s) | WireValue::Ascii(s) => s
            .parse()
            .map(Value::Inet)
            .map_err(|_| CodecError::Malformed(format!("invalid inet \"{s}\""))),
        other => Err(wire_mismatch("inet", other)),
    }
}

fn encode_inet(value: &Value) -> Result<WireValue, CodecError> {
    match value {
        Value::Inet(ip) => Ok(WireValue::Inet(*ip)),
        other => Err(value_mismatch("inet", other)),
    }
}

// Date/Time

fn decode_timestamp(wire: &WireValue) -> Result<Value, CodecError> {
    match wire {
        WireValue::Timestamp(ms) => temporal::timestamp_from_wire(*ms).map(Value::Timestamp),
        other => Err(wire_mismatch("timestamp", other)),
    }
}

fn decode_timestamptz(wire: &WireValue) -> Result<Value, CodecError> {
    match wire {
        WireValue::Timestamp(ms) => temporal::timestamp_from_wire(*ms).map(Value::TimestampTz),
        other => Err(wire_mismatch("timestamp", other)),
    }
}

fn encode_timestamp(value: &Value) -> Result<WireValue, CodecError> {
    match value {
        Value::Timestamp(us) | Value::TimestampTz(us) => {
            temporal::timestamp_to_wire(*us).map(WireValue::Timestamp)
        }
        other => Err(value_mismatch("timestamp", other)),
    }
}

fn decode_date(wire: &WireValue) -> Result<Value, CodecError> {
    match wire {
        WireValue::Date(biased) => temporal::date_from_wire(*biased).map(Value::Date),
        other => Err(wire_mismatch("date", other)),
    }
}

fn encode_date(value: &Value) -> Result<WireValue, CodecError> {
    match value {
        Value::Date(days) => temporal::date_to_wire(*days).map(WireValue::Date),
        other => Err(value_mismatch("date", other)),
    }
}

fn decode_time(wire: &WireValue) -> Result<Value, CodecError> {
    match wire {
        WireValue::Time(ns) => temporal::time_from_wire(*ns).map(Value::Time),
        other => Err(wire_mismatch("time", other)),
    }
}

fn encode_time(value: &Value) -> Result<WireValue, CodecError> {
    match value {
        Value::Time(us) => temporal::time_to_wire(*us).map(WireValue::Time),
        other => Err(value_mismatch("time", other)),
    }
}
