//! Epoch and unit arithmetic between wire and relational temporal values
//!
//! Wire timestamps are milliseconds since 1970-01-01, relational timestamps
//! are microseconds since 2000-01-01. Wire dates are Unix days biased by
//! 2^31, relational dates are days since 2000-01-01. Wire times are
//! nanoseconds since midnight, relational times are microseconds.

use crate::core::value::{EPOCH_OFFSET_DAYS, EPOCH_OFFSET_MICROS, MICROS_PER_DAY};
use crate::core::CodecError;

/// Bias added to Unix day numbers on the wire: day 2^31 is 1970-01-01
pub const DATE_BIAS: i64 = 1 << 31;

const NANOS_PER_DAY: i64 = MICROS_PER_DAY * 1_000;

fn overflow(what: &str, value: i64) -> CodecError {
    CodecError::OutOfRange(format!("{what} {value} overflows"))
}

/// Wire milliseconds → relational microseconds: `ms * 1000 - offset`.
pub fn timestamp_from_wire(millis: i64) -> Result<i64, CodecError> {
    millis
        .checked_mul(1_000)
        .and_then(|us| us.checked_sub(EPOCH_OFFSET_MICROS))
        .ok_or_else(|| overflow("timestamp", millis))
}

/// Relational microseconds → wire milliseconds: `floor((us + offset) / 1000)`.
///
/// Sub-millisecond precision is dropped toward negative infinity so that
/// instants before 1970 land on the millisecond that contains them.
pub fn timestamp_to_wire(micros: i64) -> Result<i64, CodecError> {
    micros
        .checked_add(EPOCH_OFFSET_MICROS)
        .map(|unix_us| unix_us.div_euclid(1_000))
        .ok_or_else(|| overflow("timestamp", micros))
}

pub fn date_from_wire(biased: u32) -> Result<i32, CodecError> {
    let unix_days = i64::from(biased) - DATE_BIAS;
    i32::try_from(unix_days - EPOCH_OFFSET_DAYS).map_err(|_| overflow("date", unix_days))
}

pub fn date_to_wire(days: i32) -> Result<u32, CodecError> {
    let unix_days = i64::from(days) + EPOCH_OFFSET_DAYS;
    u32::try_from(unix_days + DATE_BIAS).map_err(|_| overflow("date", i64::from(days)))
}

/// Truncates: 1999 ns becomes 1 µs.
pub fn time_from_wire(nanos: i64) -> Result<i64, CodecError> {
    if !(0..NANOS_PER_DAY).contains(&nanos) {
        return Err(CodecError::OutOfRange(format!("time {nanos} ns is outside a day")));
    }
    Ok(nanos / 1_000)
}

pub fn time_to_wire(micros: i64) -> Result<i64, CodecError> {
    if !(0..MICROS_PER_DAY).contains(&micros) {
        return Err(CodecError::OutOfRange(format!("time {micros} us is outside a day")));
    }
    Ok(micros * 1_000)
}
