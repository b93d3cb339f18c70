use super::data_type::DataType;
use super::error::CodecError;
use super::numeric::Numeric;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use std::cmp::Ordering;
use std::net::IpAddr;
use uuid::Uuid;

/// Days between 1970-01-01 and the relational epoch 2000-01-01
pub const EPOCH_OFFSET_DAYS: i64 = 10_957;
/// Microseconds between 1970-01-01 and the relational epoch 2000-01-01
pub const EPOCH_OFFSET_MICROS: i64 = EPOCH_OFFSET_DAYS * 86_400 * 1_000_000;
/// `NaiveDate::num_days_from_ce` of 2000-01-01
const EPOCH_DAYS_FROM_CE: i32 = 730_120;

const MICROS_PER_SECOND: i64 = 1_000_000;
pub const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;

/// A relational value as the host engine sees it.
///
/// Temporal values use the host's representation: timestamps are
/// microseconds since 2000-01-01, dates are days since 2000-01-01 and
/// times are microseconds since midnight.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    // Numeric types
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Numeric(Numeric),
    // String and binary types
    Text(String),
    Bytea(Vec<u8>),
    // Special types
    Uuid(Uuid),
    Inet(IpAddr),
    // Date/Time types
    Timestamp(i64),
    TimestampTz(i64),
    Date(i32),
    Time(i64),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Natural semantic type of this value; `None` for NULL.
    #[must_use]
    pub const fn data_type(&self) -> Option<DataType> {
        let ty = match self {
            Self::Null => return None,
            Self::Boolean(_) => DataType::Boolean,
            Self::SmallInt(_) => DataType::SmallInt,
            Self::Integer(_) => DataType::Integer,
            Self::BigInt(_) => DataType::BigInt,
            Self::Real(_) => DataType::Real,
            Self::Double(_) => DataType::DoublePrecision,
            Self::Numeric(_) => DataType::Numeric,
            Self::Text(_) => DataType::Text,
            Self::Bytea(_) => DataType::Bytea,
            Self::Uuid(_) => DataType::Uuid,
            Self::Inet(_) => DataType::Inet,
            Self::Timestamp(_) => DataType::Timestamp,
            Self::TimestampTz(_) => DataType::TimestampTz,
            Self::Date(_) => DataType::Date,
            Self::Time(_) => DataType::Time,
        };
        Some(ty)
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::SmallInt(i) => Some(*i as i64),
            Self::Integer(i) => Some(*i as i64),
            Self::BigInt(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(f) => Some(f64::from(*f)),
            Self::Double(f) => Some(*f),
            Self::Numeric(n) => Some(n.to_f64()),
            other => other.as_int().map(|i| i as f64),
        }
    }

    // Temporal conversions between chrono and the relational representation

    #[must_use]
    pub fn timestamp_from_naive(ts: NaiveDateTime) -> Self {
        Self::Timestamp(ts.and_utc().timestamp_micros() - EPOCH_OFFSET_MICROS)
    }

    #[must_use]
    pub fn timestamptz_from_utc(ts: DateTime<Utc>) -> Self {
        Self::TimestampTz(ts.timestamp_micros() - EPOCH_OFFSET_MICROS)
    }

    #[must_use]
    pub fn date_from_naive(date: NaiveDate) -> Self {
        Self::Date(date.num_days_from_ce() - EPOCH_DAYS_FROM_CE)
    }

    #[must_use]
    pub fn time_from_naive(time: NaiveTime) -> Self {
        let secs = i64::from(time.num_seconds_from_midnight());
        Self::Time(secs * MICROS_PER_SECOND + i64::from(time.nanosecond() / 1_000))
    }

    #[must_use]
    pub fn to_naive_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(us) | Self::TimestampTz(us) => {
                let unix = us.checked_add(EPOCH_OFFSET_MICROS)?;
                DateTime::from_timestamp_micros(unix).map(|dt| dt.naive_utc())
            }
            Self::Date(_) => self.to_naive_date()?.and_hms_opt(0, 0, 0),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(days) => NaiveDate::from_num_days_from_ce_opt(days.checked_add(EPOCH_DAYS_FROM_CE)?),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_naive_time(&self) -> Option<NaiveTime> {
        match self {
            Self::Time(us) if (0..MICROS_PER_DAY).contains(us) => {
                let secs = u32::try_from(us / MICROS_PER_SECOND).ok()?;
                let nanos = u32::try_from((us % MICROS_PER_SECOND) * 1_000).ok()?;
                NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
            }
            _ => None,
        }
    }

    /// SQL comparison: `None` when either side is NULL or the types are not comparable.
    /// A text operand is cast to the other side's type first.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Bytea(a), Self::Bytea(b)) => Some(a.cmp(b)),
            (Self::Uuid(a), Self::Uuid(b)) => Some(a.cmp(b)),
            (Self::Inet(a), Self::Inet(b)) => Some(a.cmp(b)),
            (
                Self::Timestamp(a) | Self::TimestampTz(a),
                Self::Timestamp(b) | Self::TimestampTz(b),
            ) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::Time(a), Self::Time(b)) => Some(a.cmp(b)),
            (Self::Numeric(a), Self::Numeric(b)) => Some(a.cmp_value(b)),
            (Self::Numeric(a), b) if b.as_int().is_some() => {
                Some(a.cmp_value(&Numeric::from(b.as_int()?)))
            }
            (a, Self::Numeric(b)) if a.as_int().is_some() => {
                Some(Numeric::from(a.as_int()?).cmp_value(b))
            }
            (Self::Text(_), b) => self.cast_to(b.data_type()?).ok()?.compare(b),
            (a, Self::Text(_)) => a.compare(&other.cast_to(a.data_type()?).ok()?),
            (a, b) => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
            },
        }
    }

    /// Convert to another semantic type, parsing text where needed.
    pub fn cast_to(&self, ty: DataType) -> Result<Self, CodecError> {
        let mismatch = || CodecError::mismatch(ty.name(), self.type_name());
        if self.is_null() {
            return Ok(Self::Null);
        }
        if ty.is_textual() || matches!(ty, DataType::Json | DataType::Other) {
            return Ok(match self {
                Self::Text(_) => self.clone(),
                other => Self::Text(other.to_string()),
            });
        }
        if self.data_type() == Some(ty) {
            return Ok(self.clone());
        }
        if let Self::Text(s) = self {
            return Self::parse_text(s, ty);
        }

        match ty {
            DataType::SmallInt | DataType::Integer | DataType::BigInt => {
                let int = match self {
                    Self::Numeric(n) => n.to_i64_exact(),
                    Self::Boolean(b) => Some(i64::from(*b)),
                    other => other.as_int(),
                }
                .ok_or_else(mismatch)?;
                Self::integer_of(int, ty)
            }
            DataType::Real => Ok(Self::Real(self.as_f64().ok_or_else(mismatch)? as f32)),
            DataType::DoublePrecision => Ok(Self::Double(self.as_f64().ok_or_else(mismatch)?)),
            DataType::Numeric => match self {
                Self::Real(_) | Self::Double(_) => self.to_string().parse().map(Self::Numeric),
                other => other
                    .as_int()
                    .map(|i| Self::Numeric(Numeric::from(i)))
                    .ok_or_else(mismatch),
            },
            DataType::Timestamp => match self {
                Self::TimestampTz(us) => Ok(Self::Timestamp(*us)),
                Self::Date(d) => Ok(Self::Timestamp(i64::from(*d) * MICROS_PER_DAY)),
                _ => Err(mismatch()),
            },
            DataType::TimestampTz => match self {
                Self::Timestamp(us) => Ok(Self::TimestampTz(*us)),
                Self::Date(d) => Ok(Self::TimestampTz(i64::from(*d) * MICROS_PER_DAY)),
                _ => Err(mismatch()),
            },
            DataType::Date => match self {
                Self::Timestamp(us) | Self::TimestampTz(us) => {
                    i32::try_from(us.div_euclid(MICROS_PER_DAY))
                        .map(Self::Date)
                        .map_err(|_| CodecError::OutOfRange(self.to_string()))
                }
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        }
    }

    fn integer_of(int: i64, ty: DataType) -> Result<Self, CodecError> {
        let range = || CodecError::OutOfRange(format!("{int} does not fit {ty}"));
        match ty {
            DataType::SmallInt => i16::try_from(int).map(Self::SmallInt).map_err(|_| range()),
            DataType::Integer => i32::try_from(int).map(Self::Integer).map_err(|_| range()),
            _ => Ok(Self::BigInt(int)),
        }
    }

    fn parse_text(s: &str, ty: DataType) -> Result<Self, CodecError> {
        let bad = || CodecError::Malformed(format!("invalid input for type {ty}: \"{s}\""));
        let t = s.trim();
        match ty {
            DataType::Boolean => match t.to_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "on" | "1" => Ok(Self::Boolean(true)),
                "false" | "f" | "no" | "n" | "off" | "0" => Ok(Self::Boolean(false)),
                _ => Err(bad()),
            },
            DataType::SmallInt | DataType::Integer | DataType::BigInt => {
                Self::integer_of(t.parse().map_err(|_| bad())?, ty)
            }
            DataType::Real => t.parse().map(Self::Real).map_err(|_| bad()),
            DataType::DoublePrecision => t.parse().map(Self::Double).map_err(|_| bad()),
            DataType::Numeric => t.parse().map(Self::Numeric),
            DataType::Bytea => {
                let hex_digits = t.strip_prefix("\\x").or_else(|| t.strip_prefix("0x"));
                match hex_digits {
                    Some(digits) => hex::decode(digits).map(Self::Bytea).map_err(|_| bad()),
                    None => Ok(Self::Bytea(s.as_bytes().to_vec())),
                }
            }
            DataType::Uuid => Uuid::parse_str(t).map(Self::Uuid).map_err(|_| bad()),
            DataType::Inet => t.parse().map(Self::Inet).map_err(|_| bad()),
            DataType::Timestamp => parse_naive_timestamp(t)
                .map(Self::timestamp_from_naive)
                .ok_or_else(bad),
            DataType::TimestampTz => DateTime::parse_from_rfc3339(t)
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|_| DateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S%.f%z").map(|dt| dt.with_timezone(&Utc)))
                .ok()
                .or_else(|| parse_naive_timestamp(t).map(|ndt| ndt.and_utc()))
                .map(Self::timestamptz_from_utc)
                .ok_or_else(bad),
            DataType::Date => NaiveDate::parse_from_str(t, "%Y-%m-%d")
                .map(Self::date_from_naive)
                .map_err(|_| bad()),
            DataType::Time => NaiveTime::parse_from_str(t, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
                .map(Self::time_from_naive)
                .map_err(|_| bad()),
            DataType::Text | DataType::Varchar | DataType::Char | DataType::Json | DataType::Other => {
                Ok(Self::Text(s.to_string()))
            }
        }
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self.data_type() {
            Some(ty) => ty.name(),
            None => "null",
        }
    }
}

fn parse_naive_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0))
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Integer(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::BigInt(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Numeric> for Value {
    fn from(n: Numeric) -> Self {
        Self::Numeric(n)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::SmallInt(n) => write!(f, "{n}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::BigInt(n) => write!(f, "{n}"),
            Self::Real(n) => write!(f, "{n}"),
            Self::Double(n) => write!(f, "{n}"),
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Bytea(b) => write!(f, "\\x{}", hex::encode(b)),
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Inet(ip) => write!(f, "{ip}"),
            Self::Timestamp(us) => match self.to_naive_datetime() {
                Some(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
                None => write!(f, "{us}"),
            },
            Self::TimestampTz(us) => match self.to_naive_datetime() {
                Some(ts) => write!(f, "{}+00", ts.format("%Y-%m-%d %H:%M:%S%.f")),
                None => write!(f, "{us}"),
            },
            Self::Date(days) => match self.to_naive_date() {
                Some(d) => write!(f, "{}", d.format("%Y-%m-%d")),
                None => write!(f, "{days}"),
            },
            Self::Time(us) => match self.to_naive_time() {
                Some(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
                None => write!(f, "{us}"),
            },
        }
    }
}
