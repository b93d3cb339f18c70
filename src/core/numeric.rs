use super::error::CodecError;
use num_bigint::{BigInt, Sign};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Arbitrary-precision decimal: `unscaled * 10^-scale`.
///
/// Equality is structural (`1.0` and `1.00` differ); use [`Numeric::cmp_value`]
/// for numeric ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Numeric {
    unscaled: BigInt,
    scale: i32,
}

fn pow10(exponent: u32) -> BigInt {
    BigInt::from(10u8).pow(exponent)
}

impl Numeric {
    /// Largest accepted `|scale|`, matching the host's numeric display limit
    pub const MAX_SCALE: i32 = 16_383;

    #[must_use]
    pub const fn new(unscaled: BigInt, scale: i32) -> Self {
        Self { unscaled, scale }
    }

    #[must_use]
    pub const fn unscaled(&self) -> &BigInt {
        &self.unscaled
    }

    #[must_use]
    pub const fn scale(&self) -> i32 {
        self.scale
    }

    /// Build from a big-endian two's-complement integer and a scale.
    #[must_use]
    pub fn from_signed_bytes_be(bytes: &[u8], scale: i32) -> Self {
        Self::new(BigInt::from_signed_bytes_be(bytes), scale)
    }

    /// Minimal big-endian two's-complement encoding of the unscaled value.
    #[must_use]
    pub fn to_signed_bytes_be(&self) -> Vec<u8> {
        self.unscaled.to_signed_bytes_be()
    }

    /// Reject scales that would make rendering or rescaling unbounded.
    pub fn check_scale(scale: i32) -> Result<i32, CodecError> {
        if scale.unsigned_abs() > Self::MAX_SCALE.unsigned_abs() {
            return Err(CodecError::OutOfRange(format!(
                "decimal scale {scale} exceeds {}",
                Self::MAX_SCALE
            )));
        }
        Ok(scale)
    }

    /// The integer this value equals, if it has no fractional part and
    /// fits `i64`; `5.00` gives 5, `5.5` gives `None`.
    #[must_use]
    pub fn to_i64_exact(&self) -> Option<i64> {
        let decimal = Decimal::try_from(self).ok()?;
        if decimal.fract().is_zero() {
            decimal.to_i64()
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.unscaled.sign() == Sign::Minus
    }

    /// Unscaled value brought to a larger scale
    fn rescaled(&self, scale: i32) -> BigInt {
        let diff = scale.saturating_sub(self.scale).max(0).unsigned_abs();
        &self.unscaled * pow10(diff)
    }

    /// Compare by numeric value, ignoring scale differences.
    #[must_use]
    pub fn cmp_value(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        self.rescaled(scale).cmp(&other.rescaled(scale))
    }

    /// Lossy conversion used for comparisons against floats
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(f64::NAN)
    }
}

impl From<i64> for Numeric {
    fn from(value: i64) -> Self {
        Self::new(BigInt::from(value), 0)
    }
}

impl TryFrom<&Numeric> for Decimal {
    type Error = CodecError;

    fn try_from(value: &Numeric) -> Result<Self, Self::Error> {
        let out_of_range = || CodecError::OutOfRange(format!("{value} does not fit a 96-bit decimal"));
        if value.scale < 0 {
            let mantissa = i128::try_from(value.rescaled(0)).map_err(|_| out_of_range())?;
            return Self::try_from_i128_with_scale(mantissa, 0).map_err(|_| out_of_range());
        }
        let mantissa = i128::try_from(value.unscaled.clone()).map_err(|_| out_of_range())?;
        Self::try_from_i128_with_scale(mantissa, value.scale.unsigned_abs()).map_err(|_| out_of_range())
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.unscaled.magnitude().to_string();
        let sign = if self.is_negative() { "-" } else { "" };

        if self.scale <= 0 {
            let zeros = if digits == "0" { 0 } else { self.scale.unsigned_abs() as usize };
            return write!(f, "{sign}{digits}{}", "0".repeat(zeros));
        }

        let scale = self.scale.unsigned_abs() as usize;
        if digits.len() > scale {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{sign}{int_part}.{frac_part}")
        } else {
            write!(f, "{sign}0.{}{digits}", "0".repeat(scale - digits.len()))
        }
    }
}

impl FromStr for Numeric {
    type Err = CodecError;

    /// Accepts `[+-]digits[.digits][e[+-]digits]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::InvalidDecimal(s.to_string());
        let text = s.trim();

        let (mantissa, exponent) = match text.find(['e', 'E']) {
            Some(pos) => {
                let exp: i32 = text[pos + 1..].parse().map_err(|_| invalid())?;
                (&text[..pos], exp)
            }
            None => (text, 0),
        };

        let (negative, unsigned) = match mantissa.as_bytes().first() {
            Some(b'-') => (true, &mantissa[1..]),
            Some(b'+') => (false, &mantissa[1..]),
            _ => (false, mantissa),
        };

        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, f),
            None => (unsigned, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let digits = format!("{int_part}{frac_part}");
        let mut unscaled = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(invalid)?;
        if negative {
            unscaled = -unscaled;
        }

        let frac_len = i32::try_from(frac_part.len()).map_err(|_| invalid())?;
        let scale = frac_len.checked_sub(exponent).ok_or_else(invalid)?;
        Ok(Self::new(unscaled, Self::check_scale(scale)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(s: &str) -> Numeric {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(num("123.45").to_string(), "123.45");
        assert_eq!(num("-0.001").to_string(), "-0.001");
        assert_eq!(num("42").to_string(), "42");
        assert_eq!(num("+7.50").to_string(), "7.50");
        assert_eq!(num(".5").to_string(), "0.5");
        assert_eq!(num("1.5e3").to_string(), "1500");
        assert_eq!(num("25e-4").to_string(), "0.0025");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Numeric>().is_err());
        assert!("1.2.3".parse::<Numeric>().is_err());
        assert!("NaN".parse::<Numeric>().is_err());
        assert!("12a".parse::<Numeric>().is_err());
    }

    #[test]
    fn test_scale_and_unscaled() {
        let n = num("-12.345");
        assert_eq!(n.scale(), 3);
        assert_eq!(n.unscaled(), &BigInt::from(-12345));
    }

    #[test]
    fn test_twos_complement_bytes() {
        // 0x00 0x80 = 128, 0xFF 0x7F = -129
        assert_eq!(Numeric::from_signed_bytes_be(&[0x00, 0x80], 0).to_string(), "128");
        assert_eq!(Numeric::from_signed_bytes_be(&[0xFF, 0x7F], 0).to_string(), "-129");
        assert_eq!(Numeric::from_signed_bytes_be(&[0x30, 0x39], 2).to_string(), "123.45");
        assert_eq!(num("-129").to_signed_bytes_be(), vec![0xFF, 0x7F]);
    }

    #[test]
    fn test_large_values_survive() {
        let text = "123456789012345678901234567890123456789.000000000000000000001";
        assert_eq!(num(text).to_string(), text);
    }

    #[test]
    fn test_cmp_value_ignores_scale() {
        assert_eq!(num("1.0").cmp_value(&num("1.00")), Ordering::Equal);
        assert_eq!(num("-2").cmp_value(&num("1.5")), Ordering::Less);
        assert_ne!(num("1.0"), num("1.00"));
    }

    #[test]
    fn test_rust_decimal_conversion() {
        assert_eq!(Decimal::try_from(&num("-3.1415")).unwrap(), Decimal::new(-31415, 4));
        assert_eq!(Decimal::try_from(&num("12e2")).unwrap(), Decimal::new(1200, 0));
        assert!(Decimal::try_from(&num("1e40")).is_err());
    }

    #[test]
    fn test_exact_integer_view() {
        assert_eq!(num("5.00").to_i64_exact(), Some(5));
        assert_eq!(num("-12e1").to_i64_exact(), Some(-120));
        assert_eq!(num("5.5").to_i64_exact(), None);
        assert_eq!(num("1e30").to_i64_exact(), None);
    }

    #[test]
    fn test_scale_is_bounded() {
        assert!(Numeric::check_scale(Numeric::MAX_SCALE).is_ok());
        assert!(Numeric::check_scale(-Numeric::MAX_SCALE).is_ok());
        assert!(matches!(Numeric::check_scale(i32::MAX), Err(CodecError::OutOfRange(_))));
        assert!(matches!(Numeric::check_scale(i32::MIN), Err(CodecError::OutOfRange(_))));
        assert!(matches!("1e-99999".parse::<Numeric>(), Err(CodecError::OutOfRange(_))));
        assert!(matches!("1e99999".parse::<Numeric>(), Err(CodecError::OutOfRange(_))));
    }
}
