//! Arbitrary-precision token amounts.
//!
//! ## Overview
//!
//! Token amounts are unsigned integers in the token's smallest unit. With
//! 18-decimal tokens a single product such as `100e18 * 45e18` already
//! overflows `u128`, so every amount is a [`num_bigint::BigUint`].
//!
//! ## Rounding
//!
//! All division in the engine is **floor** division. There is no
//! rounding-to-nearest anywhere: [`mul_div`] is the only scaling primitive.
//!
//! ## Examples
//!
//! ```
//! use ring_settlement::types::amount::{parse_amount, mul_div, fraction};
//! use rust_decimal::Decimal;
//!
//! let a = parse_amount("4.5e18").unwrap();
//! assert_eq!(a.to_string(), "4500000000000000000");
//!
//! // floor(7 * 2 / 3) = 4
//! assert_eq!(mul_div(&7u32.into(), &2u32.into(), &3u32.into()), 4u32.into());
//!
//! assert_eq!(fraction(&1u32.into(), &2u32.into()), Decimal::new(5, 1));
//! ```

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rust_decimal::Decimal;
use thiserror::Error;

/// Token amount in the token's smallest unit
pub type Amount = BigUint;

/// Decimal places kept when converting a ratio of amounts to a `Decimal`
pub const FRACTION_SCALE: u32 = 18;

/// Error returned when an amount literal cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid amount literal `{0}`")]
pub struct AmountParseError(pub String);

// ============================================================================
// Parsing
// ============================================================================

/// Parse an amount literal.
///
/// Accepts plain integers (`"1000"`), exponent notation (`"3e18"`,
/// `"4.5E18"`) and decimals that resolve to an integer (`"12.0"`).
/// Negative values and literals with a fractional remainder are rejected.
///
/// # Example
///
/// ```
/// use ring_settlement::types::amount::parse_amount;
///
/// assert_eq!(parse_amount("3e18").unwrap().to_string(), "3000000000000000000");
/// assert!(parse_amount("0.5").is_err());
/// assert!(parse_amount("-1").is_err());
/// ```
pub fn parse_amount(s: &str) -> Result<Amount, AmountParseError> {
    let err = || AmountParseError(s.to_string());
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(err());
    }

    let (mantissa, exponent) = match trimmed.find(['e', 'E']) {
        Some(pos) => {
            let exp_str = trimmed[pos + 1..].trim_start_matches('+');
            let exp: i64 = exp_str.parse().map_err(|_| err())?;
            (&trimmed[..pos], exp)
        }
        None => (trimmed, 0),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f.trim_end_matches('0')),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(err());
    }
    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(err());
    }

    let digits = format!("{}{}", int_part, frac_part);
    let shift = exponent - frac_part.len() as i64;
    let base = if digits.is_empty() {
        Amount::zero()
    } else {
        digits.parse::<Amount>().map_err(|_| err())?
    };

    if shift >= 0 {
        let shift = u32::try_from(shift).map_err(|_| err())?;
        Ok(base * Amount::from(10u32).pow(shift))
    } else {
        // Only acceptable when the value is still integral
        let shift = u32::try_from(-shift).map_err(|_| err())?;
        let divisor = Amount::from(10u32).pow(shift);
        if (&base % &divisor).is_zero() {
            Ok(base / divisor)
        } else {
            Err(err())
        }
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

/// `floor(a * b / c)`.
///
/// Returns zero when `c` is zero; callers only divide by amounts the
/// validator has already checked to be positive.
#[inline]
pub fn mul_div(a: &Amount, b: &Amount, c: &Amount) -> Amount {
    if c.is_zero() {
        return Amount::zero();
    }
    (a * b) / c
}

/// `floor(a * numerator / denominator)` for small integer percentages
#[inline]
pub fn scale(a: &Amount, numerator: u32, denominator: u32) -> Amount {
    mul_div(a, &Amount::from(numerator), &Amount::from(denominator))
}

/// Exact ratio `num / den` as a `Decimal`, truncated to 18 places.
///
/// A zero denominator yields zero. Ratios too large for a `Decimal`
/// saturate at `Decimal::MAX`.
pub fn fraction(num: &Amount, den: &Amount) -> Decimal {
    if den.is_zero() {
        return Decimal::ZERO;
    }
    let scaled = num * Amount::from(10u32).pow(FRACTION_SCALE) / den;
    scaled
        .to_i128()
        .and_then(|v| Decimal::try_from_i128_with_scale(v, FRACTION_SCALE).ok())
        .map(|d| d.normalize())
        .unwrap_or(Decimal::MAX)
}

// ============================================================================
// Serde helpers
// ============================================================================

/// Serde adapter: amounts serialize as decimal strings and deserialize
/// from strings or JSON numbers.
///
/// serde_json is built with `arbitrary_precision`, so a JSON number reaches
/// [`parse_amount`] as its source text. Integers wider than 64 bits keep
/// every digit instead of passing through an `f64`.
pub mod serde_amount {
    use serde::de::{self, Deserialize};
    use serde::{Deserializer, Serializer};
    use serde_json::Value;

    use super::{parse_amount, Amount};

    /// Serialize as a decimal string
    pub fn serialize<S: Serializer>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    /// Deserialize from a string or a JSON number
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => parse_amount(&n.to_string()).map_err(de::Error::custom),
            Value::String(s) => parse_amount(&s).map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "expected a non-negative integer amount as a number or string, found {other}"
            ))),
        }
    }

    /// Same as the parent module, for `Option<Amount>` fields
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        use super::super::Amount;

        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "super")] Amount);

        pub fn serialize<S: Serializer>(
            value: &Option<Amount>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Amount>, D::Error> {
            Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|w| w.0))
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
