//! Decimal numbers and the IEEE 754-2008 decimal128 (BID) wire encoding.
//!
//! [`Decimal`] is also the common representation used when converting
//! between numeric field kinds: every integer, fixed point and decimal128
//! value is exactly representable.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

const BID_BIAS: i64 = 6176;
const BID_EMIN: i64 = -6176;
const BID_EMAX: i64 = 6111;
/// 10^34 - 1
const BID_MAX_COEFFICIENT: u128 = 9_999_999_999_999_999_999_999_999_999_999_999;
const BID_COEFFICIENT_MASK: u128 = (1 << 113) - 1;

/// Decimal floating point value.
#[derive(Debug, Clone, Copy)]
pub enum Decimal {
    Finite {
        negative: bool,
        coefficient: u128,
        exponent: i32,
    },
    Infinity {
        negative: bool,
    },
    NaN,
    SignalingNaN,
}

fn pow10(n: u32) -> Option<u128> {
    10u128.checked_pow(n)
}

impl Decimal {
    pub const ZERO: Decimal = Decimal::Finite {
        negative: false,
        coefficient: 0,
        exponent: 0,
    };

    /// Creates `mantissa * 10^exponent`.
    pub fn new(mantissa: i128, exponent: i32) -> Self {
        Decimal::Finite {
            negative: mantissa < 0,
            coefficient: mantissa.unsigned_abs(),
            exponent,
        }
    }

    /// Creates a value from a fixed point integer with `precision` fractional digits.
    pub fn from_scaled(value: i128, precision: u32) -> Self {
        Decimal::new(value, -(precision as i32))
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, Decimal::Finite { .. })
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Decimal::NaN | Decimal::SignalingNaN)
    }

    /// Removes trailing zeros from the coefficient. Zero is always `+0e0`.
    pub fn normalized(&self) -> Self {
        match *self {
            Decimal::Finite {
                negative,
                mut coefficient,
                mut exponent,
            } => {
                if coefficient == 0 {
                    return Decimal::ZERO;
                }
                while coefficient % 10 == 0 && exponent < i32::MAX {
                    coefficient /= 10;
                    exponent += 1;
                }
                Decimal::Finite {
                    negative,
                    coefficient,
                    exponent,
                }
            }
            other => other,
        }
    }

    /// Converts a binary double through its shortest round-trip representation.
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return Decimal::NaN;
        }
        if value.is_infinite() {
            return Decimal::Infinity {
                negative: value < 0.0,
            };
        }
        format!("{:e}", value).parse().unwrap_or(Decimal::NaN)
    }

    /// Nearest binary double.
    pub fn to_f64(&self) -> f64 {
        match *self {
            Decimal::Finite {
                negative,
                coefficient,
                exponent,
            } => {
                let magnitude = format!("{}e{}", coefficient, exponent)
                    .parse::<f64>()
                    .unwrap_or(f64::NAN);
                if negative {
                    -magnitude
                } else {
                    magnitude
                }
            }
            Decimal::Infinity { negative: true } => f64::NEG_INFINITY,
            Decimal::Infinity { negative: false } => f64::INFINITY,
            Decimal::NaN | Decimal::SignalingNaN => f64::NAN,
        }
    }

    /// Exact integer value, None for fractions, specials or values beyond i128.
    pub fn to_i128(&self) -> Option<i128> {
        self.rescale(0, false)
    }

    /// Integer value truncated toward zero.
    pub fn trunc_i128(&self) -> Option<i128> {
        let Decimal::Finite {
            negative,
            coefficient,
            exponent,
        } = *self
        else {
            return None;
        };
        let magnitude = if exponent >= 0 {
            coefficient.checked_mul(pow10(exponent as u32)?)?
        } else {
            match pow10(exponent.unsigned_abs()) {
                Some(div) => coefficient / div,
                None => 0,
            }
        };
        signed(negative, magnitude)
    }

    /// Returns `self * 10^precision` as an integer.
    ///
    /// # Arguments
    /// * `precision` - Number of fractional digits to keep
    /// * `round` - Round half away from zero instead of rejecting inexact results
    ///
    /// # Returns
    /// `None` for specials, values beyond i128, or inexact results when `round` is false.
    pub fn rescale(&self, precision: u32, round: bool) -> Option<i128> {
        let Decimal::Finite {
            negative,
            coefficient,
            exponent,
        } = *self
        else {
            return None;
        };
        let shift = exponent as i64 + precision as i64;
        let magnitude = if shift >= 0 {
            if coefficient == 0 {
                0
            } else {
                coefficient.checked_mul(pow10(u32::try_from(shift).ok()?)?)?
            }
        } else {
            let digits = u32::try_from(-shift).ok()?;
            match pow10(digits) {
                Some(div) => {
                    let (q, r) = (coefficient / div, coefficient % div);
                    if r == 0 {
                        q
                    } else if !round {
                        return None;
                    } else if r >= div - r {
                        q + 1
                    } else {
                        q
                    }
                }
                // Divisor beyond u128: any coefficient rounds to zero
                None if coefficient == 0 || round => 0,
                None => return None,
            }
        };
        signed(negative, magnitude)
    }

    /// Encodes into the decimal128 BID bit pattern.
    ///
    /// Coefficients wider than 34 digits and exponents outside the decimal128
    /// range are adjusted only when exact, otherwise `None` is returned.
    pub fn to_bid(&self) -> Option<u128> {
        match *self {
            Decimal::Infinity { negative } => Some(sign_bit(negative) | (0x78u128 << 120)),
            Decimal::NaN => Some(0x7Cu128 << 120),
            Decimal::SignalingNaN => Some(0x7Eu128 << 120),
            Decimal::Finite {
                negative,
                coefficient,
                exponent,
            } => {
                let mut c = coefficient;
                let mut e = exponent as i64;
                while c > BID_MAX_COEFFICIENT {
                    if c % 10 != 0 {
                        return None;
                    }
                    c /= 10;
                    e += 1;
                }
                while e > BID_EMAX {
                    if c == 0 {
                        e = BID_EMAX;
                        break;
                    }
                    c = c.checked_mul(10).filter(|c| *c <= BID_MAX_COEFFICIENT)?;
                    e -= 1;
                }
                while e < BID_EMIN {
                    if c == 0 {
                        e = BID_EMIN;
                        break;
                    }
                    if c % 10 != 0 {
                        return None;
                    }
                    c /= 10;
                    e += 1;
                }
                let biased = (e + BID_BIAS) as u128;
                Some(sign_bit(negative) | (biased << 113) | c)
            }
        }
    }

    /// Decodes a decimal128 BID bit pattern. Non-canonical coefficients read as zero.
    pub fn from_bid(bits: u128) -> Self {
        let negative = bits >> 127 == 1;
        match (bits >> 122) & 0x1f {
            0b11110 => return Decimal::Infinity { negative },
            0b11111 => {
                return if (bits >> 121) & 1 == 1 {
                    Decimal::SignalingNaN
                } else {
                    Decimal::NaN
                }
            }
            _ => {}
        }
        let (biased, coefficient) = if (bits >> 125) & 0b11 == 0b11 {
            // Large coefficient form, always above 10^34 - 1
            ((bits >> 111) & 0x3fff, 0)
        } else {
            let c = bits & BID_COEFFICIENT_MASK;
            let c = if c > BID_MAX_COEFFICIENT { 0 } else { c };
            ((bits >> 113) & 0x3fff, c)
        };
        Decimal::Finite {
            negative,
            coefficient,
            exponent: (biased as i64 - BID_BIAS) as i32,
        }
    }
}

fn sign_bit(negative: bool) -> u128 {
    if negative {
        1u128 << 127
    } else {
        0
    }
}

fn signed(negative: bool, magnitude: u128) -> Option<i128> {
    if negative {
        if magnitude == i128::MIN.unsigned_abs() {
            Some(i128::MIN)
        } else {
            i128::try_from(magnitude).ok().map(|m| -m)
        }
    } else {
        i128::try_from(magnitude).ok()
    }
}

impl PartialEq for Decimal {
    /// Numeric equality for finite values, class equality for specials.
    fn eq(&self, other: &Self) -> bool {
        match (self.normalized(), other.normalized()) {
            (
                Decimal::Finite {
                    negative: a_neg,
                    coefficient: a_coef,
                    exponent: a_exp,
                },
                Decimal::Finite {
                    negative: b_neg,
                    coefficient: b_coef,
                    exponent: b_exp,
                },
            ) => a_neg == b_neg && a_coef == b_coef && a_exp == b_exp,
            (Decimal::Infinity { negative: a }, Decimal::Infinity { negative: b }) => a == b,
            (Decimal::NaN, Decimal::NaN) => true,
            (Decimal::SignalingNaN, Decimal::SignalingNaN) => true,
            _ => false,
        }
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal::new(value as i128, 0)
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Decimal::new(value as i128, 0)
    }
}

impl From<i32> for Decimal {
    fn from(value: i32) -> Self {
        Decimal::new(value as i128, 0)
    }
}

impl FromStr for Decimal {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let text = input.trim();
        let (negative, body) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        match body.to_ascii_lowercase().as_str() {
            "inf" | "infinity" => return Ok(Decimal::Infinity { negative }),
            "nan" => return Ok(Decimal::NaN),
            "snan" => return Ok(Decimal::SignalingNaN),
            _ => {}
        }

        let (mantissa, exp_part) = match body.find(|c: char| c == 'e' || c == 'E') {
            Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
            None => (body, None),
        };
        let (int_part, frac_part) = match mantissa.find('.') {
            Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseError::syntax(input, "no digits"));
        }

        let mut coefficient: u128 = 0;
        for ch in int_part.chars().chain(frac_part.chars()) {
            let digit = ch
                .to_digit(10)
                .ok_or_else(|| ParseError::syntax(input, format!("unexpected '{}'", ch)))?;
            coefficient = coefficient
                .checked_mul(10)
                .and_then(|c| c.checked_add(digit as u128))
                .ok_or_else(|| ParseError::overflow(input, "decimal"))?;
        }

        let exponent: i64 = match exp_part {
            Some(e) => e
                .parse::<i64>()
                .map_err(|_| ParseError::syntax(input, "invalid exponent"))?,
            None => 0,
        };
        let exponent = exponent - frac_part.len() as i64;
        let exponent =
            i32::try_from(exponent).map_err(|_| ParseError::overflow(input, "decimal"))?;

        Ok(Decimal::Finite {
            negative,
            coefficient,
            exponent,
        })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (negative, coefficient, exponent) = match *self {
            Decimal::Finite {
                negative,
                coefficient,
                exponent,
            } => (negative, coefficient, exponent),
            Decimal::Infinity { negative: true } => return f.write_str("-inf"),
            Decimal::Infinity { negative: false } => return f.write_str("inf"),
            Decimal::NaN => return f.write_str("nan"),
            Decimal::SignalingNaN => return f.write_str("snan"),
        };
        if negative && coefficient != 0 {
            f.write_str("-")?;
        }
        let digits = coefficient.to_string();
        if exponent >= 0 {
            if coefficient == 0 {
                return f.write_str("0");
            }
            if exponent <= 20 {
                return write!(f, "{}{}", digits, "0".repeat(exponent as usize));
            }
            return write!(f, "{}e{}", digits, exponent);
        }
        let point = digits.len() as i64 + exponent as i64;
        if point > 0 {
            let (int, frac) = digits.split_at(point as usize);
            write!(f, "{}.{}", int, frac)
        } else if point > -20 {
            write!(f, "0.{}{}", "0".repeat((-point) as usize), digits)
        } else {
            write!(f, "{}e{}", digits, exponent)
        }
    }
}
