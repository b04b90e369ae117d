use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as KubeQuantity;

use crate::lib::error::QuantityError;

const NANOS_PER_UNIT: u128 = 1_000_000_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Exact amount of a resource, stored as an integer count of nano-units.
///
/// CPU is read through [`Quantity::milli_value`] and memory through
/// [`Quantity::value`] (bytes). Both projections round up to the next whole
/// unit, the same way Kubernetes does. Callers that divide these projections
/// (per-replica amounts, mebibytes) use truncating integer division, so very
/// small amounts may truncate to zero.
///
/// Accumulation saturates instead of wrapping and no operation subtracts, so
/// a `Quantity` is never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity {
    nanos: u128,
}

impl Quantity {
    pub const fn zero() -> Self {
        Self { nanos: 0 }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self {
            nanos: u128::from(millis) * NANOS_PER_MILLI,
        }
    }

    pub fn from_bytes(bytes: u64) -> Self {
        Self {
            nanos: u128::from(bytes) * NANOS_PER_UNIT,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    /// Amount in milli-units, rounded up
    pub fn milli_value(&self) -> u64 {
        saturate(self.nanos.div_ceil(NANOS_PER_MILLI))
    }

    /// Amount in whole units (bytes for memory), rounded up
    pub fn value(&self) -> u64 {
        saturate(self.nanos.div_ceil(NANOS_PER_UNIT))
    }

    /// Whole mebibytes, truncated
    pub fn mebibytes(&self) -> u64 {
        self.value() / BYTES_PER_MIB
    }
}

fn saturate(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity {
            nanos: self.nanos.saturating_add(rhs.nanos),
        }
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        *self = *self + rhs;
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Quantity {
        iter.fold(Quantity::zero(), Add::add)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos % NANOS_PER_UNIT == 0 {
            write!(f, "{}", self.nanos / NANOS_PER_UNIT)
        } else if self.nanos % NANOS_PER_MILLI == 0 {
            write!(f, "{}m", self.nanos / NANOS_PER_MILLI)
        } else {
            write!(f, "{}n", self.nanos)
        }
    }
}

enum Scale {
    /// Power of ten
    Decimal(i64),
    /// Power of 1024
    Binary(u32),
}

fn parse_suffix(suffix: &str) -> Result<Scale, QuantityError> {
    let scale = match suffix {
        "" => Scale::Decimal(0),
        "n" => Scale::Decimal(-9),
        "u" => Scale::Decimal(-6),
        "m" => Scale::Decimal(-3),
        "k" => Scale::Decimal(3),
        "M" => Scale::Decimal(6),
        "G" => Scale::Decimal(9),
        "T" => Scale::Decimal(12),
        "P" => Scale::Decimal(15),
        "E" => Scale::Decimal(18),
        "Ki" => Scale::Binary(1),
        "Mi" => Scale::Binary(2),
        "Gi" => Scale::Binary(3),
        "Ti" => Scale::Binary(4),
        "Pi" => Scale::Binary(5),
        "Ei" => Scale::Binary(6),
        _ => {
            let exponent = suffix
                .strip_prefix('e')
                .or_else(|| suffix.strip_prefix('E'))
                .ok_or_else(|| QuantityError::InvalidSuffix(suffix.to_string()))?;
            let exponent = exponent
                .parse::<i32>()
                .map_err(|_| QuantityError::InvalidSuffix(suffix.to_string()))?;
            Scale::Decimal(i64::from(exponent))
        }
    };
    Ok(scale)
}

fn pow10(exponent: u32) -> Option<u128> {
    10u128.checked_pow(exponent)
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let unsigned = match input.as_bytes().first() {
            None => return Err(QuantityError::Empty),
            Some(b'-') => return Err(QuantityError::Negative(input.to_string())),
            Some(b'+') => &input[1..],
            Some(_) => input,
        };

        let split = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(split);
        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
            return Err(QuantityError::InvalidNumber(input.to_string()));
        }
        let frac_part = frac_part.trim_end_matches('0');

        let overflow = || QuantityError::Overflow(input.to_string());

        let mut mantissa: u128 = 0;
        for digit in int_part.bytes().chain(frac_part.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(u128::from(digit - b'0')))
                .ok_or_else(overflow)?;
        }
        let frac_digits = frac_part.len() as i64;

        let nanos = match parse_suffix(suffix)? {
            Scale::Decimal(exponent) => {
                let shift = exponent + 9 - frac_digits;
                if shift >= 0 {
                    let factor = u32::try_from(shift).ok().and_then(pow10);
                    factor
                        .and_then(|f| mantissa.checked_mul(f))
                        .ok_or_else(overflow)?
                } else {
                    match u32::try_from(-shift).ok().and_then(pow10) {
                        Some(divisor) => mantissa.div_ceil(divisor),
                        // Smaller than one nano-unit
                        None => u128::from(mantissa > 0),
                    }
                }
            }
            Scale::Binary(power) => {
                let numerator = 1024u128
                    .checked_pow(power)
                    .and_then(|f| f.checked_mul(NANOS_PER_UNIT))
                    .and_then(|f| mantissa.checked_mul(f))
                    .ok_or_else(overflow)?;
                let divisor = u32::try_from(frac_digits)
                    .ok()
                    .and_then(pow10)
                    .ok_or_else(overflow)?;
                numerator.div_ceil(divisor)
            }
        };

        Ok(Quantity { nanos })
    }
}

impl TryFrom<&KubeQuantity> for Quantity {
    type Error = QuantityError;

    fn try_from(quantity: &KubeQuantity) -> Result<Self, Self::Error> {
        quantity.0.parse()
    }
}
