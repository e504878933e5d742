//! Exact decimal number representation.
//!
//! A number is `(mantissa, exponent, sign)` in base 10, so parsed values
//! round-trip without binary floating rounding. Equality is structural over
//! the three fields, not numeric: `1e1` and `10` differ unless normalized.

use std::fmt;

/// The representation of parsed numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Number {
    mant: u64,
    exp: i16,
    neg: bool,
}

/// Powers of ten up to the largest that fits a `u64`.
const POW10: [u64; 20] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
    10_000_000_000_000_000_000,
];

/// Number of decimal digits in `v`, by binary search over [`POW10`].
fn decimal_digits(v: u64) -> usize {
    POW10.partition_point(|&p| p <= v).max(1)
}

fn pow10(e: i32) -> f64 {
    10f64.powi(e)
}

impl Number {
    /// Maximum bytes `print` can emit:
    /// sign, 20-digit mantissa, `e`, exponent sign, 5-digit exponent.
    pub const MAX_CHARS: usize = 1 + 20 + 1 + 1 + 5;

    /// Construct from mantissa, exponent, and sign, then normalize.
    pub fn new(mantissa: u64, exponent: i16, negative: bool) -> Self {
        let mut n = Number {
            mant: mantissa,
            exp: exponent,
            neg: negative,
        };
        n.normalize();
        n
    }

    /// The unsigned mantissa.
    pub fn mantissa(&self) -> u64 {
        self.mant
    }

    /// The base-10 exponent.
    pub fn exponent(&self) -> i16 {
        self.exp
    }

    /// Whether the number is negative.
    pub fn is_negative(&self) -> bool {
        self.neg
    }

    /// Whether the number is an exact integer (`exponent == 0`).
    pub fn is_integral(&self) -> bool {
        self.exp == 0
    }

    /// Whether the number fits a signed 64-bit integer.
    pub fn is_int64(&self) -> bool {
        self.exp == 0
            && if self.neg {
                // two's complement: |i64::MIN| is one past i64::MAX
                self.mant <= 1 << 63
            } else {
                self.mant <= i64::MAX as u64
            }
    }

    /// Whether the number fits an unsigned 64-bit integer.
    pub fn is_uint64(&self) -> bool {
        self.exp == 0 && (!self.neg || self.mant == 0)
    }

    /// The number as `i64`, if it fits.
    pub fn as_i64(&self) -> Option<i64> {
        if !self.is_int64() {
            return None;
        }
        if self.neg {
            // mant == 1 << 63 maps onto i64::MIN exactly
            Some((self.mant as i64).wrapping_neg())
        } else {
            Some(self.mant as i64)
        }
    }

    /// The number as `u64`, if it fits.
    pub fn as_u64(&self) -> Option<u64> {
        self.is_uint64().then_some(self.mant)
    }

    /// The number as floating point.
    pub fn as_f64(&self) -> f64 {
        let e = i32::from(self.exp);
        // staged multiply keeps intermediate magnitudes inside f64 range
        let a = self.mant as f64 * pow10(e / 2) * pow10(e - e / 2);
        if self.neg { -a } else { a }
    }

    /// Write the canonical form `[-]digits[e[-]digits]` into `dest`.
    ///
    /// Returns the formatted prefix of `dest`. No heap allocation.
    pub fn print<'a>(&self, dest: &'a mut [u8; Self::MAX_CHARS]) -> &'a str {
        let mut at = 0;
        if self.neg {
            dest[at] = b'-';
            at += 1;
        }
        let digits = decimal_digits(self.mant);
        for i in (0..digits).rev() {
            dest[at] = b'0' + ((self.mant / POW10[i]) % 10) as u8;
            at += 1;
        }
        if self.exp != 0 {
            dest[at] = b'e';
            at += 1;
            if self.exp < 0 {
                dest[at] = b'-';
                at += 1;
            }
            let e = u64::from(self.exp.unsigned_abs());
            let digits = decimal_digits(e);
            for i in (0..digits).rev() {
                dest[at] = b'0' + ((e / POW10[i]) % 10) as u8;
                at += 1;
            }
        }
        // SAFETY: only ASCII bytes were written.
        unsafe { std::str::from_utf8_unchecked(&dest[..at]) }
    }

    /// Strip trailing decimal zeros by raising the exponent toward zero.
    fn normalize(&mut self) {
        while self.exp < 0 && self.mant != 0 && self.mant % 10 == 0 {
            self.mant /= 10;
            self.exp += 1;
        }
    }

    fn from_signed(v: i64) -> Self {
        Number {
            mant: v.unsigned_abs(),
            exp: 0,
            neg: v < 0,
        }
    }

    fn from_unsigned(v: u64) -> Self {
        Number {
            mant: v,
            exp: 0,
            neg: false,
        }
    }

    fn from_ieee(v: f64) -> Self {
        if v == 0.0 || !v.is_finite() {
            return Number {
                mant: 0,
                exp: 0,
                neg: v.is_sign_negative(),
            };
        }
        let neg = v < 0.0;
        let a = v.abs();
        let e10 = a.log10().floor() as i32;
        // scale the significand to roughly 19 digits
        let scale = 18 - e10;
        let scaled = a * pow10(scale / 2) * pow10(scale - scale / 2);
        let mut n = Number {
            mant: scaled.round() as u64,
            exp: (e10 - 18) as i16,
            neg,
        };
        n.normalize();
        n
    }
}

macro_rules! number_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Number {
            fn from(v: $t) -> Self {
                Number::from_signed(i64::from(v))
            }
        })*
    };
}

macro_rules! number_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Number {
            fn from(v: $t) -> Self {
                Number::from_unsigned(u64::from(v))
            }
        })*
    };
}

number_from_signed!(i8, i16, i32, i64);
number_from_unsigned!(u8, u16, u32, u64);

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Number::from_ieee(v)
    }
}

impl From<f32> for Number {
    fn from(v: f32) -> Self {
        Number::from_ieee(f64::from(v))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [0u8; Number::MAX_CHARS];
        f.write_str(self.print(&mut buf))
    }
}
