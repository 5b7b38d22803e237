//! The exact-rational value type backing every monetary amount.
//!
//! A [`Numeric`] is a signed 64-bit numerator over a positive 64-bit
//! denominator. Values are never mutated in place: every operation returns a
//! new value. Intermediate arithmetic runs in 128 bits; a result whose
//! reduced form still does not fit 64 bits is a hard [`NumericError::Overflow`],
//! never a silent clamp.
//!
//! A distinguished family of values with `denom == 0` encodes the error
//! codes; [`Numeric::check`] round-trips them. The arithmetic methods return
//! `Result` instead, which is what engine code uses.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::{Denom, Round};

/// Value-level arithmetic errors.
///
/// Returned as values on the arithmetic hot path; callers routinely
/// test-and-continue rather than unwind.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericError {
    /// An argument is not a valid number (zero divisor, malformed string,
    /// non-finite double).
    #[error("argument is not a valid number")]
    InvalidArgument,
    /// An intermediate or final result exceeds the signed 64-bit range
    /// after common-factor elimination.
    #[error("intermediate result overflow")]
    Overflow,
    /// A fixed denominator was requested but an operand's denominator could
    /// not be losslessly reconciled with it.
    #[error("operand denominators differ from fixed denominator")]
    DenominatorMismatch,
    /// `Round::Never` was in effect but the result had a remainder.
    #[error("result could not be represented without rounding")]
    InexactRounding,
}

impl NumericError {
    /// Sentinel code carried in the numerator of an error value.
    pub fn code(self) -> i64 {
        match self {
            NumericError::InvalidArgument => -1,
            NumericError::Overflow => -2,
            NumericError::DenominatorMismatch => -3,
            NumericError::InexactRounding => -4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(NumericError::InvalidArgument),
            -2 => Some(NumericError::Overflow),
            -3 => Some(NumericError::DenominatorMismatch),
            -4 => Some(NumericError::InexactRounding),
            _ => None,
        }
    }
}

/// Exact rational number: `num / denom`, `denom > 0` for valid values.
///
/// Derived `PartialEq` is field-exact ("eq" in the native engine's terms):
/// `1/2` and `2/4` are *not* `==` even though [`Numeric::equal`] says they
/// represent the same value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Numeric {
    num: i64,
    denom: i64,
}

impl Default for Numeric {
    fn default() -> Self {
        Self::zero()
    }
}

impl Numeric {
    /// Build a rational from numerator and denominator. A negative
    /// denominator moves its sign to the numerator; a zero denominator
    /// produces a value flagged as `InvalidArgument`.
    pub const fn new(num: i64, denom: i64) -> Self {
        if denom < 0 {
            Self { num: -num, denom: -denom }
        } else {
            Self { num, denom }
        }
    }

    pub const fn zero() -> Self {
        Self { num: 0, denom: 1 }
    }

    pub const fn from_int(num: i64) -> Self {
        Self { num, denom: 1 }
    }

    /// A value that signals the given error condition instead of a number.
    pub fn error(code: NumericError) -> Self {
        Self { num: code.code(), denom: 0 }
    }

    pub fn num(&self) -> i64 {
        self.num
    }

    pub fn denom(&self) -> i64 {
        self.denom
    }

    /// Check for an error signal in the value. Error values always have a
    /// zero denominator.
    pub fn check(&self) -> Result<(), NumericError> {
        if self.denom > 0 {
            Ok(())
        } else {
            Err(NumericError::from_code(self.num).unwrap_or(NumericError::InvalidArgument))
        }
    }

    pub fn is_valid(&self) -> bool {
        self.denom > 0
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0 && self.denom != 0
    }

    pub fn is_negative(&self) -> bool {
        self.denom > 0 && self.num < 0
    }

    pub fn is_positive(&self) -> bool {
        self.denom > 0 && self.num > 0
    }

    /// `-a/b`. Error values pass through; negating `i64::MIN` has no
    /// representable result and yields an `Overflow` error value.
    pub fn neg(&self) -> Self {
        if self.denom <= 0 {
            return *self;
        }
        match self.num.checked_neg() {
            Some(num) => Self { num, denom: self.denom },
            None => Self::error(NumericError::Overflow),
        }
    }

    /// `|a/b|`, with the same `i64::MIN` behavior as [`Numeric::neg`].
    pub fn abs(&self) -> Self {
        if self.denom <= 0 {
            return *self;
        }
        match self.num.checked_abs() {
            Some(num) => Self { num, denom: self.denom },
            None => Self::error(NumericError::Overflow),
        }
    }

    /// `b/a`, reduced. Errors `InvalidArgument` on a zero numerator.
    pub fn invert(&self) -> Result<Self, NumericError> {
        self.check()?;
        if self.num == 0 {
            return Err(NumericError::InvalidArgument);
        }
        let (num, denom) = if self.num < 0 {
            (-self.denom, -self.num)
        } else {
            (self.denom, self.num)
        };
        Ok(Self { num, denom }.reduce())
    }

    /// Divide numerator and denominator by their greatest common divisor.
    /// Error values pass through unchanged.
    pub fn reduce(&self) -> Self {
        if self.denom <= 0 {
            return *self;
        }
        let g = gcd_i64(self.num.unsigned_abs(), self.denom.unsigned_abs());
        if g <= 1 {
            return *self;
        }
        Self { num: self.num / g as i64, denom: self.denom / g as i64 }
    }

    /// Total order on the represented values. Error values sort before all
    /// valid numbers; two error values order by code.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self.is_valid(), other.is_valid()) {
            (true, true) => {
                let lhs = self.num as i128 * other.denom as i128;
                let rhs = other.num as i128 * self.denom as i128;
                lhs.cmp(&rhs)
            }
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.num.cmp(&other.num),
        }
    }

    /// Value equivalence: true when the reduced ratios are identical.
    /// Compare with derived `==`, which requires field-exact equality.
    pub fn equal(&self, other: &Self) -> bool {
        self.is_valid() && other.is_valid() && self.compare(other) == Ordering::Equal
    }

    pub fn to_double(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Re-express the value at a denominator chosen by `denom`, rounding per
    /// `round` when the conversion is inexact.
    pub fn convert(&self, denom: Denom, round: Round) -> Result<Self, NumericError> {
        self.check()?;
        convert_big(self.num as i128, self.denom as i128, denom, round)
    }

    /// Attempt to re-express the denominator as an exact power of ten
    /// without rounding. Returns `None` when no power of ten up to
    /// `max_decimal_places` (default 17) represents the value exactly.
    pub fn to_decimal(&self, max_decimal_places: Option<u8>) -> Option<Self> {
        if !self.is_valid() {
            return None;
        }
        let max = max_decimal_places.unwrap_or(17).min(17);
        let mut denom: i128 = 1;
        for _ in 0..=max {
            let scaled = self.num as i128 * denom;
            if scaled % self.denom as i128 == 0 {
                let num = scaled / self.denom as i128;
                return fit_i64(num, denom).ok();
            }
            denom *= 10;
        }
        None
    }

    /// `a + b`.
    pub fn add(&self, other: &Self, denom: Denom, round: Round) -> Result<Self, NumericError> {
        self.binary_op(other, denom, round, |an, ad, bn, bd| (an * bd + bn * ad, ad * bd))
    }

    /// `a - b`.
    pub fn sub(&self, other: &Self, denom: Denom, round: Round) -> Result<Self, NumericError> {
        self.binary_op(other, denom, round, |an, ad, bn, bd| (an * bd - bn * ad, ad * bd))
    }

    /// `a * b`.
    pub fn mul(&self, other: &Self, denom: Denom, round: Round) -> Result<Self, NumericError> {
        self.binary_op(other, denom, round, |an, ad, bn, bd| (an * bn, ad * bd))
    }

    /// `a / b`. Errors `InvalidArgument` when `b` is zero. Like every other
    /// operation, overflows when the reduced cross products exceed 64 bits.
    pub fn div(&self, other: &Self, denom: Denom, round: Round) -> Result<Self, NumericError> {
        self.check()?;
        other.check()?;
        if other.num == 0 {
            return Err(NumericError::InvalidArgument);
        }
        let mut num = self.num as i128 * other.denom as i128;
        let mut den = self.denom as i128 * other.num as i128;
        if den < 0 {
            num = -num;
            den = -den;
        }
        finish_op(num, den, self, other, denom, round)
    }

    fn binary_op(
        &self,
        other: &Self,
        denom: Denom,
        round: Round,
        f: impl Fn(i128, i128, i128, i128) -> (i128, i128),
    ) -> Result<Self, NumericError> {
        self.check()?;
        other.check()?;
        let (num, den) = f(
            self.num as i128,
            self.denom as i128,
            other.num as i128,
            other.denom as i128,
        );
        finish_op(num, den, self, other, denom, round)
    }

    /// Convert a double into a rational.
    ///
    /// The double is first decomposed into its exact dyadic rational
    /// (mantissa over a power of two), then re-expressed per `denom` and
    /// `round`. Under `Denom::Auto`/`Denom::Exact` the result is that exact
    /// dyadic value, so no rounding ever occurs and `Round::Never` cannot
    /// fire; decimal denominators are obtained with `Denom::Fixed` or
    /// `Denom::SigFigs`.
    pub fn from_double(value: f64, denom: Denom, round: Round) -> Result<Self, NumericError> {
        if !value.is_finite() {
            return Err(NumericError::InvalidArgument);
        }
        if value == 0.0 {
            return convert_big(0, 1, denom, round);
        }

        let bits = value.to_bits();
        let raw_exp = ((bits >> 52) & 0x7ff) as i64;
        let raw_mant = bits & 0x000f_ffff_ffff_ffff;
        let (mut mant, mut exp) = if raw_exp == 0 {
            (raw_mant, -1074i64)
        } else {
            (raw_mant | 0x0010_0000_0000_0000, raw_exp - 1075)
        };
        // Strip trailing zero bits so the power of two stays small.
        let tz = mant.trailing_zeros() as i64;
        mant >>= tz;
        exp += tz;

        let signed_mant = if bits >> 63 == 1 { -(mant as i128) } else { mant as i128 };
        let (num, den) = if exp >= 0 {
            if exp > 74 {
                return Err(NumericError::Overflow);
            }
            (signed_mant << exp, 1i128)
        } else {
            if exp < -126 {
                // The exact power of two exceeds 128-bit intermediates.
                return Err(NumericError::Overflow);
            }
            (signed_mant, 1i128 << -exp)
        };
        convert_big(num, den, denom, round)
    }
}

impl fmt::Display for Numeric {
    /// Renders as a decimal when the denominator is a power of ten,
    /// otherwise as `num/denom`. Error values render their code.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom == 0 {
            return write!(f, "error({})", self.num);
        }
        match decimal_places(self.denom) {
            Some(0) => write!(f, "{}", self.num),
            Some(places) => {
                let sign = if self.num < 0 { "-" } else { "" };
                let abs = self.num.unsigned_abs();
                let whole = abs / self.denom.unsigned_abs();
                let frac = abs % self.denom.unsigned_abs();
                write!(f, "{sign}{whole}.{frac:0places$}", places = places as usize)
            }
            None => write!(f, "{}/{}", self.num, self.denom),
        }
    }
}

impl FromStr for Numeric {
    type Err = NumericError;

    /// Parses `<numerator>/<denominator>`, a plain integer, or a plain
    /// decimal. Leading whitespace is skipped; anything else is
    /// `InvalidArgument`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start();
        if s.is_empty() {
            return Err(NumericError::InvalidArgument);
        }
        if let Some((num_str, denom_str)) = s.split_once('/') {
            let num: i64 = num_str.parse().map_err(|_| NumericError::InvalidArgument)?;
            let denom: i64 = denom_str.parse().map_err(|_| NumericError::InvalidArgument)?;
            if denom <= 0 {
                return Err(NumericError::InvalidArgument);
            }
            return Ok(Numeric::new(num, denom));
        }
        if let Some((whole_str, frac_str)) = s.split_once('.') {
            if frac_str.is_empty() || !frac_str.bytes().all(|b| b.is_ascii_digit()) {
                return Err(NumericError::InvalidArgument);
            }
            let whole: i64 = whole_str.parse().map_err(|_| NumericError::InvalidArgument)?;
            let frac: i64 = frac_str.parse().map_err(|_| NumericError::InvalidArgument)?;
            let denom = 10i64
                .checked_pow(frac_str.len() as u32)
                .ok_or(NumericError::Overflow)?;
            let num = whole
                .checked_mul(denom)
                .and_then(|n| {
                    if whole_str.starts_with('-') {
                        n.checked_sub(frac)
                    } else {
                        n.checked_add(frac)
                    }
                })
                .ok_or(NumericError::Overflow)?;
            return Ok(Numeric::new(num, denom));
        }
        let num: i64 = s.parse().map_err(|_| NumericError::InvalidArgument)?;
        Ok(Numeric::from_int(num))
    }
}

/// Number of decimal places implied by a power-of-ten denominator, or `None`
/// if the denominator is not a power of ten.
fn decimal_places(denom: i64) -> Option<u32> {
    let mut d = denom;
    let mut places = 0u32;
    while d % 10 == 0 {
        d /= 10;
        places += 1;
    }
    (d == 1).then_some(places)
}

fn gcd_i64(a: u64, b: u64) -> u64 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn gcd_i128(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Squeeze a 128-bit ratio into a `Numeric`, reducing only if the natural
/// form does not fit.
fn fit_i64(num: i128, den: i128) -> Result<Numeric, NumericError> {
    debug_assert!(den > 0);
    if let (Ok(n), Ok(d)) = (i64::try_from(num), i64::try_from(den)) {
        return Ok(Numeric { num: n, denom: d });
    }
    let g = gcd_i128(num, den);
    let (num, den) = if g > 1 { (num / g, den / g) } else { (num, den) };
    match (i64::try_from(num), i64::try_from(den)) {
        (Ok(n), Ok(d)) => Ok(Numeric { num: n, denom: d }),
        _ => Err(NumericError::Overflow),
    }
}

/// Round `num/den` to the target denominator, yielding the new numerator.
fn round_to_denom(num: i128, den: i128, target: i128, round: Round) -> Result<i128, NumericError> {
    debug_assert!(den > 0 && target > 0);
    let g = gcd_i128(den, target);
    let scaled = num
        .checked_mul(target / g)
        .ok_or(NumericError::Overflow)?;
    let den = den / g;
    let q = scaled / den;
    let r = scaled % den;
    if r == 0 {
        return Ok(q);
    }
    let negative = scaled < 0;
    let away = if negative { q - 1 } else { q + 1 };
    let rounded = match round {
        Round::Never => return Err(NumericError::InexactRounding),
        Round::Trunc => q,
        Round::Floor => {
            if negative {
                q - 1
            } else {
                q
            }
        }
        Round::Ceil => {
            if negative {
                q
            } else {
                q + 1
            }
        }
        Round::Promote => away,
        Round::HalfDown | Round::HalfUp | Round::Bankers => {
            let twice = r.abs() * 2;
            match twice.cmp(&den) {
                Ordering::Less => q,
                Ordering::Greater => away,
                Ordering::Equal => match round {
                    Round::HalfDown => q,
                    Round::HalfUp => away,
                    // Banker's: keep the even candidate.
                    _ => {
                        if q % 2 == 0 {
                            q
                        } else {
                            away
                        }
                    }
                },
            }
        }
    };
    Ok(rounded)
}

/// Exponent p with `10^p <= |num/den| < 10^(p+1)`. Matches the native
/// engine, which derives it from the double value.
fn magnitude_exponent(num: i128, den: i128) -> i32 {
    let v = (num as f64 / den as f64).abs();
    v.log10().floor() as i32
}

fn sigfig_convert(
    num: i128,
    den: i128,
    sigfigs: u8,
    round: Round,
) -> Result<Numeric, NumericError> {
    if sigfigs == 0 {
        return Err(NumericError::InvalidArgument);
    }
    if num == 0 {
        return Ok(Numeric { num: 0, denom: 1 });
    }
    let p = magnitude_exponent(num, den);
    let e = sigfigs as i32 - 1 - p;
    if e >= 0 {
        if e > 18 {
            return Err(NumericError::Overflow);
        }
        let target = 10i128.pow(e as u32);
        let out = round_to_denom(num, den, target, round)?;
        fit_i64(out, target)
    } else {
        // Magnitude exceeds the significant digits: round the numerator to
        // a multiple of the granule, at denominator one.
        let granule = 10i128.pow((-e) as u32);
        let scaled_den = den.checked_mul(granule).ok_or(NumericError::Overflow)?;
        let q = round_to_denom(num, scaled_den, 1, round)?;
        let out = q.checked_mul(granule).ok_or(NumericError::Overflow)?;
        fit_i64(out, 1)
    }
}

/// Apply a denominator policy to an exact 128-bit ratio.
fn convert_big(num: i128, den: i128, denom: Denom, round: Round) -> Result<Numeric, NumericError> {
    debug_assert!(den > 0);
    match denom {
        Denom::Auto | Denom::Exact => fit_i64(num, den),
        Denom::Reduce | Denom::Lcd => {
            let g = gcd_i128(num, den);
            let (num, den) = if g > 1 { (num / g, den / g) } else { (num, den) };
            fit_i64(num, den)
        }
        Denom::Fixed(d) => {
            if d <= 0 {
                return Err(NumericError::InvalidArgument);
            }
            let out = round_to_denom(num, den, d as i128, round)?;
            fit_i64(out, d as i128)
        }
        Denom::SigFigs(n) => sigfig_convert(num, den, n, round),
    }
}

/// Shared tail of the four arithmetic operations: the exact 128-bit result
/// plus the operand pair, resolved per denominator policy.
fn finish_op(
    num: i128,
    den: i128,
    a: &Numeric,
    b: &Numeric,
    denom: Denom,
    round: Round,
) -> Result<Numeric, NumericError> {
    match denom {
        Denom::Lcd => {
            let g = gcd_i128(a.denom as i128, b.denom as i128);
            let lcm = (a.denom as i128 / g)
                .checked_mul(b.denom as i128)
                .ok_or(NumericError::Overflow)?;
            let out = round_to_denom(num, den, lcm, round)?;
            fit_i64(out, lcm)
        }
        Denom::Fixed(d) => {
            if d <= 0 {
                return Err(NumericError::InvalidArgument);
            }
            // Operands must be losslessly expressible at the fixed
            // denominator, otherwise the request is contradictory.
            for side in [a, b] {
                if side.denom != d
                    && round_to_denom(side.num as i128, side.denom as i128, d as i128, Round::Never)
                        .is_err()
                {
                    return Err(NumericError::DenominatorMismatch);
                }
            }
            let out = round_to_denom(num, den, d as i128, round)?;
            fit_i64(out, d as i128)
        }
        _ => convert_big(num, den, denom, round),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn n(num: i64, denom: i64) -> Numeric {
        Numeric::new(num, denom)
    }

    #[test]
    fn construction_normalizes_negative_denominators() {
        let v = Numeric::new(5, -2);
        assert_eq!(v.num(), -5);
        assert_eq!(v.denom(), 2);
    }

    #[test]
    fn neg_and_abs_flag_the_unrepresentable_minimum() {
        let edge = n(i64::MIN, 100);
        assert_eq!(edge.neg().check(), Err(NumericError::Overflow));
        assert_eq!(edge.abs().check(), Err(NumericError::Overflow));

        let v = n(-5, 2);
        assert!(v.neg().equal(&n(5, 2)));
        assert!(v.abs().equal(&n(5, 2)));
        assert!(n(i64::MIN + 1, 100).neg().equal(&n(i64::MAX, 100)));

        let poisoned = Numeric::error(NumericError::DenominatorMismatch);
        assert_eq!(poisoned.neg().check(), Err(NumericError::DenominatorMismatch));
    }

    #[test]
    fn error_values_round_trip_through_check() {
        for code in [
            NumericError::InvalidArgument,
            NumericError::Overflow,
            NumericError::DenominatorMismatch,
            NumericError::InexactRounding,
        ] {
            let v = Numeric::error(code);
            assert_eq!(v.denom(), 0);
            assert_eq!(v.check(), Err(code));
        }
        assert_eq!(n(1, 2).check(), Ok(()));
    }

    #[test]
    fn eq_is_field_exact_while_equal_is_value_equivalence() {
        let half = n(1, 2);
        let two_quarters = n(2, 4);
        assert_ne!(half, two_quarters);
        assert!(half.equal(&two_quarters));
        assert!(!half.equal(&n(3, 4)));
    }

    #[test]
    fn compare_orders_across_denominators() {
        assert_eq!(n(1, 3).compare(&n(1, 2)), Ordering::Less);
        assert_eq!(n(-1, 2).compare(&n(-1, 3)), Ordering::Less);
        assert_eq!(n(2, 4).compare(&n(1, 2)), Ordering::Equal);
    }

    #[test]
    fn add_exact_keeps_value() {
        let sum = n(1, 3).add(&n(1, 6), Denom::Reduce, Round::Never).unwrap();
        assert_eq!(sum, n(1, 2));
    }

    #[test]
    fn add_with_fixed_denominator() {
        let sum = n(50, 100)
            .add(&n(25, 100), Denom::Fixed(100), Round::Never)
            .unwrap();
        assert_eq!(sum, n(75, 100));
    }

    #[test]
    fn fixed_denominator_mismatch_is_reported() {
        // 1/3 cannot be expressed at denominator 100.
        let err = n(1, 3)
            .add(&n(1, 100), Denom::Fixed(100), Round::Bankers)
            .unwrap_err();
        assert_eq!(err, NumericError::DenominatorMismatch);
    }

    #[test]
    fn fixed_denominator_reconciles_lossless_operands() {
        // 1/2 is representable at denominator 100, so FIXED succeeds.
        let sum = n(1, 2)
            .add(&n(25, 100), Denom::Fixed(100), Round::Never)
            .unwrap();
        assert_eq!(sum, n(75, 100));
    }

    #[test]
    fn lcd_uses_least_common_multiple() {
        let sum = n(1, 4).add(&n(1, 6), Denom::Lcd, Round::Never).unwrap();
        assert_eq!(sum, n(5, 12));
    }

    #[test]
    fn division_by_zero_is_invalid_argument() {
        let err = n(1, 3).div(&n(0, 1), Denom::Reduce, Round::Never).unwrap_err();
        assert_eq!(err, NumericError::InvalidArgument);
    }

    #[test]
    fn division_normalizes_sign() {
        let q = n(1, 2).div(&n(-1, 3), Denom::Reduce, Round::Never).unwrap();
        assert_eq!(q, n(-3, 2));
    }

    #[test]
    fn multiplication_overflow_is_detected() {
        let big = n(i64::MAX - 1, 1);
        let err = big.mul(&big, Denom::Exact, Round::Never).unwrap_err();
        assert_eq!(err, NumericError::Overflow);
    }

    #[test]
    fn division_overflow_after_reduction() {
        // (2^62 + 1) / 1 divided by 1 / (2^62 + 1): the cross products share
        // no common factor and exceed 64 bits.
        let v = n((1i64 << 62) + 1, 1);
        let w = n(1, (1i64 << 62) + 1);
        let err = v.div(&w, Denom::Exact, Round::Never).unwrap_err();
        assert_eq!(err, NumericError::Overflow);
    }

    #[test]
    fn never_rounding_signals_remainder() {
        let err = n(1, 3).convert(Denom::Fixed(100), Round::Never).unwrap_err();
        assert_eq!(err, NumericError::InexactRounding);
    }

    #[test]
    fn rounding_modes_disagree_exactly_where_documented() {
        let v = n(7, 2); // 3.5
        let w = n(-7, 2);
        let to_unit = |x: Numeric, r| x.convert(Denom::Fixed(1), r).unwrap().num();
        assert_eq!(to_unit(v, Round::Floor), 3);
        assert_eq!(to_unit(v, Round::Ceil), 4);
        assert_eq!(to_unit(v, Round::Trunc), 3);
        assert_eq!(to_unit(v, Round::Promote), 4);
        assert_eq!(to_unit(v, Round::HalfDown), 3);
        assert_eq!(to_unit(v, Round::HalfUp), 4);
        assert_eq!(to_unit(v, Round::Bankers), 4); // 4 is even
        assert_eq!(to_unit(n(5, 2), Round::Bankers), 2); // 2 is even
        assert_eq!(to_unit(w, Round::Floor), -4);
        assert_eq!(to_unit(w, Round::Ceil), -3);
        assert_eq!(to_unit(w, Round::Trunc), -3);
        assert_eq!(to_unit(w, Round::Promote), -4);
        assert_eq!(to_unit(w, Round::Bankers), -4);
    }

    #[test]
    fn sigfig_denominator_tracks_magnitude() {
        // 0.1234 at 3 significant figures -> 123/1000.
        let v = n(1234, 10_000);
        let out = v.convert(Denom::SigFigs(3), Round::Bankers).unwrap();
        assert_eq!(out, n(123, 1000));

        // 123456 at 3 significant figures -> 123000/1.
        let big = n(123_456, 1);
        let out = big.convert(Denom::SigFigs(3), Round::Trunc).unwrap();
        assert_eq!(out, n(123_000, 1));
    }

    #[test]
    fn invert_moves_sign_and_rejects_zero() {
        assert_eq!(n(-2, 3).invert().unwrap(), n(-3, 2));
        assert_eq!(n(0, 1).invert().unwrap_err(), NumericError::InvalidArgument);
    }

    #[test]
    fn reduce_eliminates_common_factors() {
        assert_eq!(n(6, 8).reduce(), n(3, 4));
        assert_eq!(n(-6, 8).reduce(), n(-3, 4));
        assert_eq!(n(0, 8).reduce(), n(0, 1));
    }

    #[test]
    fn parse_accepts_ratio_integer_and_decimal_forms() {
        assert_eq!("123/456".parse::<Numeric>().unwrap(), n(123, 456));
        assert_eq!(" -5/2".parse::<Numeric>().unwrap(), n(-5, 2));
        assert_eq!("42".parse::<Numeric>().unwrap(), n(42, 1));
        assert_eq!("1.23".parse::<Numeric>().unwrap(), n(123, 100));
        assert_eq!("-1.05".parse::<Numeric>().unwrap(), n(-105, 100));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        for s in ["", "abc", "1/0", "1/-2", "1//2", "1.2.3", "1.", "/2"] {
            assert_eq!(
                s.parse::<Numeric>().unwrap_err(),
                NumericError::InvalidArgument,
                "input {s:?}"
            );
        }
    }

    #[test]
    fn display_renders_decimal_for_power_of_ten_denominators() {
        assert_eq!(n(123, 100).to_string(), "1.23");
        assert_eq!(n(-105, 100).to_string(), "-1.05");
        assert_eq!(n(5, 1).to_string(), "5");
        assert_eq!(n(1, 3).to_string(), "1/3");
        assert_eq!(n(7, 1000).to_string(), "0.007");
    }

    #[test]
    fn from_double_exact_recovers_dyadic_expansion() {
        // 0.1 is not exactly representable in binary; the exact dyadic
        // rational of the nearest double is what Auto/Exact preserves.
        let v = Numeric::from_double(0.1, Denom::Auto, Round::Never).unwrap();
        assert_eq!(v, n(3_602_879_701_896_397, 36_028_797_018_963_968));
        assert!((v.to_double() - 0.1).abs() < f64::EPSILON);

        let exact = Numeric::from_double(0.25, Denom::Reduce, Round::Never).unwrap();
        assert_eq!(exact, n(1, 4));
    }

    #[test]
    fn from_double_with_fixed_denominator_rounds_to_cents() {
        let v = Numeric::from_double(1.005, Denom::Fixed(100), Round::Bankers).unwrap();
        // The double nearest 1.005 is slightly below it, so banker's
        // rounding lands on 1.00.
        assert_eq!(v, n(100, 100));
        let w = Numeric::from_double(12.34, Denom::Fixed(100), Round::Bankers).unwrap();
        assert_eq!(w, n(1234, 100));
    }

    #[test]
    fn from_double_rejects_non_finite() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(
                Numeric::from_double(bad, Denom::Auto, Round::Never).unwrap_err(),
                NumericError::InvalidArgument
            );
        }
    }

    #[test]
    fn to_decimal_finds_power_of_ten_denominators() {
        assert_eq!(n(1, 4).to_decimal(None).unwrap(), n(25, 100));
        assert_eq!(n(123, 100).to_decimal(None).unwrap(), n(123, 100));
        assert!(n(1, 3).to_decimal(None).is_none());
        assert!(n(1, 4).to_decimal(Some(1)).is_none());
    }

    proptest! {
        #[test]
        fn add_neg_is_zero(num in -1_000_000_000i64..1_000_000_000, denom in 1i64..1_000_000) {
            let a = Numeric::new(num, denom);
            let sum = a.add(&a.neg(), Denom::Fixed(denom), Round::Never).unwrap();
            prop_assert!(sum.is_zero());
            prop_assert_eq!(sum.denom(), denom);
        }

        #[test]
        fn reduce_convert_round_trip(num in -1_000_000i64..1_000_000, denom in 1i64..10_000) {
            let a = Numeric::new(num, denom).reduce();
            let wider = a.convert(Denom::Fixed(denom), Round::Never).unwrap();
            prop_assert_eq!(wider.reduce(), a);
        }

        #[test]
        fn double_round_trip_within_denominator_precision(
            cents in -1_000_000_000i64..1_000_000_000
        ) {
            let v = Numeric::new(cents, 100);
            let back = Numeric::from_double(v.to_double(), Denom::Fixed(100), Round::Bankers)
                .unwrap();
            prop_assert_eq!(back, v);
        }

        #[test]
        fn compare_agrees_with_doubles(
            an in -100_000i64..100_000, ad in 1i64..10_000,
            bn in -100_000i64..100_000, bd in 1i64..10_000,
        ) {
            let a = Numeric::new(an, ad);
            let b = Numeric::new(bn, bd);
            let expected = a.to_double().partial_cmp(&b.to_double()).unwrap();
            // f64 has ample precision for these ranges.
            prop_assert_eq!(a.compare(&b), expected);
        }

        #[test]
        fn mul_reduce_never_loses_value(
            an in -10_000i64..10_000, ad in 1i64..1_000,
            bn in -10_000i64..10_000, bd in 1i64..1_000,
        ) {
            let a = Numeric::new(an, ad);
            let b = Numeric::new(bn, bd);
            let exact = a.mul(&b, Denom::Reduce, Round::Never).unwrap();
            let lhs = an as i128 * bn as i128 * exact.denom() as i128;
            let rhs = exact.num() as i128 * ad as i128 * bd as i128;
            prop_assert_eq!(lhs, rhs);
        }
    }
}
