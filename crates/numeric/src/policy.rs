//! Denominator and rounding policies.
//!
//! Every arithmetic operation takes two independent axes of control: how the
//! result's denominator is chosen ([`Denom`]) and how an inexact result is
//! rounded to that denominator ([`Round`]). These are closed sum types so a
//! caller can never combine them into a nonsensical request.

use serde::{Deserialize, Serialize};

/// Rounding policy applied when a result does not fit the chosen denominator
/// exactly.
///
/// Watch out: `Never` is the only mode that reports inexactness instead of
/// discarding it. Monetary code that must not lose precision silently should
/// use `Never` and handle the error.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Round {
    /// Round toward negative infinity.
    Floor,
    /// Round toward positive infinity.
    Ceil,
    /// Truncate fractions (round toward zero).
    Trunc,
    /// Promote fractions (round away from zero).
    Promote,
    /// Round to the nearest unit, toward zero on ties.
    HalfDown,
    /// Round to the nearest unit, away from zero on ties.
    HalfUp,
    /// Unbiased ("banker's") rounding: nearest unit, nearest even on ties.
    /// Generally the right choice for financial quantities.
    Bankers,
    /// Never round: signal `InexactRounding` if the result has a remainder.
    Never,
}

/// How the denominator of a result is computed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denom {
    /// Let the operation pick: the smallest denominator that keeps the
    /// result exact. For conversions this is a no-op.
    Auto,
    /// Any denominator that represents the ratio exactly, without spending
    /// time finding the smallest one. No rounding can occur.
    Exact,
    /// Reduce the result by common-factor elimination; numerator and
    /// denominator of the result are relatively prime.
    Reduce,
    /// Use the least common multiple of the operands' denominators.
    Lcd,
    /// Use exactly this denominator. Operands whose denominators cannot be
    /// losslessly re-expressed at it signal `DenominatorMismatch`.
    Fixed(i64),
    /// Round to this many significant decimal digits; the denominator is a
    /// power of ten derived from the result's magnitude.
    SigFigs(u8),
}
