//! `cashbook-numeric` — exact rational arithmetic for monetary amounts.
//!
//! Every amount in the engine is a ratio of 64-bit integers with a
//! controlled denominator; floating point exists only at the conversion
//! boundary. See [`rational::Numeric`] for the value type and
//! [`policy`] for the denominator/rounding policy axes.

pub mod policy;
pub mod rational;

pub use policy::{Denom, Round};
pub use rational::{Numeric, NumericError};
