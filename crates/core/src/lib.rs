//! `cashbook-core` — engine foundation building blocks.
//!
//! This crate contains the primitives every other crate shares: the error
//! model, strongly-typed entity identifiers, and the date representations
//! used at the engine boundary.

pub mod date;
pub mod error;
pub mod id;

pub use date::Time64;
pub use error::{EngineError, EngineResult};
pub use id::{AccountId, CommodityId, PriceId, SplitId, TransactionId};
