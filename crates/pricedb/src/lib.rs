//! `cashbook-pricedb` — time- and source-ordered exchange rates.

pub mod db;
pub mod price;
pub mod quotes;

pub use db::PriceDb;
pub use price::{Price, PriceSource};
pub use quotes::{Quote, QuoteFeed, apply_quotes};
