//! `cashbook-commodity` — tradeable units and the book-owned commodity table.

pub mod commodity;
pub mod table;

pub use commodity::{Commodity, QuoteSourceKind, UNIQUE_NAME_SEPARATOR};
pub use table::CommodityTable;
