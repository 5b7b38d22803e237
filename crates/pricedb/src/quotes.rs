//! Quote-source boundary.
//!
//! The engine never fetches quotes itself; an external collaborator supplies
//! `(commodity, currency, time, value, source)` tuples which are applied to
//! the price database here.

use serde::{Deserialize, Serialize};
use tracing::info;

use cashbook_core::{CommodityId, Time64};
use cashbook_numeric::Numeric;

use crate::db::PriceDb;
use crate::price::{Price, PriceSource};

/// One retrieved quote, ready to be turned into a [`Price`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub commodity: CommodityId,
    pub currency: CommodityId,
    pub time: Time64,
    pub value: Numeric,
    pub source: PriceSource,
}

/// External quote supplier. Implementations may be slow or fail; the engine
/// only consumes their output.
pub trait QuoteFeed {
    fn fetch(&mut self, commodities: &[CommodityId]) -> anyhow::Result<Vec<Quote>>;
}

/// Apply quotes to the database, returning how many were newly added
/// (duplicates are skipped, matching `add_price` semantics).
pub fn apply_quotes(db: &mut PriceDb, quotes: Vec<Quote>) -> usize {
    let mut added = 0;
    for q in quotes {
        let price = Price::new(q.commodity, q.currency, q.time, q.value, q.source);
        if db.add_price(price) {
            added += 1;
        }
    }
    info!(added, "applied quote batch");
    added
}
