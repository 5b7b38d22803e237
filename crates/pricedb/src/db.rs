//! The price database: exchange rates keyed by `(commodity, currency)`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use cashbook_core::{CommodityId, Time64};

use crate::price::{Price, PriceSource};

/// Time- and source-ordered store of commodity-to-currency exchange rates.
///
/// Each pair's price list is kept sorted newest first; among equal
/// timestamps, higher-priority (lower ordinal) sources first. Serialized as
/// a flat price list, since tuple map keys have no JSON representation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(into = "Vec<Price>", from = "Vec<Price>")]
pub struct PriceDb {
    prices: HashMap<(CommodityId, CommodityId), Vec<Price>>,
}

impl From<PriceDb> for Vec<Price> {
    fn from(db: PriceDb) -> Self {
        let mut all: Vec<Price> = db.prices.into_values().flatten().collect();
        // Deterministic snapshot order.
        all.sort_by(|a, b| {
            (a.commodity, a.currency, a.time, a.source)
                .cmp(&(b.commodity, b.currency, b.time, b.source))
        });
        all
    }
}

impl From<Vec<Price>> for PriceDb {
    fn from(prices: Vec<Price>) -> Self {
        let mut db = PriceDb::default();
        for price in prices {
            db.add_price(price);
        }
        db
    }
}

impl PriceDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a price. Returns `false` (not an error) when a price for the
    /// same `(commodity, currency, time, source)` already exists.
    pub fn add_price(&mut self, price: Price) -> bool {
        let list = self
            .prices
            .entry((price.commodity, price.currency))
            .or_default();
        if list
            .iter()
            .any(|p| p.time == price.time && p.source == price.source)
        {
            debug!(commodity = %price.commodity, currency = %price.currency,
                   time = price.time, "duplicate price ignored");
            return false;
        }
        list.push(price);
        list.sort_by(|a, b| b.time.cmp(&a.time).then(a.source.cmp(&b.source)));
        true
    }

    /// Remove a price by id; `false` when absent.
    pub fn remove_price(&mut self, commodity: CommodityId, currency: CommodityId, id: cashbook_core::PriceId) -> bool {
        let Some(list) = self.prices.get_mut(&(commodity, currency)) else {
            return false;
        };
        let before = list.len();
        list.retain(|p| p.id() != id);
        before != list.len()
    }

    /// Most recent price for the pair, breaking timestamp ties by source
    /// priority.
    pub fn lookup_latest(&self, commodity: CommodityId, currency: CommodityId) -> Option<&Price> {
        self.prices
            .get(&(commodity, currency))
            .and_then(|list| list.first())
    }

    /// Price nearest the given instant, on either side.
    ///
    /// At equal distance the earlier price wins; among prices sharing the
    /// winning timestamp, the highest-priority source wins.
    pub fn lookup_nearest_in_time(
        &self,
        commodity: CommodityId,
        currency: CommodityId,
        time: Time64,
    ) -> Option<&Price> {
        let list = self.prices.get(&(commodity, currency))?;
        list.iter().min_by(|a, b| {
            let da = a.time.abs_diff(time);
            let db = b.time.abs_diff(time);
            da.cmp(&db)
                .then(a.time.cmp(&b.time))
                .then(a.source.cmp(&b.source))
        })
    }

    /// All prices for a pair, newest first.
    pub fn price_list(&self, commodity: CommodityId, currency: CommodityId) -> &[Price] {
        self.prices
            .get(&(commodity, currency))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn num_prices(&self) -> usize {
        self.prices.values().map(Vec::len).sum()
    }

    /// Best conversion rate from `commodity` to `currency` at (or nearest)
    /// the given time; `None` when the pair has no prices at all.
    pub fn rate(
        &self,
        commodity: CommodityId,
        currency: CommodityId,
        time: Option<Time64>,
    ) -> Option<&Price> {
        match time {
            Some(t) => self.lookup_nearest_in_time(commodity, currency, t),
            None => self.lookup_latest(commodity, currency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashbook_numeric::Numeric;

    fn ids() -> (CommodityId, CommodityId) {
        (CommodityId::new(), CommodityId::new())
    }

    fn price(c: CommodityId, cur: CommodityId, time: Time64, source: PriceSource) -> Price {
        Price::new(c, cur, time, Numeric::new(3, 2), source)
    }

    #[test]
    fn duplicate_key_returns_false_not_error() {
        let (c, cur) = ids();
        let mut db = PriceDb::new();
        assert!(db.add_price(price(c, cur, 1_000, PriceSource::FinanceQuote)));
        assert!(!db.add_price(price(c, cur, 1_000, PriceSource::FinanceQuote)));
        // Same time, different source is a distinct entry.
        assert!(db.add_price(price(c, cur, 1_000, PriceSource::UserPrice)));
        assert_eq!(db.num_prices(), 2);
    }

    #[test]
    fn latest_breaks_timestamp_ties_by_source_priority() {
        let (c, cur) = ids();
        let mut db = PriceDb::new();
        db.add_price(price(c, cur, 1_000, PriceSource::FinanceQuote));
        db.add_price(price(c, cur, 1_000, PriceSource::EditDialog));
        db.add_price(price(c, cur, 500, PriceSource::EditDialog));
        let latest = db.lookup_latest(c, cur).unwrap();
        assert_eq!(latest.time, 1_000);
        assert_eq!(latest.source, PriceSource::EditDialog);
    }

    #[test]
    fn nearest_prefers_smaller_distance_then_earlier() {
        let (c, cur) = ids();
        let mut db = PriceDb::new();
        db.add_price(price(c, cur, 100, PriceSource::FinanceQuote));
        db.add_price(price(c, cur, 300, PriceSource::FinanceQuote));

        assert_eq!(db.lookup_nearest_in_time(c, cur, 150).unwrap().time, 100);
        assert_eq!(db.lookup_nearest_in_time(c, cur, 260).unwrap().time, 300);
        // Equidistant: the earlier price wins.
        assert_eq!(db.lookup_nearest_in_time(c, cur, 200).unwrap().time, 100);
    }

    #[test]
    fn remove_price_by_id() {
        let (c, cur) = ids();
        let mut db = PriceDb::new();
        let p = price(c, cur, 100, PriceSource::UserPrice);
        let id = p.id();
        db.add_price(p);
        assert!(db.remove_price(c, cur, id));
        assert!(!db.remove_price(c, cur, id));
        assert_eq!(db.num_prices(), 0);
    }

    #[test]
    fn pairs_are_directional() {
        let (c, cur) = ids();
        let mut db = PriceDb::new();
        db.add_price(price(c, cur, 100, PriceSource::UserPrice));
        assert!(db.lookup_latest(cur, c).is_none());
    }
}
