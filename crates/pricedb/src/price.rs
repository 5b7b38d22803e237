//! A single time-stamped exchange rate.

use serde::{Deserialize, Serialize};

use cashbook_core::{CommodityId, PriceId, Time64};
use cashbook_numeric::Numeric;

/// Where a price came from.
///
/// These are in preference order: a quote from a lower-ordinal source
/// overwrites one from a higher-ordinal source at the same timestamp, but
/// not the other way around. User-entered prices outrank fetched quotes.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// The price editor dialog.
    EditDialog,
    /// A fetched quote.
    FinanceQuote,
    /// A user-entered price.
    UserPrice,
    /// The transfer dialog.
    TransferDialog,
    /// The split register.
    SplitRegister,
    /// Split import.
    SplitImport,
    /// A stock split.
    StockSplit,
    /// A stock transaction.
    StockTransaction,
    /// Posting an invoice.
    InvoicePost,
    /// Temporary, never persisted.
    Temporary,
    Invalid,
}

impl PriceSource {
    /// Priority ordinal; lower wins.
    pub fn priority(self) -> u8 {
        self as u8
    }
}

/// One `commodity -> currency` exchange rate at an instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    id: PriceId,
    pub commodity: CommodityId,
    pub currency: CommodityId,
    pub time: Time64,
    /// Units of `currency` per unit of `commodity`.
    pub value: Numeric,
    pub source: PriceSource,
    /// Free-form type tag ("last", "ask", "bid", ...).
    pub type_str: String,
}

impl Price {
    pub fn new(
        commodity: CommodityId,
        currency: CommodityId,
        time: Time64,
        value: Numeric,
        source: PriceSource,
    ) -> Self {
        Self {
            id: PriceId::new(),
            commodity,
            currency,
            time,
            value,
            source,
            type_str: String::new(),
        }
    }

    pub fn id(&self) -> PriceId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_priority_follows_declaration_order() {
        assert!(PriceSource::EditDialog.priority() < PriceSource::FinanceQuote.priority());
        assert!(PriceSource::FinanceQuote < PriceSource::UserPrice);
        assert_eq!(PriceSource::Invalid.priority(), 10);
    }
}
