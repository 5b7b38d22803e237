//! Tradeable units: currencies, stocks, funds.

use serde::{Deserialize, Serialize};

use cashbook_core::CommodityId;

/// Separator between namespace and mnemonic in a unique name.
pub const UNIQUE_NAME_SEPARATOR: &str = "::";

/// Namespaces whose members are treated as currencies.
const CURRENCY_NAMESPACES: [&str; 2] = ["CURRENCY", "ISO4217"];

/// How quotes for a commodity are retrieved, when they are at all.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSourceKind {
    /// A single site supplies the quote.
    Single,
    /// Multiple sites are consulted.
    Multi,
    Unknown,
    /// Currency exchange rates rather than security quotes.
    Currency,
}

/// A tradeable unit. Identity is `(namespace, mnemonic)`; everything else is
/// descriptive. Owned by the book's commodity table; accounts and
/// transactions refer to it by [`CommodityId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commodity {
    id: CommodityId,
    pub fullname: String,
    pub namespace: String,
    pub mnemonic: String,
    /// Exchange-specific code (CUSIP, ISIN, ...).
    pub cusip: String,
    /// Smallest fraction tradeable: the SCU denominator (e.g. 100 for cents).
    pub fraction: i64,
    /// Whether quotes should be fetched for this commodity.
    pub quote_flag: bool,
    pub quote_source: QuoteSourceKind,
    pub quote_tz: Option<String>,
    pub user_symbol: Option<String>,
}

impl Commodity {
    pub fn new(
        namespace: impl Into<String>,
        mnemonic: impl Into<String>,
        fullname: impl Into<String>,
        cusip: impl Into<String>,
        fraction: i64,
    ) -> Self {
        Self {
            id: CommodityId::new(),
            fullname: fullname.into(),
            namespace: namespace.into(),
            mnemonic: mnemonic.into(),
            cusip: cusip.into(),
            fraction: fraction.max(1),
            quote_flag: false,
            quote_source: QuoteSourceKind::Unknown,
            quote_tz: None,
            user_symbol: None,
        }
    }

    /// Convenience constructor for an ISO currency.
    pub fn currency(mnemonic: impl Into<String>, fullname: impl Into<String>, fraction: i64) -> Self {
        let mut c = Self::new("CURRENCY", mnemonic, fullname, "", fraction);
        c.quote_source = QuoteSourceKind::Currency;
        c
    }

    pub fn id(&self) -> CommodityId {
        self.id
    }

    /// Identity key rendered as `namespace::mnemonic`.
    pub fn unique_name(&self) -> String {
        format!("{}{}{}", self.namespace, UNIQUE_NAME_SEPARATOR, self.mnemonic)
    }

    /// Display form: `mnemonic (fullname)`.
    pub fn print_name(&self) -> String {
        format!("{} ({})", self.mnemonic, self.fullname)
    }

    pub fn is_currency(&self) -> bool {
        CURRENCY_NAMESPACES.contains(&self.namespace.as_str())
    }

    /// Same identity key, regardless of descriptive fields.
    pub fn equiv(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.mnemonic == other.mnemonic
    }

    /// Identity key plus fullname, cusip, and fraction all equal.
    pub fn equal(&self, other: &Self) -> bool {
        self.equiv(other)
            && self.fullname == other.fullname
            && self.cusip == other.cusip
            && self.fraction == other.fraction
    }

    /// Total order for sorted listings: namespace, then mnemonic.
    pub fn compare(&self, other: &Self) -> core::cmp::Ordering {
        self.namespace
            .cmp(&other.namespace)
            .then_with(|| self.mnemonic.cmp(&other.mnemonic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_name_joins_namespace_and_mnemonic() {
        let usd = Commodity::currency("USD", "US Dollar", 100);
        assert_eq!(usd.unique_name(), "CURRENCY::USD");
        assert!(usd.is_currency());
    }

    #[test]
    fn equiv_ignores_descriptive_fields_but_equal_does_not() {
        let a = Commodity::new("NASDAQ", "AAPL", "Apple Inc.", "037833100", 1);
        let mut b = a.clone();
        b.fullname = "Apple".into();
        assert!(a.equiv(&b));
        assert!(!a.equal(&b));
        b.fullname = a.fullname.clone();
        assert!(a.equal(&b));
    }

    #[test]
    fn fraction_is_clamped_positive() {
        let c = Commodity::new("FUND", "XYZ", "XYZ Fund", "", 0);
        assert_eq!(c.fraction, 1);
    }
}
