//! The commodity table: one live entry per `(namespace, mnemonic)`.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use cashbook_core::CommodityId;

use crate::commodity::{Commodity, UNIQUE_NAME_SEPARATOR};

/// Book-owned registry of commodities, deduplicated by identity key and
/// grouped into namespaces.
///
/// Serialized as a flat commodity list plus the namespace set; the identity
/// index is rebuilt on load, since tuple map keys have no JSON
/// representation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(into = "TableSnapshot", from = "TableSnapshot")]
pub struct CommodityTable {
    entries: HashMap<CommodityId, Commodity>,
    by_key: HashMap<(String, String), CommodityId>,
    namespaces: BTreeSet<String>,
}

#[derive(Serialize, Deserialize)]
struct TableSnapshot {
    commodities: Vec<Commodity>,
    namespaces: Vec<String>,
}

impl From<CommodityTable> for TableSnapshot {
    fn from(table: CommodityTable) -> Self {
        let mut commodities: Vec<Commodity> = table.entries.into_values().collect();
        commodities.sort_by(|a, b| a.compare(b));
        Self { commodities, namespaces: table.namespaces.into_iter().collect() }
    }
}

impl From<TableSnapshot> for CommodityTable {
    fn from(snapshot: TableSnapshot) -> Self {
        let mut table = CommodityTable::new();
        for namespace in snapshot.namespaces {
            table.add_namespace(namespace);
        }
        for commodity in snapshot.commodities {
            table.insert(commodity);
        }
        table
    }
}

impl CommodityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a commodity, deduplicating by identity key.
    ///
    /// If an entry with the same `(namespace, mnemonic)` already exists it
    /// is updated in place from the argument's descriptive fields and its id
    /// is returned; there are never two live entries with the same key.
    pub fn insert(&mut self, commodity: Commodity) -> CommodityId {
        let key = (commodity.namespace.clone(), commodity.mnemonic.clone());
        if let Some(&existing) = self.by_key.get(&key) {
            let slot = self
                .entries
                .get_mut(&existing)
                .expect("identity index points at a live entry");
            // The surviving entry keeps its id so existing references hold.
            slot.fullname = commodity.fullname;
            slot.cusip = commodity.cusip;
            slot.fraction = commodity.fraction;
            slot.quote_flag = commodity.quote_flag;
            slot.quote_source = commodity.quote_source;
            slot.quote_tz = commodity.quote_tz;
            slot.user_symbol = commodity.user_symbol;
            return existing;
        }
        let id = commodity.id();
        self.namespaces.insert(commodity.namespace.clone());
        self.by_key.insert(key, id);
        self.entries.insert(id, commodity);
        id
    }

    /// Remove a commodity by id. The caller is responsible for ensuring no
    /// account or transaction still references it.
    pub fn remove(&mut self, id: CommodityId) -> Option<Commodity> {
        let removed = self.entries.remove(&id)?;
        self.by_key
            .remove(&(removed.namespace.clone(), removed.mnemonic.clone()));
        Some(removed)
    }

    pub fn get(&self, id: CommodityId) -> Option<&Commodity> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: CommodityId) -> Option<&mut Commodity> {
        self.entries.get_mut(&id)
    }

    pub fn lookup(&self, namespace: &str, mnemonic: &str) -> Option<&Commodity> {
        let id = self
            .by_key
            .get(&(namespace.to_owned(), mnemonic.to_owned()))?;
        self.entries.get(id)
    }

    /// Look up by `namespace::mnemonic`.
    pub fn lookup_unique(&self, unique_name: &str) -> Option<&Commodity> {
        let (namespace, mnemonic) = unique_name.split_once(UNIQUE_NAME_SEPARATOR)?;
        self.lookup(namespace, mnemonic)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a namespace, which may have no commodities yet.
    pub fn add_namespace(&mut self, namespace: impl Into<String>) {
        self.namespaces.insert(namespace.into());
    }

    pub fn find_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace)
    }

    /// Registered namespaces, sorted.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(String::as_str)
    }

    /// Delete a namespace and destroy every commodity in it.
    ///
    /// This cascade is unconditional: any account or transaction still
    /// referencing a destroyed commodity is left dangling, so callers must
    /// check references first.
    pub fn delete_namespace(&mut self, namespace: &str) {
        if !self.namespaces.remove(namespace) {
            return;
        }
        let doomed: Vec<CommodityId> = self
            .entries
            .values()
            .filter(|c| c.namespace == namespace)
            .map(|c| c.id())
            .collect();
        for id in doomed {
            self.remove(id);
        }
    }

    /// Commodities in one namespace, sorted by mnemonic.
    pub fn commodities_in(&self, namespace: &str) -> Vec<&Commodity> {
        let mut out: Vec<&Commodity> = self
            .entries
            .values()
            .filter(|c| c.namespace == namespace)
            .collect();
        out.sort_by(|a, b| a.compare(b));
        out
    }

    /// Commodities with the quote flag set, sorted.
    pub fn quotable_commodities(&self) -> Vec<&Commodity> {
        let mut out: Vec<&Commodity> = self.entries.values().filter(|c| c.quote_flag).collect();
        out.sort_by(|a, b| a.compare(b));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd() -> Commodity {
        Commodity::currency("USD", "US Dollar", 100)
    }

    #[test]
    fn insert_dedupes_by_identity_key() {
        let mut table = CommodityTable::new();
        let first = table.insert(usd());
        let mut renamed = usd();
        renamed.fullname = "United States Dollar".into();
        let second = table.insert(renamed);
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.lookup("CURRENCY", "USD").unwrap().fullname,
            "United States Dollar"
        );
    }

    #[test]
    fn lookup_unique_splits_on_separator() {
        let mut table = CommodityTable::new();
        table.insert(usd());
        assert!(table.lookup_unique("CURRENCY::USD").is_some());
        assert!(table.lookup_unique("CURRENCY::EUR").is_none());
        assert!(table.lookup_unique("CURRENCY:USD").is_none());
    }

    #[test]
    fn delete_namespace_cascades() {
        let mut table = CommodityTable::new();
        table.insert(usd());
        table.insert(Commodity::new("NASDAQ", "AAPL", "Apple Inc.", "", 1));
        table.insert(Commodity::new("NASDAQ", "MSFT", "Microsoft", "", 1));
        table.delete_namespace("NASDAQ");
        assert!(!table.find_namespace("NASDAQ"));
        assert_eq!(table.len(), 1);
        assert!(table.lookup("NASDAQ", "AAPL").is_none());
        assert!(table.lookup("CURRENCY", "USD").is_some());
    }

    #[test]
    fn quotable_filter_respects_flag() {
        let mut table = CommodityTable::new();
        let mut aapl = Commodity::new("NASDAQ", "AAPL", "Apple Inc.", "", 1);
        aapl.quote_flag = true;
        table.insert(aapl);
        table.insert(usd());
        let quotable = table.quotable_commodities();
        assert_eq!(quotable.len(), 1);
        assert_eq!(quotable[0].mnemonic, "AAPL");
    }

    #[test]
    fn namespaces_are_tracked_even_when_empty() {
        let mut table = CommodityTable::new();
        table.add_namespace("template");
        assert!(table.find_namespace("template"));
        assert_eq!(table.namespaces().collect::<Vec<_>>(), vec!["template"]);
    }
}
