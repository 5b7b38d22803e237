//! Accounts: nodes of the account tree.

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use cashbook_core::{AccountId, CommodityId, SplitId};
use cashbook_numeric::Numeric;

/// High-level account kind. Determines display conventions (debit/credit
/// column labels) and whether the account is priced in shares.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Bank,
    Cash,
    Asset,
    Credit,
    Liability,
    Stock,
    Mutual,
    Currency,
    Income,
    Expense,
    Equity,
    Receivable,
    Payable,
    /// The hidden root of an account tree.
    Root,
    /// Multi-commodity trading account.
    Trading,
}

impl AccountType {
    /// Whether registers show this account with price/shares/value columns.
    pub fn is_priced(self) -> bool {
        matches!(self, AccountType::Stock | AccountType::Mutual | AccountType::Currency)
    }

    /// Column label for the debit side.
    pub fn debit_string(self) -> &'static str {
        match self {
            AccountType::Bank | AccountType::Cash | AccountType::Asset => "Deposit",
            AccountType::Credit | AccountType::Liability | AccountType::Payable => "Payment",
            AccountType::Stock | AccountType::Mutual | AccountType::Currency => "Buy",
            AccountType::Income => "Charge",
            AccountType::Expense => "Expense",
            AccountType::Receivable => "Invoice",
            _ => "Debit",
        }
    }

    /// Column label for the credit side.
    pub fn credit_string(self) -> &'static str {
        match self {
            AccountType::Bank | AccountType::Cash | AccountType::Asset => "Withdrawal",
            AccountType::Credit | AccountType::Liability | AccountType::Payable => "Charge",
            AccountType::Stock | AccountType::Mutual | AccountType::Currency => "Sell",
            AccountType::Income => "Income",
            AccountType::Expense => "Rebate",
            AccountType::Receivable => "Payment",
            _ => "Credit",
        }
    }
}

/// A node in the account tree.
///
/// Descriptive metadata has plain setters here; anything that touches the
/// tree shape, the split list, or balances goes through [`crate::Book`].
/// Balance fields are caches, recomputed lazily when flagged dirty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub(crate) id: AccountId,
    pub(crate) name: String,
    pub(crate) code: String,
    pub(crate) description: String,
    pub(crate) notes: String,
    pub(crate) color: String,
    pub(crate) filter: String,
    pub(crate) sort_order: String,
    pub(crate) sort_reversed: bool,
    pub(crate) last_num: String,
    pub(crate) acct_type: AccountType,
    pub(crate) commodity: Option<CommodityId>,
    /// Explicit SCU override, meaningful only when `non_std_scu` is set.
    pub(crate) commodity_scu: i64,
    pub(crate) non_std_scu: bool,
    pub(crate) splits: Vec<SplitId>,
    pub(crate) children: Vec<AccountId>,
    pub(crate) parent: Option<AccountId>,
    pub(crate) placeholder: bool,
    pub(crate) hidden: bool,
    pub(crate) opening_balance: bool,
    pub(crate) auto_interest: bool,
    pub(crate) tax_related: bool,
    pub(crate) balance: Numeric,
    pub(crate) cleared_balance: Numeric,
    pub(crate) reconciled_balance: Numeric,
    pub(crate) balance_dirty: bool,
    pub(crate) sort_dirty: bool,
    pub(crate) defer_bal_computation: bool,
    #[serde(skip)]
    pub(crate) edit_depth: u32,
}

impl Account {
    pub(crate) fn new(name: &str, acct_type: AccountType, commodity: Option<CommodityId>) -> Self {
        Self {
            id: AccountId::new(),
            name: name.to_owned(),
            code: String::new(),
            description: String::new(),
            notes: String::new(),
            color: String::new(),
            filter: String::new(),
            sort_order: String::new(),
            sort_reversed: false,
            last_num: String::new(),
            acct_type,
            commodity,
            commodity_scu: 0,
            non_std_scu: false,
            splits: Vec::new(),
            children: Vec::new(),
            parent: None,
            placeholder: false,
            hidden: false,
            opening_balance: false,
            auto_interest: false,
            tax_related: false,
            balance: Numeric::zero(),
            cleared_balance: Numeric::zero(),
            reconciled_balance: Numeric::zero(),
            balance_dirty: false,
            sort_dirty: false,
            defer_bal_computation: false,
            edit_depth: 0,
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn acct_type(&self) -> AccountType {
        self.acct_type
    }

    pub fn commodity(&self) -> Option<CommodityId> {
        self.commodity
    }

    pub fn parent(&self) -> Option<AccountId> {
        self.parent
    }

    pub fn children(&self) -> &[AccountId] {
        &self.children
    }

    pub fn splits(&self) -> &[SplitId] {
        &self.splits
    }

    pub fn is_root(&self) -> bool {
        self.acct_type == AccountType::Root
    }

    pub fn placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_opening_balance(&self) -> bool {
        self.opening_balance
    }

    pub fn auto_interest(&self) -> bool {
        self.auto_interest
    }

    pub fn tax_related(&self) -> bool {
        self.tax_related
    }

    pub fn non_std_scu(&self) -> bool {
        self.non_std_scu
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    pub fn set_sort_order(&mut self, sort_order: impl Into<String>) {
        self.sort_order = sort_order.into();
    }

    pub fn set_sort_reversed(&mut self, reversed: bool) {
        self.sort_reversed = reversed;
    }

    pub fn set_last_num(&mut self, num: impl Into<String>) {
        self.last_num = num.into();
    }

    pub fn set_type(&mut self, acct_type: AccountType) {
        self.acct_type = acct_type;
    }

    /// Changing the commodity re-denominates future amounts, so the cached
    /// balances can no longer be trusted.
    pub fn set_commodity(&mut self, commodity: Option<CommodityId>) {
        self.commodity = commodity;
        self.balance_dirty = true;
    }

    /// Set an explicit SCU, overriding the commodity's own fraction.
    pub fn set_commodity_scu(&mut self, scu: i64) {
        self.commodity_scu = scu.max(1);
        self.non_std_scu = true;
        self.balance_dirty = true;
    }

    /// Flip the non-standard-SCU flag without changing the stored override.
    pub fn set_non_std_scu(&mut self, flag: bool) {
        self.non_std_scu = flag;
        self.balance_dirty = true;
    }

    pub fn set_placeholder(&mut self, val: bool) {
        self.placeholder = val;
    }

    pub fn set_hidden(&mut self, val: bool) {
        self.hidden = val;
    }

    pub fn set_is_opening_balance(&mut self, val: bool) {
        self.opening_balance = val;
    }

    pub fn set_auto_interest(&mut self, val: bool) {
        self.auto_interest = val;
    }

    pub fn set_tax_related(&mut self, val: bool) {
        self.tax_related = val;
    }

    pub fn defer_bal_computation(&self) -> bool {
        self.defer_bal_computation
    }
}

/// Canonical sibling order: code, then type, then name, then id as the
/// final tiebreak. Sorted tree views apply this at every level.
pub fn account_order(a: &Account, b: &Account) -> Ordering {
    a.code
        .cmp(&b.code)
        .then_with(|| a.acct_type.cmp(&b.acct_type))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_code_type_name_then_id() {
        let mut a = Account::new("Checking", AccountType::Bank, None);
        let mut b = Account::new("Savings", AccountType::Bank, None);
        assert_eq!(account_order(&a, &b), Ordering::Less);

        b.set_name("Checking");
        let by_id = a.id.cmp(&b.id);
        assert_eq!(account_order(&a, &b), by_id);

        a.set_code("200");
        b.set_code("100");
        assert_eq!(account_order(&a, &b), Ordering::Greater);
    }

    #[test]
    fn priced_types() {
        assert!(AccountType::Stock.is_priced());
        assert!(AccountType::Mutual.is_priced());
        assert!(!AccountType::Bank.is_priced());
    }

    #[test]
    fn debit_credit_strings_vary_by_type() {
        assert_eq!(AccountType::Bank.debit_string(), "Deposit");
        assert_eq!(AccountType::Bank.credit_string(), "Withdrawal");
        assert_eq!(AccountType::Stock.debit_string(), "Buy");
        assert_eq!(AccountType::Equity.debit_string(), "Debit");
    }
}
