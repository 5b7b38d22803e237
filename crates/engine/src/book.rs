//! The book: top-level owner of the account tree, transactions, splits,
//! commodities, and prices.
//!
//! Every entity lives in an id-keyed arena here; cross-references between
//! entities are ids, resolved through the book. All structural mutation and
//! the transaction edit protocol go through these methods so the
//! bidirectional invariants (split <-> account, split <-> transaction,
//! account <-> parent) hold after every call.
//!
//! One logical mutator at a time: the book has no internal locking. Confine
//! it to one thread or wrap it at the session boundary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use cashbook_commodity::CommodityTable;
use cashbook_core::{
    AccountId, CommodityId, EngineError, EngineResult, SplitId, Time64, TransactionId, date,
};
use cashbook_numeric::{Denom, Numeric, Round};
use cashbook_pricedb::PriceDb;

use crate::account::{Account, AccountType, account_order};
use crate::split::{ReconcileState, Split};
use crate::transaction::{EditState, Snapshot, Transaction, TxnType, VoidInfo};

/// Default SCU for accounts with no commodity attached.
const DEFAULT_SCU: i64 = 100;

/// Separator in account full names.
pub const ACCOUNT_SEPARATOR: char = ':';

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub(crate) accounts: HashMap<AccountId, Account>,
    pub(crate) transactions: HashMap<TransactionId, Transaction>,
    pub(crate) splits: HashMap<SplitId, Split>,
    commodities: CommodityTable,
    prices: PriceDb,
    root: AccountId,
}

impl Default for Book {
    fn default() -> Self {
        Self::new()
    }
}

impl Book {
    pub fn new() -> Self {
        let root = Account::new("Root Account", AccountType::Root, None);
        let root_id = root.id();
        let mut accounts = HashMap::new();
        accounts.insert(root_id, root);
        Self {
            accounts,
            transactions: HashMap::new(),
            splits: HashMap::new(),
            commodities: CommodityTable::new(),
            prices: PriceDb::new(),
            root: root_id,
        }
    }

    pub fn root_account(&self) -> AccountId {
        self.root
    }

    pub fn commodities(&self) -> &CommodityTable {
        &self.commodities
    }

    pub fn commodities_mut(&mut self) -> &mut CommodityTable {
        &mut self.commodities
    }

    pub fn prices(&self) -> &PriceDb {
        &self.prices
    }

    pub fn prices_mut(&mut self) -> &mut PriceDb {
        &mut self.prices
    }

    pub fn account(&self, id: AccountId) -> EngineResult<&Account> {
        self.accounts.get(&id).ok_or(EngineError::NotFound)
    }

    pub fn account_mut(&mut self, id: AccountId) -> EngineResult<&mut Account> {
        self.accounts.get_mut(&id).ok_or(EngineError::NotFound)
    }

    pub fn transaction(&self, id: TransactionId) -> EngineResult<&Transaction> {
        self.transactions.get(&id).ok_or(EngineError::NotFound)
    }

    pub fn split(&self, id: SplitId) -> EngineResult<&Split> {
        self.splits.get(&id).ok_or(EngineError::NotFound)
    }

    pub fn num_transactions(&self) -> usize {
        self.transactions.len()
    }

    // ------------------------------------------------------------------
    // Account tree
    // ------------------------------------------------------------------

    /// Create a detached account; attach it with [`Book::append_child`].
    pub fn new_account(
        &mut self,
        name: &str,
        acct_type: AccountType,
        commodity: Option<CommodityId>,
    ) -> AccountId {
        let account = Account::new(name, acct_type, commodity);
        let id = account.id();
        self.accounts.insert(id, account);
        id
    }

    /// Attach `child` under `parent`, detaching it from any current parent
    /// first (a no-op if the parent is unchanged). Fails on cycles.
    pub fn append_child(&mut self, parent: AccountId, child: AccountId) -> EngineResult<()> {
        self.account(parent)?;
        let current = self.account(child)?.parent;
        if current == Some(parent) {
            return Ok(());
        }
        if child == parent || self.is_ancestor(child, parent)? {
            return Err(EngineError::invariant("appending an account under its own descendant"));
        }
        if let Some(old) = current {
            let old_acct = self.account_mut(old)?;
            old_acct.children.retain(|c| *c != child);
        }
        self.account_mut(parent)?.children.push(child);
        self.account_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Detach `child` from `parent`; the child becomes parentless but stays
    /// in the book.
    pub fn remove_child(&mut self, parent: AccountId, child: AccountId) -> EngineResult<()> {
        if self.account(child)?.parent != Some(parent) {
            return Err(EngineError::validation("account is not a child of the given parent"));
        }
        self.account_mut(parent)?.children.retain(|c| *c != child);
        self.account_mut(child)?.parent = None;
        Ok(())
    }

    /// Whether `ancestor` appears on `account`'s path to the root.
    pub fn is_ancestor(&self, ancestor: AccountId, account: AccountId) -> EngineResult<bool> {
        let mut cursor = self.account(account)?.parent;
        while let Some(id) = cursor {
            if id == ancestor {
                return Ok(true);
            }
            cursor = self.account(id)?.parent;
        }
        Ok(false)
    }

    /// Root of the tree containing `account`.
    pub fn get_root(&self, account: AccountId) -> EngineResult<AccountId> {
        let mut cursor = account;
        while let Some(parent) = self.account(cursor)?.parent {
            cursor = parent;
        }
        Ok(cursor)
    }

    /// All accounts below `account`, depth-first. Order within siblings is
    /// insertion order; use [`Book::descendants_sorted`] for a defined one.
    pub fn descendants(&self, account: AccountId) -> EngineResult<Vec<AccountId>> {
        let mut out = Vec::new();
        let mut stack: Vec<AccountId> = self.account(account)?.children.clone();
        stack.reverse();
        while let Some(id) = stack.pop() {
            out.push(id);
            let children = &self.account(id)?.children;
            for child in children.iter().rev() {
                stack.push(*child);
            }
        }
        Ok(out)
    }

    /// Depth-first flattening with siblings ordered by the canonical
    /// account order at every level.
    pub fn descendants_sorted(&self, account: AccountId) -> EngineResult<Vec<AccountId>> {
        fn walk(book: &Book, id: AccountId, out: &mut Vec<AccountId>) -> EngineResult<()> {
            let mut children = book.account(id)?.children.clone();
            children.sort_by(|a, b| {
                account_order(
                    book.accounts.get(a).expect("child ids are live"),
                    book.accounts.get(b).expect("child ids are live"),
                )
            });
            for child in children {
                out.push(child);
                walk(book, child, out)?;
            }
            Ok(())
        }
        let mut out = Vec::new();
        walk(self, account, &mut out)?;
        Ok(out)
    }

    pub fn n_children(&self, account: AccountId) -> EngineResult<usize> {
        Ok(self.account(account)?.children.len())
    }

    pub fn n_descendants(&self, account: AccountId) -> EngineResult<usize> {
        Ok(self.descendants(account)?.len())
    }

    /// Separator-joined path from just below the root, e.g.
    /// `Assets:Bank:Checking`.
    pub fn full_name(&self, account: AccountId) -> EngineResult<String> {
        let mut parts = Vec::new();
        let mut cursor = account;
        loop {
            let acct = self.account(cursor)?;
            match acct.parent {
                Some(parent) => {
                    parts.push(acct.name.clone());
                    cursor = parent;
                }
                None => break,
            }
        }
        parts.reverse();
        Ok(parts.join(&ACCOUNT_SEPARATOR.to_string()))
    }

    pub fn account_begin_edit(&mut self, account: AccountId) -> EngineResult<()> {
        self.account_mut(account)?.edit_depth += 1;
        Ok(())
    }

    pub fn account_commit_edit(&mut self, account: AccountId) -> EngineResult<()> {
        let acct = self.account_mut(account)?;
        if acct.edit_depth == 0 {
            return Err(EngineError::protocol("account commit without matching begin"));
        }
        acct.edit_depth -= 1;
        Ok(())
    }

    /// Destroy an account that has been opened for edit and has no
    /// remaining splits or children. What to do with those beforehand is
    /// the caller's decision.
    pub fn destroy_account(&mut self, account: AccountId) -> EngineResult<()> {
        let acct = self.account(account)?;
        if acct.edit_depth == 0 {
            return Err(EngineError::protocol("destroying an account not opened for edit"));
        }
        if !acct.splits.is_empty() {
            return Err(EngineError::invariant("destroying an account that still has splits"));
        }
        if !acct.children.is_empty() {
            return Err(EngineError::invariant("destroying an account that still has children"));
        }
        if account == self.root {
            return Err(EngineError::invariant("the root account cannot be destroyed"));
        }
        let parent = acct.parent;
        if let Some(parent) = parent {
            self.account_mut(parent)?.children.retain(|c| *c != account);
        }
        self.accounts.remove(&account);
        Ok(())
    }

    /// Move an account subtree here from another book: destroy-and-recreate
    /// semantics, producing fresh ids in this book. Refuses subtrees that
    /// still own splits, since transactions do not move with them.
    pub fn graft_account(
        &mut self,
        source: &mut Book,
        account: AccountId,
        new_parent: AccountId,
    ) -> EngineResult<AccountId> {
        self.account(new_parent)?;
        let subtree: Vec<AccountId> = {
            let mut ids = vec![account];
            ids.extend(source.descendants(account)?);
            ids
        };
        for id in &subtree {
            if !source.account(*id)?.splits.is_empty() {
                return Err(EngineError::invariant(
                    "cross-book move of an account that still has splits",
                ));
            }
        }

        fn copy_into(
            dest: &mut Book,
            source: &Book,
            src_id: AccountId,
            dest_parent: AccountId,
        ) -> EngineResult<AccountId> {
            let src = source.account(src_id)?.clone();
            let commodity = match src.commodity {
                Some(cid) => {
                    let c = source
                        .commodities
                        .get(cid)
                        .ok_or_else(|| EngineError::invariant("account commodity missing from table"))?;
                    // Insert dedupes by identity key within the target book.
                    Some(dest.commodities.insert(c.clone()))
                }
                None => None,
            };
            let new_id = dest.new_account(&src.name, src.acct_type, commodity);
            {
                let acct = dest.account_mut(new_id)?;
                acct.code = src.code;
                acct.description = src.description;
                acct.notes = src.notes;
                acct.commodity_scu = src.commodity_scu;
                acct.non_std_scu = src.non_std_scu;
                acct.placeholder = src.placeholder;
                acct.hidden = src.hidden;
            }
            dest.append_child(dest_parent, new_id)?;
            for child in source.account(src_id)?.children.clone() {
                copy_into(dest, source, child, new_id)?;
            }
            Ok(new_id)
        }

        let new_root = copy_into(self, source, account, new_parent)?;

        // Remove the subtree from the source, leaves first.
        if let Some(parent) = source.account(account)?.parent {
            source.account_mut(parent)?.children.retain(|c| *c != account);
        }
        for id in subtree.iter().rev() {
            source.accounts.remove(id);
        }
        debug!(%account, %new_root, "grafted account subtree across books");
        Ok(new_root)
    }

    // ------------------------------------------------------------------
    // Split <-> account membership
    // ------------------------------------------------------------------

    /// Create a fresh split, parented to nothing.
    pub fn new_split(&mut self) -> SplitId {
        let split = Split::new();
        let id = split.id();
        self.splits.insert(id, split);
        id
    }

    /// Insert a split into an account's split list, detaching it from any
    /// previous account. Returns `false` (not an error) when the split is
    /// already present.
    pub fn insert_split(&mut self, account: AccountId, split: SplitId) -> EngineResult<bool> {
        self.account(account)?;
        let old = self.split(split)?.account;
        if self.account(account)?.splits.contains(&split) {
            return Ok(false);
        }
        if let Some(old_id) = old {
            let old_acct = self.account_mut(old_id)?;
            old_acct.splits.retain(|s| *s != split);
            old_acct.balance_dirty = true;
            old_acct.sort_dirty = true;
        }
        let acct = self.account_mut(account)?;
        acct.splits.push(split);
        acct.balance_dirty = true;
        acct.sort_dirty = true;
        self.splits
            .get_mut(&split)
            .expect("checked above")
            .account = Some(account);
        Ok(true)
    }

    /// Remove a split from an account's split list. Returns `false` when it
    /// was not present.
    pub fn remove_split(&mut self, account: AccountId, split: SplitId) -> EngineResult<bool> {
        let acct = self.account_mut(account)?;
        let before = acct.splits.len();
        acct.splits.retain(|s| *s != split);
        if acct.splits.len() == before {
            return Ok(false);
        }
        acct.balance_dirty = true;
        acct.sort_dirty = true;
        if let Some(s) = self.splits.get_mut(&split)
            && s.account == Some(account)
        {
            s.account = None;
        }
        Ok(true)
    }

    /// `insert_split` under its traditional name.
    pub fn set_split_account(&mut self, split: SplitId, account: AccountId) -> EngineResult<bool> {
        self.insert_split(account, split)
    }

    /// Parent a split to a transaction (which must be open for edit),
    /// detaching it from any previous transaction, whose edit bracket must
    /// also be open.
    pub fn set_split_parent(&mut self, split: SplitId, txn: TransactionId) -> EngineResult<()> {
        self.require_open(txn)?;
        let old = self.split(split)?.transaction;
        if old == Some(txn) {
            return Ok(());
        }
        if let Some(old_id) = old {
            self.require_open(old_id)?;
            let old_txn = self.transactions.get_mut(&old_id).expect("checked above");
            old_txn.splits.retain(|s| *s != split);
            if old_txn.edit.balancing == Some(split) {
                old_txn.edit.balancing = None;
            }
        }
        self.transactions
            .get_mut(&txn)
            .expect("require_open checked existence")
            .splits
            .push(split);
        self.splits.get_mut(&split).expect("checked above").transaction = Some(txn);
        Ok(())
    }

    /// Free split metadata setters; these do not affect balances.
    pub fn set_split_memo(&mut self, split: SplitId, memo: &str) -> EngineResult<()> {
        self.split_mut(split)?.memo = memo.to_owned();
        Ok(())
    }

    pub fn set_split_action(&mut self, split: SplitId, action: &str) -> EngineResult<()> {
        self.split_mut(split)?.action = action.to_owned();
        Ok(())
    }

    /// Reconciliation affects the cleared/reconciled balance caches.
    pub fn set_split_reconcile_state(
        &mut self,
        split: SplitId,
        state: ReconcileState,
    ) -> EngineResult<()> {
        let account = {
            let s = self.split_mut(split)?;
            s.reconcile_state = state;
            s.account
        };
        if let Some(account) = account {
            self.account_mut(account)?.balance_dirty = true;
        }
        Ok(())
    }

    pub fn set_split_reconcile_date(
        &mut self,
        split: SplitId,
        date: Option<Time64>,
    ) -> EngineResult<()> {
        self.split_mut(split)?.reconcile_date = date;
        Ok(())
    }

    fn split_mut(&mut self, id: SplitId) -> EngineResult<&mut Split> {
        self.splits.get_mut(&id).ok_or(EngineError::NotFound)
    }

    // ------------------------------------------------------------------
    // Amount / value setters (protocol-gated, balance-maintaining)
    // ------------------------------------------------------------------

    /// SCU in effect for an account: the explicit override when flagged,
    /// otherwise the commodity's own fraction.
    pub fn account_scu(&self, account: AccountId) -> EngineResult<i64> {
        let acct = self.account(account)?;
        if acct.non_std_scu && acct.commodity_scu > 0 {
            return Ok(acct.commodity_scu);
        }
        Ok(acct
            .commodity
            .and_then(|c| self.commodities.get(c))
            .map(|c| c.fraction)
            .unwrap_or(DEFAULT_SCU))
    }

    fn currency_scu(&self, txn: &Transaction) -> Option<i64> {
        txn.currency
            .and_then(|c| self.commodities.get(c))
            .map(|c| c.fraction)
    }

    /// Set the split's amount, denominated in its account's commodity.
    ///
    /// The amount is re-expressed at the account SCU with banker's
    /// rounding. When the account commodity is the transaction currency the
    /// value is kept equal to the amount and the transaction is rebalanced.
    pub fn set_split_amount(&mut self, split: SplitId, amount: Numeric) -> EngineResult<()> {
        amount.check().map_err(numeric_arg)?;
        let txn_id = self.parent_for_mutation(split)?;
        let (account, same_commodity) = self.split_commodity_context(split, txn_id)?;
        let rounded = match account {
            Some(acct) => {
                let scu = self.account_scu(acct)?;
                amount
                    .convert(Denom::Fixed(scu), Round::Bankers)
                    .map_err(numeric_arg)?
            }
            None => amount,
        };
        self.split_mut(split)?.amount = rounded;
        if let Some(acct) = account {
            self.account_mut(acct)?.balance_dirty = true;
        }
        if same_commodity {
            self.apply_value_change(txn_id, split, rounded)?;
        } else {
            self.transactions
                .get_mut(&txn_id)
                .expect("parent checked")
                .edit
                .balancing = Some(split);
        }
        Ok(())
    }

    /// Set the split's value, denominated in the transaction's currency.
    ///
    /// The value is re-expressed at the currency SCU. When the account
    /// commodity equals the transaction currency the amount follows the
    /// value. A designated balancing split absorbs the change so the
    /// transaction stays balanced when at all possible.
    pub fn set_split_value(&mut self, split: SplitId, value: Numeric) -> EngineResult<()> {
        value.check().map_err(numeric_arg)?;
        let txn_id = self.parent_for_mutation(split)?;
        let (account, same_commodity) = self.split_commodity_context(split, txn_id)?;
        let rounded = self.round_to_currency(txn_id, value)?;
        if same_commodity {
            let amount = match account {
                Some(acct) => {
                    let scu = self.account_scu(acct)?;
                    rounded
                        .convert(Denom::Fixed(scu), Round::Bankers)
                        .map_err(numeric_arg)?
                }
                None => rounded,
            };
            self.split_mut(split)?.amount = amount;
        }
        if let Some(acct) = account {
            self.account_mut(acct)?.balance_dirty = true;
        }
        self.apply_value_change(txn_id, split, rounded)?;
        Ok(())
    }

    /// Set share price and share count together, updating the value with a
    /// single rebalancing pass.
    pub fn set_split_share_price_and_amount(
        &mut self,
        split: SplitId,
        price: Numeric,
        amount: Numeric,
    ) -> EngineResult<()> {
        price.check().map_err(numeric_arg)?;
        amount.check().map_err(numeric_arg)?;
        let txn_id = self.parent_for_mutation(split)?;
        let (account, _) = self.split_commodity_context(split, txn_id)?;
        let rounded_amount = match account {
            Some(acct) => {
                let scu = self.account_scu(acct)?;
                amount
                    .convert(Denom::Fixed(scu), Round::Bankers)
                    .map_err(numeric_arg)?
            }
            None => amount,
        };
        let value = rounded_amount
            .mul(&price, Denom::Reduce, Round::Never)
            .map_err(numeric_arg)?;
        let value = self.round_to_currency(txn_id, value)?;
        self.split_mut(split)?.amount = rounded_amount;
        if let Some(acct) = account {
            self.account_mut(acct)?.balance_dirty = true;
        }
        self.apply_value_change(txn_id, split, value)?;
        Ok(())
    }

    fn round_to_currency(&self, txn: TransactionId, value: Numeric) -> EngineResult<Numeric> {
        match self.currency_scu(self.transaction(txn)?) {
            Some(scu) => value
                .convert(Denom::Fixed(scu), Round::Bankers)
                .map_err(numeric_arg),
            None => Ok(value.reduce()),
        }
    }

    /// The split's parent transaction, verified open and mutable.
    fn parent_for_mutation(&self, split: SplitId) -> EngineResult<TransactionId> {
        let txn_id = self
            .split(split)?
            .transaction
            .ok_or_else(|| EngineError::protocol("split has no parent transaction"))?;
        self.require_open(txn_id)?;
        Ok(txn_id)
    }

    /// `(account, account commodity == transaction currency)`.
    fn split_commodity_context(
        &self,
        split: SplitId,
        txn: TransactionId,
    ) -> EngineResult<(Option<AccountId>, bool)> {
        let account = self.split(split)?.account;
        let currency = self.transaction(txn)?.currency;
        let same = match (account, currency) {
            (Some(acct), Some(cur)) => self.account(acct)?.commodity == Some(cur),
            // With no commodity information, treat amount and value as the
            // same number.
            _ => true,
        };
        Ok((account, same))
    }

    /// Store the new value on `split`, then push the delta onto the
    /// designated balancing split. If no other split can absorb it the
    /// transaction is simply left imbalanced, which `is_balanced` reports.
    fn apply_value_change(
        &mut self,
        txn_id: TransactionId,
        split: SplitId,
        new_value: Numeric,
    ) -> EngineResult<()> {
        let old_value = self.split(split)?.value;
        self.split_mut(split)?.value = new_value;

        let delta = match new_value.sub(&old_value, Denom::Reduce, Round::Never) {
            Ok(d) => d,
            Err(err) => {
                warn!(%txn_id, %split, ?err, "value delta overflowed; leaving imbalanced");
                return Ok(());
            }
        };
        let txn = self.transaction(txn_id)?;
        let candidate = txn
            .edit
            .balancing
            .filter(|b| *b != split && txn.splits.contains(b))
            .or_else(|| txn.splits.iter().rev().find(|s| **s != split).copied());
        self.transactions
            .get_mut(&txn_id)
            .expect("parent checked")
            .edit
            .balancing = Some(split);

        let Some(candidate) = candidate else {
            return Ok(());
        };
        if delta.is_zero() {
            return Ok(());
        }

        let cand_value = self.split(candidate)?.value;
        let adjusted = match cand_value.sub(&delta, Denom::Reduce, Round::Never) {
            Ok(v) => v,
            Err(err) => {
                warn!(%txn_id, %candidate, ?err, "balancing adjustment overflowed");
                return Ok(());
            }
        };
        let adjusted = self.round_to_currency(txn_id, adjusted)?;
        let (cand_account, same) = self.split_commodity_context(candidate, txn_id)?;
        {
            let s = self.split_mut(candidate)?;
            s.value = adjusted;
            if same {
                s.amount = adjusted;
            }
        }
        if let Some(acct) = cand_account {
            self.account_mut(acct)?.balance_dirty = true;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transaction lifecycle and edit protocol
    // ------------------------------------------------------------------

    pub fn new_transaction(&mut self, currency: Option<CommodityId>) -> TransactionId {
        let txn = Transaction::new(currency, date::now());
        let id = txn.id();
        self.transactions.insert(id, txn);
        id
    }

    /// Enter (or re-enter) the edit bracket. The first `begin_edit`
    /// snapshots the transaction and its splits for rollback.
    pub fn begin_edit(&mut self, txn: TransactionId) -> EngineResult<()> {
        let t = self.transaction(txn)?;
        if t.is_voided() {
            return Err(EngineError::protocol("editing a voided transaction"));
        }
        if let Some(reason) = &t.read_only_reason {
            return Err(EngineError::protocol(format!("transaction is read-only: {reason}")));
        }
        if t.edit.depth == 0 {
            let snapshot = Snapshot {
                txn: Box::new(Transaction { edit: EditState::default(), ..t.clone() }),
                splits: t
                    .splits
                    .iter()
                    .map(|s| self.split(*s).cloned())
                    .collect::<EngineResult<Vec<_>>>()?,
            };
            let t = self.transactions.get_mut(&txn).expect("checked above");
            t.edit.depth = 1;
            t.edit.snapshot = Some(snapshot);
            debug!(%txn, "begin edit");
        } else {
            self.transactions.get_mut(&txn).expect("checked above").edit.depth += 1;
        }
        Ok(())
    }

    /// Leave the edit bracket. Only the outermost commit finalizes: it
    /// resolves a staged destroy, marks touched accounts for lazy re-sort
    /// and balance recomputation, and discards the rollback snapshot.
    /// Imbalance is not an error here, only a queryable state.
    pub fn commit_edit(&mut self, txn: TransactionId) -> EngineResult<()> {
        let t = self
            .transactions
            .get_mut(&txn)
            .ok_or(EngineError::NotFound)?;
        if t.edit.depth == 0 {
            return Err(EngineError::protocol("commit without matching begin"));
        }
        t.edit.depth -= 1;
        if t.edit.depth > 0 {
            return Ok(());
        }
        if t.edit.pending_destroy {
            debug!(%txn, "committing staged destroy");
            return self.finalize_destroy(txn);
        }
        t.edit.snapshot = None;
        t.edit.balancing = None;
        let member_splits = t.splits.clone();
        for split in member_splits {
            if let Some(acct) = self.splits.get(&split).and_then(|s| s.account)
                && let Some(a) = self.accounts.get_mut(&acct)
            {
                a.sort_dirty = true;
            }
        }
        let residual = self.imbalance_value(txn)?;
        if !residual.is_zero() {
            warn!(%txn, %residual, "transaction committed imbalanced");
        }
        debug!(%txn, "commit edit");
        Ok(())
    }

    /// Abandon the edit bracket entirely, restoring the transaction, its
    /// splits, and the touched accounts' membership to the pre-begin
    /// snapshot. Works from any nesting depth and undoes a staged destroy.
    pub fn rollback_edit(&mut self, txn: TransactionId) -> EngineResult<()> {
        let t = self.transaction(txn)?;
        if t.edit.depth == 0 {
            return Err(EngineError::protocol("rollback without matching begin"));
        }
        let snapshot = self
            .transactions
            .get_mut(&txn)
            .expect("checked above")
            .edit
            .snapshot
            .take()
            .ok_or_else(|| EngineError::protocol("edit bracket has no snapshot"))?;

        // Drop every current member split; the snapshot recreates the old
        // membership from whole-split copies.
        let current: Vec<SplitId> = self.transaction(txn)?.splits.clone();
        for split in current {
            if let Some(acct) = self.splits.get(&split).and_then(|s| s.account)
                && let Some(a) = self.accounts.get_mut(&acct)
            {
                a.splits.retain(|s| *s != split);
                a.balance_dirty = true;
                a.sort_dirty = true;
            }
            self.splits.remove(&split);
        }
        for split in snapshot.splits {
            let id = split.id();
            if let Some(acct) = split.account
                && let Some(a) = self.accounts.get_mut(&acct)
            {
                if !a.splits.contains(&id) {
                    a.splits.push(id);
                }
                a.balance_dirty = true;
                a.sort_dirty = true;
            }
            self.splits.insert(id, split);
        }
        *self.transactions.get_mut(&txn).expect("checked above") = *snapshot.txn;
        debug!(%txn, "rolled back edit");
        Ok(())
    }

    /// Destroy a transaction and its splits. Outside an edit bracket the
    /// destroy is committed immediately; inside one it is staged, finalized
    /// by the outermost commit, and fully undone by rollback.
    pub fn destroy_transaction(&mut self, txn: TransactionId) -> EngineResult<()> {
        let t = self
            .transactions
            .get_mut(&txn)
            .ok_or(EngineError::NotFound)?;
        if t.edit.depth > 0 {
            t.edit.pending_destroy = true;
            return Ok(());
        }
        self.finalize_destroy(txn)
    }

    fn finalize_destroy(&mut self, txn: TransactionId) -> EngineResult<()> {
        let splits = self.transaction(txn)?.splits.clone();
        for split in splits {
            if let Some(acct) = self.splits.get(&split).and_then(|s| s.account)
                && let Some(a) = self.accounts.get_mut(&acct)
            {
                a.splits.retain(|s| *s != split);
                a.balance_dirty = true;
                a.sort_dirty = true;
            }
            self.splits.remove(&split);
        }
        self.transactions.remove(&txn);
        debug!(%txn, "destroyed transaction");
        Ok(())
    }

    /// Remove one split from its transaction (which must be open) and its
    /// account, and free it.
    pub fn destroy_split(&mut self, split: SplitId) -> EngineResult<()> {
        let txn_id = self.parent_for_mutation(split)?;
        let t = self.transactions.get_mut(&txn_id).expect("parent checked");
        t.splits.retain(|s| *s != split);
        if t.edit.balancing == Some(split) {
            t.edit.balancing = None;
        }
        if let Some(acct) = self.splits.get(&split).and_then(|s| s.account)
            && let Some(a) = self.accounts.get_mut(&acct)
        {
            a.splits.retain(|s| *s != split);
            a.balance_dirty = true;
            a.sort_dirty = true;
        }
        self.splits.remove(&split);
        Ok(())
    }

    fn require_open(&self, txn: TransactionId) -> EngineResult<()> {
        let t = self.transaction(txn)?;
        if t.edit.depth == 0 {
            return Err(EngineError::protocol("mutating a transaction outside begin/commit"));
        }
        Ok(())
    }

    fn open_txn_mut(&mut self, txn: TransactionId) -> EngineResult<&mut Transaction> {
        self.require_open(txn)?;
        Ok(self.transactions.get_mut(&txn).expect("require_open checked existence"))
    }

    // ------------------------------------------------------------------
    // Transaction field setters (require an open bracket)
    // ------------------------------------------------------------------

    pub fn set_txn_currency(&mut self, txn: TransactionId, currency: CommodityId) -> EngineResult<()> {
        self.open_txn_mut(txn)?.currency = Some(currency);
        Ok(())
    }

    pub fn set_txn_num(&mut self, txn: TransactionId, num: &str) -> EngineResult<()> {
        self.open_txn_mut(txn)?.num = num.to_owned();
        Ok(())
    }

    pub fn set_txn_description(&mut self, txn: TransactionId, desc: &str) -> EngineResult<()> {
        self.open_txn_mut(txn)?.description = desc.to_owned();
        Ok(())
    }

    pub fn set_txn_notes(&mut self, txn: TransactionId, notes: &str) -> EngineResult<()> {
        self.open_txn_mut(txn)?.notes = notes.to_owned();
        Ok(())
    }

    pub fn set_txn_doc_link(&mut self, txn: TransactionId, doc_link: &str) -> EngineResult<()> {
        self.open_txn_mut(txn)?.doc_link = doc_link.to_owned();
        Ok(())
    }

    pub fn set_txn_type(&mut self, txn: TransactionId, txn_type: TxnType) -> EngineResult<()> {
        self.open_txn_mut(txn)?.txn_type = txn_type;
        Ok(())
    }

    pub fn set_txn_is_closing(&mut self, txn: TransactionId, is_closing: bool) -> EngineResult<()> {
        self.open_txn_mut(txn)?.is_closing = is_closing;
        Ok(())
    }

    pub fn set_txn_date_posted(&mut self, txn: TransactionId, posted: Time64) -> EngineResult<()> {
        self.open_txn_mut(txn)?.date_posted = posted;
        Ok(())
    }

    /// Posted date from a calendar date, normalized to the start of day.
    pub fn set_txn_date(&mut self, txn: TransactionId, d: chrono::NaiveDate) -> EngineResult<()> {
        self.set_txn_date_posted(txn, date::date_to_seconds(d))
    }

    pub fn set_txn_date_entered(&mut self, txn: TransactionId, entered: Time64) -> EngineResult<()> {
        self.open_txn_mut(txn)?.date_entered = entered;
        Ok(())
    }

    pub fn set_txn_date_due(&mut self, txn: TransactionId, due: Option<Time64>) -> EngineResult<()> {
        self.open_txn_mut(txn)?.date_due = due;
        Ok(())
    }

    /// Mark read-only; subsequent `begin_edit` fails until cleared.
    pub fn set_txn_read_only(&mut self, txn: TransactionId, reason: &str) -> EngineResult<()> {
        self.transactions
            .get_mut(&txn)
            .ok_or(EngineError::NotFound)?
            .read_only_reason = Some(reason.to_owned());
        Ok(())
    }

    pub fn clear_txn_read_only(&mut self, txn: TransactionId) -> EngineResult<()> {
        self.transactions
            .get_mut(&txn)
            .ok_or(EngineError::NotFound)?
            .read_only_reason = None;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Voiding
    // ------------------------------------------------------------------

    /// Void a transaction: zero its splits for balance purposes while
    /// preserving the originals recoverably. Rejected mid-edit.
    pub fn void_transaction(&mut self, txn: TransactionId, reason: &str) -> EngineResult<()> {
        let t = self.transaction(txn)?;
        if t.is_open() {
            return Err(EngineError::protocol("voiding a transaction mid-edit"));
        }
        if t.is_voided() {
            return Err(EngineError::conflict("transaction is already voided"));
        }
        let member_splits = t.splits.clone();
        let mut original = Vec::with_capacity(member_splits.len());
        for split in member_splits {
            let s = self.split_mut(split)?;
            original.push((split, s.amount, s.value));
            s.amount = Numeric::zero();
            s.value = Numeric::zero();
            s.reconcile_state = ReconcileState::Voided;
            let account = s.account;
            if let Some(acct) = account {
                self.account_mut(acct)?.balance_dirty = true;
            }
        }
        let t = self.transactions.get_mut(&txn).expect("checked above");
        t.void = Some(VoidInfo { reason: reason.to_owned(), time: date::now(), original });
        debug!(%txn, reason, "voided transaction");
        Ok(())
    }

    /// Undo a void, restoring the preserved amounts and values.
    pub fn unvoid_transaction(&mut self, txn: TransactionId) -> EngineResult<()> {
        let info = self
            .transactions
            .get_mut(&txn)
            .ok_or(EngineError::NotFound)?
            .void
            .take()
            .ok_or_else(|| EngineError::conflict("transaction is not voided"))?;
        for (split, amount, value) in info.original {
            let s = self.split_mut(split)?;
            s.amount = amount;
            s.value = value;
            s.reconcile_state = ReconcileState::NotReconciled;
            let account = s.account;
            if let Some(acct) = account {
                self.account_mut(acct)?.balance_dirty = true;
            }
        }
        debug!(%txn, "unvoided transaction");
        Ok(())
    }

    /// Create a transaction that reverses this one: same accounts, negated
    /// amounts and values, linked through `reversed_by`.
    pub fn reverse_transaction(&mut self, txn: TransactionId) -> EngineResult<TransactionId> {
        let original = self.transaction(txn)?;
        if original.reversed_by.is_some() {
            return Err(EngineError::conflict("transaction already reversed"));
        }
        let currency = original.currency;
        let description = original.description.clone();
        let member_splits = original.splits.clone();

        let rev = self.new_transaction(currency);
        self.begin_edit(rev)?;
        self.set_txn_description(rev, &description)?;
        for split in member_splits {
            let (account, amount, value, memo) = {
                let s = self.split(split)?;
                (s.account, s.amount, s.value, s.memo.clone())
            };
            let new_split = self.new_split();
            if let Some(acct) = account {
                self.insert_split(acct, new_split)?;
            }
            self.set_split_parent(new_split, rev)?;
            self.set_split_memo(new_split, &memo)?;
            {
                let s = self.split_mut(new_split)?;
                s.amount = amount.neg();
                s.value = value.neg();
            }
            if let Some(acct) = account {
                self.account_mut(acct)?.balance_dirty = true;
            }
        }
        self.commit_edit(rev)?;
        self.transactions
            .get_mut(&txn)
            .expect("checked above")
            .reversed_by = Some(rev);
        Ok(rev)
    }

    // ------------------------------------------------------------------
    // Transaction queries
    // ------------------------------------------------------------------

    /// Sum of split values in the transaction's currency. Zero when the
    /// transaction is balanced; an error-flagged value if the fold
    /// overflows.
    pub fn imbalance_value(&self, txn: TransactionId) -> EngineResult<Numeric> {
        let t = self.transaction(txn)?;
        let mut sum = Numeric::zero();
        for split in &t.splits {
            let value = self.split(*split)?.value;
            sum = match sum.add(&value, Denom::Reduce, Round::Never) {
                Ok(s) => s,
                Err(err) => return Ok(Numeric::error(err)),
            };
        }
        Ok(sum)
    }

    /// Per-commodity residuals: amounts grouped by each split's account
    /// commodity. When the amounts all cancel but the values do not (a
    /// price mismatch), the residual is reported in the transaction
    /// currency.
    pub fn imbalance(&self, txn: TransactionId) -> EngineResult<Vec<(CommodityId, Numeric)>> {
        let t = self.transaction(txn)?;
        let mut by_commodity: Vec<(CommodityId, Numeric)> = Vec::new();
        for split in &t.splits {
            let s = self.split(*split)?;
            let commodity = s
                .account
                .and_then(|a| self.accounts.get(&a))
                .and_then(|a| a.commodity)
                .or(t.currency);
            let Some(commodity) = commodity else { continue };
            match by_commodity.iter_mut().find(|(c, _)| *c == commodity) {
                Some((_, total)) => {
                    *total = total
                        .add(&s.amount, Denom::Reduce, Round::Never)
                        .unwrap_or(Numeric::error(cashbook_numeric::NumericError::Overflow));
                }
                None => by_commodity.push((commodity, s.amount)),
            }
        }
        by_commodity.retain(|(_, total)| !total.is_zero());
        if by_commodity.is_empty() {
            let residual = self.imbalance_value(txn)?;
            if !residual.is_zero()
                && let Some(currency) = t.currency
            {
                by_commodity.push((currency, residual));
            }
        }
        Ok(by_commodity)
    }

    pub fn is_balanced(&self, txn: TransactionId) -> EngineResult<bool> {
        Ok(self.imbalance_value(txn)?.is_zero())
    }

    /// Order the transaction's split list canonically.
    pub fn sort_txn_splits(&mut self, txn: TransactionId) -> EngineResult<()> {
        let mut splits = self.transaction(txn)?.splits.clone();
        splits.sort_by(|a, b| {
            crate::split::split_order(
                self.splits.get(a).expect("member split ids are live"),
                self.splits.get(b).expect("member split ids are live"),
            )
        });
        self.transactions.get_mut(&txn).expect("checked above").splits = splits;
        Ok(())
    }

    /// First split of the transaction posted to the given account.
    pub fn find_split_by_account(
        &self,
        txn: TransactionId,
        account: AccountId,
    ) -> EngineResult<Option<SplitId>> {
        let t = self.transaction(txn)?;
        for split in &t.splits {
            if self.split(*split)?.account == Some(account) {
                return Ok(Some(*split));
            }
        }
        Ok(None)
    }

    /// Sum of this transaction's split values posted to the account.
    pub fn txn_account_value(&self, txn: TransactionId, account: AccountId) -> EngineResult<Numeric> {
        self.txn_account_sum(txn, account, |s| s.value)
    }

    /// Sum of this transaction's split amounts posted to the account.
    pub fn txn_account_amount(&self, txn: TransactionId, account: AccountId) -> EngineResult<Numeric> {
        self.txn_account_sum(txn, account, |s| s.amount)
    }

    fn txn_account_sum(
        &self,
        txn: TransactionId,
        account: AccountId,
        field: impl Fn(&Split) -> Numeric,
    ) -> EngineResult<Numeric> {
        let t = self.transaction(txn)?;
        let mut sum = Numeric::zero();
        for split in &t.splits {
            let s = self.split(*split)?;
            if s.account == Some(account) {
                sum = match sum.add(&field(s), Denom::Reduce, Round::Never) {
                    Ok(v) => v,
                    Err(err) => return Ok(Numeric::error(err)),
                };
            }
        }
        Ok(sum)
    }
}

fn numeric_arg(err: cashbook_numeric::NumericError) -> EngineError {
    EngineError::validation(format!("numeric: {err}"))
}
