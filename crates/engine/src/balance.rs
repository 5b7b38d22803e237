//! Account balance computation.
//!
//! Plain/cleared/reconciled balances are cached on the account and
//! recomputed lazily when the dirty flag is set, unless recomputation is
//! deferred (bulk loads set the defer flag, then clear it once at the end).
//! Date-bounded and currency-converted balances are computed on demand and
//! never cached.

use chrono::NaiveDate;
use tracing::trace;

use cashbook_core::{
    AccountId, CommodityId, EngineError, EngineResult, SplitId, Time64, TransactionId, date,
};
use cashbook_numeric::{Denom, Numeric, Round};

use crate::book::Book;
use crate::split::ReconcileState;
use crate::transaction::trans_order;

impl Book {
    /// Current balance: the sum of split amounts, in the account's
    /// commodity.
    pub fn balance(&mut self, account: AccountId) -> EngineResult<Numeric> {
        self.refresh_balance(account)?;
        Ok(self.account(account)?.balance)
    }

    /// Sum over splits in cleared, reconciled, or frozen state.
    pub fn cleared_balance(&mut self, account: AccountId) -> EngineResult<Numeric> {
        self.refresh_balance(account)?;
        Ok(self.account(account)?.cleared_balance)
    }

    /// Sum over splits in reconciled or frozen state.
    pub fn reconciled_balance(&mut self, account: AccountId) -> EngineResult<Numeric> {
        self.refresh_balance(account)?;
        Ok(self.account(account)?.reconciled_balance)
    }

    /// Suspend (or resume) cache recomputation. Resuming recomputes
    /// immediately when the cache went stale during the deferral.
    pub fn set_defer_bal_computation(&mut self, account: AccountId, defer: bool) -> EngineResult<()> {
        self.account_mut(account)?.defer_bal_computation = defer;
        if !defer {
            self.refresh_balance(account)?;
        }
        Ok(())
    }

    fn refresh_balance(&mut self, account: AccountId) -> EngineResult<()> {
        {
            let acct = self.account(account)?;
            if !acct.balance_dirty || acct.defer_bal_computation {
                return Ok(());
            }
        }
        let mut balance = Numeric::zero();
        let mut cleared = Numeric::zero();
        let mut reconciled = Numeric::zero();
        for split_id in self.account(account)?.splits.clone() {
            let split = self.split(split_id)?;
            let amount = split.amount;
            let state = split.reconcile_state;
            balance = accumulate(balance, &amount);
            if state.is_cleared() {
                cleared = accumulate(cleared, &amount);
            }
            if state.is_reconciled() {
                reconciled = accumulate(reconciled, &amount);
            }
        }
        let acct = self.account_mut(account)?;
        acct.balance = balance;
        acct.cleared_balance = cleared;
        acct.reconciled_balance = reconciled;
        acct.balance_dirty = false;
        trace!(%account, %balance, "recomputed balance cache");
        Ok(())
    }

    /// The account's splits in canonical register order: parent transaction
    /// order first, then split id. Re-sorts only when flagged stale.
    pub fn splits_sorted(&mut self, account: AccountId) -> EngineResult<Vec<SplitId>> {
        if self.account(account)?.sort_dirty {
            let mut splits = self.account(account)?.splits.clone();
            splits.sort_by(|a, b| {
                let ta = self.splits.get(a).and_then(|s| s.transaction);
                let tb = self.splits.get(b).and_then(|s| s.transaction);
                match (
                    ta.and_then(|t| self.transactions.get(&t)),
                    tb.and_then(|t| self.transactions.get(&t)),
                ) {
                    (Some(x), Some(y)) => trans_order(x, y).then_with(|| a.cmp(b)),
                    // Parentless splits sort to the end.
                    (Some(_), None) => core::cmp::Ordering::Less,
                    (None, Some(_)) => core::cmp::Ordering::Greater,
                    (None, None) => a.cmp(b),
                }
            });
            let acct = self.account_mut(account)?;
            acct.splits = splits;
            acct.sort_dirty = false;
        }
        Ok(self.account(account)?.splits.clone())
    }

    /// Balance including every split whose transaction is posted on or
    /// before the given date (the whole day counts).
    pub fn balance_as_of_date(&mut self, account: AccountId, d: NaiveDate) -> EngineResult<Numeric> {
        self.balance_through(account, date::date_end_seconds(d), |_| true)
    }

    /// As-of-date variant of [`Book::cleared_balance`].
    pub fn cleared_balance_as_of_date(
        &mut self,
        account: AccountId,
        d: NaiveDate,
    ) -> EngineResult<Numeric> {
        self.balance_through(account, date::date_end_seconds(d), ReconcileState::is_cleared)
    }

    /// As-of-date variant of [`Book::reconciled_balance`].
    pub fn reconciled_balance_as_of_date(
        &mut self,
        account: AccountId,
        d: NaiveDate,
    ) -> EngineResult<Numeric> {
        self.balance_through(account, date::date_end_seconds(d), ReconcileState::is_reconciled)
    }

    /// Balance as of the end of today.
    pub fn present_balance(&mut self, account: AccountId) -> EngineResult<Numeric> {
        self.balance_through(account, date::day_end(date::now()), |_| true)
    }

    fn balance_through(
        &mut self,
        account: AccountId,
        cutoff: Time64,
        keep: impl Fn(ReconcileState) -> bool,
    ) -> EngineResult<Numeric> {
        let mut sum = Numeric::zero();
        for split_id in self.splits_sorted(account)? {
            let split = self.split(split_id)?;
            let Some(txn) = split.transaction else { continue };
            if self.transaction(txn)?.date_posted > cutoff {
                // Sorted by posted date: nothing later can qualify.
                break;
            }
            let split = self.split(split_id)?;
            if keep(split.reconcile_state) {
                sum = accumulate(sum, &split.amount);
            }
        }
        Ok(sum)
    }

    /// Running balance of the account up to and including the given
    /// transaction, in register order.
    pub fn txn_account_balance(
        &mut self,
        txn: TransactionId,
        account: AccountId,
    ) -> EngineResult<Numeric> {
        self.transaction(txn)?;
        let mut sum = Numeric::zero();
        for split_id in self.splits_sorted(account)? {
            let split = self.split(split_id)?;
            let Some(owner) = split.transaction else { continue };
            let after = trans_order(self.transaction(owner)?, self.transaction(txn)?)
                == core::cmp::Ordering::Greater;
            if after {
                break;
            }
            sum = accumulate(sum, &self.split(split_id)?.amount);
        }
        Ok(sum)
    }

    /// Net change over `[t1, t2]`, optionally including all descendant
    /// accounts (each in its own commodity; callers wanting one currency
    /// should convert per account instead).
    pub fn balance_change_for_period(
        &mut self,
        account: AccountId,
        t1: Time64,
        t2: Time64,
        recurse: bool,
    ) -> EngineResult<Numeric> {
        let mut targets = vec![account];
        if recurse {
            targets.extend(self.descendants(account)?);
        }
        let mut sum = Numeric::zero();
        for target in targets {
            for split_id in self.account(target)?.splits.clone() {
                let split = self.split(split_id)?;
                let Some(txn) = split.transaction else { continue };
                let posted = self.transaction(txn)?.date_posted;
                if posted >= t1 && posted <= t2 {
                    sum = accumulate(sum, &self.split(split_id)?.amount);
                }
            }
        }
        Ok(sum)
    }

    /// The account balance re-expressed in another currency using the price
    /// database: the latest known rate, or the rate nearest `time` when one
    /// is given. Falls back to the inverted reverse-pair rate. Errors when
    /// no rate exists at all.
    pub fn balance_in_currency(
        &mut self,
        account: AccountId,
        currency: CommodityId,
        time: Option<Time64>,
    ) -> EngineResult<Numeric> {
        let balance = self.balance(account)?;
        self.convert_balance(account, balance, currency, time)
    }

    /// In-currency variant of [`Book::cleared_balance`].
    pub fn cleared_balance_in_currency(
        &mut self,
        account: AccountId,
        currency: CommodityId,
        time: Option<Time64>,
    ) -> EngineResult<Numeric> {
        let balance = self.cleared_balance(account)?;
        self.convert_balance(account, balance, currency, time)
    }

    /// In-currency variant of [`Book::reconciled_balance`].
    pub fn reconciled_balance_in_currency(
        &mut self,
        account: AccountId,
        currency: CommodityId,
        time: Option<Time64>,
    ) -> EngineResult<Numeric> {
        let balance = self.reconciled_balance(account)?;
        self.convert_balance(account, balance, currency, time)
    }

    /// In-currency variant of [`Book::present_balance`].
    pub fn present_balance_in_currency(
        &mut self,
        account: AccountId,
        currency: CommodityId,
        time: Option<Time64>,
    ) -> EngineResult<Numeric> {
        let balance = self.present_balance(account)?;
        self.convert_balance(account, balance, currency, time)
    }

    /// Sum of this account's and every descendant's balance, each converted
    /// into the target currency.
    pub fn balance_in_currency_recursive(
        &mut self,
        account: AccountId,
        currency: CommodityId,
        time: Option<Time64>,
    ) -> EngineResult<Numeric> {
        let mut targets = vec![account];
        targets.extend(self.descendants(account)?);
        let mut sum = Numeric::zero();
        for target in targets {
            let converted = self.balance_in_currency(target, currency, time)?;
            sum = sum
                .add(&converted, Denom::Reduce, Round::Never)
                .map_err(|e| EngineError::validation(format!("numeric: {e}")))?;
        }
        let fraction = self.currency_fraction(currency);
        sum.convert(Denom::Fixed(fraction), Round::Bankers)
            .map_err(|e| EngineError::validation(format!("numeric: {e}")))
    }

    fn convert_balance(
        &self,
        account: AccountId,
        balance: Numeric,
        currency: CommodityId,
        time: Option<Time64>,
    ) -> EngineResult<Numeric> {
        let commodity = self.account(account)?.commodity;
        if commodity.is_none() || commodity == Some(currency) {
            return Ok(balance);
        }
        let commodity = commodity.expect("checked above");
        let rate = match self.prices().rate(commodity, currency, time) {
            Some(price) => price.value,
            None => {
                // No direct quote: try the reverse pair and invert.
                let reverse = self
                    .prices()
                    .rate(currency, commodity, time)
                    .ok_or_else(|| {
                        EngineError::validation("no price available for currency conversion")
                    })?;
                reverse
                    .value
                    .invert()
                    .map_err(|e| EngineError::validation(format!("numeric: {e}")))?
            }
        };
        let fraction = self.currency_fraction(currency);
        balance
            .mul(&rate, Denom::Reduce, Round::Never)
            .and_then(|v| v.convert(Denom::Fixed(fraction), Round::Bankers))
            .map_err(|e| EngineError::validation(format!("numeric: {e}")))
    }

    fn currency_fraction(&self, currency: CommodityId) -> i64 {
        self.commodities().get(currency).map(|c| c.fraction).unwrap_or(100)
    }
}

/// Running-total accumulator: an overflow poisons the total with an error
/// value instead of aborting the walk.
fn accumulate(total: Numeric, amount: &Numeric) -> Numeric {
    match total.add(amount, Denom::Reduce, Round::Never) {
        Ok(v) => v,
        Err(err) => Numeric::error(err),
    }
}
