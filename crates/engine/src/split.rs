//! Splits: the atomic debit/credit lines of a transaction.

use serde::{Deserialize, Serialize};

use cashbook_core::{AccountId, SplitId, Time64, TransactionId};
use cashbook_numeric::Numeric;

/// Reconciliation state of a split, with the classic single-character
/// encoding used for interchange.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileState {
    NotReconciled,
    Cleared,
    Reconciled,
    Frozen,
    Voided,
}

impl ReconcileState {
    pub fn as_char(self) -> char {
        match self {
            ReconcileState::NotReconciled => 'n',
            ReconcileState::Cleared => 'c',
            ReconcileState::Reconciled => 'y',
            ReconcileState::Frozen => 'f',
            ReconcileState::Voided => 'v',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'n' => Some(ReconcileState::NotReconciled),
            'c' => Some(ReconcileState::Cleared),
            'y' => Some(ReconcileState::Reconciled),
            'f' => Some(ReconcileState::Frozen),
            'v' => Some(ReconcileState::Voided),
            _ => None,
        }
    }

    /// Whether the split counts toward the cleared balance.
    pub fn is_cleared(self) -> bool {
        matches!(
            self,
            ReconcileState::Cleared | ReconcileState::Reconciled | ReconcileState::Frozen
        )
    }

    /// Whether the split counts toward the reconciled balance.
    pub fn is_reconciled(self) -> bool {
        matches!(self, ReconcileState::Reconciled | ReconcileState::Frozen)
    }
}

/// One leg of a transaction, posted to at most one account.
///
/// `amount` is denominated in the owning account's commodity; `value` in the
/// parent transaction's currency. All mutation goes through [`crate::Book`],
/// which maintains the back-reference invariants and the parent
/// transaction's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub(crate) id: SplitId,
    pub(crate) account: Option<AccountId>,
    pub(crate) transaction: Option<TransactionId>,
    pub(crate) amount: Numeric,
    pub(crate) value: Numeric,
    pub(crate) memo: String,
    pub(crate) action: String,
    pub(crate) reconcile_state: ReconcileState,
    pub(crate) reconcile_date: Option<Time64>,
}

impl Split {
    pub(crate) fn new() -> Self {
        Self {
            id: SplitId::new(),
            account: None,
            transaction: None,
            amount: Numeric::zero(),
            value: Numeric::zero(),
            memo: String::new(),
            action: String::new(),
            reconcile_state: ReconcileState::NotReconciled,
            reconcile_date: None,
        }
    }

    pub fn id(&self) -> SplitId {
        self.id
    }

    pub fn account(&self) -> Option<AccountId> {
        self.account
    }

    pub fn transaction(&self) -> Option<TransactionId> {
        self.transaction
    }

    pub fn amount(&self) -> Numeric {
        self.amount
    }

    pub fn value(&self) -> Numeric {
        self.value
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn reconcile_state(&self) -> ReconcileState {
        self.reconcile_state
    }

    pub fn reconcile_date(&self) -> Option<Time64> {
        self.reconcile_date
    }
}

/// Canonical order of splits inside one transaction: memo, action,
/// reconcile state, amount, value, then id as the final tiebreak.
pub fn split_order(a: &Split, b: &Split) -> core::cmp::Ordering {
    a.memo
        .cmp(&b.memo)
        .then_with(|| a.action.cmp(&b.action))
        .then_with(|| a.reconcile_state.as_char().cmp(&b.reconcile_state.as_char()))
        .then_with(|| a.amount.compare(&b.amount))
        .then_with(|| a.value.compare(&b.value))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_state_chars_round_trip() {
        for state in [
            ReconcileState::NotReconciled,
            ReconcileState::Cleared,
            ReconcileState::Reconciled,
            ReconcileState::Frozen,
            ReconcileState::Voided,
        ] {
            assert_eq!(ReconcileState::from_char(state.as_char()), Some(state));
        }
        assert_eq!(ReconcileState::from_char('x'), None);
    }

    #[test]
    fn cleared_and_reconciled_classification() {
        assert!(!ReconcileState::NotReconciled.is_cleared());
        assert!(ReconcileState::Cleared.is_cleared());
        assert!(!ReconcileState::Cleared.is_reconciled());
        assert!(ReconcileState::Reconciled.is_reconciled());
        assert!(ReconcileState::Frozen.is_reconciled());
        assert!(!ReconcileState::Voided.is_cleared());
    }
}
