//! Transactions: balanced groups of splits with an edit protocol.

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use cashbook_core::{CommodityId, SplitId, Time64, TransactionId};
use cashbook_numeric::Numeric;

use crate::split::Split;

/// Business class of a transaction, encoded as a single character for
/// interchange: none, invoice, payment, or link.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnType {
    #[default]
    None,
    Invoice,
    Payment,
    Link,
}

impl TxnType {
    pub fn as_char(self) -> char {
        match self {
            TxnType::None => '\0',
            TxnType::Invoice => 'I',
            TxnType::Payment => 'P',
            TxnType::Link => 'L',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '\0' => Some(TxnType::None),
            'I' => Some(TxnType::Invoice),
            'P' => Some(TxnType::Payment),
            'L' => Some(TxnType::Link),
            _ => None,
        }
    }
}

/// What a void preserved, so it can be undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct VoidInfo {
    pub reason: String,
    pub time: Time64,
    /// `(split, amount, value)` triples as they were before zeroing.
    pub original: Vec<(SplitId, Numeric, Numeric)>,
}

/// Pre-edit state captured by `begin_edit`, restored by `rollback_edit`.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub txn: Box<Transaction>,
    /// Full copies of every member split at begin time, including their
    /// account membership.
    pub splits: Vec<Split>,
}

/// Edit bracket bookkeeping. Never persisted: a stored book has no edits in
/// flight.
#[derive(Debug, Clone, Default)]
pub(crate) struct EditState {
    pub depth: u32,
    pub snapshot: Option<Snapshot>,
    pub pending_destroy: bool,
    /// The split most recently touched by a value setter; the next value
    /// change on a *different* split adjusts this one to keep the
    /// transaction balanced.
    pub balancing: Option<SplitId>,
}

/// A balanced group of splits.
///
/// All mutation happens through [`crate::Book`] inside a
/// `begin_edit`/`commit_edit` bracket; `rollback_edit` restores the
/// pre-begin snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub(crate) id: TransactionId,
    pub(crate) currency: Option<CommodityId>,
    pub(crate) date_posted: Time64,
    pub(crate) date_entered: Time64,
    pub(crate) date_due: Option<Time64>,
    pub(crate) num: String,
    pub(crate) description: String,
    pub(crate) doc_link: String,
    pub(crate) notes: String,
    pub(crate) txn_type: TxnType,
    pub(crate) splits: Vec<SplitId>,
    pub(crate) is_closing: bool,
    pub(crate) read_only_reason: Option<String>,
    pub(crate) void: Option<VoidInfo>,
    pub(crate) reversed_by: Option<TransactionId>,
    #[serde(skip)]
    pub(crate) edit: EditState,
}

impl Transaction {
    pub(crate) fn new(currency: Option<CommodityId>, now: Time64) -> Self {
        Self {
            id: TransactionId::new(),
            currency,
            date_posted: now,
            date_entered: now,
            date_due: None,
            num: String::new(),
            description: String::new(),
            doc_link: String::new(),
            notes: String::new(),
            txn_type: TxnType::None,
            splits: Vec::new(),
            is_closing: false,
            read_only_reason: None,
            void: None,
            reversed_by: None,
            edit: EditState::default(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn currency(&self) -> Option<CommodityId> {
        self.currency
    }

    pub fn date_posted(&self) -> Time64 {
        self.date_posted
    }

    pub fn date_entered(&self) -> Time64 {
        self.date_entered
    }

    pub fn date_due(&self) -> Option<Time64> {
        self.date_due
    }

    pub fn num(&self) -> &str {
        &self.num
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn doc_link(&self) -> &str {
        &self.doc_link
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn txn_type(&self) -> TxnType {
        self.txn_type
    }

    pub fn splits(&self) -> &[SplitId] {
        &self.splits
    }

    pub fn count_splits(&self) -> usize {
        self.splits.len()
    }

    pub fn still_has_split(&self, split: SplitId) -> bool {
        self.splits.contains(&split)
    }

    pub fn is_closing(&self) -> bool {
        self.is_closing
    }

    /// Currently inside a begin/commit bracket.
    pub fn is_open(&self) -> bool {
        self.edit.depth > 0
    }

    pub fn is_voided(&self) -> bool {
        self.void.is_some()
    }

    pub fn void_reason(&self) -> Option<&str> {
        self.void.as_ref().map(|v| v.reason.as_str())
    }

    pub fn void_time(&self) -> Option<Time64> {
        self.void.as_ref().map(|v| v.time)
    }

    pub fn read_only_reason(&self) -> Option<&str> {
        self.read_only_reason.as_deref()
    }

    pub fn reversed_by(&self) -> Option<TransactionId> {
        self.reversed_by
    }
}

/// Leading-digit prefix of `num` as an integer, for numeric comparison of
/// check numbers; non-numeric strings compare as zero.
fn num_as_integer(num: &str) -> i64 {
    let digits: String = num.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Canonical transaction order: posted date, num as integer, entered date,
/// description, then id as the final tiebreak. This exact chain makes
/// sorting deterministic.
pub fn trans_order(a: &Transaction, b: &Transaction) -> Ordering {
    a.date_posted
        .cmp(&b.date_posted)
        .then_with(|| num_as_integer(&a.num).cmp(&num_as_integer(&b.num)))
        .then_with(|| a.date_entered.cmp(&b.date_entered))
        .then_with(|| a.description.cmp(&b.description))
        .then_with(|| a.id.cmp(&b.id))
}
