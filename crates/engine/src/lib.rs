//! The double-entry engine: books, accounts, transactions, and splits.
//!
//! A [`Book`] owns everything; entities refer to each other by id and all
//! mutation goes through book methods, which maintain the bidirectional
//! membership invariants and the transaction edit protocol.

pub mod account;
pub mod balance;
pub mod book;
pub mod split;
pub mod transaction;


pub use account::{Account, AccountType, account_order};
pub use book::{ACCOUNT_SEPARATOR, Book};
pub use split::{ReconcileState, Split, split_order};
pub use transaction::{Transaction, TxnType, trans_order};
