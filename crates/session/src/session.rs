//! Sessions: the handle tying a book to a storage URI.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use cashbook_engine::Book;

use crate::store::{Progress, Store};

#[derive(Debug, Error)]
pub enum SessionError {
    /// Another session holds the lock on this URI.
    #[error("book at {0} is locked by another session")]
    Locked(String),

    /// `Normal`/`ReadOnly` open of a URI with nothing stored there.
    #[error("no book found at {0}")]
    NoSuchBook(String),

    /// `New` open of a URI that already has a book.
    #[error("a book already exists at {0}")]
    AlreadyExists(String),

    /// Write attempted through a read-only session.
    #[error("session is read-only")]
    ReadOnly,

    /// The backend failed.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// How to open a session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Load an existing book, taking the lock.
    Normal,
    /// Create a fresh book; the URI must be unoccupied.
    New,
    /// Create a fresh book, replacing whatever is stored on save.
    NewOverwrite,
    /// Load without taking the lock; saving is refused.
    ReadOnly,
    /// Load an existing book, stealing the lock from a crashed or stale
    /// holder.
    BreakLock,
}

/// An open book bound to a storage URI.
///
/// Dropping a session without calling [`Session::end`] leaks the advisory
/// lock, exactly like a crashed process would; `BreakLock` recovers from
/// that.
#[derive(Debug)]
pub struct Session<S: Store> {
    store: S,
    uri: String,
    mode: SessionMode,
    book: Book,
    locked: bool,
}

impl<S: Store> Session<S> {
    pub fn open(mut store: S, uri: &str, mode: SessionMode) -> Result<Self, SessionError> {
        Self::open_with_progress(&mut store, uri, mode, &mut |_| {}).map(|(book, locked)| Self {
            store,
            uri: uri.to_owned(),
            mode,
            book,
            locked,
        })
    }

    fn open_with_progress(
        store: &mut S,
        uri: &str,
        mode: SessionMode,
        progress: Progress<'_>,
    ) -> Result<(Book, bool), SessionError> {
        let book = match mode {
            SessionMode::Normal | SessionMode::ReadOnly | SessionMode::BreakLock => {
                if !store.exists(uri) {
                    return Err(SessionError::NoSuchBook(uri.to_owned()));
                }
                store.load(uri, progress)?
            }
            SessionMode::New => {
                if store.exists(uri) {
                    return Err(SessionError::AlreadyExists(uri.to_owned()));
                }
                Book::new()
            }
            SessionMode::NewOverwrite => Book::new(),
        };
        let locked = match mode {
            SessionMode::ReadOnly => false,
            SessionMode::BreakLock => {
                store.lock(uri, true)?;
                true
            }
            _ => {
                if !store.lock(uri, false)? {
                    return Err(SessionError::Locked(uri.to_owned()));
                }
                true
            }
        };
        info!(uri, ?mode, "opened session");
        Ok((book, locked))
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == SessionMode::ReadOnly
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut Book {
        &mut self.book
    }

    /// Write the book back to its URI.
    pub fn save(&mut self, progress: Progress<'_>) -> Result<(), SessionError> {
        if self.is_read_only() {
            return Err(SessionError::ReadOnly);
        }
        self.store.save(&self.uri, &self.book, progress)?;
        info!(uri = %self.uri, "saved book");
        Ok(())
    }

    /// Close the session, releasing the lock. Unsaved changes are dropped.
    pub fn end(mut self) {
        if self.locked {
            self.store.unlock(&self.uri);
        }
        info!(uri = %self.uri, "ended session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use cashbook_commodity::Commodity;
    use cashbook_engine::AccountType;
    use cashbook_numeric::Numeric;
    use cashbook_pricedb::{Price, PriceSource};

    fn no_progress() -> impl FnMut(f64) {
        |_| {}
    }

    #[test]
    fn new_save_reopen_round_trips_the_book() {
        let store = MemoryStore::new();
        let mut session = Session::open(store.clone(), "mem://books/a", SessionMode::New).unwrap();
        {
            let book = session.book_mut();
            let usd = book
                .commodities_mut()
                .insert(Commodity::currency("USD", "US Dollar", 100));
            let root = book.root_account();
            let acct = book.new_account("Checking", AccountType::Bank, Some(usd));
            book.append_child(root, acct).unwrap();

            let txn = book.new_transaction(Some(usd));
            book.begin_edit(txn).unwrap();
            let s1 = book.new_split();
            book.insert_split(acct, s1).unwrap();
            book.set_split_parent(s1, txn).unwrap();
            book.set_split_value(s1, Numeric::new(100, 1)).unwrap();
            book.commit_edit(txn).unwrap();

            let eur = book
                .commodities_mut()
                .insert(Commodity::currency("EUR", "Euro", 100));
            book.prices_mut().add_price(Price::new(
                usd,
                eur,
                1_700_000_000,
                Numeric::new(9, 10),
                PriceSource::UserPrice,
            ));
        }
        session.save(&mut no_progress()).unwrap();
        session.end();

        let mut session = Session::open(store, "mem://books/a", SessionMode::Normal).unwrap();
        assert_eq!(session.book().num_transactions(), 1);
        assert_eq!(session.book().commodities().len(), 2);
        assert_eq!(session.book().prices().num_prices(), 1);
        let root = session.book().root_account();
        let children = session.book().account(root).unwrap().children().to_vec();
        assert_eq!(children.len(), 1);
        let balance = session.book_mut().balance(children[0]).unwrap();
        assert!(balance.equal(&Numeric::new(100, 1)));
        session.end();
    }

    #[test]
    fn second_session_is_locked_out_until_the_first_ends() {
        let store = MemoryStore::new();
        let mut first = Session::open(store.clone(), "mem://books/b", SessionMode::New).unwrap();
        first.save(&mut no_progress()).unwrap();

        let err = Session::open(store.clone(), "mem://books/b", SessionMode::Normal).unwrap_err();
        assert!(matches!(err, SessionError::Locked(_)));

        first.end();
        let second = Session::open(store, "mem://books/b", SessionMode::Normal).unwrap();
        second.end();
    }

    #[test]
    fn break_lock_steals_a_stale_lock() {
        let store = MemoryStore::new();
        let mut first = Session::open(store.clone(), "mem://books/c", SessionMode::New).unwrap();
        first.save(&mut no_progress()).unwrap();
        // Simulate a crash: drop without end(), leaving the lock behind.
        drop(first);

        let err = Session::open(store.clone(), "mem://books/c", SessionMode::Normal).unwrap_err();
        assert!(matches!(err, SessionError::Locked(_)));

        let stolen = Session::open(store, "mem://books/c", SessionMode::BreakLock).unwrap();
        stolen.end();
    }

    #[test]
    fn read_only_sessions_cannot_save_and_take_no_lock() {
        let store = MemoryStore::new();
        let mut writer = Session::open(store.clone(), "mem://books/d", SessionMode::New).unwrap();
        writer.save(&mut no_progress()).unwrap();
        writer.end();

        let mut reader =
            Session::open(store.clone(), "mem://books/d", SessionMode::ReadOnly).unwrap();
        assert!(matches!(reader.save(&mut no_progress()), Err(SessionError::ReadOnly)));

        // The reader holds no lock, so a writer can open concurrently.
        let writer = Session::open(store, "mem://books/d", SessionMode::Normal).unwrap();
        writer.end();
        reader.end();
    }

    #[test]
    fn new_refuses_an_occupied_uri_but_overwrite_does_not() {
        let store = MemoryStore::new();
        let mut first = Session::open(store.clone(), "mem://books/e", SessionMode::New).unwrap();
        first.save(&mut no_progress()).unwrap();
        first.end();

        let err = Session::open(store.clone(), "mem://books/e", SessionMode::New).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyExists(_)));

        let fresh =
            Session::open(store, "mem://books/e", SessionMode::NewOverwrite).unwrap();
        assert_eq!(fresh.book().num_transactions(), 0);
        fresh.end();
    }

    #[test]
    fn normal_open_of_a_missing_uri_fails() {
        let store = MemoryStore::new();
        let err = Session::open(store, "mem://books/missing", SessionMode::Normal).unwrap_err();
        assert!(matches!(err, SessionError::NoSuchBook(_)));
    }

    #[test]
    fn progress_reports_start_and_finish() {
        let store = MemoryStore::new();
        let mut session = Session::open(store, "mem://books/f", SessionMode::New).unwrap();
        let mut reports = Vec::new();
        session.save(&mut |f| reports.push(f)).unwrap();
        assert_eq!(reports.first(), Some(&0.0));
        assert_eq!(reports.last(), Some(&1.0));
        session.end();
    }
}
