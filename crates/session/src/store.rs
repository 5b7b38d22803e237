//! Persistence backends.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use cashbook_engine::Book;

/// Fraction-complete callback reported during long loads and saves.
pub type Progress<'a> = &'a mut dyn FnMut(f64);

/// A place books are stored, addressed by URI.
///
/// Backends report failures as `anyhow` errors; the session layer wraps
/// them. Locking is advisory and per-URI: `lock` returns `false` when the
/// URI is already locked by someone else (unless asked to break it).
pub trait Store {
    fn exists(&self, uri: &str) -> bool;
    fn load(&mut self, uri: &str, progress: Progress<'_>) -> anyhow::Result<Book>;
    fn save(&mut self, uri: &str, book: &Book, progress: Progress<'_>) -> anyhow::Result<()>;
    fn lock(&mut self, uri: &str, break_existing: bool) -> anyhow::Result<bool>;
    fn unlock(&mut self, uri: &str);
}

#[derive(Debug, Default)]
struct MemoryInner {
    snapshots: HashMap<String, String>,
    locks: HashSet<String>,
}

/// In-memory backend holding JSON snapshots of books.
///
/// Cheaply cloneable; clones share the same underlying storage, so several
/// sessions can contend for the same URIs the way they would on a real
/// backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn exists(&self, uri: &str) -> bool {
        self.inner.lock().expect("store mutex poisoned").snapshots.contains_key(uri)
    }

    fn load(&mut self, uri: &str, progress: Progress<'_>) -> anyhow::Result<Book> {
        progress(0.0);
        let snapshot = {
            let inner = self.inner.lock().expect("store mutex poisoned");
            inner
                .snapshots
                .get(uri)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no book stored at {uri}"))?
        };
        let book = serde_json::from_str(&snapshot)?;
        progress(1.0);
        Ok(book)
    }

    fn save(&mut self, uri: &str, book: &Book, progress: Progress<'_>) -> anyhow::Result<()> {
        progress(0.0);
        let snapshot = serde_json::to_string(book)?;
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .snapshots
            .insert(uri.to_owned(), snapshot);
        progress(1.0);
        Ok(())
    }

    fn lock(&mut self, uri: &str, break_existing: bool) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if inner.locks.contains(uri) && !break_existing {
            return Ok(false);
        }
        inner.locks.insert(uri.to_owned());
        Ok(true)
    }

    fn unlock(&mut self, uri: &str) {
        self.inner.lock().expect("store mutex poisoned").locks.remove(uri);
    }
}
