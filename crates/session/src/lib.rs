//! Sessions bind a [`cashbook_engine::Book`] to a storage URI: open under a
//! mode, edit, save, end. Locking is advisory and lives in the backend.

pub mod session;
pub mod store;

pub use session::{Session, SessionError, SessionMode};
pub use store::{MemoryStore, Progress, Store};
