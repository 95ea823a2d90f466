//! Store backends for the snip URL shortener.
//!
//! Three interchangeable implementations of [`Store`]: an in-memory store, an
//! append-only JSON-lines file store, and a MySQL store. All of them honor
//! the same dedup and soft-delete contract.

mod index;
pub mod file;
pub mod memory;
pub mod mysql;

pub use file::FileStore;
pub use memory::InMemoryStore;
pub use mysql::{MySqlSettings, MySqlStore};
pub use snip_core::{ReadStore, StorageError, Store};
