use crate::index::{SavePlan, UrlIndex};
use async_trait::async_trait;
use parking_lot::RwLock;
use snip_core::error::Result;
use snip_core::{ReadStore, ShortCode, Store, UrlRecord, UserId, UserUrl};
use tracing::{debug, trace};

/// In-memory implementation of the [`Store`] contract.
///
/// Both indices live behind one reader/writer lock, so the duplicate check
/// and the insert in [`save`][Store::save] happen in a single critical
/// section and two concurrent saves of the same URL cannot both win.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    index: RwLock<UrlIndex>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReadStore for InMemoryStore {
    async fn get(&self, code: &ShortCode) -> Result<String> {
        trace!(code = %code, "memory store get");
        self.index.read().get(code)
    }

    async fn get_by_original_url(&self, original_url: &str) -> Result<ShortCode> {
        self.index.read().get_by_original_url(original_url)
    }

    async fn get_all_by_user(&self, user: &UserId) -> Result<Vec<UserUrl>> {
        Ok(self.index.read().get_all_by_user(user))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save(
        &self,
        code: &ShortCode,
        original_url: &str,
        user: &UserId,
    ) -> Result<ShortCode> {
        let mut index = self.index.write();
        match index.plan_save(code, original_url)? {
            SavePlan::Existing(existing) => {
                debug!(code = %existing, "original url already stored");
                Ok(existing)
            }
            SavePlan::Insert => {
                index.apply(UrlRecord::new(code.clone(), original_url, user.clone()));
                debug!(code = %code, user_id = %user, "stored url");
                Ok(code.clone())
            }
        }
    }

    async fn batch_delete(&self, user: &UserId, codes: &[ShortCode]) -> Result<u64> {
        let mut index = self.index.write();
        let tombstones = index.tombstones_for(user, codes);
        let deleted = tombstones.len() as u64;
        for record in tombstones {
            index.apply(record);
        }
        debug!(user_id = %user, requested = codes.len(), deleted, "batch delete applied");
        Ok(deleted)
    }
}
