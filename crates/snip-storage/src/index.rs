use snip_core::error::Result;
use snip_core::{ShortCode, StorageError, UrlRecord, UserId, UserUrl};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
struct Entry {
    record: UrlRecord,
    seq: u64,
}

/// Outcome of checking a save against the current index state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SavePlan {
    /// A live record already maps the URL; return its code.
    Existing(ShortCode),
    /// Nothing maps the URL and the code is free.
    Insert,
}

/// The two lookup indices shared by the in-memory and file stores.
///
/// `by_url` only ever points at live records.
#[derive(Debug, Default)]
pub(crate) struct UrlIndex {
    by_code: HashMap<ShortCode, Entry>,
    by_url: HashMap<String, ShortCode>,
    next_seq: u64,
}

impl UrlIndex {
    pub(crate) fn len(&self) -> usize {
        self.by_code.len()
    }

    pub(crate) fn get(&self, code: &ShortCode) -> Result<String> {
        match self.by_code.get(code) {
            None => Err(StorageError::NotFound(code.to_string())),
            Some(entry) if entry.record.deleted => Err(StorageError::Gone(code.to_string())),
            Some(entry) => Ok(entry.record.original_url.clone()),
        }
    }

    pub(crate) fn get_by_original_url(&self, original_url: &str) -> Result<ShortCode> {
        self.by_url
            .get(original_url)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(original_url.to_string()))
    }

    pub(crate) fn get_all_by_user(&self, user: &UserId) -> Vec<UserUrl> {
        let mut owned: Vec<&Entry> = self
            .by_code
            .values()
            .filter(|entry| entry.record.is_live() && entry.record.is_owned_by(user))
            .collect();
        owned.sort_by_key(|entry| entry.seq);
        owned.iter().map(|entry| entry.record.to_user_url()).collect()
    }

    pub(crate) fn plan_save(&self, code: &ShortCode, original_url: &str) -> Result<SavePlan> {
        if let Some(existing) = self.by_url.get(original_url) {
            return Ok(SavePlan::Existing(existing.clone()));
        }
        if self.by_code.contains_key(code) {
            return Err(StorageError::CodeTaken(code.to_string()));
        }
        Ok(SavePlan::Insert)
    }

    /// Returns tombstoned copies of the records `user` may delete among `codes`.
    pub(crate) fn tombstones_for(&self, user: &UserId, codes: &[ShortCode]) -> Vec<UrlRecord> {
        let mut seen = HashSet::new();
        codes
            .iter()
            .filter(|code| seen.insert(*code))
            .filter_map(|code| self.by_code.get(code))
            .filter(|entry| entry.record.is_live() && entry.record.is_owned_by(user))
            .map(|entry| UrlRecord {
                deleted: true,
                ..entry.record.clone()
            })
            .collect()
    }

    /// Applies a record, replacing any earlier state for the same code.
    pub(crate) fn apply(&mut self, record: UrlRecord) {
        if record.deleted {
            if self.by_url.get(&record.original_url) == Some(&record.short_code) {
                self.by_url.remove(&record.original_url);
            }
        } else {
            self.by_url
                .insert(record.original_url.clone(), record.short_code.clone());
        }

        match self.by_code.get_mut(&record.short_code) {
            Some(entry) => entry.record = record,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.by_code
                    .insert(record.short_code.clone(), Entry { record, seq });
            }
        }
    }
}
