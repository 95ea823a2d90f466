//! Store wrappers used by the unit tests.

use async_trait::async_trait;
use snip_core::error::Result;
use snip_core::{ReadStore, ShortCode, StorageError, Store, UserId, UserUrl};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;

pub fn code(value: &str) -> ShortCode {
    ShortCode::new_unchecked(value)
}

/// Counts `batch_delete` calls and can fail them for one owner.
pub struct CountingStore<S> {
    inner: S,
    batch_delete_calls: AtomicUsize,
    save_calls: AtomicUsize,
    failing_user: Option<UserId>,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            batch_delete_calls: AtomicUsize::new(0),
            save_calls: AtomicUsize::new(0),
            failing_user: None,
        }
    }

    pub fn failing_for(inner: S, user: UserId) -> Self {
        Self {
            failing_user: Some(user),
            ..Self::new(inner)
        }
    }

    pub fn batch_delete_calls(&self) -> usize {
        self.batch_delete_calls.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: Store> ReadStore for CountingStore<S> {
    async fn get(&self, code: &ShortCode) -> Result<String> {
        self.inner.get(code).await
    }

    async fn get_by_original_url(&self, original_url: &str) -> Result<ShortCode> {
        self.inner.get_by_original_url(original_url).await
    }

    async fn get_all_by_user(&self, user: &UserId) -> Result<Vec<UserUrl>> {
        self.inner.get_all_by_user(user).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

#[async_trait]
impl<S: Store> Store for CountingStore<S> {
    async fn save(
        &self,
        code: &ShortCode,
        original_url: &str,
        user: &UserId,
    ) -> Result<ShortCode> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.save(code, original_url, user).await
    }

    async fn batch_delete(&self, user: &UserId, codes: &[ShortCode]) -> Result<u64> {
        self.batch_delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_user.as_ref() == Some(user) {
            return Err(StorageError::Unavailable("backend offline".to_string()));
        }
        self.inner.batch_delete(user, codes).await
    }
}

/// Holds every `batch_delete` until [`open`][Self::open] is called.
pub struct GatedStore<S> {
    inner: S,
    entered: AtomicUsize,
    gate: watch::Sender<bool>,
}

impl<S> GatedStore<S> {
    pub fn new(inner: S) -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            inner,
            entered: AtomicUsize::new(0),
            gate,
        }
    }

    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn open(&self) {
        self.gate.send_replace(true);
    }
}

#[async_trait]
impl<S: Store> ReadStore for GatedStore<S> {
    async fn get(&self, code: &ShortCode) -> Result<String> {
        self.inner.get(code).await
    }

    async fn get_by_original_url(&self, original_url: &str) -> Result<ShortCode> {
        self.inner.get_by_original_url(original_url).await
    }

    async fn get_all_by_user(&self, user: &UserId) -> Result<Vec<UserUrl>> {
        self.inner.get_all_by_user(user).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

#[async_trait]
impl<S: Store> Store for GatedStore<S> {
    async fn save(
        &self,
        code: &ShortCode,
        original_url: &str,
        user: &UserId,
    ) -> Result<ShortCode> {
        self.inner.save(code, original_url, user).await
    }

    async fn batch_delete(&self, user: &UserId, codes: &[ShortCode]) -> Result<u64> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.gate.subscribe();
        // The sender lives as long as `self`, so this only fails if it is gone.
        let _ = gate.wait_for(|open| *open).await;
        self.inner.batch_delete(user, codes).await
    }
}
