use crate::error::Result;
use crate::record::UserUrl;
use crate::shortcode::ShortCode;
use crate::user::UserId;
use async_trait::async_trait;
use std::sync::Arc;

/// A read-only view of a store.
///
/// Tombstoned records are invisible here, except that [`get`][Self::get]
/// reports them as `Gone` rather than `NotFound`.
#[async_trait]
pub trait ReadStore: Send + Sync + 'static {
    /// Resolves a short code to its original URL.
    ///
    /// Fails with `NotFound` if the code was never stored and with `Gone` if
    /// the record has been tombstoned.
    async fn get(&self, code: &ShortCode) -> Result<String>;

    /// Returns the code of the live record for `original_url`.
    async fn get_by_original_url(&self, original_url: &str) -> Result<ShortCode>;

    /// Lists the live records owned by `user`. Empty if the user owns nothing.
    async fn get_all_by_user(&self, user: &UserId) -> Result<Vec<UserUrl>>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait Store: ReadStore {
    /// Stores `original_url` under `code` unless a live record for the URL
    /// already exists, in which case that record's code is returned instead.
    ///
    /// Callers detect the duplicate path by comparing the returned code with
    /// the one they asked for. Returns `Err(CodeTaken)` if `code` is already
    /// used by another record, tombstoned or not.
    async fn save(&self, code: &ShortCode, original_url: &str, user: &UserId)
        -> Result<ShortCode>;

    /// Tombstones every code in `codes` that exists, is live and is owned by
    /// `user`. Everything else is skipped without error.
    ///
    /// Returns the number of records tombstoned by this call.
    async fn batch_delete(&self, user: &UserId, codes: &[ShortCode]) -> Result<u64>;
}

#[async_trait]
impl<S: ReadStore + ?Sized> ReadStore for Arc<S> {
    async fn get(&self, code: &ShortCode) -> Result<String> {
        (**self).get(code).await
    }

    async fn get_by_original_url(&self, original_url: &str) -> Result<ShortCode> {
        (**self).get_by_original_url(original_url).await
    }

    async fn get_all_by_user(&self, user: &UserId) -> Result<Vec<UserUrl>> {
        (**self).get_all_by_user(user).await
    }

    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn save(
        &self,
        code: &ShortCode,
        original_url: &str,
        user: &UserId,
    ) -> Result<ShortCode> {
        (**self).save(code, original_url, user).await
    }

    async fn batch_delete(&self, user: &UserId, codes: &[ShortCode]) -> Result<u64> {
        (**self).batch_delete(user, codes).await
    }
}
