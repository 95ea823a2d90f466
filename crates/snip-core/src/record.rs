use crate::shortcode::ShortCode;
use crate::user::UserId;
use serde::{Deserialize, Serialize};

/// A stored short URL mapping.
///
/// `deleted` only ever moves from `false` to `true`. Tombstoned records stay
/// in the store so repeated deletes are idempotent and lookups can report
/// [`Gone`][crate::StorageError::Gone] instead of `NotFound`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub short_code: ShortCode,
    pub original_url: String,
    pub user_id: UserId,
    pub deleted: bool,
}

impl UrlRecord {
    /// Creates a live record.
    pub fn new(short_code: ShortCode, original_url: impl Into<String>, user_id: UserId) -> Self {
        Self {
            short_code,
            original_url: original_url.into(),
            user_id,
            deleted: false,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.deleted
    }

    /// Returns `true` if `user` may tombstone this record.
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.user_id == user
    }

    pub fn to_user_url(&self) -> UserUrl {
        UserUrl {
            short_code: self.short_code.clone(),
            original_url: self.original_url.clone(),
        }
    }
}

/// A live short URL as listed for its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUrl {
    pub short_code: ShortCode,
    pub original_url: String,
}
