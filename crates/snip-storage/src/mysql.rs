use async_trait::async_trait;
use jiff::Timestamp;
use snip_core::error::Result;
use snip_core::{ReadStore, ShortCode, StorageError, Store, UserId, UserUrl};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound on codes bound into one `IN (...)` list.
const MAX_CODES_PER_STATEMENT: usize = 1_000;

const SCHEMA: &str = include_str!("../ddl/mysql/short_urls.sql");

/// Connection settings for [`MySqlStore`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct MySqlSettings {
    #[builder(setter(into))]
    pub database_url: String,
    #[builder(default = 5)]
    pub max_connections: u32,
    /// Bounds every query and pool acquisition.
    #[builder(default = DEFAULT_QUERY_TIMEOUT)]
    pub query_timeout: Duration,
}

/// MySQL implementation of the [`Store`] contract.
///
/// Soft delete is implemented with `deleted_at`. Uniqueness of live URLs is
/// enforced by a unique index over a generated column that is only set
/// while `deleted_at IS NULL`, so concurrent writers in different processes
/// cannot create two live records for one URL, while a tombstoned URL can be
/// shortened again. Short codes are never reused, tombstoned or not.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
    query_timeout: Duration,
}

impl MySqlStore {
    /// Creates a store from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Creates a store by opening a new MySQL connection pool.
    pub async fn connect(settings: &MySqlSettings) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.query_timeout)
            .connect(&settings.database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool).with_query_timeout(settings.query_timeout))
    }

    /// Creates the `short_urls` table if it does not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Runs `fut` under the query timeout.
    async fn bounded<T, F>(
        &self,
        operation: &str,
        fut: F,
    ) -> Result<std::result::Result<T, sqlx::Error>>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>> + Send,
    {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| {
                StorageError::Timeout(format!(
                    "{operation} exceeded {}ms",
                    self.query_timeout.as_millis()
                ))
            })
    }

    async fn live_code_for(&self, original_url: &str) -> Result<Option<ShortCode>> {
        let row = self
            .bounded(
                "get_by_original_url",
                sqlx::query(
                    r#"
                    SELECT short_code
                    FROM short_urls
                    WHERE original_url = ?
                      AND deleted_at IS NULL
                    LIMIT 1
                    "#,
                )
                .bind(original_url)
                .fetch_optional(&self.pool),
            )
            .await?
            .map_err(map_sqlx_error)?;

        row.map(|row| {
            row.try_get::<String, _>("short_code")
                .map(ShortCode::new_unchecked)
                .map_err(map_sqlx_error)
        })
        .transpose()
    }
}

fn now_unix_seconds() -> i64 {
    Timestamp::now().as_second()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadStore for MySqlStore {
    async fn get(&self, code: &ShortCode) -> Result<String> {
        trace!(code = %code, "mysql store get");

        let row = self
            .bounded(
                "get",
                sqlx::query(
                    r#"
                    SELECT original_url, deleted_at
                    FROM short_urls
                    WHERE short_code = ?
                    LIMIT 1
                    "#,
                )
                .bind(code.as_str())
                .fetch_optional(&self.pool),
            )
            .await?
            .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(code.to_string()));
        };

        let deleted_at: Option<i64> = row.try_get("deleted_at").map_err(map_sqlx_error)?;
        if deleted_at.is_some() {
            return Err(StorageError::Gone(code.to_string()));
        }

        row.try_get("original_url").map_err(map_sqlx_error)
    }

    async fn get_by_original_url(&self, original_url: &str) -> Result<ShortCode> {
        self.live_code_for(original_url)
            .await?
            .ok_or_else(|| StorageError::NotFound(original_url.to_string()))
    }

    async fn get_all_by_user(&self, user: &UserId) -> Result<Vec<UserUrl>> {
        let rows = self
            .bounded(
                "get_all_by_user",
                sqlx::query(
                    r#"
                    SELECT short_code, original_url
                    FROM short_urls
                    WHERE user_id = ?
                      AND deleted_at IS NULL
                    ORDER BY id
                    "#,
                )
                .bind(user.as_str())
                .fetch_all(&self.pool),
            )
            .await?
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(UserUrl {
                    short_code: ShortCode::new_unchecked(
                        row.try_get::<String, _>("short_code")
                            .map_err(map_sqlx_error)?,
                    ),
                    original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        self.bounded("ping", sqlx::query("SELECT 1").execute(&self.pool))
            .await?
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl Store for MySqlStore {
    async fn save(
        &self,
        code: &ShortCode,
        original_url: &str,
        user: &UserId,
    ) -> Result<ShortCode> {
        let result = self
            .bounded(
                "save",
                sqlx::query(
                    r#"
                    INSERT INTO short_urls (short_code, original_url, user_id, created_at, deleted_at)
                    VALUES (?, ?, ?, ?, NULL)
                    "#,
                )
                .bind(code.as_str())
                .bind(original_url)
                .bind(user.as_str())
                .bind(now_unix_seconds())
                .execute(&self.pool),
            )
            .await?;

        match result {
            Ok(_) => {
                debug!(code = %code, user_id = %user, "stored url");
                Ok(code.clone())
            }
            // Either another writer stored the same URL first, or the code is taken.
            Err(err) if is_unique_violation(&err) => match self.live_code_for(original_url).await? {
                Some(existing) => {
                    debug!(code = %existing, "original url already stored");
                    Ok(existing)
                }
                None => Err(StorageError::CodeTaken(code.to_string())),
            },
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn batch_delete(&self, user: &UserId, codes: &[ShortCode]) -> Result<u64> {
        let now = now_unix_seconds();
        let mut deleted = 0;

        for chunk in codes.chunks(MAX_CODES_PER_STATEMENT) {
            let mut query = QueryBuilder::<MySql>::new("UPDATE short_urls SET deleted_at = ");
            query
                .push_bind(now)
                .push(" WHERE user_id = ")
                .push_bind(user.as_str())
                .push(" AND deleted_at IS NULL AND short_code IN (");
            let mut separated = query.separated(", ");
            for code in chunk {
                separated.push_bind(code.as_str());
            }
            separated.push_unseparated(")");

            let result = self
                .bounded("batch_delete", query.build().execute(&self.pool))
                .await?
                .map_err(map_sqlx_error)?;
            deleted += result.rows_affected();
        }

        debug!(user_id = %user, requested = codes.len(), deleted, "batch delete applied");
        Ok(deleted)
    }
}
