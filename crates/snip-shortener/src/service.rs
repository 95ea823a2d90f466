use crate::deletion::{DeleteTask, DeletionPipeline, PipelineSettings};
use crate::error::{Result, ShortenerError};
use serde::{Deserialize, Serialize};
use snip_core::{ShortCode, StorageError, Store, UserId, UserUrl};
use snip_generator::Generator;
use std::sync::Arc;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Fresh codes tried before a save that keeps hitting taken codes gives up.
const MAX_CODE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceSettings {
    /// Prefix used to render short URLs.
    #[builder(default = DEFAULT_BASE_URL.to_string(), setter(into))]
    pub base_url: String,
    #[builder(default)]
    pub pipeline: PipelineSettings,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Result of shortening one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortened {
    pub code: ShortCode,
    /// `true` if the URL had already been shortened and `code` is the
    /// existing one.
    pub was_duplicate: bool,
}

impl Shortened {
    /// HTTP status an adapter should answer with (201 created, 409 duplicate).
    pub fn status_hint(&self) -> u16 {
        if self.was_duplicate {
            409
        } else {
            201
        }
    }
}

/// One item of a batch shorten request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub correlation_id: String,
    pub original_url: String,
}

/// One item of a batch shorten response, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub correlation_id: String,
    pub short_code: ShortCode,
    pub short_url: String,
    pub was_duplicate: bool,
}

/// Validates a short code received from a caller, e.g. a path segment.
pub fn parse_short_code(raw: &str) -> Result<ShortCode> {
    Ok(ShortCode::new(raw)?)
}

/// The operations exposed to transport adapters.
///
/// This service wraps a [`Store`], a [`Generator`] and a
/// [`DeletionPipeline`]:
/// - creation and lookups go straight to the store
/// - deletions are queued and applied in the background, so a successful
///   [`request_deletion`][Self::request_deletion] only means "accepted"
#[derive(Debug)]
pub struct ShortenerService<S, G> {
    store: Arc<S>,
    generator: G,
    deletions: DeletionPipeline,
    base_url: String,
}

impl<S: Store, G: Generator> ShortenerService<S, G> {
    /// Creates the service and spawns its deletion workers on the current
    /// tokio runtime.
    pub fn new(store: S, generator: G, settings: ServiceSettings) -> Self {
        let store = Arc::new(store);
        let deletions = DeletionPipeline::spawn(Arc::clone(&store), settings.pipeline);
        Self {
            store,
            generator,
            deletions,
            base_url: settings.base_url,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validates that the URL has a valid format (has a scheme and host).
    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }

        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {}",
                url
            )));
        };
        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if scheme.is_empty() || host.is_empty() {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {}",
                url
            )));
        }

        let scheme = scheme.to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {}",
                scheme
            )));
        }

        Ok(())
    }

    /// Shortens `original_url` on behalf of `user`.
    ///
    /// If the URL is already stored (by anyone), its existing code is returned
    /// with `was_duplicate` set.
    pub async fn shorten(&self, original_url: &str, user: &UserId) -> Result<Shortened> {
        Self::validate_url(original_url)?;

        match self.store.get_by_original_url(original_url).await {
            Ok(code) => {
                return Ok(Shortened {
                    code,
                    was_duplicate: true,
                })
            }
            Err(StorageError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        let mut attempt = 1;
        loop {
            let candidate = self.generator.generate();
            match self.store.save(&candidate, original_url, user).await {
                // A concurrent writer may have stored the URL in between.
                Ok(code) => {
                    let was_duplicate = code != candidate;
                    debug!(code = %code, user_id = %user, was_duplicate, "shortened url");
                    return Ok(Shortened {
                        code,
                        was_duplicate,
                    });
                }
                Err(StorageError::CodeTaken(taken)) if attempt < MAX_CODE_ATTEMPTS => {
                    warn!(code = %taken, attempt, "generated code already taken, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Shortens every request in order, preserving correlation ids.
    ///
    /// Stops at the first failing item.
    pub async fn shorten_batch(
        &self,
        requests: Vec<BatchRequest>,
        user: &UserId,
    ) -> Result<Vec<BatchResponse>> {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            let shortened = self.shorten(&request.original_url, user).await?;
            responses.push(BatchResponse {
                correlation_id: request.correlation_id,
                short_url: self.short_url(&shortened.code),
                short_code: shortened.code,
                was_duplicate: shortened.was_duplicate,
            });
        }
        Ok(responses)
    }

    /// Resolves a short code to its original URL.
    ///
    /// Fails with [`ShortenerError::NotFound`] for unknown codes and with
    /// [`ShortenerError::Gone`] for deleted ones.
    pub async fn resolve(&self, code: &ShortCode) -> Result<String> {
        Ok(self.store.get(code).await?)
    }

    /// Lists the live short URLs owned by `user`.
    pub async fn list_owned(&self, user: &UserId) -> Result<Vec<UserUrl>> {
        Ok(self.store.get_all_by_user(user).await?)
    }

    /// Queues `codes` for deletion on behalf of `user`.
    ///
    /// Returns once the request is accepted; the records are tombstoned later
    /// and a `resolve` issued right after may still see them live. Codes the
    /// user does not own are ignored.
    pub async fn request_deletion(&self, user: &UserId, codes: Vec<ShortCode>) -> Result<()> {
        let count = codes.len();
        self.deletions
            .submit(DeleteTask::new(user.clone(), codes))
            .await?;
        debug!(user_id = %user, count, "deletion accepted");
        Ok(())
    }

    /// Renders the public URL of a short code.
    pub fn short_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.base_url)
    }

    pub async fn ping(&self) -> Result<()> {
        Ok(self.store.ping().await?)
    }

    /// Drains the deletion pipeline. Deletions requested afterwards are
    /// rejected.
    pub async fn shutdown(&self) {
        self.deletions.shutdown().await;
    }
}
