//! URL shortener service implementation.
//!
//! This crate provides the service façade consumed by transport adapters and
//! the asynchronous deletion pipeline. Core types are re-exported from
//! `snip_core`.

pub mod deletion;
pub mod error;
pub mod service;

#[cfg(test)]
mod testing;

pub use deletion::{DeleteTask, DeletionPipeline, PipelineSettings};
pub use error::{PipelineError, ShortenerError};
pub use service::{
    parse_short_code, BatchRequest, BatchResponse, ServiceSettings, Shortened, ShortenerService,
};
pub use snip_core::{ShortCode, UserId, UserUrl};
