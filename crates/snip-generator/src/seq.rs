use crate::Generator;
use snip_core::ShortCode;
use std::sync::atomic::{AtomicU64, Ordering};

const DIGITS: usize = 5;

/// Hands out `{prefix}{counter}` codes, zero-padded to five digits.
///
/// Deterministic, so tests and fixtures can predict the codes a service
/// will produce. Two generators sharing a prefix will collide; the store
/// rejects the second save with `CodeTaken`.
#[derive(Debug)]
pub struct SeqGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SeqGenerator {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    /// Starts counting at `offset`, e.g. to skip codes already in a store.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(offset),
        }
    }
}

impl Generator for SeqGenerator {
    fn generate(&self) -> ShortCode {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        ShortCode::new_unchecked(format!("{}{:0width$}", self.prefix, n, width = DIGITS))
    }
}
