pub mod random;
pub mod seq;

pub use random::RandomGenerator;
pub use seq::SeqGenerator;

use snip_core::ShortCode;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage.
/// Generated codes are expected to be collision-resistant, not unique: the
/// store still rejects a code that is already taken.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self) -> ShortCode;
}
