use crate::Generator;
use rand::distr::Alphanumeric;
use rand::Rng;
use snip_core::ShortCode;
use typed_builder::TypedBuilder;

pub const DEFAULT_LENGTH: usize = 7;
pub const MAX_LENGTH: usize = 8;

/// Generates random alphanumeric short codes.
///
/// Draws from the thread-local CSPRNG, so codes are unpredictable.
/// `length` is clamped to `DEFAULT_LENGTH..=MAX_LENGTH`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RandomGenerator {
    #[builder(default = DEFAULT_LENGTH)]
    length: usize,
}

impl RandomGenerator {
    pub fn new() -> Self {
        Self::builder().build()
    }

    fn effective_length(&self) -> usize {
        self.length.clamp(DEFAULT_LENGTH, MAX_LENGTH)
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> ShortCode {
        let code: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(self.effective_length())
            .map(char::from)
            .collect();
        ShortCode::new_unchecked(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_length_is_seven() {
        let code = RandomGenerator::new().generate();
        assert_eq!(code.as_str().len(), 7);
        assert!(code.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn length_is_clamped() {
        let long = RandomGenerator::builder().length(20).build();
        assert_eq!(long.generate().as_str().len(), MAX_LENGTH);

        let short = RandomGenerator::builder().length(2).build();
        assert_eq!(short.generate().as_str().len(), DEFAULT_LENGTH);
    }

    #[test]
    fn generated_codes_pass_validation() {
        let code = RandomGenerator::builder().length(8).build().generate();
        assert!(ShortCode::new(code.as_str()).is_ok());
    }

    #[test]
    fn codes_do_not_repeat_in_practice() {
        let generator = RandomGenerator::new();
        let codes: HashSet<_> = (0..1_000).map(|_| generator.generate()).collect();
        assert_eq!(codes.len(), 1_000);
    }
}
