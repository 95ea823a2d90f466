use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

const MIN_LENGTH: usize = 3;
const MAX_LENGTH: usize = 32;

/// The public identifier of a shortened URL.
///
/// Codes accepted from callers go through [`ShortCode::new`] (or `parse`)
/// and must be 3-32 characters of `[A-Za-z0-9_-]`. Generators and store
/// backends build codes with [`ShortCode::new_unchecked`].
///
/// Serialized as a bare string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortCode(String);

impl ShortCode {
    pub fn new(code: impl Into<String>) -> Result<Self, CoreError> {
        let code = code.into();
        check(&code)?;
        Ok(Self(code))
    }

    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Joins the code onto `base_url`, tolerating a trailing slash.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check(code: &str) -> Result<(), CoreError> {
    if !(MIN_LENGTH..=MAX_LENGTH).contains(&code.len()) {
        return Err(CoreError::InvalidShortCode(format!(
            "expected {MIN_LENGTH}-{MAX_LENGTH} characters, got {}",
            code.len()
        )));
    }

    match code
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        Some(bad) => Err(CoreError::InvalidShortCode(format!(
            "unexpected character {bad:?} in '{code}'"
        ))),
        None => Ok(()),
    }
}

impl FromStr for ShortCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ShortCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
