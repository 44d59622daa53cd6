//! Upstream feed identifiers.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const HEX_PREFIX: &str = "0x";

/// Canonical feed identifier.
///
/// Always stored with a `0x` prefix so that prefixed and unprefixed spellings
/// of the same id compare equal. Hex digit case is preserved as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeedId(String);

impl FeedId {
    /// Parse and canonicalize a feed id.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix(HEX_PREFIX).unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(CoreError::InvalidFeedId(raw.to_string()));
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidFeedId(raw.to_string()));
        }

        Ok(Self(format!("{HEX_PREFIX}{digits}")))
    }

    /// Canonical form, `0x`-prefixed.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex digits without the `0x` prefix.
    #[inline]
    pub fn digits(&self) -> &str {
        &self.0[HEX_PREFIX.len()..]
    }

    /// Canonical key for an arbitrary upstream id string.
    ///
    /// Never fails; an id that is not valid hex simply won't match.
    pub fn lookup_key(raw: &str) -> String {
        if raw.starts_with(HEX_PREFIX) {
            raw.to_string()
        } else {
            format!("{HEX_PREFIX}{raw}")
        }
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FeedId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FeedId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<FeedId> for String {
    fn from(id: FeedId) -> Self {
        id.0
    }
}
