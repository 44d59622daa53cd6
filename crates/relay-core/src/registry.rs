//! Static feed registry.
//!
//! Maps upstream feed identifiers to human-readable symbols. The registry is
//! built once at startup and only read afterwards, so it is shared as a plain
//! `Arc<FeedRegistry>` without interior locking.

use crate::error::{CoreError, Result};
use crate::feed::FeedId;
use std::collections::HashMap;

/// Symbol reported for ids that are not in the registry.
pub const UNKNOWN_SYMBOL: &str = "Unknown";

/// Compiled-in feed table used when the configuration lists no feeds.
pub const DEFAULT_FEEDS: &[(&str, &str)] = &[(
    "0xe62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43",
    "BTC/USD",
)];

/// One registered feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: FeedId,
    pub symbol: String,
}

/// Feed identifier to symbol table.
#[derive(Debug, Clone)]
pub struct FeedRegistry {
    /// Entries in registration order (subscribe requests keep this order).
    entries: Vec<FeedEntry>,
    /// Canonical id -> index into `entries`.
    index: HashMap<String, usize>,
}

impl FeedRegistry {
    /// Build a registry from `(id, symbol)` pairs.
    ///
    /// Ids are canonicalized, so `abc` and `0xabc` are the same feed and
    /// registering both is rejected as a duplicate.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut entries = Vec::new();
        let mut index = HashMap::new();

        for (raw_id, symbol) in pairs {
            let id = FeedId::parse(raw_id.as_ref())?;
            if index.contains_key(id.as_str()) {
                return Err(CoreError::DuplicateFeed(id.to_string()));
            }
            index.insert(id.as_str().to_string(), entries.len());
            entries.push(FeedEntry {
                id,
                symbol: symbol.into(),
            });
        }

        if entries.is_empty() {
            return Err(CoreError::EmptyRegistry);
        }

        Ok(Self { entries, index })
    }

    /// Registry holding the compiled-in feed table.
    pub fn with_defaults() -> Result<Self> {
        Self::from_pairs(DEFAULT_FEEDS.iter().copied())
    }

    /// Look up the symbol for an upstream id.
    ///
    /// Tries the id as given first, then with a `0x` prefix if it had none.
    pub fn lookup(&self, raw_id: &str) -> Option<&str> {
        let position = match self.index.get(raw_id) {
            Some(position) => Some(position),
            None if !raw_id.starts_with("0x") => self.index.get(&FeedId::lookup_key(raw_id)),
            None => None,
        };
        position.map(|&i| self.entries[i].symbol.as_str())
    }

    /// Symbol for an upstream id, or [`UNKNOWN_SYMBOL`].
    pub fn resolve(&self, raw_id: &str) -> &str {
        self.lookup(raw_id).unwrap_or(UNKNOWN_SYMBOL)
    }

    /// Canonical ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.id.to_string())
            .collect()
    }

    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
