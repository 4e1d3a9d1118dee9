//! Define canonicalization
//!
//! Defines arrive as free-form space separated strings. Before they can be
//! used as a cache key or as part of a variation name they are normalized so
//! that incidental spacing does not produce duplicate variations.

use std::fmt;

/// Normalize a define string.
///
/// Leading and trailing spaces are removed and interior runs of spaces are
/// collapsed to a single space. Only the space character counts; tabs and
/// other whitespace pass through untouched. Token order and case are
/// preserved, so `"A B"` and `"B A"` stay distinct.
pub fn canonicalize(raw: &str) -> String {
    let trimmed = raw.trim_matches(' ');
    let mut out = String::with_capacity(trimmed.len());
    let mut last_was_space = false;

    for c in trimmed.chars() {
        if c == ' ' {
            if last_was_space {
                continue;
            }
            last_was_space = true;
        } else {
            last_was_space = false;
        }
        out.push(c);
    }

    out
}

/// Hash of a canonical define string, used as the variation cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DefinesHash(u32);

impl DefinesHash {
    /// Hash of the empty define set
    pub const EMPTY: Self = Self(0);

    /// Hash a string that has already been canonicalized
    pub fn of(canonical: &str) -> Self {
        // SDBM
        let hash = canonical.bytes().fold(0u32, |hash, byte| {
            (byte as u32)
                .wrapping_add(hash << 6)
                .wrapping_add(hash << 16)
                .wrapping_sub(hash)
        });
        Self(hash)
    }

    /// Canonicalize `raw` and hash the result
    pub fn from_raw(raw: &str) -> Self {
        Self::of(&canonicalize(raw))
    }

    /// Get the raw hash value
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DefinesHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}
