//! Atom: the unit of deduplicated storage.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::digest::ContentDigest;
use super::metadata::AtomMetadata;

/// Opaque surrogate key assigned on first insert. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AtomId(pub u64);

impl AtomId {
    #[inline]
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atom:{}", self.0)
    }
}

/// Full content of an oversized atom, kept outside the inline slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPayload {
    /// Content was valid UTF-8
    Text(String),
    /// Arbitrary binary content
    Bytes(Vec<u8>),
}

impl OverflowPayload {
    /// Wrap `content`, choosing `Text` when it decodes as UTF-8.
    pub fn from_content(content: &[u8]) -> Self {
        match std::str::from_utf8(content) {
            Ok(s) => Self::Text(s.to_string()),
            Err(_) => Self::Bytes(content.to_vec()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Bytes(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A stored atom, with its content reassembled.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub atom_id: AtomId,
    pub content_digest: ContentDigest,
    /// Exactly `inline_budget` bytes: padded content or digest || prefix
    pub inline_value: Vec<u8>,
    /// Full content when it did not fit inline
    pub overflow: Option<OverflowPayload>,
    pub modality: String,
    pub subtype: Option<String>,
    pub reference_count: u64,
    pub metadata: AtomMetadata,
    pub created_at: DateTime<Utc>,
    /// Set when the reference count last reached 0
    pub orphaned_since: Option<DateTime<Utc>>,
}

impl Atom {
    /// Full original content.
    pub fn content(&self) -> &[u8] {
        match &self.overflow {
            Some(payload) => payload.as_bytes(),
            None => {
                let len = self.metadata.original_size as usize;
                self.inline_value.get(..len).unwrap_or(&self.inline_value)
            }
        }
    }

    /// Content as UTF-8 text, if it is text.
    pub fn content_str(&self) -> Option<&str> {
        std::str::from_utf8(self.content()).ok()
    }

    #[inline]
    pub fn is_orphan(&self) -> bool {
        self.reference_count == 0
    }
}

/// Result of `AtomStore::put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomRef {
    pub atom_id: AtomId,
    /// True when this call created the atom (a miss)
    pub is_new: bool,
    /// Reference count after this call
    pub reference_count: u64,
}
