//! Typed atom metadata.
//!
//! The codec owns `overflow`, `original_size` and `fingerprint_algorithm`.
//! Caller-supplied metadata can never overwrite those three.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current metadata layout version.
pub const METADATA_SCHEMA_VERSION: u16 = 1;

/// Hash used for content digests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FingerprintAlgorithm {
    #[default]
    Sha256,
}

/// Scalar value in the open-ended part of [`AtomMetadata`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Versioned metadata attached to every atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomMetadata {
    pub schema_version: u16,
    /// Content exceeded the inline budget and lives in the overflow table
    pub overflow: bool,
    /// Length in bytes of the full content
    pub original_size: u64,
    pub fingerprint_algorithm: FingerprintAlgorithm,
    /// MIME-like content type, caller supplied
    pub content_type: Option<String>,
    /// Free-form provenance tag, caller supplied
    pub source: Option<String>,
    pub extra: BTreeMap<String, MetadataValue>,
}

impl Default for AtomMetadata {
    fn default() -> Self {
        Self {
            schema_version: METADATA_SCHEMA_VERSION,
            overflow: false,
            original_size: 0,
            fingerprint_algorithm: FingerprintAlgorithm::default(),
            content_type: None,
            source: None,
            extra: BTreeMap::new(),
        }
    }
}

impl AtomMetadata {
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Merge caller metadata into `self`.
    ///
    /// `content_type` and `source` are replaced when `other` sets them;
    /// `extra` keys are inserted or replaced. Codec-owned fields keep the
    /// values already in `self`.
    pub fn merge(&mut self, other: &AtomMetadata) {
        if let Some(ct) = &other.content_type {
            self.content_type = Some(ct.clone());
        }
        if let Some(src) = &other.source {
            self.source = Some(src.clone());
        }
        for (k, v) in &other.extra {
            self.extra.insert(k.clone(), v.clone());
        }
    }

    /// Return `self` with caller metadata layered on top (see [`merge`](Self::merge)).
    pub fn merged_with(mut self, caller: &AtomMetadata) -> Self {
        self.merge(caller);
        self
    }
}
