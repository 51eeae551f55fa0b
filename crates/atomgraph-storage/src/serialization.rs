//! Bincode serialization for persisted records.
//!
//! Uses bincode 1.3. Every record is prefixed with a version byte; a
//! version mismatch is an error (no migration support). Deserialization
//! returns `CoreError::SerializationError` so one corrupt row cannot take
//! down an iteration over a whole column family.
//!
//! Vectors are not bincode-encoded: they are raw little-endian f32 bytes,
//! zero-padded to the configured width.

use atomgraph_core::dedup::DeduplicationPolicy;
use atomgraph_core::error::{CoreError, CoreResult};
use atomgraph_core::projection::LandmarkSet;
use atomgraph_core::types::{EmbeddingRecord, OverflowPayload};
use bincode::{deserialize, serialize};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::store::AtomRecord;

/// Bump when the `AtomRecord` layout changes.
pub const ATOM_RECORD_VERSION: u8 = 1;
pub const OVERFLOW_VERSION: u8 = 1;
pub const EMBEDDING_RECORD_VERSION: u8 = 1;
pub const LANDMARK_SET_VERSION: u8 = 1;
pub const POLICY_VERSION: u8 = 1;

fn encode_versioned<T: Serialize>(version: u8, value: &T, what: &str) -> CoreResult<Vec<u8>> {
    let encoded = serialize(value).map_err(|e| {
        CoreError::SerializationError(format!("Failed to serialize {}: {}", what, e))
    })?;
    let mut out = Vec::with_capacity(encoded.len() + 1);
    out.push(version);
    out.extend(encoded);
    Ok(out)
}

fn decode_versioned<T: DeserializeOwned>(data: &[u8], version: u8, what: &str) -> CoreResult<T> {
    let (&found, body) = data.split_first().ok_or_else(|| {
        CoreError::SerializationError(format!(
            "Empty data for {}. This indicates a missing row or wrong CF lookup.",
            what
        ))
    })?;
    if found != version {
        return Err(CoreError::SerializationError(format!(
            "Version mismatch for {}. Expected {}, got {}. Data length: {} bytes.",
            what,
            version,
            found,
            data.len()
        )));
    }
    deserialize(body).map_err(|e| {
        CoreError::SerializationError(format!(
            "Failed to deserialize {}: {}. Data length: {} bytes. \
             This indicates corrupted storage or incompatible struct changes.",
            what,
            e,
            data.len()
        ))
    })
}

pub fn serialize_atom_record(record: &AtomRecord) -> CoreResult<Vec<u8>> {
    encode_versioned(ATOM_RECORD_VERSION, record, "AtomRecord")
}

pub fn deserialize_atom_record(data: &[u8]) -> CoreResult<AtomRecord> {
    decode_versioned(data, ATOM_RECORD_VERSION, "AtomRecord")
}

pub fn serialize_overflow(payload: &OverflowPayload) -> CoreResult<Vec<u8>> {
    encode_versioned(OVERFLOW_VERSION, payload, "OverflowPayload")
}

pub fn deserialize_overflow(data: &[u8]) -> CoreResult<OverflowPayload> {
    decode_versioned(data, OVERFLOW_VERSION, "OverflowPayload")
}

pub fn serialize_embedding_record(record: &EmbeddingRecord) -> CoreResult<Vec<u8>> {
    encode_versioned(EMBEDDING_RECORD_VERSION, record, "EmbeddingRecord")
}

pub fn deserialize_embedding_record(data: &[u8]) -> CoreResult<EmbeddingRecord> {
    decode_versioned(data, EMBEDDING_RECORD_VERSION, "EmbeddingRecord")
}

pub fn serialize_landmark_set(set: &LandmarkSet) -> CoreResult<Vec<u8>> {
    encode_versioned(LANDMARK_SET_VERSION, set, "LandmarkSet")
}

pub fn deserialize_landmark_set(data: &[u8]) -> CoreResult<LandmarkSet> {
    decode_versioned(data, LANDMARK_SET_VERSION, "LandmarkSet")
}

pub fn serialize_policy(policy: &DeduplicationPolicy) -> CoreResult<Vec<u8>> {
    encode_versioned(POLICY_VERSION, policy, "DeduplicationPolicy")
}

pub fn deserialize_policy(data: &[u8]) -> CoreResult<DeduplicationPolicy> {
    decode_versioned(data, POLICY_VERSION, "DeduplicationPolicy")
}

/// Encode a vector as little-endian f32, zero-padded to `padded_dimension`.
///
/// Returns exactly `max(padded_dimension, vector.len()) * 4` bytes.
pub fn serialize_vector(vector: &[f32], padded_dimension: usize) -> Vec<u8> {
    let width = padded_dimension.max(vector.len());
    let mut out = Vec::with_capacity(width * 4);
    for v in vector {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.resize(width * 4, 0);
    out
}

/// Decode the first `dimension` floats of a stored vector; padding is dropped.
pub fn deserialize_vector(data: &[u8], dimension: usize) -> CoreResult<Vec<f32>> {
    if data.len() % 4 != 0 || data.len() < dimension * 4 {
        return Err(CoreError::SerializationError(format!(
            "Vector must hold at least {} f32 values, got {} bytes",
            dimension,
            data.len()
        )));
    }
    Ok(data[..dimension * 4]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomgraph_core::types::{AtomId, AtomMetadata, ContentDigest};
    use chrono::Utc;

    #[test]
    fn test_vector_padding_layout() {
        let bytes = serialize_vector(&[1.0, -2.5], 4);
        assert_eq!(bytes.len(), 16);
        assert!(bytes[8..].iter().all(|b| *b == 0));
        assert_eq!(deserialize_vector(&bytes, 2).unwrap(), vec![1.0, -2.5]);
    }

    #[test]
    fn edge_case_vector_too_short() {
        let bytes = serialize_vector(&[1.0], 1);
        assert!(deserialize_vector(&bytes, 2).is_err());
        assert!(deserialize_vector(&[0u8; 5], 1).is_err());
    }

    #[test]
    fn test_atom_record_survives_encoding() {
        let record = AtomRecord {
            atom_id: AtomId(3),
            content_digest: ContentDigest::of(b"abc"),
            inline_value: vec![1u8; 64],
            modality: "text".into(),
            subtype: Some("paragraph".into()),
            reference_count: 2,
            metadata: AtomMetadata::default().with_extra("k", 1i64),
            created_at: Utc::now(),
            orphaned_since: None,
        };
        let bytes = serialize_atom_record(&record).unwrap();
        assert_eq!(bytes[0], ATOM_RECORD_VERSION);
        let back = deserialize_atom_record(&bytes).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn edge_case_version_mismatch_and_empty() {
        let mut bytes = serialize_overflow(&OverflowPayload::Text("x".into())).unwrap();
        bytes[0] = 99;
        let err = deserialize_overflow(&bytes).unwrap_err();
        assert!(err.to_string().contains("Version mismatch"));
        assert!(deserialize_overflow(&[]).is_err());
    }
}
