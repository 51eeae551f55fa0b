//! Key formats for every column family.
//!
//! Integer keys are big-endian so RocksDB's lexicographic order matches
//! numeric order; range scans over `atoms` therefore visit ids ascending.
//!
//! | CF | Key Format | Size |
//! |----|------------|------|
//! | atoms, atom_overflow | atom_id u64 BE | 8 bytes |
//! | atom_digests | SHA-256 | 32 bytes |
//! | embeddings, embedding_vectors | embedding_id u64 BE | 8 bytes |
//! | atom_embeddings | atom_id u64 BE + embedding_type UTF-8 | 8 + n bytes |
//! | landmarks | version u32 BE | 4 bytes |
//! | dedup_policies | policy UUID | 16 bytes |
//! | dedup_active | scope UTF-8 | variable |
//! | system | fixed ASCII keys | variable |

use atomgraph_core::error::{CoreError, CoreResult};
use atomgraph_core::types::{AtomId, ContentDigest, EmbeddingId};
use uuid::Uuid;

/// Next atom id to assign (u64 BE).
pub const NEXT_ATOM_ID_KEY: &[u8] = b"next_atom_id";

/// Next embedding id to assign (u64 BE).
pub const NEXT_EMBEDDING_ID_KEY: &[u8] = b"next_embedding_id";

/// Version of the landmark set used for projection (u32 BE).
pub const ACTIVE_LANDMARK_VERSION_KEY: &[u8] = b"active_landmark_version";

#[inline]
pub fn atom_key(id: AtomId) -> [u8; 8] {
    id.to_be_bytes()
}

#[inline]
pub fn digest_key(digest: &ContentDigest) -> [u8; 32] {
    *digest.as_bytes()
}

#[inline]
pub fn embedding_key(id: EmbeddingId) -> [u8; 8] {
    id.to_be_bytes()
}

/// Prefix shared by all `atom_embeddings` keys of one atom.
#[inline]
pub fn atom_embeddings_prefix(atom_id: AtomId) -> [u8; 8] {
    atom_id.to_be_bytes()
}

/// Key of the `(atom, embedding_type)` uniqueness entry.
pub fn atom_embedding_key(atom_id: AtomId, embedding_type: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + embedding_type.len());
    key.extend_from_slice(&atom_id.to_be_bytes());
    key.extend_from_slice(embedding_type.as_bytes());
    key
}

#[inline]
pub fn landmark_key(version: u32) -> [u8; 4] {
    version.to_be_bytes()
}

#[inline]
pub fn policy_key(id: &Uuid) -> [u8; 16] {
    *id.as_bytes()
}

#[inline]
pub fn scope_key(scope: &str) -> &[u8] {
    scope.as_bytes()
}

/// Decode an 8-byte big-endian integer (keys and id values).
pub fn parse_u64_be(bytes: &[u8]) -> CoreResult<u64> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| {
        CoreError::SerializationError(format!(
            "expected 8-byte big-endian id, got {} bytes",
            bytes.len()
        ))
    })?;
    Ok(u64::from_be_bytes(arr))
}

pub fn parse_u32_be(bytes: &[u8]) -> CoreResult<u32> {
    let arr: [u8; 4] = bytes.try_into().map_err(|_| {
        CoreError::SerializationError(format!(
            "expected 4-byte big-endian value, got {} bytes",
            bytes.len()
        ))
    })?;
    Ok(u32::from_be_bytes(arr))
}

#[inline]
pub fn parse_atom_key(bytes: &[u8]) -> CoreResult<AtomId> {
    parse_u64_be(bytes).map(AtomId)
}

#[inline]
pub fn parse_embedding_key(bytes: &[u8]) -> CoreResult<EmbeddingId> {
    parse_u64_be(bytes).map(EmbeddingId)
}

pub fn parse_policy_key(bytes: &[u8]) -> CoreResult<Uuid> {
    Uuid::from_slice(bytes).map_err(|e| {
        CoreError::SerializationError(format!("invalid policy id key: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_keys_sort_numerically() {
        let a = atom_key(AtomId(255));
        let b = atom_key(AtomId(256));
        assert!(a < b, "BE encoding must preserve numeric order");
        assert_eq!(parse_atom_key(&b).unwrap(), AtomId(256));
    }

    #[test]
    fn test_atom_embedding_key_has_atom_prefix() {
        let key = atom_embedding_key(AtomId(7), "text-dense");
        assert!(key.starts_with(&atom_embeddings_prefix(AtomId(7))));
        assert_eq!(&key[8..], b"text-dense");
    }

    #[test]
    fn edge_case_parse_wrong_length() {
        assert!(parse_u64_be(&[1, 2, 3]).is_err());
        assert!(parse_u32_be(&[0; 8]).is_err());
        assert!(parse_policy_key(&[0; 3]).is_err());
    }
}
