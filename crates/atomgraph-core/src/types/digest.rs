//! SHA-256 content digest.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length in bytes of a [`ContentDigest`].
pub const DIGEST_LEN: usize = 32;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Encode a byte slice as lowercase hexadecimal string.
///
/// Shared by digest display and storage error messages for raw keys.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_DIGITS[(b >> 4) as usize] as char);
        out.push(HEX_DIGITS[(b & 0x0f) as usize] as char);
    }
    out
}

/// SHA-256 of an atom's full content. The deduplication key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentDigest(pub [u8; DIGEST_LEN]);

impl ContentDigest {
    /// Hash `content`.
    pub fn of(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(hasher.finalize().into())
    }

    /// Rebuild a digest from a stored key. Returns `None` unless exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; DIGEST_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }

    /// Lock stripe owning this digest, out of `stripes`.
    #[inline]
    pub fn stripe(&self, stripes: usize) -> usize {
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.0[..8]);
        (u64::from_be_bytes(head) % stripes.max(1) as u64) as usize
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_sha256_vector() {
        let d = ContentDigest::of(b"hello");
        assert_eq!(
            d.to_hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_hex_encode_matches_to_hex() {
        assert_eq!(hex_encode(&[]), "");
        assert_eq!(hex_encode(&[0x00, 0x0f, 0xa5, 0xff]), "000fa5ff");
        let d = ContentDigest::of(b"hello");
        assert_eq!(hex_encode(d.as_bytes()), d.to_hex());
    }

    #[test]
    fn test_from_slice_requires_32_bytes() {
        let d = ContentDigest::of(b"x");
        assert_eq!(ContentDigest::from_slice(d.as_bytes()), Some(d));
        assert_eq!(ContentDigest::from_slice(&[0u8; 31]), None);
    }

    #[test]
    fn test_stripe_in_range() {
        for i in 0..100u32 {
            let d = ContentDigest::of(&i.to_le_bytes());
            assert!(d.stripe(64) < 64);
        }
        assert_eq!(ContentDigest::of(b"a").stripe(1), 0);
    }
}
