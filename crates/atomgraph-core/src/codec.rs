//! Fingerprint codec: bounds every inline value slot to a fixed size.
//!
//! Content that fits in `inline_budget` bytes is stored verbatim, zero
//! padded. Anything longer is replaced inline by its SHA-256 digest
//! followed by the first `inline_budget - 32` bytes of content, and the
//! caller must retain the full payload elsewhere (the overflow table).
//! The codec never discards information on its own: [`FingerprintCodec::reassemble`]
//! refuses to return anything when the overflow payload is missing or does
//! not match the fingerprint.
//!
//! # Layout
//!
//! ```text
//! len <= budget:  [ content ............ | 0 0 0 ]
//! len >  budget:  [ sha256 (32 bytes) | content[0..budget-32] ]
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::{AtomMetadata, ContentDigest, FingerprintAlgorithm, DIGEST_LEN};

/// Default inline slot size in bytes.
pub const DEFAULT_INLINE_BUDGET: usize = 64;

/// Smallest budget that still holds a digest.
pub const MIN_INLINE_BUDGET: usize = DIGEST_LEN;

/// Output of [`FingerprintCodec::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineRecord {
    /// Exactly `inline_budget` bytes
    pub bytes: Vec<u8>,
    /// Content did not fit; full payload must be stored out of line
    pub overflow: bool,
    /// Length of the full content
    pub content_len: u64,
    /// SHA-256 of the full content
    pub digest: ContentDigest,
}

/// Interpretation of an inline slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineView<'a> {
    /// The full content, padding removed
    Content(&'a [u8]),
    /// Digest plus a content prefix; the rest lives in overflow
    Fingerprint {
        digest: &'a [u8],
        prefix: &'a [u8],
    },
}

/// Encodes content into fixed-size inline records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintCodec {
    inline_budget: usize,
}

impl Default for FingerprintCodec {
    fn default() -> Self {
        Self {
            inline_budget: DEFAULT_INLINE_BUDGET,
        }
    }
}

impl FingerprintCodec {
    /// Create a codec with the given slot size.
    ///
    /// # Errors
    ///
    /// `CoreError::ConfigError` when `inline_budget < 32`.
    pub fn new(inline_budget: usize) -> CoreResult<Self> {
        if inline_budget < MIN_INLINE_BUDGET {
            return Err(CoreError::ConfigError(format!(
                "inline budget must be at least {} bytes, got {}",
                MIN_INLINE_BUDGET, inline_budget
            )));
        }
        Ok(Self { inline_budget })
    }

    #[inline]
    pub fn inline_budget(&self) -> usize {
        self.inline_budget
    }

    /// Number of content bytes kept inline next to the digest.
    #[inline]
    pub fn prefix_len(&self) -> usize {
        self.inline_budget - DIGEST_LEN
    }

    #[inline]
    pub fn digest(&self, content: &[u8]) -> ContentDigest {
        ContentDigest::of(content)
    }

    /// Whether `content_len` bytes need an overflow payload.
    #[inline]
    pub fn needs_overflow(&self, content_len: usize) -> bool {
        content_len > self.inline_budget
    }

    /// Encode content. Total and deterministic.
    pub fn encode(&self, content: &[u8]) -> InlineRecord {
        self.encode_with_digest(content, ContentDigest::of(content))
    }

    /// Encode with a digest the caller already computed.
    pub fn encode_with_digest(&self, content: &[u8], digest: ContentDigest) -> InlineRecord {
        let mut bytes = Vec::with_capacity(self.inline_budget);
        let overflow = self.needs_overflow(content.len());
        if overflow {
            bytes.extend_from_slice(digest.as_bytes());
            bytes.extend_from_slice(&content[..self.prefix_len()]);
        } else {
            bytes.extend_from_slice(content);
            bytes.resize(self.inline_budget, 0);
        }
        InlineRecord {
            bytes,
            overflow,
            content_len: content.len() as u64,
            digest,
        }
    }

    /// Codec-owned metadata fields for a record.
    pub fn metadata_for(&self, record: &InlineRecord) -> AtomMetadata {
        AtomMetadata {
            overflow: record.overflow,
            original_size: record.content_len,
            fingerprint_algorithm: FingerprintAlgorithm::Sha256,
            ..Default::default()
        }
    }

    /// Interpret an inline slot.
    pub fn view<'a>(&self, record: &'a InlineRecord) -> InlineView<'a> {
        if record.overflow {
            let split = DIGEST_LEN.min(record.bytes.len());
            InlineView::Fingerprint {
                digest: &record.bytes[..split],
                prefix: &record.bytes[split..],
            }
        } else {
            let len = (record.content_len as usize).min(record.bytes.len());
            InlineView::Content(&record.bytes[..len])
        }
    }

    /// Recover the full content of a record.
    ///
    /// # Errors
    ///
    /// `CoreError::IntegrityViolation` when:
    /// - the record overflows and `overflow` is `None`
    /// - the payload length, digest or prefix disagrees with the record
    /// - an inline record claims more bytes than its slot holds
    pub fn reassemble(&self, record: &InlineRecord, overflow: Option<&[u8]>) -> CoreResult<Vec<u8>> {
        self.verify(record, overflow)?;
        match overflow {
            Some(payload) if record.overflow => Ok(payload.to_vec()),
            _ => Ok(record.bytes[..record.content_len as usize].to_vec()),
        }
    }

    /// Integrity checks of [`reassemble`](Self::reassemble) without copying.
    pub fn verify(&self, record: &InlineRecord, overflow: Option<&[u8]>) -> CoreResult<()> {
        if !record.overflow {
            let len = record.content_len as usize;
            if len > record.bytes.len() {
                return Err(CoreError::IntegrityViolation(format!(
                    "inline record for {} claims {} bytes but slot holds {}",
                    record.digest,
                    len,
                    record.bytes.len()
                )));
            }
            return Ok(());
        }

        let payload = overflow.ok_or_else(|| {
            CoreError::IntegrityViolation(format!(
                "overflow payload missing for {}",
                record.digest
            ))
        })?;

        if payload.len() as u64 != record.content_len {
            return Err(CoreError::IntegrityViolation(format!(
                "overflow payload for {} is {} bytes, expected {}",
                record.digest,
                payload.len(),
                record.content_len
            )));
        }

        if ContentDigest::of(payload) != record.digest {
            return Err(CoreError::IntegrityViolation(format!(
                "overflow payload digest does not match {}",
                record.digest
            )));
        }

        match self.view(record) {
            InlineView::Fingerprint { digest, prefix }
                if digest == record.digest.as_bytes() && payload.starts_with(prefix) => {}
            _ => {
                return Err(CoreError::IntegrityViolation(format!(
                    "inline fingerprint for {} does not match its payload",
                    record.digest
                )))
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_stays_inline() {
        let codec = FingerprintCodec::default();
        let record = codec.encode(b"hello");

        assert!(!record.overflow);
        assert_eq!(record.bytes.len(), 64);
        assert_eq!(&record.bytes[..5], b"hello");
        assert!(record.bytes[5..].iter().all(|b| *b == 0));
        assert_eq!(codec.view(&record), InlineView::Content(b"hello"));
        assert_eq!(codec.reassemble(&record, None).unwrap(), b"hello");
    }

    #[test]
    fn test_500_byte_blob_fingerprint_layout() {
        let codec = FingerprintCodec::default();
        let content: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();
        let record = codec.encode(&content);

        println!("=== TEST 500-byte blob: overflow={} len={}", record.overflow, record.bytes.len());
        assert!(record.overflow);
        assert_eq!(record.bytes.len(), 64);
        assert_eq!(&record.bytes[..32], ContentDigest::of(&content).as_bytes());
        assert_eq!(&record.bytes[32..], &content[..32]);
        assert_eq!(record.content_len, 500);

        let back = codec.reassemble(&record, Some(&content)).unwrap();
        assert_eq!(back, content);
    }

    #[test]
    fn edge_case_exact_budget_does_not_overflow() {
        let codec = FingerprintCodec::default();
        let exact = vec![7u8; 64];
        let record = codec.encode(&exact);
        assert!(!record.overflow);
        assert_eq!(record.bytes, exact);

        let over = vec![7u8; 65];
        assert!(codec.encode(&over).overflow);
    }

    #[test]
    fn edge_case_empty_content() {
        let codec = FingerprintCodec::default();
        let record = codec.encode(b"");
        assert!(!record.overflow);
        assert_eq!(record.content_len, 0);
        assert_eq!(codec.reassemble(&record, None).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_budget_below_digest_rejected() {
        assert!(matches!(
            FingerprintCodec::new(31),
            Err(CoreError::ConfigError(_))
        ));
        let codec = FingerprintCodec::new(32).unwrap();
        let record = codec.encode(&[1u8; 40]);
        assert!(record.overflow);
        assert_eq!(record.bytes.len(), 32);
        assert_eq!(codec.prefix_len(), 0);
    }

    #[test]
    fn test_missing_overflow_payload_is_integrity_violation() {
        let codec = FingerprintCodec::default();
        let record = codec.encode(&[9u8; 100]);
        assert!(matches!(
            codec.reassemble(&record, None),
            Err(CoreError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn test_tampered_payload_is_integrity_violation() {
        let codec = FingerprintCodec::default();
        let content = vec![3u8; 200];
        let record = codec.encode(&content);

        let mut tampered = content.clone();
        tampered[150] = 4;
        assert!(matches!(
            codec.reassemble(&record, Some(&tampered)),
            Err(CoreError::IntegrityViolation(_))
        ));

        let truncated = &content[..199];
        assert!(matches!(
            codec.reassemble(&record, Some(truncated)),
            Err(CoreError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn test_metadata_for_sets_codec_fields() {
        let codec = FingerprintCodec::default();
        let meta = codec.metadata_for(&codec.encode(&[0u8; 300]));
        assert!(meta.overflow);
        assert_eq!(meta.original_size, 300);
        assert_eq!(meta.fingerprint_algorithm, FingerprintAlgorithm::Sha256);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let codec = FingerprintCodec::new(48).unwrap();
        let content = b"the same bytes produce the same record every time, always";
        assert_eq!(codec.encode(content), codec.encode(content));
    }
}
