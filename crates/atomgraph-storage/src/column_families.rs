//! RocksDB column family definitions.
//!
//! # Column Families (10 total)
//! | Name | Purpose | Key Format | Optimization |
//! |------|---------|------------|--------------|
//! | atoms | Atom rows | atom_id u64 BE (8 bytes) | Bloom filter, point lookups |
//! | atom_digests | Digest -> atom_id | SHA-256 (32 bytes) | Bloom filter |
//! | atom_overflow | Full payload of oversized atoms | atom_id u64 BE | Large blocks |
//! | embeddings | Embedding records | embedding_id u64 BE | Bloom filter |
//! | embedding_vectors | Padded f32 vectors | embedding_id u64 BE | Large blocks |
//! | atom_embeddings | (atom, type) -> embedding_id | atom_id BE + type bytes | 8-byte prefix |
//! | landmarks | Landmark sets | version u32 BE | No compression |
//! | dedup_policies | Immutable policy rows | policy UUID (16 bytes) | No compression |
//! | dedup_active | Active policy per scope | scope UTF-8 | No compression |
//! | system | Counters, active landmark version | string key | No compression |
//!
//! All column families share one LRU block cache.

use rocksdb::{BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBCompressionType, Options, SliceTransform};

/// Column family name constants.
pub mod cf_names {
    pub const ATOMS: &str = "atoms";
    pub const ATOM_DIGESTS: &str = "atom_digests";
    pub const ATOM_OVERFLOW: &str = "atom_overflow";
    pub const EMBEDDINGS: &str = "embeddings";
    pub const EMBEDDING_VECTORS: &str = "embedding_vectors";
    pub const ATOM_EMBEDDINGS: &str = "atom_embeddings";
    pub const LANDMARKS: &str = "landmarks";
    pub const DEDUP_POLICIES: &str = "dedup_policies";
    pub const DEDUP_ACTIVE: &str = "dedup_active";
    pub const SYSTEM: &str = "system";

    /// All column family names, in creation order.
    pub const ALL: &[&str] = &[
        ATOMS,
        ATOM_DIGESTS,
        ATOM_OVERFLOW,
        EMBEDDINGS,
        EMBEDDING_VECTORS,
        ATOM_EMBEDDINGS,
        LANDMARKS,
        DEDUP_POLICIES,
        DEDUP_ACTIVE,
        SYSTEM,
    ];
}

fn compression(enabled: bool) -> DBCompressionType {
    if enabled {
        DBCompressionType::Lz4
    } else {
        DBCompressionType::None
    }
}

/// Options for point-lookup column families (atoms, digests, embedding records).
///
/// - Bloom filter: 10 bits per key
/// - Index and filter blocks cached in the shared cache
pub fn point_lookup_options(cache: &Cache, compress: bool) -> Options {
    let mut block_opts = BlockBasedOptions::default();
    block_opts.set_block_cache(cache);
    block_opts.set_bloom_filter(10.0, false);
    block_opts.set_cache_index_and_filter_blocks(true);

    let mut opts = Options::default();
    opts.set_block_based_table_factory(&block_opts);
    opts.set_compression_type(compression(compress));
    opts.create_if_missing(true);
    opts
}

/// Options for large values (overflow payloads, padded vectors).
///
/// A padded 1998-dim vector is ~8KB, so 64KB blocks hold about eight.
pub fn blob_options(cache: &Cache, compress: bool) -> Options {
    let mut block_opts = BlockBasedOptions::default();
    block_opts.set_block_cache(cache);
    block_opts.set_block_size(64 * 1024);
    block_opts.set_cache_index_and_filter_blocks(true);

    let mut opts = Options::default();
    opts.set_block_based_table_factory(&block_opts);
    opts.set_compression_type(compression(compress));
    opts.create_if_missing(true);
    opts
}

/// Options for `atom_embeddings`: prefix scans by 8-byte atom id.
pub fn atom_embeddings_options(cache: &Cache, compress: bool) -> Options {
    let mut block_opts = BlockBasedOptions::default();
    block_opts.set_block_cache(cache);
    block_opts.set_bloom_filter(10.0, false);
    block_opts.set_cache_index_and_filter_blocks(true);

    let mut opts = Options::default();
    opts.set_block_based_table_factory(&block_opts);
    opts.set_compression_type(compression(compress));
    opts.set_prefix_extractor(SliceTransform::create_fixed_prefix(8));
    opts.create_if_missing(true);
    opts
}

/// Options for small, rarely written families. No compression.
pub fn system_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(DBCompressionType::None);
    opts.create_if_missing(true);
    opts
}

/// All column family descriptors with their tuned options.
pub fn get_column_family_descriptors(cache: &Cache, compress: bool) -> Vec<ColumnFamilyDescriptor> {
    use cf_names::*;
    vec![
        ColumnFamilyDescriptor::new(ATOMS, point_lookup_options(cache, compress)),
        ColumnFamilyDescriptor::new(ATOM_DIGESTS, point_lookup_options(cache, compress)),
        ColumnFamilyDescriptor::new(ATOM_OVERFLOW, blob_options(cache, compress)),
        ColumnFamilyDescriptor::new(EMBEDDINGS, point_lookup_options(cache, compress)),
        ColumnFamilyDescriptor::new(EMBEDDING_VECTORS, blob_options(cache, compress)),
        ColumnFamilyDescriptor::new(ATOM_EMBEDDINGS, atom_embeddings_options(cache, compress)),
        ColumnFamilyDescriptor::new(LANDMARKS, system_options()),
        ColumnFamilyDescriptor::new(DEDUP_POLICIES, system_options()),
        ColumnFamilyDescriptor::new(DEDUP_ACTIVE, system_options()),
        ColumnFamilyDescriptor::new(SYSTEM, system_options()),
    ]
}
