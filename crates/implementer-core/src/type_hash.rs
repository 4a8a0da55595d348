//! Deterministic hash-based identity for targets, members, and synthesized types.
//!
//! [`TypeHash`] is a 64-bit hash computed from names and signatures. The same
//! input always produces the same hash, so a member can be identified before
//! the target it belongs to has finished building, and lookups need a single
//! map keyed by hash.
//!
//! # Hash Computation
//!
//! Uses XXHash64 with domain-specific mixing constants so that a type named
//! `foo` and a member named `foo` never collide.
//!
//! # Examples
//!
//! ```
//! use implementer_core::TypeHash;
//!
//! let owner = TypeHash::from_name("ICalculator");
//! let int_hash = TypeHash::from_name("int");
//!
//! let add_ii = TypeHash::from_member(owner, "add", &[int_hash, int_hash]);
//! let add_i = TypeHash::from_member(owner, "add", &[int_hash]);
//! assert_ne!(add_ii, add_i);
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
pub mod hash_constants {
    /// Separator constant for path components
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for type hashes
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for member hashes
    pub const MEMBER: u64 = 0x7d3c8b4a92e15f6d;

    /// Domain marker for synthesized type hashes
    pub const SYNTHESIZED: u64 = 0x9a7f3d5e2b8c4601;

    /// Per-position parameter markers; positions past the table derive
    /// their marker from the first entry.
    pub const PARAM_MARKERS: [u64; 8] = [
        0x51a0c3e1d9b47f25,
        0x8e2d6b19f04a73c7,
        0x3c97e5a2b16d08f4,
        0xd40b8f6e27c95a13,
        0x6fa21c74e83b0d59,
        0xb7583d0a9f61e2c6,
        0x29e4f7b85c0a136d,
        0xe16c0952a7d3b84f,
    ];
}

/// A deterministic 64-bit hash identifying a type, a member, or a synthesized type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a type name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a member hash from owner type, member name and parameter type hashes.
    ///
    /// Parameter order matters - `(int, float)` and `(float, int)` differ.
    #[inline]
    pub fn from_member(owner: TypeHash, name: &str, param_hashes: &[TypeHash]) -> Self {
        let hash = hash_constants::MEMBER ^ owner.0 ^ xxh64(name.as_bytes(), 0);
        TypeHash(mix_params(hash, param_hashes))
    }

    /// Create the identity of a synthesized type.
    ///
    /// `serial` distinguishes separate sessions implementing the same target
    /// with the same custom-data type.
    #[inline]
    pub fn from_synthesized(target: TypeHash, data: Option<TypeHash>, serial: u64) -> Self {
        let mut hash = hash_constants::SYNTHESIZED ^ target.0;
        if let Some(data) = data {
            hash = hash.wrapping_mul(hash_constants::SEP).wrapping_add(data.0);
        }
        TypeHash(hash.wrapping_mul(hash_constants::SEP).wrapping_add(serial))
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

fn mix_params(mut hash: u64, param_hashes: &[TypeHash]) -> u64 {
    for (i, param) in param_hashes.iter().enumerate() {
        let marker = hash_constants::PARAM_MARKERS
            .get(i)
            .copied()
            .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
        hash = hash
            .wrapping_mul(hash_constants::SEP)
            .wrapping_add(marker ^ param.0);
    }
    hash
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
