//! Cache Settings
//!
//! Configuration shared by [`StructuralHasher`] and [`ResourceCache`]. The
//! settings are a plain value owned by whoever owns the cache; there is no
//! global configuration.
//!
//! ```rust,ignore
//! use myth_cache::CacheSettings;
//!
//! let settings = CacheSettings {
//!     verify_hashes: true,
//!     panic_on_collision: true,
//!     ..Default::default()
//! };
//! ```
//!
//! [`StructuralHasher`]: crate::hashing::StructuralHasher
//! [`ResourceCache`]: crate::cache::ResourceCache

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Keep a `(kind, key) -> 128-bit fingerprint` ledger and report
    /// structural hash collisions.
    pub verify_hashes: bool,

    /// Panic on a detected collision instead of logging it.
    pub panic_on_collision: bool,

    /// Maximum number of distinct shader texts memoized by the hasher. The
    /// memo is cleared when it grows past this.
    pub shader_memo_capacity: usize,

    /// Maximum number of fingerprints kept for collision checks. The ledger
    /// is cleared when it grows past this, so only collisions between keys
    /// hashed since the last reset are caught.
    pub ledger_capacity: usize,

    /// Pre-sized capacity of each resource map.
    pub initial_capacity: usize,

    /// Dump shader text at `trace` level whenever a module is compiled.
    pub log_shader_source: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            verify_hashes: cfg!(debug_assertions),
            panic_on_collision: false,
            shader_memo_capacity: 1024,
            ledger_capacity: 65536,
            initial_capacity: 64,
            log_shader_source: false,
        }
    }
}
