//! Error Types
//!
//! This module defines the error types used throughout the cache.
//!
//! # Overview
//!
//! The main error type [`CacheError`] covers the three failure modes of the
//! cache:
//! - The device rejected a descriptor while an entry was being built
//! - A composite entry referenced a dependency that was never appended
//! - An eviction named owners that were never recorded for an entry
//!
//! Hashing and lookups cannot fail. Only construction can, and a failed
//! construction never leaves anything behind in the maps.
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, CacheError>`.
//!
//! ```rust,ignore
//! use myth_cache::errors::{CacheError, Result};
//!
//! fn prepare() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::cache::kind::AnyKey;
use crate::cache::owner::{OwnerId, OwnerSet};

/// Error produced by a [`GraphicsDevice`](crate::device::GraphicsDevice)
/// or a caller-supplied build closure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DeviceError(pub String);

impl DeviceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The main error type for the resource cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The device rejected a descriptor while building a cache entry.
    ///
    /// Not retried. The map for `key` is left exactly as it was before the
    /// append.
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailure {
        key: AnyKey,
        #[source]
        source: DeviceError,
    },

    /// A lookup or a composite builder referenced an entry that does not exist.
    ///
    /// Dependencies must be appended bottom-up (layouts before pipeline layouts
    /// before pipelines), so this always indicates a caller ordering bug.
    #[error("Missing dependency {key}: dependencies must be appended bottom-up")]
    MissingDependency { key: AnyKey },

    /// An eviction named owners that were never recorded for the entry.
    #[error("Inconsistent owner set for {key}: none of {owners:?} are recorded owners")]
    InconsistentOwnerSet { key: AnyKey, owners: Vec<OwnerId> },
}

impl CacheError {
    pub(crate) fn construction(key: impl Into<AnyKey>, source: DeviceError) -> Self {
        Self::ConstructionFailure {
            key: key.into(),
            source,
        }
    }

    pub(crate) fn missing(key: impl Into<AnyKey>) -> Self {
        Self::MissingDependency { key: key.into() }
    }

    pub(crate) fn inconsistent(key: impl Into<AnyKey>, owners: &OwnerSet) -> Self {
        let mut owners: Vec<OwnerId> = owners.iter().copied().collect();
        owners.sort_unstable();
        Self::InconsistentOwnerSet {
            key: key.into(),
            owners,
        }
    }

    /// The key the error is about.
    #[must_use]
    pub fn key(&self) -> AnyKey {
        match self {
            Self::ConstructionFailure { key, .. }
            | Self::MissingDependency { key }
            | Self::InconsistentOwnerSet { key, .. } => *key,
        }
    }
}

/// Alias for `Result<T, CacheError>`.
pub type Result<T> = std::result::Result<T, CacheError>;
