//! Strongly-typed cache keys.
//!
//! Thin `Copy` wrappers around a `u64` structural hash, one per resource kind.
//! Each kind lives in its own key space: a [`ShaderKey`] and a [`PipelineKey`]
//! holding the same number are unrelated and cannot be mixed up.
//!
//! Keys are produced by [`StructuralHasher`] and consumed by [`ResourceCache`].
//!
//! [`StructuralHasher`]: crate::hashing::StructuralHasher
//! [`ResourceCache`]: crate::cache::ResourceCache

use std::fmt;

macro_rules! cache_key {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u64);

        impl $name {
            /// Wraps a raw hash value.
            #[inline]
            #[must_use]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Raw hash value.
            #[inline]
            #[must_use]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, " {:016x}"), self.0)
            }
        }
    };
}

cache_key!(
    /// Key of a compiled shader module (hash of the final shader text).
    ShaderKey,
    "shader module"
);

cache_key!(
    /// Key of a bind group layout (hash of its binding schema).
    BindGroupLayoutKey,
    "bind group layout"
);

cache_key!(
    /// Key of a bind group (layout key + content digests of the bound resources).
    BindGroupKey,
    "bind group"
);

cache_key!(
    /// Key of a pipeline layout (ordered bind group layout keys).
    PipelineLayoutKey,
    "pipeline layout"
);

cache_key!(
    /// Key of a render pipeline (render state + pipeline layout + shader).
    PipelineKey,
    "pipeline"
);
