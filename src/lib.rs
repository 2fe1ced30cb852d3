#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! GPU pipeline and resource deduplication cache.
//!
//! Descriptors are hashed by [`StructuralHasher`] into typed keys; the
//! [`ResourceCache`] builds each distinct object once and tracks which
//! primitives use it; [`ResourceCache::get_render_setup`] hands the finished
//! handles to the draw loop.

pub mod cache;
pub mod device;
pub mod errors;
pub mod hashing;
pub mod keys;
pub mod primitive;
pub mod render_setup;
pub mod settings;

pub use cache::{
    AnyKey, AppendOutcome, CacheEntry, CacheStats, DeferredBuild, DependencyIndex, EvictionReport,
    OwnerId, OwnerSet, Removal, ResourceCache, ResourceKind, owner_set,
};
pub use device::{BindGroupEntry, GraphicsDevice, LayoutEntry, RenderState};
pub use errors::{CacheError, DeviceError, Result};
pub use hashing::StructuralHasher;
pub use keys::{BindGroupKey, BindGroupLayoutKey, PipelineKey, PipelineLayoutKey, ShaderKey};
pub use primitive::{PrimitiveAssembler, PrimitiveDescriptor};
pub use render_setup::{PrimitiveKeys, RenderSetup};
pub use settings::CacheSettings;
