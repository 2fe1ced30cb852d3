//! Resource kinds as a closed sum type.
//!
//! The five maps are selected with a `match` over [`ResourceKind`] / [`AnyKey`]
//! rather than by name, so every dispatch site is checked for exhaustiveness.

use std::fmt;

use crate::device::GraphicsDevice;
use crate::keys::{BindGroupKey, BindGroupLayoutKey, PipelineKey, PipelineLayoutKey, ShaderKey};

/// The five resource kinds held by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    ShaderModule,
    BindGroupLayout,
    BindGroup,
    PipelineLayout,
    Pipeline,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        Self::ShaderModule,
        Self::BindGroupLayout,
        Self::BindGroup,
        Self::PipelineLayout,
        Self::Pipeline,
    ];

    /// Dense index in `0..5`, in [`ResourceKind::ALL`] order.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ShaderModule => "shader module",
            Self::BindGroupLayout => "bind group layout",
            Self::BindGroup => "bind group",
            Self::PipelineLayout => "pipeline layout",
            Self::Pipeline => "pipeline",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A key from any of the five key spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnyKey {
    ShaderModule(ShaderKey),
    BindGroupLayout(BindGroupLayoutKey),
    BindGroup(BindGroupKey),
    PipelineLayout(PipelineLayoutKey),
    Pipeline(PipelineKey),
}

impl AnyKey {
    #[must_use]
    pub const fn kind(self) -> ResourceKind {
        match self {
            Self::ShaderModule(_) => ResourceKind::ShaderModule,
            Self::BindGroupLayout(_) => ResourceKind::BindGroupLayout,
            Self::BindGroup(_) => ResourceKind::BindGroup,
            Self::PipelineLayout(_) => ResourceKind::PipelineLayout,
            Self::Pipeline(_) => ResourceKind::Pipeline,
        }
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        match self {
            Self::ShaderModule(k) => k.raw(),
            Self::BindGroupLayout(k) => k.raw(),
            Self::BindGroup(k) => k.raw(),
            Self::PipelineLayout(k) => k.raw(),
            Self::Pipeline(k) => k.raw(),
        }
    }
}

impl fmt::Display for AnyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:016x}", self.kind(), self.raw())
    }
}

macro_rules! any_key_from {
    ($($key:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$key> for AnyKey {
                #[inline]
                fn from(key: $key) -> Self {
                    Self::$variant(key)
                }
            }
        )*
    };
}

any_key_from! {
    ShaderKey => ShaderModule,
    BindGroupLayoutKey => BindGroupLayout,
    BindGroupKey => BindGroup,
    PipelineLayoutKey => PipelineLayout,
    PipelineKey => Pipeline,
}

/// A finished resource of any kind, as delivered by a deferred build.
pub enum BuiltResource<D: GraphicsDevice> {
    ShaderModule(D::ShaderModule),
    BindGroupLayout(D::BindGroupLayout),
    BindGroup(D::BindGroup),
    PipelineLayout(D::PipelineLayout),
    Pipeline(D::RenderPipeline),
}

impl<D: GraphicsDevice> BuiltResource<D> {
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::ShaderModule(_) => ResourceKind::ShaderModule,
            Self::BindGroupLayout(_) => ResourceKind::BindGroupLayout,
            Self::BindGroup(_) => ResourceKind::BindGroup,
            Self::PipelineLayout(_) => ResourceKind::PipelineLayout,
            Self::Pipeline(_) => ResourceKind::Pipeline,
        }
    }
}
