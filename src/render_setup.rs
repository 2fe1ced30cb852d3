//! Render setup resolution.
//!
//! The draw-call recorder needs five objects per primitive and side. They are
//! looked up (never created) from the keys the primitive was assembled with.

use crate::cache::{AnyKey, ResourceCache};
use crate::device::GraphicsDevice;
use crate::errors::{CacheError, Result};
use crate::keys::{BindGroupKey, BindGroupLayoutKey, PipelineKey, PipelineLayoutKey, ShaderKey};

/// Every cache key one primitive references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveKeys {
    pub pipeline: PipelineKey,
    pub pipeline_layout: PipelineLayoutKey,
    pub bind_group: BindGroupKey,
    /// Material bind group layout.
    pub bind_group_layout: BindGroupLayoutKey,
    /// Geometry (vertex-stage) bind group layout.
    pub geometry_layout: BindGroupLayoutKey,
    pub shader: ShaderKey,
}

impl PrimitiveKeys {
    /// Keys from the most derived to the least: pipeline first, shader last.
    #[must_use]
    pub fn keys_top_down(&self) -> [AnyKey; 6] {
        [
            self.pipeline.into(),
            self.pipeline_layout.into(),
            self.bind_group.into(),
            self.bind_group_layout.into(),
            self.geometry_layout.into(),
            self.shader.into(),
        ]
    }
}

/// Borrowed handles for one draw call.
pub struct RenderSetup<'a, D: GraphicsDevice> {
    pub pipeline: &'a D::RenderPipeline,
    pub pipeline_layout: &'a D::PipelineLayout,
    pub bind_group: &'a D::BindGroup,
    pub bind_group_layout: &'a D::BindGroupLayout,
    pub shader_module: &'a D::ShaderModule,
}

impl<D: GraphicsDevice> Clone for RenderSetup<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: GraphicsDevice> Copy for RenderSetup<'_, D> {}

impl<D: GraphicsDevice> ResourceCache<D> {
    /// Resolves all five handles for a primitive.
    ///
    /// Every key must have been appended (and finished building) before the
    /// primitive is drawn, so any absence is reported as
    /// [`MissingDependency`](CacheError::MissingDependency).
    pub fn get_render_setup(&self, keys: &PrimitiveKeys) -> Result<RenderSetup<'_, D>> {
        Ok(RenderSetup {
            pipeline: self
                .resolve_pipeline(keys.pipeline)
                .ok_or_else(|| CacheError::missing(keys.pipeline))?,
            pipeline_layout: self
                .resolve_pipeline_layout(keys.pipeline_layout)
                .ok_or_else(|| CacheError::missing(keys.pipeline_layout))?,
            bind_group: self
                .resolve_bind_group(keys.bind_group)
                .ok_or_else(|| CacheError::missing(keys.bind_group))?,
            bind_group_layout: self
                .resolve_bind_group_layout(keys.bind_group_layout)
                .ok_or_else(|| CacheError::missing(keys.bind_group_layout))?,
            shader_module: self
                .resolve_shader_module(keys.shader)
                .ok_or_else(|| CacheError::missing(keys.shader))?,
        })
    }
}
