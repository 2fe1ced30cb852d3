//! Graphics device capability.
//!
//! The cache never talks to a GPU API directly. It is handed a
//! [`GraphicsDevice`] whose associated types are the compiled objects it
//! stores, and calls the device only on a cache miss. Releasing an object is
//! dropping it.
//!
//! - [`descriptors`]: layout entries, bind group entries, sampler / view keys
//! - [`render_state`]: hashable fixed-function pipeline state
//! - [`wgpu_backend`]: the implementation for `wgpu::Device`

pub mod descriptors;
pub mod render_state;
pub mod wgpu_backend;

pub use descriptors::{
    BindGroupEntry, BoundResource, BufferKind, ContentDigest, FilterKey, LayoutBindingKind,
    LayoutEntry, SamplerKey, TextureViewKey,
};
pub use render_state::{
    BlendComponentKey, BlendStateKey, ColorTargetKey, DepthBiasKey, DepthStencilKey,
    MultisampleKey, RenderState, StencilFaceKey, StencilStateKey, VertexBufferLayoutKey,
};

use crate::errors::DeviceError;

/// Creates the GPU objects the cache stores.
///
/// Every constructor may reject its descriptor; the cache turns a rejection
/// into [`CacheError::ConstructionFailure`](crate::errors::CacheError) and
/// inserts nothing.
pub trait GraphicsDevice: Sized {
    type ShaderModule;
    type BindGroupLayout;
    type BindGroup;
    type PipelineLayout;
    type RenderPipeline;

    type Buffer;
    type TextureView;
    type Sampler;

    fn create_shader_module(
        &self,
        label: &str,
        source: &str,
    ) -> Result<Self::ShaderModule, DeviceError>;

    fn create_bind_group_layout(
        &self,
        label: &str,
        entries: &[LayoutEntry],
    ) -> Result<Self::BindGroupLayout, DeviceError>;

    fn create_bind_group(
        &self,
        label: &str,
        layout: &Self::BindGroupLayout,
        entries: &[BindGroupEntry<'_, Self>],
    ) -> Result<Self::BindGroup, DeviceError>;

    /// `layouts` is in bind group index order.
    fn create_pipeline_layout(
        &self,
        label: &str,
        layouts: &[&Self::BindGroupLayout],
    ) -> Result<Self::PipelineLayout, DeviceError>;

    fn create_render_pipeline(
        &self,
        label: &str,
        layout: &Self::PipelineLayout,
        shader: &Self::ShaderModule,
        state: &RenderState,
    ) -> Result<Self::RenderPipeline, DeviceError>;
}
