//! [`GraphicsDevice`] for `wgpu::Device`.
//!
//! Descriptors that would exceed the device limits (or are malformed in ways
//! that are cheap to check up front) are rejected before reaching wgpu, so
//! the cache sees a [`DeviceError`] instead of a validation panic later.
//! Anything wgpu itself rejects goes to the device's uncaptured error handler.

use std::borrow::Cow;

use rustc_hash::FxHashSet;

use super::{BindGroupEntry, BoundResource, GraphicsDevice, LayoutEntry, RenderState};
use crate::errors::DeviceError;

fn check_unique_bindings(
    label: &str,
    bindings: impl Iterator<Item = u32>,
) -> Result<(), DeviceError> {
    let mut seen = FxHashSet::default();
    for binding in bindings {
        if !seen.insert(binding) {
            return Err(DeviceError::new(format!(
                "{label}: binding {binding} is declared more than once"
            )));
        }
    }
    Ok(())
}

fn check_limit(label: &str, what: &str, count: usize, limit: u32) -> Result<(), DeviceError> {
    if count > limit as usize {
        return Err(DeviceError::new(format!(
            "{label}: {count} {what} exceeds the device limit of {limit}"
        )));
    }
    Ok(())
}

impl GraphicsDevice for wgpu::Device {
    type ShaderModule = wgpu::ShaderModule;
    type BindGroupLayout = wgpu::BindGroupLayout;
    type BindGroup = wgpu::BindGroup;
    type PipelineLayout = wgpu::PipelineLayout;
    type RenderPipeline = wgpu::RenderPipeline;

    type Buffer = wgpu::Buffer;
    type TextureView = wgpu::TextureView;
    type Sampler = wgpu::Sampler;

    fn create_shader_module(
        &self,
        label: &str,
        source: &str,
    ) -> Result<wgpu::ShaderModule, DeviceError> {
        if source.trim().is_empty() {
            return Err(DeviceError::new(format!("{label}: empty shader source")));
        }

        Ok(self.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
        }))
    }

    fn create_bind_group_layout(
        &self,
        label: &str,
        entries: &[LayoutEntry],
    ) -> Result<wgpu::BindGroupLayout, DeviceError> {
        check_unique_bindings(label, entries.iter().map(|e| e.binding))?;
        check_limit(
            label,
            "bindings",
            entries.len(),
            self.limits().max_bindings_per_bind_group,
        )?;

        let entries: Vec<wgpu::BindGroupLayoutEntry> =
            entries.iter().map(LayoutEntry::to_wgpu).collect();

        Ok(self.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        }))
    }

    fn create_bind_group(
        &self,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        entries: &[BindGroupEntry<'_, Self>],
    ) -> Result<wgpu::BindGroup, DeviceError> {
        check_unique_bindings(label, entries.iter().map(|e| e.binding))?;

        let entries: Vec<wgpu::BindGroupEntry<'_>> = entries
            .iter()
            .map(|entry| wgpu::BindGroupEntry {
                binding: entry.binding,
                resource: match &entry.resource {
                    BoundResource::Buffer {
                        buffer,
                        offset,
                        size,
                        ..
                    } => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: *offset,
                        size: *size,
                    }),
                    BoundResource::Texture { view, .. } => wgpu::BindingResource::TextureView(view),
                    BoundResource::Sampler { sampler, .. } => {
                        wgpu::BindingResource::Sampler(sampler)
                    }
                },
            })
            .collect();

        Ok(self.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        }))
    }

    fn create_pipeline_layout(
        &self,
        label: &str,
        layouts: &[&wgpu::BindGroupLayout],
    ) -> Result<wgpu::PipelineLayout, DeviceError> {
        check_limit(label, "bind groups", layouts.len(), self.limits().max_bind_groups)?;

        let layouts: Vec<Option<&wgpu::BindGroupLayout>> = layouts.iter().copied().map(Some).collect();
        Ok(self.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &layouts,
            immediate_size: 0,
        }))
    }

    fn create_render_pipeline(
        &self,
        label: &str,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        state: &RenderState,
    ) -> Result<wgpu::RenderPipeline, DeviceError> {
        let limits = self.limits();
        check_limit(
            label,
            "vertex buffers",
            state.vertex_buffers.len(),
            limits.max_vertex_buffers,
        )?;
        check_limit(
            label,
            "color targets",
            state.color_targets.len(),
            limits.max_color_attachments,
        )?;
        if state.color_targets.is_empty() && state.depth_stencil.is_none() {
            return Err(DeviceError::new(format!(
                "{label}: pipeline has neither color targets nor depth-stencil"
            )));
        }

        let vertex_buffers = state.vertex_buffers_wgpu();
        let color_targets = state.color_targets_wgpu();

        Ok(self.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &color_targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: state.primitive_state(),
            depth_stencil: state.depth_stencil.map(|ds| ds.to_wgpu()),
            multisample: state.multisample.to_wgpu(),
            multiview_mask: None,
            cache: None,
        }))
    }
}
