//! Shared fixtures: a counting mock device and a few canned descriptors.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::smallvec;

use myth_cache::device::{
    BindGroupEntry, ColorTargetKey, DepthStencilKey, GraphicsDevice, LayoutEntry, RenderState,
    SamplerKey, TextureViewKey,
};
use myth_cache::{DeviceError, PrimitiveDescriptor, ResourceKind};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Mock device
// ============================================================================

#[derive(Default)]
pub struct Counters {
    created: [AtomicUsize; 5],
    released: [AtomicUsize; 5],
}

impl Counters {
    pub fn created(&self, kind: ResourceKind) -> usize {
        self.created[kind.index()].load(Ordering::SeqCst)
    }

    pub fn released(&self, kind: ResourceKind) -> usize {
        self.released[kind.index()].load(Ordering::SeqCst)
    }

    pub fn live(&self, kind: ResourceKind) -> usize {
        self.created(kind) - self.released(kind)
    }
}

/// A fake GPU object. Dropping it counts as a release.
pub struct MockObject {
    pub kind: ResourceKind,
    pub label: String,
    counters: Arc<Counters>,
}

impl Drop for MockObject {
    fn drop(&mut self) {
        self.counters.released[self.kind.index()].fetch_add(1, Ordering::SeqCst);
    }
}

/// Stand-in for buffers, texture views and samplers. Only its identity matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockHandle(pub u32);

#[derive(Clone, Default)]
pub struct MockDevice {
    counters: Arc<Counters>,
    fail_next: Arc<Mutex<Option<ResourceKind>>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Makes the next construction of `kind` fail.
    pub fn fail_next(&self, kind: ResourceKind) {
        *self.fail_next.lock() = Some(kind);
    }

    pub fn object(&self, kind: ResourceKind, label: &str) -> Result<MockObject, DeviceError> {
        {
            let mut fail = self.fail_next.lock();
            if *fail == Some(kind) {
                *fail = None;
                return Err(DeviceError::new(format!("{label}: rejected {kind}")));
            }
        }
        self.counters.created[kind.index()].fetch_add(1, Ordering::SeqCst);
        Ok(MockObject {
            kind,
            label: label.to_owned(),
            counters: self.counters.clone(),
        })
    }
}

impl GraphicsDevice for MockDevice {
    type ShaderModule = MockObject;
    type BindGroupLayout = MockObject;
    type BindGroup = MockObject;
    type PipelineLayout = MockObject;
    type RenderPipeline = MockObject;

    type Buffer = MockHandle;
    type TextureView = MockHandle;
    type Sampler = MockHandle;

    fn create_shader_module(&self, label: &str, source: &str) -> Result<MockObject, DeviceError> {
        if source.is_empty() {
            return Err(DeviceError::new("empty shader"));
        }
        self.object(ResourceKind::ShaderModule, label)
    }

    fn create_bind_group_layout(
        &self,
        label: &str,
        _entries: &[LayoutEntry],
    ) -> Result<MockObject, DeviceError> {
        self.object(ResourceKind::BindGroupLayout, label)
    }

    fn create_bind_group(
        &self,
        label: &str,
        layout: &MockObject,
        _entries: &[BindGroupEntry<'_, Self>],
    ) -> Result<MockObject, DeviceError> {
        assert_eq!(layout.kind, ResourceKind::BindGroupLayout);
        self.object(ResourceKind::BindGroup, label)
    }

    fn create_pipeline_layout(
        &self,
        label: &str,
        layouts: &[&MockObject],
    ) -> Result<MockObject, DeviceError> {
        assert!(layouts.iter().all(|l| l.kind == ResourceKind::BindGroupLayout));
        self.object(ResourceKind::PipelineLayout, label)
    }

    fn create_render_pipeline(
        &self,
        label: &str,
        layout: &MockObject,
        shader: &MockObject,
        _state: &RenderState,
    ) -> Result<MockObject, DeviceError> {
        assert_eq!(layout.kind, ResourceKind::PipelineLayout);
        assert_eq!(shader.kind, ResourceKind::ShaderModule);
        self.object(ResourceKind::Pipeline, label)
    }
}

// ============================================================================
// Descriptors
// ============================================================================

pub const SHADER: &str = "@vertex fn vs_main() {}\n@fragment fn fs_main() {}";
pub const SHADER_SKINNED: &str = "// SKINNING\n@vertex fn vs_main() {}\n@fragment fn fs_main() {}";

pub fn material_layout() -> Vec<LayoutEntry> {
    let vf = wgpu::ShaderStages::VERTEX_FRAGMENT;
    let f = wgpu::ShaderStages::FRAGMENT;
    vec![
        LayoutEntry::uniform(0, vf),
        LayoutEntry::texture_2d(1, f),
        LayoutEntry::sampler(2, f),
    ]
}

/// `material_layout` plus a normal map slot.
pub fn normal_mapped_layout() -> Vec<LayoutEntry> {
    let mut entries = material_layout();
    entries.push(LayoutEntry::texture_2d(3, wgpu::ShaderStages::FRAGMENT));
    entries
}

pub fn geometry_layout() -> Vec<LayoutEntry> {
    vec![LayoutEntry::storage(0, wgpu::ShaderStages::VERTEX, true)]
}

pub fn global_layout() -> Vec<LayoutEntry> {
    vec![LayoutEntry::uniform(0, wgpu::ShaderStages::VERTEX_FRAGMENT)]
}

pub fn opaque_state() -> RenderState {
    RenderState {
        color_targets: smallvec![ColorTargetKey::opaque(wgpu::TextureFormat::Bgra8UnormSrgb)],
        depth_stencil: Some(DepthStencilKey::depth(
            wgpu::TextureFormat::Depth32Float,
            true,
            wgpu::CompareFunction::Less,
        )),
        ..Default::default()
    }
}

/// Material resources, owned so bind group entries can borrow them.
pub struct MaterialData {
    pub uniform: MockHandle,
    pub uniform_bytes: Vec<u8>,
    pub view: MockHandle,
    pub texels: Vec<u8>,
    pub sampler: MockHandle,
    pub normal_view: MockHandle,
    pub normal_texels: Vec<u8>,
}

impl MaterialData {
    /// `handle_base` only changes handle identities, never contents.
    pub fn new(color: [u8; 4], handle_base: u32) -> Self {
        Self {
            uniform: MockHandle(handle_base),
            uniform_bytes: vec![0x3f, 0x80, 0, 0, 0, 0, 0, 0],
            view: MockHandle(handle_base + 1),
            texels: color.repeat(16),
            sampler: MockHandle(handle_base + 2),
            normal_view: MockHandle(handle_base + 3),
            normal_texels: [128u8, 128, 255, 255].repeat(16),
        }
    }

    pub fn entries(&self) -> Vec<BindGroupEntry<'_, MockDevice>> {
        vec![
            BindGroupEntry::buffer(0, "material", &self.uniform, &self.uniform_bytes),
            BindGroupEntry::texture(
                1,
                "base_color_map",
                &self.view,
                TextureViewKey::d2(wgpu::TextureFormat::Rgba8UnormSrgb),
                &self.texels,
            ),
            BindGroupEntry::sampler(
                2,
                "base_color_sampler",
                &self.sampler,
                SamplerKey::linear_repeat(),
            ),
        ]
    }

    pub fn normal_mapped_entries(&self) -> Vec<BindGroupEntry<'_, MockDevice>> {
        let mut entries = self.entries();
        entries.push(BindGroupEntry::texture(
            3,
            "normal_map",
            &self.normal_view,
            TextureViewKey::d2(wgpu::TextureFormat::Rgba8Unorm),
            &self.normal_texels,
        ));
        entries
    }
}

/// Owned inputs of a `PrimitiveDescriptor`.
pub struct PrimitiveFixture {
    pub shader: &'static str,
    pub material_layout: Vec<LayoutEntry>,
    pub geometry_layout: Vec<LayoutEntry>,
    pub state: RenderState,
}

impl PrimitiveFixture {
    pub fn standard() -> Self {
        Self {
            shader: SHADER,
            material_layout: material_layout(),
            geometry_layout: geometry_layout(),
            state: opaque_state(),
        }
    }

    pub fn normal_mapped() -> Self {
        Self {
            material_layout: normal_mapped_layout(),
            ..Self::standard()
        }
    }

    pub fn descriptor<'a>(
        &'a self,
        entries: &'a [BindGroupEntry<'a, MockDevice>],
    ) -> PrimitiveDescriptor<'a, MockDevice> {
        PrimitiveDescriptor {
            label: "primitive",
            shader_source: self.shader,
            material_layout: &self.material_layout,
            material_entries: entries,
            geometry_layout: &self.geometry_layout,
            render_state: &self.state,
        }
    }
}
