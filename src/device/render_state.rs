//! Render State
//!
//! Fixed-function pipeline state in a form the structural hasher can consume.
//! The `wgpu` state structs carry floats and bitflags and implement neither
//! `Hash` nor `Eq`, so each part is kept here as a small key type (floats as
//! bit patterns, flags as raw bits) and converted back only when the device
//! actually builds a pipeline.
//!
//! [`RenderState`] is hashed by [`StructuralHasher::pipeline`] and handed to
//! [`GraphicsDevice::create_render_pipeline`] on a miss.
//!
//! [`StructuralHasher::pipeline`]: crate::hashing::StructuralHasher::pipeline
//! [`GraphicsDevice::create_render_pipeline`]: super::GraphicsDevice::create_render_pipeline

use smallvec::SmallVec;

/// Fixed-function state of one render pipeline.
///
/// Every field takes part in the pipeline key. Optional parts
/// (`strip_index_format`, `cull_mode`, `depth_stencil`, per-target `blend`)
/// hash their absence as a distinct value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderState {
    pub topology: wgpu::PrimitiveTopology,
    pub strip_index_format: Option<wgpu::IndexFormat>,
    pub front_face: wgpu::FrontFace,
    pub cull_mode: Option<wgpu::Face>,
    pub polygon_mode: wgpu::PolygonMode,
    pub color_targets: SmallVec<[ColorTargetKey; 2]>,
    pub depth_stencil: Option<DepthStencilKey>,
    pub multisample: MultisampleKey,
    pub vertex_buffers: SmallVec<[VertexBufferLayoutKey; 2]>,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            color_targets: SmallVec::new(),
            depth_stencil: None,
            multisample: MultisampleKey::SINGLE,
            vertex_buffers: SmallVec::new(),
        }
    }
}

impl RenderState {
    #[must_use]
    pub fn primitive_state(&self) -> wgpu::PrimitiveState {
        wgpu::PrimitiveState {
            topology: self.topology,
            strip_index_format: self.strip_index_format,
            front_face: self.front_face,
            cull_mode: self.cull_mode,
            polygon_mode: self.polygon_mode,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn color_targets_wgpu(&self) -> Vec<Option<wgpu::ColorTargetState>> {
        self.color_targets
            .iter()
            .map(|target| Some(target.to_wgpu()))
            .collect()
    }

    #[must_use]
    pub fn vertex_buffers_wgpu(&self) -> Vec<wgpu::VertexBufferLayout<'_>> {
        self.vertex_buffers
            .iter()
            .map(VertexBufferLayoutKey::as_wgpu)
            .collect()
    }
}

// ─── Color ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponentKey {
    pub src_factor: wgpu::BlendFactor,
    pub dst_factor: wgpu::BlendFactor,
    pub operation: wgpu::BlendOperation,
}

impl From<wgpu::BlendComponent> for BlendComponentKey {
    fn from(b: wgpu::BlendComponent) -> Self {
        Self {
            src_factor: b.src_factor,
            dst_factor: b.dst_factor,
            operation: b.operation,
        }
    }
}

impl From<BlendComponentKey> for wgpu::BlendComponent {
    fn from(b: BlendComponentKey) -> Self {
        Self {
            src_factor: b.src_factor,
            dst_factor: b.dst_factor,
            operation: b.operation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendStateKey {
    pub color: BlendComponentKey,
    pub alpha: BlendComponentKey,
}

impl From<wgpu::BlendState> for BlendStateKey {
    fn from(b: wgpu::BlendState) -> Self {
        Self {
            color: b.color.into(),
            alpha: b.alpha.into(),
        }
    }
}

/// One color attachment.
///
/// `blend: None` (blending disabled) and `Some(BlendState::REPLACE)` are
/// different keys even though they render the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTargetKey {
    pub format: wgpu::TextureFormat,
    pub blend: Option<BlendStateKey>,
    /// `wgpu::ColorWrites` bits.
    pub write_mask: u32,
}

impl ColorTargetKey {
    /// Opaque target with blending disabled and all channels written.
    #[must_use]
    pub fn opaque(format: wgpu::TextureFormat) -> Self {
        Self {
            format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL.bits(),
        }
    }

    #[must_use]
    pub fn to_wgpu(self) -> wgpu::ColorTargetState {
        wgpu::ColorTargetState {
            format: self.format,
            blend: self.blend.map(|b| wgpu::BlendState {
                color: b.color.into(),
                alpha: b.alpha.into(),
            }),
            write_mask: wgpu::ColorWrites::from_bits_truncate(self.write_mask),
        }
    }
}

// ─── Depth / Stencil ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFaceKey {
    pub compare: wgpu::CompareFunction,
    pub fail_op: wgpu::StencilOperation,
    pub depth_fail_op: wgpu::StencilOperation,
    pub pass_op: wgpu::StencilOperation,
}

impl StencilFaceKey {
    /// Always passes and keeps the stored value.
    pub const IGNORE: Self = Self {
        compare: wgpu::CompareFunction::Always,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op: wgpu::StencilOperation::Keep,
    };

    fn to_wgpu(self) -> wgpu::StencilFaceState {
        wgpu::StencilFaceState {
            compare: self.compare,
            fail_op: self.fail_op,
            depth_fail_op: self.depth_fail_op,
            pass_op: self.pass_op,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilStateKey {
    pub front: StencilFaceKey,
    pub back: StencilFaceKey,
    pub read_mask: u32,
    pub write_mask: u32,
}

impl Default for StencilStateKey {
    fn default() -> Self {
        Self {
            front: StencilFaceKey::IGNORE,
            back: StencilFaceKey::IGNORE,
            read_mask: 0,
            write_mask: 0,
        }
    }
}

/// Depth bias with the float terms stored as bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DepthBiasKey {
    pub constant: i32,
    pub slope_scale_bits: u32,
    pub clamp_bits: u32,
}

impl DepthBiasKey {
    #[must_use]
    pub fn new(constant: i32, slope_scale: f32, clamp: f32) -> Self {
        Self {
            constant,
            slope_scale_bits: slope_scale.to_bits(),
            clamp_bits: clamp.to_bits(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilKey {
    pub format: wgpu::TextureFormat,
    pub depth_write_enabled: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub stencil: StencilStateKey,
    pub bias: DepthBiasKey,
}

impl DepthStencilKey {
    /// Depth test without stencil or bias.
    #[must_use]
    pub fn depth(
        format: wgpu::TextureFormat,
        write: bool,
        compare: wgpu::CompareFunction,
    ) -> Self {
        Self {
            format,
            depth_write_enabled: write,
            depth_compare: compare,
            stencil: StencilStateKey::default(),
            bias: DepthBiasKey::default(),
        }
    }

    #[must_use]
    pub fn to_wgpu(self) -> wgpu::DepthStencilState {
        let stencil = self.stencil;
        let bias = self.bias;
        wgpu::DepthStencilState {
            format: self.format,
            depth_write_enabled: Some(self.depth_write_enabled),
            depth_compare: Some(self.depth_compare),
            stencil: wgpu::StencilState {
                front: stencil.front.to_wgpu(),
                back: stencil.back.to_wgpu(),
                read_mask: stencil.read_mask,
                write_mask: stencil.write_mask,
            },
            bias: wgpu::DepthBiasState {
                constant: bias.constant,
                slope_scale: f32::from_bits(bias.slope_scale_bits),
                clamp: f32::from_bits(bias.clamp_bits),
            },
        }
    }
}

// ─── Multisample / Vertex Input ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MultisampleKey {
    pub count: u32,
    pub mask: u64,
    pub alpha_to_coverage_enabled: bool,
}

impl MultisampleKey {
    /// One sample, every bit of the mask set.
    pub const SINGLE: Self = Self {
        count: 1,
        mask: !0,
        alpha_to_coverage_enabled: false,
    };

    #[must_use]
    pub fn to_wgpu(self) -> wgpu::MultisampleState {
        wgpu::MultisampleState {
            count: self.count,
            mask: self.mask,
            alpha_to_coverage_enabled: self.alpha_to_coverage_enabled,
        }
    }
}

impl Default for MultisampleKey {
    fn default() -> Self {
        Self::SINGLE
    }
}

/// Owned vertex buffer layout; `wgpu::VertexBufferLayout` only borrows its
/// attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayoutKey {
    pub array_stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: SmallVec<[wgpu::VertexAttribute; 8]>,
}

impl VertexBufferLayoutKey {
    #[must_use]
    pub fn new(
        array_stride: u64,
        step_mode: wgpu::VertexStepMode,
        attributes: &[wgpu::VertexAttribute],
    ) -> Self {
        Self {
            array_stride,
            step_mode,
            attributes: SmallVec::from_slice(attributes),
        }
    }

    #[must_use]
    pub fn as_wgpu(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.array_stride,
            step_mode: self.step_mode,
            attributes: &self.attributes,
        }
    }
}
