//! Descriptor inputs consumed by the cache.
//!
//! These are what material / geometry setup code hands over: a layout schema
//! ([`LayoutEntry`]), the concrete resources to bind ([`BindGroupEntry`]),
//! and sampler / texture-view parameters in hashable form.

use std::num::NonZeroU64;

use sha2::{Digest, Sha256};

use super::GraphicsDevice;

// ─── Bind Group Layout ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Uniform,
    Storage { read_only: bool },
}

/// Resource kind of one layout slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutBindingKind {
    Buffer {
        ty: BufferKind,
        has_dynamic_offset: bool,
    },
    Texture {
        sample_type: wgpu::TextureSampleType,
        view_dimension: wgpu::TextureViewDimension,
        multisampled: bool,
    },
    Sampler(wgpu::SamplerBindingType),
}

/// One slot of a bind group layout.
///
/// Only what affects layout compatibility is kept; labels are passed to the
/// device separately and never hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutEntry {
    pub binding: u32,
    pub visibility: wgpu::ShaderStages,
    pub kind: LayoutBindingKind,
}

impl LayoutEntry {
    #[must_use]
    pub fn uniform(binding: u32, visibility: wgpu::ShaderStages) -> Self {
        Self {
            binding,
            visibility,
            kind: LayoutBindingKind::Buffer {
                ty: BufferKind::Uniform,
                has_dynamic_offset: false,
            },
        }
    }

    #[must_use]
    pub fn storage(binding: u32, visibility: wgpu::ShaderStages, read_only: bool) -> Self {
        Self {
            binding,
            visibility,
            kind: LayoutBindingKind::Buffer {
                ty: BufferKind::Storage { read_only },
                has_dynamic_offset: false,
            },
        }
    }

    /// Filterable float 2D texture.
    #[must_use]
    pub fn texture_2d(binding: u32, visibility: wgpu::ShaderStages) -> Self {
        Self {
            binding,
            visibility,
            kind: LayoutBindingKind::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
        }
    }

    #[must_use]
    pub fn sampler(binding: u32, visibility: wgpu::ShaderStages) -> Self {
        Self {
            binding,
            visibility,
            kind: LayoutBindingKind::Sampler(wgpu::SamplerBindingType::Filtering),
        }
    }

    #[must_use]
    pub fn to_wgpu(&self) -> wgpu::BindGroupLayoutEntry {
        let ty = match self.kind {
            LayoutBindingKind::Buffer {
                ty,
                has_dynamic_offset,
            } => wgpu::BindingType::Buffer {
                ty: match ty {
                    BufferKind::Uniform => wgpu::BufferBindingType::Uniform,
                    BufferKind::Storage { read_only } => {
                        wgpu::BufferBindingType::Storage { read_only }
                    }
                },
                has_dynamic_offset,
                min_binding_size: None,
            },
            LayoutBindingKind::Texture {
                sample_type,
                view_dimension,
                multisampled,
            } => wgpu::BindingType::Texture {
                sample_type,
                view_dimension,
                multisampled,
            },
            LayoutBindingKind::Sampler(ty) => wgpu::BindingType::Sampler(ty),
        };

        wgpu::BindGroupLayoutEntry {
            binding: self.binding,
            visibility: self.visibility,
            ty,
            count: None,
        }
    }
}

// ─── Sampler / Texture View Keys ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterKey {
    #[default]
    Nearest,
    Linear,
}

/// Hashable sampler description.
///
/// Filters, address modes and the compare function are enum ordinals; LOD
/// clamps are kept as bit patterns so equal samplers always hash equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerKey {
    pub address_mode_u: wgpu::AddressMode,
    pub address_mode_v: wgpu::AddressMode,
    pub address_mode_w: wgpu::AddressMode,
    pub mag_filter: FilterKey,
    pub min_filter: FilterKey,
    pub mipmap_filter: FilterKey,
    pub lod_min_clamp_bits: u32,
    pub lod_max_clamp_bits: u32,
    pub compare: Option<wgpu::CompareFunction>,
    pub anisotropy_clamp: u16,
    pub border_color: Option<wgpu::SamplerBorderColor>,
}

impl Default for SamplerKey {
    fn default() -> Self {
        Self {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: FilterKey::Nearest,
            min_filter: FilterKey::Nearest,
            mipmap_filter: FilterKey::Nearest,
            lod_min_clamp_bits: 0.0f32.to_bits(),
            lod_max_clamp_bits: 32.0f32.to_bits(),
            compare: None,
            anisotropy_clamp: 1,
            border_color: None,
        }
    }
}

impl SamplerKey {
    /// Trilinear, repeating sampler (the usual material texture sampler).
    #[must_use]
    pub fn linear_repeat() -> Self {
        Self {
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: FilterKey::Linear,
            min_filter: FilterKey::Linear,
            mipmap_filter: FilterKey::Linear,
            ..Self::default()
        }
    }
}

/// Hashable texture view parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewKey {
    pub format: wgpu::TextureFormat,
    pub dimension: wgpu::TextureViewDimension,
    pub base_mip_level: u32,
    pub mip_level_count: Option<u32>,
    pub base_array_layer: u32,
    pub array_layer_count: Option<u32>,
}

impl TextureViewKey {
    /// Full view of a 2D texture.
    #[must_use]
    pub fn d2(format: wgpu::TextureFormat) -> Self {
        Self {
            format,
            dimension: wgpu::TextureViewDimension::D2,
            base_mip_level: 0,
            mip_level_count: None,
            base_array_layer: 0,
            array_layer_count: None,
        }
    }
}

// ─── Content Digest ───────────────────────────────────────────────────────────

/// SHA-256 of a resource's backing bytes.
///
/// Two textures (or buffers) with byte-identical contents share a digest no
/// matter where they were loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest(pub [u8; 32]);

impl ContentDigest {
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(bytes));
        Self(digest)
    }
}

// ─── Bind Group Entries ───────────────────────────────────────────────────────

/// A concrete resource bound to one slot.
pub enum BoundResource<'a, D: GraphicsDevice> {
    Buffer {
        buffer: &'a D::Buffer,
        offset: u64,
        size: Option<NonZeroU64>,
        /// Backing bytes, content-addressed for deduplication.
        contents: &'a [u8],
    },
    Texture {
        view: &'a D::TextureView,
        view_key: TextureViewKey,
        /// Backing texel bytes, content-addressed for deduplication.
        contents: &'a [u8],
    },
    Sampler {
        sampler: &'a D::Sampler,
        descriptor: SamplerKey,
    },
}

/// One entry of a bind group.
pub struct BindGroupEntry<'a, D: GraphicsDevice> {
    pub binding: u32,
    /// Logical name used for later lookup (e.g. `"base_color_map"`). Not hashed.
    pub name: &'a str,
    pub resource: BoundResource<'a, D>,
}

impl<'a, D: GraphicsDevice> BindGroupEntry<'a, D> {
    pub fn buffer(binding: u32, name: &'a str, buffer: &'a D::Buffer, contents: &'a [u8]) -> Self {
        Self {
            binding,
            name,
            resource: BoundResource::Buffer {
                buffer,
                offset: 0,
                size: None,
                contents,
            },
        }
    }

    pub fn texture(
        binding: u32,
        name: &'a str,
        view: &'a D::TextureView,
        view_key: TextureViewKey,
        contents: &'a [u8],
    ) -> Self {
        Self {
            binding,
            name,
            resource: BoundResource::Texture {
                view,
                view_key,
                contents,
            },
        }
    }

    pub fn sampler(
        binding: u32,
        name: &'a str,
        sampler: &'a D::Sampler,
        descriptor: SamplerKey,
    ) -> Self {
        Self {
            binding,
            name,
            resource: BoundResource::Sampler {
                sampler,
                descriptor,
            },
        }
    }
}
