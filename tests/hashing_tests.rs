//! Structural Hashing Tests
//!
//! Tests for:
//! - Determinism across repeated calls and freshly allocated copies
//! - Binding order and logical names not affecting keys
//! - Content addressing of buffers and textures
//! - Layout / shader / render state changes producing new keys

mod common;

use common::{MaterialData, MockDevice, SHADER, SHADER_SKINNED, material_layout, opaque_state};
use myth_cache::device::{BindGroupEntry, BlendStateKey, LayoutEntry};
use myth_cache::{BindGroupLayoutKey, CacheSettings, PipelineLayoutKey, StructuralHasher};

fn hasher() -> StructuralHasher {
    StructuralHasher::new(CacheSettings {
        verify_hashes: true,
        panic_on_collision: true,
        ..Default::default()
    })
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn layout_key_is_deterministic_across_copies() {
    let mut h = hasher();
    let a = h.bind_group_layout(&material_layout());
    let b = h.bind_group_layout(&material_layout());

    assert_eq!(a, b);
    assert_eq!(h.collisions(), 0);
}

#[test]
fn independent_hashers_agree() {
    let a = hasher().bind_group_layout(&material_layout());
    let b = hasher().bind_group_layout(&material_layout());
    assert_eq!(a, b);
}

#[test]
fn layout_key_ignores_entry_order() {
    let mut h = hasher();
    let mut reversed = material_layout();
    reversed.reverse();

    assert_eq!(
        h.bind_group_layout(&material_layout()),
        h.bind_group_layout(&reversed)
    );
}

#[test]
fn layout_key_tracks_visibility_and_kind() {
    let mut h = hasher();
    let vertex = h.bind_group_layout(&[LayoutEntry::uniform(0, wgpu::ShaderStages::VERTEX)]);
    let fragment = h.bind_group_layout(&[LayoutEntry::uniform(0, wgpu::ShaderStages::FRAGMENT)]);
    let storage =
        h.bind_group_layout(&[LayoutEntry::storage(0, wgpu::ShaderStages::VERTEX, true)]);

    assert_ne!(vertex, fragment);
    assert_ne!(vertex, storage);
}

#[test]
fn shader_key_is_stable_and_content_sensitive() {
    let mut h = hasher();
    let first = h.shader_source(SHADER);

    assert_eq!(first, h.shader_source(&SHADER.to_owned()));
    assert_ne!(first, h.shader_source(SHADER_SKINNED));
}

// ============================================================================
// Bind group content addressing
// ============================================================================

#[test]
fn byte_identical_resources_share_a_bind_group_key() {
    let mut h = hasher();
    let layout = h.bind_group_layout(&material_layout());

    // Same contents, different handles.
    let a = MaterialData::new([255, 0, 0, 255], 10);
    let b = MaterialData::new([255, 0, 0, 255], 20);

    assert_eq!(
        h.bind_group(layout, &a.entries()),
        h.bind_group(layout, &b.entries())
    );
}

#[test]
fn different_texels_change_the_bind_group_key() {
    let mut h = hasher();
    let layout = h.bind_group_layout(&material_layout());
    let red = MaterialData::new([255, 0, 0, 255], 10);
    let blue = MaterialData::new([0, 0, 255, 255], 10);

    assert_ne!(
        h.bind_group(layout, &red.entries()),
        h.bind_group(layout, &blue.entries())
    );
}

#[test]
fn entry_names_are_not_hashed() {
    let mut h = hasher();
    let layout = h.bind_group_layout(&material_layout());
    let data = MaterialData::new([1, 2, 3, 4], 0);

    let mut renamed = data.entries();
    for entry in &mut renamed {
        entry.name = "renamed";
    }

    assert_eq!(
        h.bind_group(layout, &data.entries()),
        h.bind_group(layout, &renamed)
    );
}

#[test]
fn bind_group_key_depends_on_its_layout() {
    let mut h = hasher();
    let data = MaterialData::new([1, 2, 3, 4], 0);
    let entries: Vec<BindGroupEntry<'_, MockDevice>> = data.entries();

    let a = h.bind_group(BindGroupLayoutKey::from_raw(1), &entries);
    let b = h.bind_group(BindGroupLayoutKey::from_raw(2), &entries);
    assert_ne!(a, b);
}

// ============================================================================
// Pipelines
// ============================================================================

#[test]
fn pipeline_key_depends_on_every_input() {
    let mut h = hasher();
    let state = opaque_state();
    let layout = PipelineLayoutKey::from_raw(1);
    let shader = h.shader_source(SHADER);

    let base = h.pipeline(&state, layout, shader);
    assert_eq!(base, h.pipeline(&opaque_state(), layout, shader));

    assert_ne!(base, h.pipeline(&state, PipelineLayoutKey::from_raw(2), shader));
    let skinned = h.shader_source(SHADER_SKINNED);
    assert_ne!(base, h.pipeline(&state, layout, skinned));

    let double_sided = myth_cache::RenderState {
        cull_mode: None,
        ..opaque_state()
    };
    assert_ne!(base, h.pipeline(&double_sided, layout, shader));
}

#[test]
fn disabled_blending_differs_from_replace() {
    let mut h = hasher();
    let layout = PipelineLayoutKey::from_raw(1);
    let shader = h.shader_source(SHADER);

    let disabled = opaque_state();
    let mut replace = opaque_state();
    replace.color_targets[0].blend = Some(BlendStateKey::from(wgpu::BlendState::REPLACE));

    assert_ne!(
        h.pipeline(&disabled, layout, shader),
        h.pipeline(&replace, layout, shader)
    );
}

#[test]
fn global_layout_is_part_of_pipeline_layout_keys() {
    let mut h = hasher();
    let material = h.bind_group_layout(&material_layout());
    let geometry = h.bind_group_layout(&common::geometry_layout());
    let before = h.pipeline_layout(material, geometry);

    let global = h.register_global_layout(&common::global_layout());
    assert_eq!(h.global_layout(), Some(global));
    assert_ne!(before, h.pipeline_layout(material, geometry));
}
