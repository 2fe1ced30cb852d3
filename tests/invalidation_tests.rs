//! Invalidation Cascade Tests
//!
//! Tests for:
//! - Layout change for one owner shrinking shared entries and releasing sole-owned ones
//! - Objects built from the new layout resolving for the same owners
//! - Dependents owned only by other primitives being left alone
//! - Rejection of owner sets that never used the layout

mod common;

use common::{MaterialData, MockDevice, MockObject, PrimitiveFixture, init_logging};
use myth_cache::{
    AnyKey, CacheError, CacheSettings, OwnerId, PrimitiveAssembler, ResourceCache, ResourceKind,
    StructuralHasher, owner_set,
};

fn setup() -> (MockDevice, MockObject, ResourceCache<MockDevice>, StructuralHasher) {
    init_logging();
    let device = MockDevice::new();
    let global = device
        .object(ResourceKind::BindGroupLayout, "global")
        .unwrap();
    let mut hasher = StructuralHasher::default();
    hasher.register_global_layout(&common::global_layout());
    (device, global, ResourceCache::default(), hasher)
}

#[test]
fn layout_change_for_one_owner_keeps_the_others_intact() {
    let (device, global, mut cache, mut hasher) = setup();
    let asm = PrimitiveAssembler::new(&device, &global, CacheSettings::default());

    let standard = PrimitiveFixture::standard();
    let normal_mapped = PrimitiveFixture::normal_mapped();
    let red = MaterialData::new([255, 0, 0, 255], 0);
    let blue = MaterialData::new([0, 0, 255, 255], 10);
    let red_entries = red.entries();
    let blue_entries = blue.entries();
    let red_nm_entries = red.normal_mapped_entries();
    let blue_nm_entries = blue.normal_mapped_entries();

    let one = asm
        .assemble(&mut cache, &mut hasher, OwnerId(1), &standard.descriptor(&red_entries))
        .unwrap();
    let two = asm
        .assemble(&mut cache, &mut hasher, OwnerId(2), &standard.descriptor(&blue_entries))
        .unwrap();
    assert_eq!(one.bind_group_layout, two.bind_group_layout);

    // Primitive 1 gains a normal map.
    let one_nm = asm
        .reassemble(
            &mut cache,
            &mut hasher,
            &owner_set([1u64]),
            &one,
            &normal_mapped.descriptor(&red_nm_entries),
        )
        .unwrap();

    assert_ne!(one_nm.bind_group_layout, one.bind_group_layout);
    assert_ne!(one_nm.pipeline_layout, one.pipeline_layout);
    assert_ne!(one_nm.pipeline, one.pipeline);

    // Red bind group was primitive 1's alone.
    assert!(!cache.contains(one.bind_group.into()));
    // The old layout chain now belongs to primitive 2 only.
    for key in [
        AnyKey::from(one.bind_group_layout),
        one.pipeline_layout.into(),
        one.pipeline.into(),
        two.bind_group.into(),
    ] {
        let owners = cache.owners(key).unwrap();
        assert_eq!(owners.len(), 1, "{key}");
        assert!(owners.contains(&OwnerId(2)), "{key}");
    }
    assert!(cache.get_render_setup(&one_nm).is_ok());
    assert!(cache.get_render_setup(&two).is_ok());

    // Primitive 2 follows; the old chain disappears entirely.
    let two_nm = asm
        .reassemble(
            &mut cache,
            &mut hasher,
            &owner_set([2u64]),
            &two,
            &normal_mapped.descriptor(&blue_nm_entries),
        )
        .unwrap();

    assert_eq!(two_nm.pipeline, one_nm.pipeline);
    for key in [
        AnyKey::from(one.bind_group_layout),
        one.pipeline_layout.into(),
        one.pipeline.into(),
        two.bind_group.into(),
    ] {
        assert!(!cache.contains(key), "{key} survived");
    }
    assert!(cache.dependencies().bind_groups_of(one.bind_group_layout).is_empty());
    assert!(cache.dependencies().pipelines_through(one.bind_group_layout).is_empty());
    assert_eq!(cache.owners(one_nm.pipeline.into()).unwrap().len(), 2);
    assert_eq!(device.counters().released(ResourceKind::Pipeline), 1);
    assert_eq!(device.counters().live(ResourceKind::Pipeline), 1);
}

#[test]
fn cascade_reports_what_it_released() {
    let (device, global, mut cache, mut hasher) = setup();
    let asm = PrimitiveAssembler::new(&device, &global, CacheSettings::default());
    let fixture = PrimitiveFixture::standard();
    let material = MaterialData::new([5, 5, 5, 255], 0);
    let entries = material.entries();

    let keys = asm
        .assemble(&mut cache, &mut hasher, OwnerId(1), &fixture.descriptor(&entries))
        .unwrap();

    let report = cache
        .invalidate_bind_group_layout(keys.bind_group_layout, &owner_set([1u64]))
        .unwrap();

    assert!(report.shrunk.is_empty());
    assert_eq!(report.released.len(), 4);
    assert_eq!(report.released[0], AnyKey::from(keys.bind_group_layout));
    assert!(report.was_released(keys.bind_group));
    assert!(report.was_released(keys.pipeline_layout));
    assert_eq!(report.released.last(), Some(&AnyKey::from(keys.pipeline)));

    // Shader and geometry layout are not built from the material layout.
    assert!(cache.contains(keys.shader.into()));
    assert!(cache.contains(keys.geometry_layout.into()));
    assert!(matches!(
        cache.get_render_setup(&keys),
        Err(CacheError::MissingDependency { .. })
    ));
}

#[test]
fn dependents_of_other_owners_are_untouched() {
    let (device, global, mut cache, mut hasher) = setup();
    let asm = PrimitiveAssembler::new(&device, &global, CacheSettings::default());
    let standard = PrimitiveFixture::standard();
    let skinned = PrimitiveFixture {
        shader: common::SHADER_SKINNED,
        ..PrimitiveFixture::standard()
    };
    let material = MaterialData::new([5, 5, 5, 255], 0);
    let entries = material.entries();

    let plain = asm
        .assemble(&mut cache, &mut hasher, OwnerId(1), &standard.descriptor(&entries))
        .unwrap();
    let other = asm
        .assemble(&mut cache, &mut hasher, OwnerId(3), &skinned.descriptor(&entries))
        .unwrap();
    assert_ne!(plain.pipeline, other.pipeline);

    let report = cache
        .invalidate_bind_group_layout(plain.bind_group_layout, &owner_set([1u64]))
        .unwrap();

    assert!(report.was_released(plain.pipeline));
    assert!(!report.released.contains(&AnyKey::from(other.pipeline)));
    assert!(!report.shrunk.contains(&AnyKey::from(other.pipeline)));
    assert!(cache.get_render_setup(&other).is_ok());
}

#[test]
fn owners_that_never_used_the_layout_are_rejected() {
    let (device, global, mut cache, mut hasher) = setup();
    let asm = PrimitiveAssembler::new(&device, &global, CacheSettings::default());
    let fixture = PrimitiveFixture::standard();
    let material = MaterialData::new([5, 5, 5, 255], 0);
    let entries = material.entries();

    let keys = asm
        .assemble(&mut cache, &mut hasher, OwnerId(1), &fixture.descriptor(&entries))
        .unwrap();
    let before = cache.stats();

    let err = cache
        .invalidate_bind_group_layout(keys.bind_group_layout, &owner_set([42u64]))
        .unwrap_err();
    assert!(matches!(err, CacheError::InconsistentOwnerSet { .. }));
    assert_eq!(cache.stats(), before);
    assert!(cache.get_render_setup(&keys).is_ok());
}
