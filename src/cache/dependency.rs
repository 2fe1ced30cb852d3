//! Reverse dependency index between cache entries.
//!
//! Edges point from a parent to every entry that was built from it:
//!
//! ```text
//! bind group layout ─┬─> bind groups
//!                    └─> pipeline layouts ──> pipelines
//! ```
//!
//! The index is extended when a dependent entry is created and pruned when
//! it is released. It is only a candidate list: eviction re-checks live
//! owner sets before touching anything it finds here.

use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::keys::{BindGroupKey, BindGroupLayoutKey, PipelineKey, PipelineLayoutKey};

#[derive(Debug, Default)]
pub struct DependencyIndex {
    layout_bind_groups: FxHashMap<BindGroupLayoutKey, FxHashSet<BindGroupKey>>,
    layout_pipeline_layouts: FxHashMap<BindGroupLayoutKey, FxHashSet<PipelineLayoutKey>>,
    pipeline_layout_pipelines: FxHashMap<PipelineLayoutKey, FxHashSet<PipelineKey>>,

    // Child -> parent(s), so a release can prune without a full scan.
    bind_group_parent: FxHashMap<BindGroupKey, BindGroupLayoutKey>,
    pipeline_layout_parents: FxHashMap<PipelineLayoutKey, [BindGroupLayoutKey; 2]>,
    pipeline_parent: FxHashMap<PipelineKey, PipelineLayoutKey>,
}

fn link<P, C>(edges: &mut FxHashMap<P, FxHashSet<C>>, parent: P, child: C)
where
    P: Eq + Hash,
    C: Eq + Hash,
{
    edges.entry(parent).or_default().insert(child);
}

fn unlink<P, C>(edges: &mut FxHashMap<P, FxHashSet<C>>, parent: P, child: &C)
where
    P: Eq + Hash,
    C: Eq + Hash,
{
    if let Some(children) = edges.get_mut(&parent) {
        children.remove(child);
        if children.is_empty() {
            edges.remove(&parent);
        }
    }
}

fn sorted<K: Copy + Ord>(set: Option<&FxHashSet<K>>) -> Vec<K> {
    let mut keys: Vec<K> = set.map(|s| s.iter().copied().collect()).unwrap_or_default();
    keys.sort_unstable();
    keys
}

impl DependencyIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Construction ─────────────────────────────────────────────────────────

    pub fn link_bind_group(&mut self, layout: BindGroupLayoutKey, bind_group: BindGroupKey) {
        link(&mut self.layout_bind_groups, layout, bind_group);
        self.bind_group_parent.insert(bind_group, layout);
    }

    pub fn link_pipeline_layout(
        &mut self,
        inputs: [BindGroupLayoutKey; 2],
        pipeline_layout: PipelineLayoutKey,
    ) {
        for layout in inputs {
            link(&mut self.layout_pipeline_layouts, layout, pipeline_layout);
        }
        self.pipeline_layout_parents.insert(pipeline_layout, inputs);
    }

    pub fn link_pipeline(&mut self, pipeline_layout: PipelineLayoutKey, pipeline: PipelineKey) {
        link(&mut self.pipeline_layout_pipelines, pipeline_layout, pipeline);
        self.pipeline_parent.insert(pipeline, pipeline_layout);
    }

    // ── Pruning ──────────────────────────────────────────────────────────────

    pub fn unlink_bind_group(&mut self, bind_group: BindGroupKey) {
        if let Some(layout) = self.bind_group_parent.remove(&bind_group) {
            unlink(&mut self.layout_bind_groups, layout, &bind_group);
        }
    }

    /// Drops the layout → pipeline-layout edges. The pipeline-layout →
    /// pipeline edges stay until their pipelines are released.
    pub fn unlink_pipeline_layout(&mut self, pipeline_layout: PipelineLayoutKey) {
        if let Some(inputs) = self.pipeline_layout_parents.remove(&pipeline_layout) {
            for layout in inputs {
                unlink(&mut self.layout_pipeline_layouts, layout, &pipeline_layout);
            }
        }
    }

    pub fn unlink_pipeline(&mut self, pipeline: PipelineKey) {
        if let Some(layout) = self.pipeline_parent.remove(&pipeline) {
            unlink(&mut self.pipeline_layout_pipelines, layout, &pipeline);
        }
    }

    // ── Queries (snapshots, sorted for deterministic eviction order) ─────────

    #[must_use]
    pub fn bind_groups_of(&self, layout: BindGroupLayoutKey) -> Vec<BindGroupKey> {
        sorted(self.layout_bind_groups.get(&layout))
    }

    #[must_use]
    pub fn pipeline_layouts_of(&self, layout: BindGroupLayoutKey) -> Vec<PipelineLayoutKey> {
        sorted(self.layout_pipeline_layouts.get(&layout))
    }

    #[must_use]
    pub fn pipelines_of(&self, pipeline_layout: PipelineLayoutKey) -> Vec<PipelineKey> {
        sorted(self.pipeline_layout_pipelines.get(&pipeline_layout))
    }

    /// Every pipeline reachable from `layout` through its pipeline layouts.
    #[must_use]
    pub fn pipelines_through(&self, layout: BindGroupLayoutKey) -> Vec<PipelineKey> {
        let mut pipelines: Vec<PipelineKey> = self
            .pipeline_layouts_of(layout)
            .into_iter()
            .flat_map(|pl| self.pipelines_of(pl))
            .collect();
        pipelines.sort_unstable();
        pipelines.dedup();
        pipelines
    }

    /// Number of parent → child edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.layout_bind_groups.values().map(FxHashSet::len).sum::<usize>()
            + self.layout_pipeline_layouts.values().map(FxHashSet::len).sum::<usize>()
            + self.pipeline_layout_pipelines.values().map(FxHashSet::len).sum::<usize>()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layout_bind_groups.is_empty()
            && self.layout_pipeline_layouts.is_empty()
            && self.pipeline_layout_pipelines.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
