//! Deferred construction.
//!
//! Some resources depend on work that should not block the owning thread,
//! e.g. texture decoding before a bind group can be created. A deferred
//! append reserves the key immediately (so later appends of the same key join
//! its owner set instead of starting a second build) and hands back a
//! [`DeferredBuild`] for the caller to drive on any executor.
//!
//! Every reservation carries a generation. A build whose slot was abandoned
//! and re-reserved in the meantime reports a stale generation and is ignored.
//!
//! Finished builds are sent over a channel and installed by
//! [`ResourceCache::collect_deferred`], which must be called on the thread
//! that owns the cache (typically once per frame).
//!
//! ```rust,ignore
//! let (_, build) = cache.append_shader_module_deferred(key, owner, async move {
//!     device.create_shader_module("pbr", &source)
//! });
//! if let Some(build) = build {
//!     std::thread::spawn(move || pollster::block_on(build.run()));
//! }
//! // later, on the owning thread
//! for err in cache.collect_deferred() {
//!     log::error!("{err}");
//! }
//! ```

use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::ResourceCache;
use super::entry::{AppendOutcome, Completion, Reservation};
use super::kind::{AnyKey, BuiltResource};
use super::owner::OwnerId;
use crate::device::GraphicsDevice;
use crate::errors::{CacheError, DeviceError, Result};
use crate::keys::{BindGroupKey, BindGroupLayoutKey, ShaderKey};

type BuildResult<D> = std::result::Result<BuiltResource<D>, DeviceError>;

struct Completed<D: GraphicsDevice> {
    key: AnyKey,
    generation: u64,
    result: BuildResult<D>,
}

pub(crate) struct DeferredChannel<D: GraphicsDevice> {
    sender: flume::Sender<Completed<D>>,
    receiver: flume::Receiver<Completed<D>>,
}

impl<D: GraphicsDevice> DeferredChannel<D> {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }
}

/// An in-flight construction. Drive it with [`DeferredBuild::run`].
///
/// Dropping it without running leaves the reserved slot building forever;
/// the owners can still be removed, which abandons the slot.
#[must_use = "a deferred build does nothing until it is run"]
pub struct DeferredBuild<D: GraphicsDevice> {
    key: AnyKey,
    generation: u64,
    task: BoxFuture<'static, BuildResult<D>>,
    sender: flume::Sender<Completed<D>>,
}

impl<D: GraphicsDevice> std::fmt::Debug for DeferredBuild<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredBuild")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl<D: GraphicsDevice> DeferredBuild<D> {
    #[inline]
    #[must_use]
    pub fn key(&self) -> AnyKey {
        self.key
    }

    /// Runs the construction and reports the result back to the cache.
    pub async fn run(self) {
        let result = self.task.await;
        if self
            .sender
            .send(Completed {
                key: self.key,
                generation: self.generation,
                result,
            })
            .is_err()
        {
            log::debug!("Cache dropped before deferred build of {} finished", self.key);
        }
    }
}

impl<D: GraphicsDevice + 'static> ResourceCache<D> {
    /// Reserves `key` and returns the build to run, or joins an existing slot
    /// and returns `None`.
    pub fn append_shader_module_deferred<F>(
        &mut self,
        key: ShaderKey,
        owner: OwnerId,
        build: F,
    ) -> (AppendOutcome, Option<DeferredBuild<D>>)
    where
        F: Future<Output = std::result::Result<D::ShaderModule, DeviceError>> + Send + 'static,
    {
        match self.shader_modules.reserve(key, owner) {
            Reservation::Joined(outcome) => (outcome, None),
            Reservation::Started(generation) => {
                let task = build.map(|r| r.map(BuiltResource::ShaderModule)).boxed();
                let build = self.deferred_build(key.into(), generation, task);
                (AppendOutcome::Pending, Some(build))
            }
        }
    }

    /// Deferred variant of [`append_bind_group`](ResourceCache::append_bind_group).
    ///
    /// `make` runs synchronously with the layout object (only if a build is
    /// needed) and returns the future that produces the bind group. The layout
    /// must already be present.
    pub fn append_bind_group_deferred<M, F>(
        &mut self,
        key: BindGroupKey,
        owner: OwnerId,
        layout: BindGroupLayoutKey,
        make: M,
    ) -> Result<(AppendOutcome, Option<DeferredBuild<D>>)>
    where
        M: FnOnce(&D::BindGroupLayout) -> F,
        F: Future<Output = std::result::Result<D::BindGroup, DeviceError>> + Send + 'static,
    {
        if !self.bind_groups.contains(key) && self.bind_group_layouts.resolve(layout).is_none() {
            return Err(CacheError::missing(layout));
        }

        match self.bind_groups.reserve(key, owner) {
            Reservation::Joined(outcome) => Ok((outcome, None)),
            Reservation::Started(generation) => {
                let Some(layout_obj) = self.bind_group_layouts.resolve(layout) else {
                    unreachable!("layout checked above");
                };
                let task = make(layout_obj).map(|r| r.map(BuiltResource::BindGroup)).boxed();
                self.dependencies.link_bind_group(layout, key);
                let build = self.deferred_build(key.into(), generation, task);
                Ok((AppendOutcome::Pending, Some(build)))
            }
        }
    }

    fn deferred_build(
        &self,
        key: AnyKey,
        generation: u64,
        task: BoxFuture<'static, BuildResult<D>>,
    ) -> DeferredBuild<D> {
        DeferredBuild {
            key,
            generation,
            task,
            sender: self.deferred.sender.clone(),
        }
    }

    /// Installs every finished deferred build.
    ///
    /// Builds whose owners all left in the meantime are dropped, as are builds
    /// whose slot was abandoned and reserved again. Failed builds remove their
    /// own slot and are returned as
    /// [`ConstructionFailure`](CacheError::ConstructionFailure)s.
    pub fn collect_deferred(&mut self) -> Vec<CacheError> {
        let mut errors = Vec::new();

        while let Ok(Completed {
            key,
            generation: g,
            result,
        }) = self.deferred.receiver.try_recv()
        {
            match result {
                Ok(resource) => {
                    let completion = match (key, resource) {
                        (AnyKey::ShaderModule(k), BuiltResource::ShaderModule(r)) => {
                            self.shader_modules.complete(k, g, r)
                        }
                        (AnyKey::BindGroupLayout(k), BuiltResource::BindGroupLayout(r)) => {
                            self.bind_group_layouts.complete(k, g, r)
                        }
                        (AnyKey::BindGroup(k), BuiltResource::BindGroup(r)) => {
                            self.bind_groups.complete(k, g, r)
                        }
                        (AnyKey::PipelineLayout(k), BuiltResource::PipelineLayout(r)) => {
                            self.pipeline_layouts.complete(k, g, r)
                        }
                        (AnyKey::Pipeline(k), BuiltResource::Pipeline(r)) => {
                            self.pipelines.complete(k, g, r)
                        }
                        (key, resource) => {
                            log::error!(
                                "Deferred build for {key} produced a {}, dropping it",
                                resource.kind()
                            );
                            continue;
                        }
                    };
                    if completion == Completion::Stale {
                        log::debug!("Ignoring stale deferred build #{g} of {key}");
                    }
                }
                Err(source) => {
                    let owners = match key {
                        AnyKey::ShaderModule(k) => self.shader_modules.fail(k, g),
                        AnyKey::BindGroupLayout(k) => self.bind_group_layouts.fail(k, g),
                        AnyKey::BindGroup(k) => {
                            let owners = self.bind_groups.fail(k, g);
                            if owners.is_some() {
                                self.dependencies.unlink_bind_group(k);
                            }
                            owners
                        }
                        AnyKey::PipelineLayout(k) => self.pipeline_layouts.fail(k, g),
                        AnyKey::Pipeline(k) => self.pipelines.fail(k, g),
                    };
                    if owners.is_some() {
                        log::error!("Deferred build of {key} failed: {source}");
                        errors.push(CacheError::construction(key, source));
                    } else {
                        log::debug!("Deferred build #{g} of abandoned {key} failed: {source}");
                    }
                }
            }
        }

        errors
    }
}
