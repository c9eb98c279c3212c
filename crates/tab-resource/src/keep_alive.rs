//! Caller-driven mark-and-sweep over resource entities.
//!
//! Each [`KeepAlive`] check scans one component across all entities and
//! marks the resources it finds referenced. Resources no check marks are
//! handed back to the caller, who decides whether to [`sweep`] them.
//! This runs above the engine's per-row reference counting and does not
//! touch it.
//!
//! [`sweep`]: KeepAliveSystem::sweep

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use tab_ecs::{
    BufferComponent, Component, ComponentBufferAccessor, ComponentDataAccessor, EcsError,
    GameEntity, World,
};

use crate::{
    db::{GameResourceDb, ResourceDescription},
    error::ResourceResult,
};

/// One liveness check.
pub trait KeepAlive: Send + Sync {
    /// Set `keep[i]` for every `resources[i]` still referenced.
    ///
    /// `resources` is sorted. Entries already `true` must be left alone.
    fn keep_alive(&self, world: &World, keep: &mut [bool], resources: &[GameEntity]) -> ResourceResult<()>;
}

fn mark(keep: &mut [bool], resources: &[GameEntity], target: GameEntity) {
    if let Ok(index) = resources.binary_search(&target) {
        keep[index] = true;
    }
}

/// Keeps resources referenced from a fixed-size component.
pub struct DataKeepAlive<T, F> {
    reference: F,
    _component: PhantomData<fn() -> T>,
}

impl<T, F> DataKeepAlive<T, F>
where
    T: Component,
    F: Fn(&T) -> Option<GameEntity> + Send + Sync,
{
    /// `reference` extracts the resource a component value points at.
    pub fn new(reference: F) -> Self {
        Self {
            reference,
            _component: PhantomData,
        }
    }
}

impl<T, F> KeepAlive for DataKeepAlive<T, F>
where
    T: Component,
    F: Fn(&T) -> Option<GameEntity> + Send + Sync,
{
    fn keep_alive(&self, world: &World, keep: &mut [bool], resources: &[GameEntity]) -> ResourceResult<()> {
        let accessor = match ComponentDataAccessor::<T>::new(world) {
            Ok(accessor) => accessor,
            Err(EcsError::UnregisteredType(_)) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        for (_, value) in accessor.iter() {
            if let Some(target) = (self.reference)(value) {
                mark(keep, resources, target);
            }
        }
        Ok(())
    }
}

/// Keeps resources referenced from any element of a buffer component.
pub struct BufferKeepAlive<T, F> {
    reference: F,
    _component: PhantomData<fn() -> T>,
}

impl<T, F> BufferKeepAlive<T, F>
where
    T: BufferComponent,
    F: Fn(&T) -> Option<GameEntity> + Send + Sync,
{
    /// `reference` extracts the resource a buffer element points at.
    pub fn new(reference: F) -> Self {
        Self {
            reference,
            _component: PhantomData,
        }
    }
}

impl<T, F> KeepAlive for BufferKeepAlive<T, F>
where
    T: BufferComponent,
    F: Fn(&T) -> Option<GameEntity> + Send + Sync,
{
    fn keep_alive(&self, world: &World, keep: &mut [bool], resources: &[GameEntity]) -> ResourceResult<()> {
        let accessor = match ComponentBufferAccessor::<T>::new(world) {
            Ok(accessor) => accessor,
            Err(EcsError::UnregisteredType(_)) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        for (_, list) in accessor.iter() {
            for target in list.iter().filter_map(&self.reference) {
                mark(keep, resources, target);
            }
        }
        Ok(())
    }
}

/// Keep-alive scheduling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepAliveConfig {
    /// Ticks between scans. Zero scans every tick.
    pub interval: u64,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self { interval: 60 }
    }
}

impl KeepAliveConfig {
    /// Parse a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> ResourceResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Periodic liveness scan for the resources of one [`GameResourceDb`].
pub struct KeepAliveSystem<D> {
    config: KeepAliveConfig,
    checks: Vec<Box<dyn KeepAlive>>,
    ticks: u64,
    _description: PhantomData<fn() -> D>,
}

impl<D: ResourceDescription> KeepAliveSystem<D> {
    /// Create a system with no checks.
    #[must_use]
    pub fn new(config: KeepAliveConfig) -> Self {
        Self {
            config,
            checks: Vec::new(),
            ticks: 0,
            _description: PhantomData,
        }
    }

    /// Register a liveness check.
    pub fn add_check(&mut self, check: impl KeepAlive + 'static) -> &mut Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Number of registered checks.
    #[must_use]
    pub fn check_count(&self) -> usize {
        self.checks.len()
    }

    /// Advance one tick; scan when the interval elapses.
    ///
    /// Returns the unreferenced resources, or nothing between scans.
    pub fn update(&mut self, world: &World, db: &GameResourceDb<D>) -> ResourceResult<Vec<GameEntity>> {
        self.ticks += 1;
        if self.ticks % self.config.interval.max(1) != 0 {
            return Ok(Vec::new());
        }
        self.scan(world, db)
    }

    /// Run every check now and return the resources none of them kept.
    ///
    /// Without checks there is no liveness information and nothing is
    /// returned.
    pub fn scan(&self, world: &World, db: &GameResourceDb<D>) -> ResourceResult<Vec<GameEntity>> {
        if self.checks.is_empty() {
            return Ok(Vec::new());
        }

        let resources = db.resources();
        let mut keep = vec![false; resources.len()];
        for check in &self.checks {
            check.keep_alive(world, &mut keep, &resources)?;
        }

        let unreferenced: Vec<_> = resources
            .into_iter()
            .zip(keep)
            .filter_map(|(resource, kept)| (!kept).then_some(resource))
            .collect();
        tracing::trace!(count = unreferenced.len(), "keep-alive scan finished");
        Ok(unreferenced)
    }

    /// Dispose the given resources. Returns how many were disposed.
    pub fn sweep(&self, world: &mut World, db: &mut GameResourceDb<D>, candidates: &[GameEntity]) -> usize {
        let mut disposed = 0;
        for &resource in candidates {
            if let Some(description) = db.description(resource) {
                tracing::warn!(%resource, ?description, "disposing unreferenced resource");
            }
            if db.dispose(world, resource) {
                disposed += 1;
            }
        }
        disposed
    }
}
