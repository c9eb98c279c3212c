//! Deduplication of resource descriptions into entities.

use std::{fmt::Debug, hash::Hash, marker::PhantomData};

use rustc_hash::FxHashMap;
use tab_ecs::{GameEntity, TagComponent, World};

use crate::error::ResourceResult;

/// Marks the entity that anchors a [`GameResourceDb`].
#[derive(Debug)]
pub struct ResourceDbState;

impl TagComponent for ResourceDbState {}

/// Set on a resource once its loader succeeded.
#[derive(Debug)]
pub struct ResourceLoaded;

impl TagComponent for ResourceLoaded {}

/// Marks an entity as a resource described by a `D`.
pub struct ResourceTag<D>(PhantomData<fn() -> D>);

impl<D: 'static> TagComponent for ResourceTag<D> {}

/// Bounds for a resource description.
pub trait ResourceDescription: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<D: Eq + Hash + Clone + Debug + Send + Sync + 'static> ResourceDescription for D {}

/// Maps each distinct description to exactly one resource entity.
///
/// ```ignore
/// let mut textures = GameResourceDb::<PathBuf>::new(&mut world)?;
/// let a = textures.get_or_create(&mut world, "grass.png".into())?;
/// let b = textures.get_or_create(&mut world, "grass.png".into())?;
/// assert_eq!(a, b);
/// ```
pub struct GameResourceDb<D: ResourceDescription> {
    state: GameEntity,
    by_description: FxHashMap<D, GameEntity>,
    by_entity: FxHashMap<GameEntity, D>,
}

impl<D: ResourceDescription> GameResourceDb<D> {
    /// Create a database and its state entity.
    pub fn new(world: &mut World) -> ResourceResult<Self> {
        world.register_tag::<ResourceDbState>();
        world.register_tag::<ResourceTag<D>>();
        world.register_tag::<ResourceLoaded>();

        let state = world.create_entity();
        world.add_tag::<ResourceDbState>(state)?;
        tracing::debug!(
            %state,
            description = std::any::type_name::<D>(),
            "created resource database"
        );

        Ok(Self {
            state,
            by_description: FxHashMap::default(),
            by_entity: FxHashMap::default(),
        })
    }

    /// The entity anchoring this database.
    #[must_use]
    pub fn state_entity(&self) -> GameEntity {
        self.state
    }

    /// Return the entity for `description`, creating and tagging one on
    /// first use.
    pub fn get_or_create(&mut self, world: &mut World, description: D) -> ResourceResult<GameEntity> {
        if let Some(&entity) = self.by_description.get(&description) {
            if world.is_alive(entity) {
                return Ok(entity);
            }
            // Destroyed behind our back; forget it and start over.
            self.by_entity.remove(&entity);
        }

        let entity = world.create_entity();
        world.add_tag::<ResourceTag<D>>(entity)?;
        tracing::debug!(%entity, ?description, "created resource");

        self.by_entity.insert(entity, description.clone());
        self.by_description.insert(description, entity);
        Ok(entity)
    }

    /// Look up a description without creating anything.
    #[must_use]
    pub fn try_get(&self, description: &D) -> Option<GameEntity> {
        self.by_description.get(description).copied()
    }

    /// The description a resource entity was created from.
    #[must_use]
    pub fn description(&self, entity: GameEntity) -> Option<&D> {
        self.by_entity.get(&entity)
    }

    /// Forget a resource and destroy its entity.
    ///
    /// Returns `false` if the entity is not a resource of this database.
    pub fn dispose(&mut self, world: &mut World, entity: GameEntity) -> bool {
        let Some(description) = self.by_entity.remove(&entity) else {
            return false;
        };
        self.by_description.remove(&description);
        world.destroy_entity(entity);
        tracing::debug!(%entity, ?description, "disposed resource");
        true
    }

    /// Dispose every resource. The state entity survives.
    pub fn dispose_all(&mut self, world: &mut World) -> usize {
        let count = self.by_entity.len();
        for (entity, _) in self.by_entity.drain() {
            world.destroy_entity(entity);
        }
        self.by_description.clear();
        count
    }

    /// All resource entities, in id order.
    #[must_use]
    pub fn resources(&self) -> Vec<GameEntity> {
        let mut resources: Vec<_> = self.by_entity.keys().copied().collect();
        resources.sort_unstable();
        resources
    }

    /// Number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    /// Whether the database holds no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }
}

impl<D: ResourceDescription> core::fmt::Debug for GameResourceDb<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GameResourceDb")
            .field("state", &self.state)
            .field("resources", &self.by_entity.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_deduplicates() {
        let mut world = World::new();
        let mut db = GameResourceDb::<String>::new(&mut world).unwrap();

        let a = db.get_or_create(&mut world, "grass.png".to_owned()).unwrap();
        let b = db.get_or_create(&mut world, "grass.png".to_owned()).unwrap();
        let c = db.get_or_create(&mut world, "stone.png".to_owned()).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(db.len(), 2);
        assert!(world.has::<ResourceTag<String>>(a));
        assert!(world.has::<ResourceDbState>(db.state_entity()));
    }

    #[test]
    fn test_lookup_both_ways() {
        let mut world = World::new();
        let mut db = GameResourceDb::<u64>::new(&mut world).unwrap();
        let e = db.get_or_create(&mut world, 42).unwrap();

        assert_eq!(db.try_get(&42), Some(e));
        assert_eq!(db.try_get(&7), None);
        assert_eq!(db.description(e), Some(&42));
        assert_eq!(db.description(db.state_entity()), None);
    }

    #[test]
    fn test_dispose() {
        let mut world = World::new();
        let mut db = GameResourceDb::<u64>::new(&mut world).unwrap();
        let e = db.get_or_create(&mut world, 1).unwrap();

        assert!(db.dispose(&mut world, e));
        assert!(!world.is_alive(e));
        assert_eq!(db.try_get(&1), None);
        assert!(!db.dispose(&mut world, e));

        let again = db.get_or_create(&mut world, 1).unwrap();
        assert_ne!(again, e);
    }

    #[test]
    fn test_recreates_externally_destroyed_resource() {
        let mut world = World::new();
        let mut db = GameResourceDb::<u64>::new(&mut world).unwrap();
        let e = db.get_or_create(&mut world, 5).unwrap();
        world.destroy_entity(e);

        let fresh = db.get_or_create(&mut world, 5).unwrap();
        assert!(world.is_alive(fresh));
        assert_eq!(db.description(e), None);
        assert_eq!(db.resources(), vec![fresh]);
    }

    #[test]
    fn test_dispose_all_keeps_state() {
        let mut world = World::new();
        let mut db = GameResourceDb::<u64>::new(&mut world).unwrap();
        for i in 0..4 {
            db.get_or_create(&mut world, i).unwrap();
        }

        assert_eq!(db.dispose_all(&mut world), 4);
        assert!(db.is_empty());
        assert_eq!(world.entity_count(), 1);
        assert!(world.is_alive(db.state_entity()));
    }
}
