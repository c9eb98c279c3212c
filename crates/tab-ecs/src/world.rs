//! World - the owner of every board, the entity board and the archetype
//! board.
//!
//! The world is the typed convenience layer over the low-level protocol in
//! [`low_level`](crate::low_level). Structural changes (adding or removing
//! a component) only mark the entity dirty; archetypes are recomputed in
//! one batch by [`World::commit_archetypes`].

use rustc_hash::FxHashSet;

use crate::{
    accessor::{
        BufferMut, ComponentBufferAccessor, ComponentBufferAccessorMut, ComponentDataAccessor,
        ComponentDataAccessorMut,
    },
    archetype::{ArchetypeBoard, EntityArchetype},
    board::{BufferComponentBoard, ComponentBoard, SingleComponentBoard, TagComponentBoard},
    component::{BufferComponent, Component, ComponentReference, ComponentType, TagComponent},
    config::EngineConfig,
    entity::{GameEntity, GameEntityHandle},
    entity_board::EntityBoard,
    error::{EcsError, EcsResult},
    low_level,
    query::QueryBuilder,
    registry::ComponentTypeRegistry,
    row::{NULL_ROW, RowId},
};

/// Disjoint mutable borrows of a world's containers, for driving the
/// low-level API directly.
pub struct WorldPartsMut<'w> {
    pub registry: &'w mut ComponentTypeRegistry,
    pub entities: &'w mut EntityBoard,
    pub archetypes: &'w mut ArchetypeBoard,
}

/// The ECS world - container for all entities and component boards.
pub struct World {
    config: EngineConfig,
    registry: ComponentTypeRegistry,
    entities: EntityBoard,
    archetypes: ArchetypeBoard,
    /// Entities whose component set changed since the last commit.
    dirty: Vec<GameEntityHandle>,
    dirty_set: FxHashSet<GameEntityHandle>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a world sized by `config`.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            registry: ComponentTypeRegistry::new(config.initial_row_capacity),
            entities: EntityBoard::new(config.initial_entity_capacity),
            archetypes: ArchetypeBoard::new(),
            dirty: Vec::new(),
            dirty_set: FxHashSet::default(),
            config,
        }
    }

    /// The configuration the world was created with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ==================== Registration ====================

    /// Register a fixed-size component type.
    pub fn register<T: Component>(&mut self) -> ComponentType {
        self.registry.register::<T>()
    }

    /// Register a buffer component type.
    pub fn register_buffer<T: BufferComponent>(&mut self) -> ComponentType {
        self.registry.register_buffer::<T>()
    }

    /// Register a tag component type.
    pub fn register_tag<T: TagComponent>(&mut self) -> ComponentType {
        self.registry.register_tag::<T>()
    }

    // ==================== Entity Operations ====================

    /// Spawn a new entity with no components.
    pub fn create_entity(&mut self) -> GameEntity {
        let entity = self.entities.create_entity();
        self.archetypes
            .add_entity(EntityArchetype::EMPTY, entity.handle());
        entity
    }

    /// Spawn `count` entities in one growth step.
    pub fn create_entities(&mut self, count: usize) -> Vec<GameEntity> {
        let mut out = Vec::with_capacity(count);
        self.entities.create_entities(count, &mut out);
        for entity in &out {
            self.archetypes
                .add_entity(EntityArchetype::EMPTY, entity.handle());
        }
        tracing::debug!(count, "created entities");
        out
    }

    /// Drop every component reference of an entity and free its id.
    ///
    /// Returns `false` if the entity was already destroyed.
    pub fn destroy_entity(&mut self, entity: GameEntity) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        let handle = entity.handle();

        let types = self.registry.types().to_vec();
        for ty in types {
            self.release(ty, entity);
        }

        self.archetypes
            .remove_entity(self.entities.archetype(handle), handle);
        if self.dirty_set.remove(&handle) {
            self.dirty.retain(|&h| h != handle);
        }
        self.entities.destroy_entity(entity)
    }

    /// Check if an entity is alive.
    #[must_use]
    pub fn is_alive(&self, entity: GameEntity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // ==================== Component Operations ====================

    /// Write a component value.
    ///
    /// A row the entity owns alone is overwritten in place. If the entity
    /// has no row yet, or shares its row with others, it gets a fresh row
    /// of its own and the shared row is left untouched.
    pub fn set<T: Component>(&mut self, entity: GameEntity, value: T) -> EcsResult<()> {
        self.check_alive(entity)?;
        let ty = ComponentType::of::<T>();
        let meta = self.entities.metadata(ty, entity.handle());

        let board = self.registry.typed_mut::<SingleComponentBoard<T>>(ty)?;
        if !meta.is_null() && board.core().reference_count(meta.id()) == 1 {
            board.set(meta.id(), value);
            return Ok(());
        }

        if meta.is_null() {
            self.mark_dirty(entity.handle());
        } else {
            // Leave the shared row to its other referencers
            self.release(ty, entity);
        }

        let board = self.registry.typed_mut::<SingleComponentBoard<T>>(ty)?;
        let row = attach_new_row(board, &mut self.entities, entity);
        board.set(row, value);
        Ok(())
    }

    /// Read a component value.
    pub fn get<T: Component>(&self, entity: GameEntity) -> EcsResult<&T> {
        let (ty, row) = self.locate(ComponentType::of::<T>(), entity)?;
        let board = self.registry.typed::<SingleComponentBoard<T>>(ty)?;
        board.get(row).ok_or(EcsError::RowOutOfRange {
            component: ty,
            row,
            len: board.values().len(),
        })
    }

    /// Mutably access a component value.
    ///
    /// Writes are visible to every entity sharing the row.
    pub fn get_mut<T: Component>(&mut self, entity: GameEntity) -> EcsResult<&mut T> {
        let (ty, row) = self.locate(ComponentType::of::<T>(), entity)?;
        let board = self.registry.typed_mut::<SingleComponentBoard<T>>(ty)?;
        let len = board.values().len();
        board
            .get_mut(row)
            .ok_or(EcsError::RowOutOfRange { component: ty, row, len })
    }

    /// Check if an entity holds a component of type `T` (any family).
    #[must_use]
    pub fn has<T: 'static>(&self, entity: GameEntity) -> bool {
        ComponentType::lookup::<T>().is_some_and(|ty| self.has_type(entity, ty))
    }

    /// Check if an entity holds a component of the given type.
    #[must_use]
    pub fn has_type(&self, entity: GameEntity, component_type: ComponentType) -> bool {
        self.entities.is_alive(entity)
            && !self
                .entities
                .metadata(component_type, entity.handle())
                .is_null()
    }

    /// Point `to`'s slot at the row `from` holds for `component_type`.
    ///
    /// Both entities then read and write the same value, and the row
    /// stays alive until neither references it.
    pub fn share(
        &mut self,
        component_type: ComponentType,
        from: GameEntity,
        to: GameEntity,
    ) -> EcsResult<()> {
        self.check_alive(to)?;
        let (ty, row) = self.locate(component_type, from)?;

        let current = self.entities.metadata(ty, to.handle()).id();
        if current == row {
            return Ok(());
        }
        if current == NULL_ROW {
            self.mark_dirty(to.handle());
        } else {
            self.release(ty, to);
        }

        let board = self
            .registry
            .board_mut(ty)
            .ok_or(EcsError::UnregisteredType(ty))?;
        low_level::assign_component(
            board,
            ComponentReference::new(ty, row),
            &mut self.entities,
            to.handle(),
        );
        Ok(())
    }

    /// Drop an entity's reference to a component.
    ///
    /// Returns whether the entity had one.
    pub fn remove(&mut self, entity: GameEntity, component_type: ComponentType) -> EcsResult<bool> {
        self.check_alive(entity)?;
        if !self.registry.contains(component_type) {
            return Err(EcsError::UnregisteredType(component_type));
        }
        let removed = self.release(component_type, entity);
        if removed {
            self.mark_dirty(entity.handle());
        }
        Ok(removed)
    }

    /// Attach a tag. Does nothing if the entity already has it.
    pub fn add_tag<T: TagComponent>(&mut self, entity: GameEntity) -> EcsResult<()> {
        self.check_alive(entity)?;
        let ty = ComponentType::of_tag::<T>();
        let board = self.registry.typed_mut::<TagComponentBoard<T>>(ty)?;
        if self.entities.metadata(ty, entity.handle()).is_null() {
            attach_new_row(board, &mut self.entities, entity);
            self.mark_dirty(entity.handle());
        }
        Ok(())
    }

    /// Attach an empty buffer if the entity has none, and return it.
    pub fn add_buffer<T: BufferComponent>(&mut self, entity: GameEntity) -> EcsResult<BufferMut<'_, T>> {
        self.check_alive(entity)?;
        let ty = ComponentType::of_buffer::<T>();
        let board = self.registry.typed_mut::<BufferComponentBoard<T>>(ty)?;

        let mut row = self.entities.metadata(ty, entity.handle()).id();
        if row == NULL_ROW {
            row = attach_new_row(board, &mut self.entities, entity);
            if self.dirty_set.insert(entity.handle()) {
                self.dirty.push(entity.handle());
            }
        }

        let len = board.lists().len();
        board
            .list_mut(row)
            .map(BufferMut::new)
            .ok_or(EcsError::RowOutOfRange { component: ty, row, len })
    }

    /// Read a buffer component.
    pub fn buffer<T: BufferComponent>(&self, entity: GameEntity) -> EcsResult<&[T]> {
        let (ty, row) = self.locate(ComponentType::of_buffer::<T>(), entity)?;
        let board = self.registry.typed::<BufferComponentBoard<T>>(ty)?;
        board.list(row).ok_or(EcsError::RowOutOfRange {
            component: ty,
            row,
            len: board.lists().len(),
        })
    }

    /// Mutably access a buffer component.
    pub fn buffer_mut<T: BufferComponent>(&mut self, entity: GameEntity) -> EcsResult<BufferMut<'_, T>> {
        let (ty, row) = self.locate(ComponentType::of_buffer::<T>(), entity)?;
        let board = self.registry.typed_mut::<BufferComponentBoard<T>>(ty)?;
        let len = board.lists().len();
        board
            .list_mut(row)
            .map(BufferMut::new)
            .ok_or(EcsError::RowOutOfRange { component: ty, row, len })
    }

    /// The entity recorded as authoritative owner of the row backing the
    /// (entity, type) slot.
    pub fn owner_of(&self, component_type: ComponentType, entity: GameEntity) -> EcsResult<GameEntity> {
        let (ty, row) = self.locate(component_type, entity)?;
        let board = self
            .registry
            .board(ty)
            .ok_or(EcsError::UnregisteredType(ty))?;
        Ok(board.core().owner(row))
    }

    // ==================== Archetypes ====================

    /// Recompute one entity's archetype right away.
    pub fn update_archetype(&mut self, entity: GameEntity) -> EcsResult<EntityArchetype> {
        self.check_alive(entity)?;
        let handle = entity.handle();
        if self.dirty_set.remove(&handle) {
            self.dirty.retain(|&h| h != handle);
        }
        Ok(low_level::update_archetype(
            &mut self.archetypes,
            &self.registry,
            &mut self.entities,
            handle,
        ))
    }

    /// Recompute the archetype of every entity changed since the last
    /// commit. Returns how many entities were processed.
    pub fn commit_archetypes(&mut self) -> usize {
        let dirty = std::mem::take(&mut self.dirty);
        self.dirty_set.clear();

        for &handle in &dirty {
            if self.entities.is_handle_alive(handle) {
                low_level::update_archetype(
                    &mut self.archetypes,
                    &self.registry,
                    &mut self.entities,
                    handle,
                );
            }
        }

        if !dirty.is_empty() {
            tracing::debug!(
                entities = dirty.len(),
                archetypes = self.archetypes.len(),
                "committed archetype changes"
            );
        }
        dirty.len()
    }

    /// Number of entities waiting for [`commit_archetypes`](Self::commit_archetypes).
    #[must_use]
    pub fn pending_archetype_updates(&self) -> usize {
        self.dirty.len()
    }

    /// Last committed archetype of an entity.
    #[must_use]
    pub fn archetype_of(&self, entity: GameEntity) -> Option<EntityArchetype> {
        self.entities
            .is_alive(entity)
            .then(|| self.entities.archetype(entity.handle()))
    }

    // ==================== Accessors ====================

    /// Read-only view over the board of `T`.
    pub fn data<T: Component>(&self) -> EcsResult<ComponentDataAccessor<'_, T>> {
        ComponentDataAccessor::new(self)
    }

    /// Read-write view over the board of `T`.
    pub fn data_mut<T: Component>(&mut self) -> EcsResult<ComponentDataAccessorMut<'_, T>> {
        ComponentDataAccessorMut::new(self)
    }

    /// Read-only view over the buffer board of `T`.
    pub fn buffers<T: BufferComponent>(&self) -> EcsResult<ComponentBufferAccessor<'_, T>> {
        ComponentBufferAccessor::new(self)
    }

    /// Read-write view over the buffer board of `T`.
    pub fn buffers_mut<T: BufferComponent>(
        &mut self,
    ) -> EcsResult<ComponentBufferAccessorMut<'_, T>> {
        ComponentBufferAccessorMut::new(self)
    }

    /// Commit pending archetype changes and start a query.
    pub fn query(&mut self) -> QueryBuilder<'_> {
        self.commit_archetypes();
        QueryBuilder::new(self)
    }

    /// The component registry.
    #[must_use]
    pub fn registry(&self) -> &ComponentTypeRegistry {
        &self.registry
    }

    /// The entity board.
    #[must_use]
    pub fn entities(&self) -> &EntityBoard {
        &self.entities
    }

    /// The archetype board.
    #[must_use]
    pub fn archetypes(&self) -> &ArchetypeBoard {
        &self.archetypes
    }

    /// Split the world into its containers.
    ///
    /// Changes made through the parts bypass dirty tracking; call
    /// [`low_level::update_archetype`] for the entities touched.
    pub fn parts_mut(&mut self) -> WorldPartsMut<'_> {
        WorldPartsMut {
            registry: &mut self.registry,
            entities: &mut self.entities,
            archetypes: &mut self.archetypes,
        }
    }

    // ==================== Internals ====================

    fn check_alive(&self, entity: GameEntity) -> EcsResult<()> {
        if self.entities.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::DeadEntity(entity))
        }
    }

    /// Row backing the (entity, type) slot.
    fn locate(&self, component_type: ComponentType, entity: GameEntity) -> EcsResult<(ComponentType, RowId)> {
        self.check_alive(entity)?;
        if !self.registry.contains(component_type) {
            return Err(EcsError::UnregisteredType(component_type));
        }
        let meta = self.entities.metadata(component_type, entity.handle());
        if meta.is_null() {
            return Err(EcsError::MissingComponent {
                entity: entity.handle(),
                component: component_type,
                archetype: self
                    .archetypes
                    .describe(self.entities.archetype(entity.handle())),
            });
        }
        Ok((component_type, meta.id()))
    }

    /// Drop the entity's reference and hand ownership of a still-shared
    /// row to one of the remaining referencers.
    fn release(&mut self, component_type: ComponentType, entity: GameEntity) -> bool {
        let handle = entity.handle();
        let row = self.entities.metadata(component_type, handle).id();
        let Some(board) = self.registry.board_mut(component_type) else {
            return false;
        };
        if !low_level::remove_component_reference(board, &mut self.entities, handle) {
            return false;
        }

        if board.core().is_live(row) && board.core().owner(row) == entity {
            let heir = self
                .entities
                .links(component_type)
                .iter()
                .position(|meta| meta.id() == row)
                .and_then(|id| self.entities.entity(GameEntityHandle::new(id as u32)));
            if let Some(heir) = heir {
                low_level::set_owner(board, ComponentReference::new(component_type, row), heir);
            }
        }
        true
    }

    fn mark_dirty(&mut self, entity: GameEntityHandle) {
        if self.dirty_set.insert(entity) {
            self.dirty.push(entity);
        }
    }
}

/// Allocate a row, make `entity` its owner and point the entity's slot
/// at it.
fn attach_new_row(
    board: &mut dyn ComponentBoard,
    entities: &mut EntityBoard,
    entity: GameEntity,
) -> RowId {
    let reference = low_level::create_component(board);
    low_level::set_owner(board, reference, entity);
    low_level::assign_component(board, reference, entities, entity.handle());
    reference.row
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entity_count())
            .field("component_types", &self.registry.len())
            .field("archetype_count", &self.archetypes.len())
            .field("pending_archetype_updates", &self.dirty.len())
            .finish()
    }
}
