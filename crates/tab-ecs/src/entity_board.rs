//! Per-entity bookkeeping: which board row backs each (entity, type) pair.
//!
//! The entity board is column oriented. For every component type there is
//! one "links" column of [`ComponentMetadata`] indexed by entity id, plus a
//! single column holding each entity's current archetype.

use std::fmt;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::{
    archetype::EntityArchetype,
    component::ComponentType,
    entity::{GameEntity, GameEntityHandle},
    row::{NULL_ROW, RowAllocator, RowId},
};

bitflags! {
    /// Flag word stored inside [`ComponentMetadata`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct MetadataFlags: u32 {
        /// The slot aliases a row that another entity already referenced.
        const SHARED = 1 << 0;
    }
}

/// Link from one entity to one row of one board.
///
/// A slot with row id 0 is null: the entity has no component of that type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
#[repr(C)]
pub struct ComponentMetadata {
    id: RowId,
    assigned: u32,
    flags: u32,
}

impl ComponentMetadata {
    /// The empty slot.
    pub const NULL: Self = Self {
        id: NULL_ROW,
        assigned: 0,
        flags: 0,
    };

    /// Metadata pointing at `row`.
    #[must_use]
    pub const fn new(row: RowId, shared: bool) -> Self {
        Self {
            id: row,
            assigned: row,
            flags: if shared {
                MetadataFlags::SHARED.bits()
            } else {
                0
            },
        }
    }

    /// Row inside the board (0 if null).
    #[must_use]
    pub const fn id(self) -> RowId {
        self.id
    }

    /// Dense index into the board's value storage.
    #[must_use]
    pub const fn assigned(self) -> u32 {
        self.assigned
    }

    /// Dense index as a `usize`.
    #[must_use]
    pub const fn assigned_index(self) -> usize {
        self.assigned as usize
    }

    /// Check if the slot aliases another entity's row.
    #[must_use]
    pub const fn is_shared(self) -> bool {
        self.flags & MetadataFlags::SHARED.bits() != 0
    }

    /// Check if the slot is empty.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.id == NULL_ROW
    }

    /// The flag word.
    #[must_use]
    pub const fn flags(self) -> MetadataFlags {
        MetadataFlags::from_bits_truncate(self.flags)
    }
}

impl fmt::Debug for ComponentMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("ComponentMetadata(null)");
        }
        f.debug_struct("ComponentMetadata")
            .field("row", &self.id)
            .field("assigned", &self.assigned)
            .field("shared", &self.is_shared())
            .finish()
    }
}

/// Entity ids, versions, archetype column and per-type links.
#[derive(Clone, Debug)]
pub struct EntityBoard {
    rows: RowAllocator,
    /// Current version per entity id.
    versions: Vec<u32>,
    /// Current archetype per entity id.
    archetypes: Vec<EntityArchetype>,
    /// Links column per component type, indexed by `ComponentType::index()`.
    links: Vec<Vec<ComponentMetadata>>,
}

impl Default for EntityBoard {
    fn default() -> Self {
        Self::new(0)
    }
}

impl EntityBoard {
    /// Create an entity board with room for `capacity` entities.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let rows = RowAllocator::with_capacity(capacity);
        let capacity = rows.capacity();
        Self {
            rows,
            versions: vec![1; capacity],
            archetypes: vec![EntityArchetype::EMPTY; capacity],
            links: Vec::new(),
        }
    }

    /// Spawn a new entity with no components.
    pub fn create_entity(&mut self) -> GameEntity {
        let id = self.rows.create_row();
        self.sync_columns();
        self.archetypes[id as usize] = EntityArchetype::EMPTY;
        GameEntity::new(id, self.versions[id as usize])
    }

    /// Spawn `count` entities in one growth step, appending them to `out`.
    pub fn create_entities(&mut self, count: usize, out: &mut Vec<GameEntity>) {
        let mut ids = Vec::with_capacity(count);
        self.rows.create_row_bulk(count, &mut ids);
        self.sync_columns();

        out.reserve(count);
        for id in ids {
            self.archetypes[id as usize] = EntityArchetype::EMPTY;
            out.push(GameEntity::new(id, self.versions[id as usize]));
        }
    }

    /// Free an entity id and bump its version.
    ///
    /// The entity must not hold component references any more. Returns
    /// `false` if the entity is stale.
    pub fn destroy_entity(&mut self, entity: GameEntity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let idx = entity.id() as usize;

        for (ty, column) in self.links.iter_mut().enumerate() {
            if let Some(slot) = column.get_mut(idx) {
                debug_assert!(
                    slot.is_null(),
                    "destroying {entity} while it still references row {} of {}",
                    slot.id(),
                    ComponentType::from_raw(ty as u32).name()
                );
                *slot = ComponentMetadata::NULL;
            }
        }

        let version = &mut self.versions[idx];
        *version = version.wrapping_add(1).max(1);
        self.archetypes[idx] = EntityArchetype::EMPTY;
        self.rows.try_set_unused_row(entity.id())
    }

    /// Check if an entity is alive (id live and version current).
    #[must_use]
    pub fn is_alive(&self, entity: GameEntity) -> bool {
        self.rows.is_used(entity.id())
            && self.versions.get(entity.id() as usize) == Some(&entity.version())
    }

    /// Check if a handle names a live entity id.
    #[must_use]
    pub fn is_handle_alive(&self, handle: GameEntityHandle) -> bool {
        self.rows.is_used(handle.id())
    }

    /// Upgrade a handle to the live entity currently using its id.
    #[must_use]
    pub fn entity(&self, handle: GameEntityHandle) -> Option<GameEntity> {
        self.is_handle_alive(handle)
            .then(|| GameEntity::new(handle.id(), self.versions[handle.index()]))
    }

    /// Overwrite the (entity, type) slot and return the previous row id.
    ///
    /// Passing [`NULL_ROW`] clears the slot. Returns [`NULL_ROW`] if the
    /// slot was empty.
    pub fn assign_component_reference(
        &mut self,
        entity: GameEntityHandle,
        component_type: ComponentType,
        row: RowId,
        shared: bool,
    ) -> RowId {
        debug_assert!(
            self.is_handle_alive(entity),
            "assigning {} to dead entity {entity}",
            component_type.name()
        );

        let capacity = self.rows.capacity();
        let ty = component_type.index();
        if ty >= self.links.len() {
            self.links.resize_with(ty + 1, Vec::new);
        }
        let column = &mut self.links[ty];
        if column.len() < capacity {
            column.resize(capacity, ComponentMetadata::NULL);
        }

        let new = if row == NULL_ROW {
            ComponentMetadata::NULL
        } else {
            ComponentMetadata::new(row, shared)
        };
        std::mem::replace(&mut column[entity.index()], new).id()
    }

    /// Drop the shared flag from every slot that points at `row`.
    ///
    /// Called once a row is back to a single referencer.
    pub(crate) fn clear_shared(&mut self, component_type: ComponentType, row: RowId) {
        let Some(column) = self.links.get_mut(component_type.index()) else {
            return;
        };
        for slot in column.iter_mut().filter(|slot| slot.id == row) {
            slot.flags &= !MetadataFlags::SHARED.bits();
        }
    }

    /// Metadata of the (entity, type) slot, null if never assigned.
    #[must_use]
    pub fn metadata(
        &self,
        component_type: ComponentType,
        entity: GameEntityHandle,
    ) -> ComponentMetadata {
        self.links
            .get(component_type.index())
            .and_then(|column| column.get(entity.index()))
            .copied()
            .unwrap_or(ComponentMetadata::NULL)
    }

    /// The links column of a type, indexed by entity id.
    ///
    /// May be shorter than the entity capacity; missing slots are null.
    #[must_use]
    pub fn links(&self, component_type: ComponentType) -> &[ComponentMetadata] {
        self.links
            .get(component_type.index())
            .map_or(&[], Vec::as_slice)
    }

    /// Current archetype of an entity.
    #[must_use]
    pub fn archetype(&self, entity: GameEntityHandle) -> EntityArchetype {
        self.archetypes
            .get(entity.index())
            .copied()
            .unwrap_or(EntityArchetype::EMPTY)
    }

    pub(crate) fn set_archetype(&mut self, entity: GameEntityHandle, archetype: EntityArchetype) {
        self.archetypes[entity.index()] = archetype;
    }

    /// Iterate over all live entities, in no particular order.
    pub fn alive(&self) -> impl Iterator<Item = GameEntity> + '_ {
        self.rows
            .used_rows()
            .iter()
            .map(|&id| GameEntity::new(id, self.versions[id as usize]))
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no entities are alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of entity slots currently backed by storage.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.rows.capacity()
    }

    fn sync_columns(&mut self) {
        let capacity = self.rows.capacity();
        if self.versions.len() < capacity {
            self.versions.resize(capacity, 1);
            self.archetypes.resize(capacity, EntityArchetype::EMPTY);
        }
    }
}
