//! Archetype board - interned component-type sets and their members.
//!
//! An archetype is the identity of the set of component types an entity
//! currently has. Set identity, not insertion order, decides equivalence:
//! signatures are sorted and deduplicated before they are interned.

use std::fmt;

use hashbrown::HashSet;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{component::ComponentType, entity::GameEntityHandle};

/// Sorted, deduplicated set of component types.
pub type Signature = SmallVec<[ComponentType; 8]>;

/// Membership slot marker for entities not listed in any archetype.
const NO_SLOT: u32 = u32::MAX;

/// Unique identifier for an archetype.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntityArchetype(u32);

impl EntityArchetype {
    /// The empty archetype (no components).
    pub const EMPTY: Self = Self(0);

    /// Create an archetype id from a raw value.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    /// Check if this is the empty archetype.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for EntityArchetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityArchetype({})", self.0)
    }
}

/// One interned component set and the entities currently using it.
pub struct Archetype {
    id: EntityArchetype,
    /// Sorted component types.
    components: Signature,
    /// Member entities, in no particular order.
    entities: Vec<GameEntityHandle>,
}

impl Archetype {
    fn new(id: EntityArchetype, components: Signature) -> Self {
        Self {
            id,
            components,
            entities: Vec::new(),
        }
    }

    /// Get the archetype id.
    #[must_use]
    pub const fn id(&self) -> EntityArchetype {
        self.id
    }

    /// Get the component types in this archetype (sorted).
    #[must_use]
    pub fn components(&self) -> &[ComponentType] {
        &self.components
    }

    /// Check if this archetype contains a component type.
    #[must_use]
    pub fn contains(&self, component_type: ComponentType) -> bool {
        self.components.binary_search(&component_type).is_ok()
    }

    /// Get the member entities.
    #[must_use]
    pub fn entities(&self) -> &[GameEntityHandle] {
        &self.entities
    }

    /// Get the number of member entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the archetype has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("components", &self.components)
            .field("entity_count", &self.entities.len())
            .finish()
    }
}

/// All archetypes of a world.
pub struct ArchetypeBoard {
    archetypes: Vec<Archetype>,
    /// Signature to archetype id.
    lookup: FxHashMap<Signature, EntityArchetype>,
    /// Position of each entity inside its archetype's member list,
    /// indexed by entity id.
    member_slots: Vec<u32>,
}

impl Default for ArchetypeBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchetypeBoard {
    /// Create a board holding only the empty archetype.
    #[must_use]
    pub fn new() -> Self {
        let mut lookup = FxHashMap::default();
        lookup.insert(Signature::new(), EntityArchetype::EMPTY);
        Self {
            archetypes: vec![Archetype::new(EntityArchetype::EMPTY, Signature::new())],
            lookup,
            member_slots: Vec::new(),
        }
    }

    /// Get or intern the archetype for a component set.
    ///
    /// `signature` may be in any order and may contain duplicates.
    pub fn get_or_create(&mut self, signature: &[ComponentType]) -> EntityArchetype {
        let key = normalize(signature);
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }

        let id = EntityArchetype::from_raw(self.archetypes.len() as u32);
        tracing::trace!(
            archetype = id.as_raw(),
            components = %describe_components(&key),
            "created archetype"
        );
        self.archetypes.push(Archetype::new(id, key.clone()));
        self.lookup.insert(key, id);
        id
    }

    /// Find the archetype for a component set, if it was interned.
    #[must_use]
    pub fn find(&self, signature: &[ComponentType]) -> Option<EntityArchetype> {
        self.lookup.get(&normalize(signature)).copied()
    }

    /// Register an entity as a member of an archetype.
    ///
    /// An entity is a member of at most one archetype; callers remove it
    /// from the previous one first.
    pub fn add_entity(&mut self, archetype: EntityArchetype, entity: GameEntityHandle) {
        let idx = entity.index();
        if idx >= self.member_slots.len() {
            self.member_slots.resize(idx + 1, NO_SLOT);
        }
        debug_assert_eq!(
            self.member_slots[idx], NO_SLOT,
            "entity {entity} is already an archetype member"
        );

        let members = &mut self.archetypes[archetype.as_raw() as usize].entities;
        self.member_slots[idx] = members.len() as u32;
        members.push(entity);
    }

    /// Drop an entity from an archetype's members.
    ///
    /// Returns `false` if the entity was not listed there.
    pub fn remove_entity(&mut self, archetype: EntityArchetype, entity: GameEntityHandle) -> bool {
        let Some(&slot) = self.member_slots.get(entity.index()) else {
            return false;
        };
        let Some(arch) = self.archetypes.get_mut(archetype.as_raw() as usize) else {
            return false;
        };
        if slot == NO_SLOT || arch.entities.get(slot as usize) != Some(&entity) {
            return false;
        }

        arch.entities.swap_remove(slot as usize);
        if let Some(&moved) = arch.entities.get(slot as usize) {
            self.member_slots[moved.index()] = slot;
        }
        self.member_slots[entity.index()] = NO_SLOT;
        true
    }

    /// Get an archetype by id.
    #[must_use]
    pub fn get(&self, id: EntityArchetype) -> Option<&Archetype> {
        self.archetypes.get(id.as_raw() as usize)
    }

    /// Component types of an archetype, empty if unknown.
    #[must_use]
    pub fn components(&self, id: EntityArchetype) -> &[ComponentType] {
        self.get(id).map_or(&[], Archetype::components)
    }

    /// Member entities of an archetype, empty if unknown.
    #[must_use]
    pub fn entities(&self, id: EntityArchetype) -> &[GameEntityHandle] {
        self.get(id).map_or(&[], Archetype::entities)
    }

    /// Get the number of archetypes (the empty archetype included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Check if only the empty archetype exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archetypes.len() <= 1
    }

    /// Iterate over all archetypes.
    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }

    /// Iterate over archetypes that contain ALL of the given components.
    pub fn iter_matching<'a>(
        &'a self,
        required: &'a HashSet<ComponentType>,
    ) -> impl Iterator<Item = &'a Archetype> {
        self.archetypes
            .iter()
            .filter(move |arch| required.iter().all(|&ty| arch.contains(ty)))
    }

    /// Comma-separated component names, for diagnostics.
    #[must_use]
    pub fn describe(&self, id: EntityArchetype) -> String {
        describe_components(self.components(id))
    }
}

impl fmt::Debug for ArchetypeBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchetypeBoard")
            .field("archetypes", &self.archetypes)
            .finish()
    }
}

fn normalize(signature: &[ComponentType]) -> Signature {
    let mut key: Signature = signature.iter().copied().collect();
    key.sort_unstable();
    key.dedup();
    key
}

fn describe_components(components: &[ComponentType]) -> String {
    if components.is_empty() {
        return "<empty>".to_owned();
    }
    components
        .iter()
        .map(|ty| ty.name())
        .collect::<Vec<_>>()
        .join(", ")
}
