//! Typed, span-based views over one board.
//!
//! An accessor caches the board's value span ("source") and the type's
//! links column for as long as it lives. Indexing by a
//! [`GameEntityHandle`] resolves `source[links[id].assigned]`.
//!
//! Every accessor borrows the [`World`], so it cannot outlive a structural
//! change. Two lookups are offered:
//!
//! - `get` validates liveness, presence and bounds and reports an
//!   [`EcsError`]
//! - `get_unchecked` indexes directly; the checks only run as debug
//!   assertions

use std::ops::{Deref, DerefMut};

use crate::{
    World,
    archetype::ArchetypeBoard,
    board::{BufferComponentBoard, SingleComponentBoard},
    component::{BufferComponent, Component, ComponentType},
    entity::{GameEntity, GameEntityHandle},
    entity_board::{ComponentMetadata, EntityBoard},
    error::{EcsError, EcsResult},
};

/// Links column plus the context needed to explain a failed lookup.
#[derive(Clone, Copy)]
struct LinkView<'w> {
    component_type: ComponentType,
    links: &'w [ComponentMetadata],
    entities: &'w EntityBoard,
    archetypes: &'w ArchetypeBoard,
}

impl<'w> LinkView<'w> {
    fn new(
        component_type: ComponentType,
        entities: &'w EntityBoard,
        archetypes: &'w ArchetypeBoard,
    ) -> Self {
        Self {
            component_type,
            links: entities.links(component_type),
            entities,
            archetypes,
        }
    }

    fn metadata(&self, entity: GameEntityHandle) -> ComponentMetadata {
        self.links
            .get(entity.index())
            .copied()
            .unwrap_or(ComponentMetadata::NULL)
    }

    fn contains(&self, entity: GameEntityHandle) -> bool {
        self.entities.is_handle_alive(entity) && !self.metadata(entity).is_null()
    }

    /// Validated storage index for an entity.
    fn resolve(&self, entity: GameEntityHandle, len: usize) -> EcsResult<usize> {
        if !self.entities.is_handle_alive(entity) {
            return Err(EcsError::DeadHandle(entity));
        }
        let meta = self.metadata(entity);
        if meta.is_null() {
            return Err(EcsError::MissingComponent {
                entity,
                component: self.component_type,
                archetype: self.archetypes.describe(self.entities.archetype(entity)),
            });
        }
        let index = meta.assigned_index();
        if index >= len {
            return Err(EcsError::RowOutOfRange {
                component: self.component_type,
                row: meta.id(),
                len,
            });
        }
        Ok(index)
    }

    /// Storage index without checks in release builds.
    ///
    /// # Safety
    ///
    /// The entity must be alive and hold a reference to the component.
    unsafe fn resolve_unchecked(&self, entity: GameEntityHandle, len: usize) -> usize {
        if cfg!(debug_assertions) {
            if let Err(err) = self.resolve(entity, len) {
                panic!("unchecked component access: {err}");
            }
        }
        // SAFETY: Caller guarantees the entity holds the component, so its
        // links slot exists
        unsafe { self.links.get_unchecked(entity.index()).assigned_index() }
    }

    /// Live entities holding the component, with their storage index.
    fn iter(self) -> impl Iterator<Item = (GameEntity, usize)> + 'w {
        let links = self.links;
        self.entities.alive().filter_map(move |entity| {
            let meta = links.get(entity.handle().index())?;
            (!meta.is_null()).then(|| (entity, meta.assigned_index()))
        })
    }
}

/// Read-only view over a [`SingleComponentBoard`].
pub struct ComponentDataAccessor<'w, T: Component> {
    source: &'w [T],
    view: LinkView<'w>,
}

impl<'w, T: Component> ComponentDataAccessor<'w, T> {
    /// View the board registered for `T`.
    pub fn new(world: &'w World) -> EcsResult<Self> {
        Self::with_type(world, ComponentType::of::<T>())
    }

    /// View the board registered under `component_type`.
    pub fn with_type(world: &'w World, component_type: ComponentType) -> EcsResult<Self> {
        let board = world
            .registry()
            .typed::<SingleComponentBoard<T>>(component_type)?;
        Ok(Self {
            source: board.values(),
            view: LinkView::new(component_type, world.entities(), world.archetypes()),
        })
    }

    /// Component type being viewed.
    #[must_use]
    pub fn component_type(&self) -> ComponentType {
        self.view.component_type
    }

    /// The value span, indexed by row id.
    #[must_use]
    pub fn source(&self) -> &'w [T] {
        self.source
    }

    /// The links column, indexed by entity id.
    #[must_use]
    pub fn links(&self) -> &'w [ComponentMetadata] {
        self.view.links
    }

    /// Check if the entity is alive and holds the component.
    #[must_use]
    pub fn contains(&self, entity: GameEntityHandle) -> bool {
        self.view.contains(entity)
    }

    /// Checked lookup.
    pub fn get(&self, entity: GameEntityHandle) -> EcsResult<&'w T> {
        let index = self.view.resolve(entity, self.source.len())?;
        Ok(&self.source[index])
    }

    /// Unchecked lookup.
    ///
    /// # Safety
    ///
    /// The entity must be alive and hold a reference to the component.
    /// Debug builds verify this and panic with a diagnostic.
    #[must_use]
    pub unsafe fn get_unchecked(&self, entity: GameEntityHandle) -> &'w T {
        // SAFETY: Forwarded caller contract; an assigned index always lies
        // within the board's value storage
        unsafe {
            let index = self.view.resolve_unchecked(entity, self.source.len());
            self.source.get_unchecked(index)
        }
    }

    /// Iterate over every live entity holding the component.
    pub fn iter(&self) -> impl Iterator<Item = (GameEntity, &'w T)> + 'w {
        let source = self.source;
        self.view
            .iter()
            .filter_map(move |(entity, index)| Some((entity, source.get(index)?)))
    }
}

/// Read-write view over a [`SingleComponentBoard`].
///
/// Entities sharing a row see each other's writes.
pub struct ComponentDataAccessorMut<'w, T: Component> {
    source: &'w mut [T],
    view: LinkView<'w>,
}

impl<'w, T: Component> ComponentDataAccessorMut<'w, T> {
    /// View the board registered for `T`.
    pub fn new(world: &'w mut World) -> EcsResult<Self> {
        Self::with_type(world, ComponentType::of::<T>())
    }

    /// View the board registered under `component_type`.
    pub fn with_type(world: &'w mut World, component_type: ComponentType) -> EcsResult<Self> {
        let parts = world.parts_mut();
        let board = parts
            .registry
            .typed_mut::<SingleComponentBoard<T>>(component_type)?;
        Ok(Self {
            source: board.values_mut(),
            view: LinkView::new(component_type, parts.entities, parts.archetypes),
        })
    }

    /// Check if the entity is alive and holds the component.
    #[must_use]
    pub fn contains(&self, entity: GameEntityHandle) -> bool {
        self.view.contains(entity)
    }

    /// Checked lookup.
    pub fn get(&self, entity: GameEntityHandle) -> EcsResult<&T> {
        let index = self.view.resolve(entity, self.source.len())?;
        Ok(&self.source[index])
    }

    /// Checked mutable lookup.
    pub fn get_mut(&mut self, entity: GameEntityHandle) -> EcsResult<&mut T> {
        let index = self.view.resolve(entity, self.source.len())?;
        Ok(&mut self.source[index])
    }

    /// Unchecked mutable lookup.
    ///
    /// # Safety
    ///
    /// The entity must be alive and hold a reference to the component.
    /// Debug builds verify this and panic with a diagnostic.
    #[must_use]
    pub unsafe fn get_unchecked_mut(&mut self, entity: GameEntityHandle) -> &mut T {
        // SAFETY: Forwarded caller contract
        unsafe {
            let index = self.view.resolve_unchecked(entity, self.source.len());
            self.source.get_unchecked_mut(index)
        }
    }

    /// Visit every live row once, through the first entity found holding
    /// it.
    ///
    /// Entities sharing a row see a single call between them, so
    /// read-modify-write closures apply once per value.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(GameEntity, &mut T)) {
        let mut visited = vec![false; self.source.len()];
        for (entity, index) in self.view.iter() {
            let Some(value) = self.source.get_mut(index) else {
                continue;
            };
            if !std::mem::replace(&mut visited[index], true) {
                f(entity, value);
            }
        }
    }
}

/// Read-only view over a [`BufferComponentBoard`].
pub struct ComponentBufferAccessor<'w, T: BufferComponent> {
    source: &'w [Vec<T>],
    view: LinkView<'w>,
}

impl<'w, T: BufferComponent> ComponentBufferAccessor<'w, T> {
    /// View the board registered for `T`.
    pub fn new(world: &'w World) -> EcsResult<Self> {
        Self::with_type(world, ComponentType::of_buffer::<T>())
    }

    /// View the board registered under `component_type`.
    pub fn with_type(world: &'w World, component_type: ComponentType) -> EcsResult<Self> {
        let board = world
            .registry()
            .typed::<BufferComponentBoard<T>>(component_type)?;
        Ok(Self {
            source: board.lists(),
            view: LinkView::new(component_type, world.entities(), world.archetypes()),
        })
    }

    /// Check if the entity is alive and holds the component.
    #[must_use]
    pub fn contains(&self, entity: GameEntityHandle) -> bool {
        self.view.contains(entity)
    }

    /// Checked lookup.
    pub fn get(&self, entity: GameEntityHandle) -> EcsResult<&'w [T]> {
        let index = self.view.resolve(entity, self.source.len())?;
        Ok(&self.source[index])
    }

    /// Unchecked lookup.
    ///
    /// # Safety
    ///
    /// The entity must be alive and hold a reference to the component.
    #[must_use]
    pub unsafe fn get_unchecked(&self, entity: GameEntityHandle) -> &'w [T] {
        // SAFETY: Forwarded caller contract
        unsafe {
            let index = self.view.resolve_unchecked(entity, self.source.len());
            self.source.get_unchecked(index)
        }
    }

    /// Iterate over every live entity holding the component.
    pub fn iter(&self) -> impl Iterator<Item = (GameEntity, &'w [T])> + 'w {
        let source = self.source;
        self.view
            .iter()
            .filter_map(move |(entity, index)| Some((entity, source.get(index)?.as_slice())))
    }
}

/// Read-write view over a [`BufferComponentBoard`].
pub struct ComponentBufferAccessorMut<'w, T: BufferComponent> {
    source: &'w mut [Vec<T>],
    view: LinkView<'w>,
}

impl<'w, T: BufferComponent> ComponentBufferAccessorMut<'w, T> {
    /// View the board registered for `T`.
    pub fn new(world: &'w mut World) -> EcsResult<Self> {
        Self::with_type(world, ComponentType::of_buffer::<T>())
    }

    /// View the board registered under `component_type`.
    pub fn with_type(world: &'w mut World, component_type: ComponentType) -> EcsResult<Self> {
        let parts = world.parts_mut();
        let board = parts
            .registry
            .typed_mut::<BufferComponentBoard<T>>(component_type)?;
        Ok(Self {
            source: board.lists_mut(),
            view: LinkView::new(component_type, parts.entities, parts.archetypes),
        })
    }

    /// Check if the entity is alive and holds the component.
    #[must_use]
    pub fn contains(&self, entity: GameEntityHandle) -> bool {
        self.view.contains(entity)
    }

    /// Checked lookup.
    pub fn get(&self, entity: GameEntityHandle) -> EcsResult<&[T]> {
        let index = self.view.resolve(entity, self.source.len())?;
        Ok(&self.source[index])
    }

    /// Checked mutable lookup.
    pub fn get_mut(&mut self, entity: GameEntityHandle) -> EcsResult<BufferMut<'_, T>> {
        let index = self.view.resolve(entity, self.source.len())?;
        Ok(BufferMut {
            list: &mut self.source[index],
        })
    }

    /// Unchecked mutable lookup.
    ///
    /// # Safety
    ///
    /// The entity must be alive and hold a reference to the component.
    #[must_use]
    pub unsafe fn get_unchecked_mut(&mut self, entity: GameEntityHandle) -> BufferMut<'_, T> {
        // SAFETY: Forwarded caller contract
        let list = unsafe {
            let index = self.view.resolve_unchecked(entity, self.source.len());
            self.source.get_unchecked_mut(index)
        };
        BufferMut { list }
    }
}

/// List-like handle to one row of a buffer board.
pub struct BufferMut<'a, T: BufferComponent> {
    list: &'a mut Vec<T>,
}

impl<'a, T: BufferComponent> BufferMut<'a, T> {
    pub(crate) fn new(list: &'a mut Vec<T>) -> Self {
        Self { list }
    }

    /// Append an element.
    pub fn push(&mut self, value: T) {
        self.list.push(value);
    }

    /// Remove and return the last element.
    pub fn pop(&mut self) -> Option<T> {
        self.list.pop()
    }

    /// Remove every element, keeping the allocation.
    pub fn clear(&mut self) {
        self.list.clear();
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Check if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Raw bytes of the list.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.list)
    }
}

impl<T: BufferComponent> Extend<T> for BufferMut<'_, T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.list.extend(iter);
    }
}

impl<T: BufferComponent> Deref for BufferMut<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.list
    }
}

impl<T: BufferComponent> DerefMut for BufferMut<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.list
    }
}
