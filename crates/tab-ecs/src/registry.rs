//! Per-world ownership of component boards.

use std::fmt;

use crate::{
    board::{BufferComponentBoard, ComponentBoard, SingleComponentBoard, TagComponentBoard},
    component::{BufferComponent, Component, ComponentType, TagComponent},
    error::{EcsError, EcsResult},
};

/// Owns one board per registered component type.
///
/// Boards are stored in a dense array indexed by the process-wide
/// [`ComponentType`] id, so lookups never hash.
pub struct ComponentTypeRegistry {
    /// Indexed by `ComponentType::index()`.
    boards: Vec<Option<Box<dyn ComponentBoard>>>,
    /// Registered types, in registration order.
    types: Vec<ComponentType>,
    /// Row capacity handed to new boards.
    row_capacity: usize,
}

impl Default for ComponentTypeRegistry {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ComponentTypeRegistry {
    /// Create an empty registry whose boards start with `row_capacity` slots.
    #[must_use]
    pub fn new(row_capacity: usize) -> Self {
        Self {
            boards: Vec::new(),
            types: Vec::new(),
            row_capacity,
        }
    }

    /// Register a fixed-size component type.
    ///
    /// If the type is already registered, returns the existing id.
    pub fn register<T: Component>(&mut self) -> ComponentType {
        let capacity = self.row_capacity;
        self.insert_board(ComponentType::of::<T>(), || {
            Box::new(SingleComponentBoard::<T>::new(capacity))
        })
    }

    /// Register a buffer component type.
    pub fn register_buffer<T: BufferComponent>(&mut self) -> ComponentType {
        let capacity = self.row_capacity;
        self.insert_board(ComponentType::of_buffer::<T>(), || {
            Box::new(BufferComponentBoard::<T>::new(capacity))
        })
    }

    /// Register a tag component type.
    pub fn register_tag<T: TagComponent>(&mut self) -> ComponentType {
        let capacity = self.row_capacity;
        self.insert_board(ComponentType::of_tag::<T>(), || {
            Box::new(TagComponentBoard::<T>::new(capacity))
        })
    }

    /// Register a custom board under its own component type.
    pub fn register_board(&mut self, board: Box<dyn ComponentBoard>) -> ComponentType {
        let component_type = board.component_type();
        self.insert_board(component_type, move || board)
    }

    fn insert_board(
        &mut self,
        component_type: ComponentType,
        make: impl FnOnce() -> Box<dyn ComponentBoard>,
    ) -> ComponentType {
        debug_assert!(!component_type.is_none(), "cannot register the null type");

        let idx = component_type.index();
        if idx >= self.boards.len() {
            self.boards.resize_with(idx + 1, || None);
        }

        if self.boards[idx].is_none() {
            let board = make();
            tracing::debug!(
                component = component_type.name(),
                kind = board.kind().name(),
                "registered component board"
            );
            self.boards[idx] = Some(board);
            self.types.push(component_type);
        }

        component_type
    }

    /// Check if a board is registered for the type.
    #[must_use]
    pub fn contains(&self, component_type: ComponentType) -> bool {
        matches!(self.boards.get(component_type.index()), Some(Some(_)))
    }

    /// Registered types, in registration order.
    #[must_use]
    pub fn types(&self) -> &[ComponentType] {
        &self.types
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Get a board by type.
    #[must_use]
    pub fn board(&self, component_type: ComponentType) -> Option<&dyn ComponentBoard> {
        self.boards.get(component_type.index())?.as_deref()
    }

    /// Get a mutable board by type.
    #[must_use]
    pub fn board_mut(&mut self, component_type: ComponentType) -> Option<&mut dyn ComponentBoard> {
        match self.boards.get_mut(component_type.index()) {
            Some(Some(board)) => Some(&mut **board),
            _ => None,
        }
    }

    /// Get a board by type, downcast to its concrete type.
    pub fn typed<B: ComponentBoard>(&self, component_type: ComponentType) -> EcsResult<&B> {
        let board = self
            .board(component_type)
            .ok_or(EcsError::UnregisteredType(component_type))?;
        let found = board.kind().name();
        board
            .as_any()
            .downcast_ref::<B>()
            .ok_or(EcsError::BoardMismatch {
                component: component_type,
                expected: std::any::type_name::<B>(),
                found,
            })
    }

    /// Get a mutable board by type, downcast to its concrete type.
    pub fn typed_mut<B: ComponentBoard>(
        &mut self,
        component_type: ComponentType,
    ) -> EcsResult<&mut B> {
        let board = self
            .board_mut(component_type)
            .ok_or(EcsError::UnregisteredType(component_type))?;
        let found = board.kind().name();
        board
            .as_any_mut()
            .downcast_mut::<B>()
            .ok_or(EcsError::BoardMismatch {
                component: component_type,
                expected: std::any::type_name::<B>(),
                found,
            })
    }

    /// Iterate over all boards, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn ComponentBoard> {
        self.types.iter().filter_map(|&ty| self.board(ty))
    }
}

impl fmt::Debug for ComponentTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentTypeRegistry")
            .field("count", &self.len())
            .field("types", &self.types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytemuck::{Pod, Zeroable};

    use super::*;
    use crate::component::BoardKind;

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct Mana(u32);
    impl Component for Mana {}

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct Stamina(u32);
    impl Component for Stamina {}

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct Item(u16);
    impl BufferComponent for Item {}

    struct Hidden;
    impl TagComponent for Hidden {}

    #[test]
    fn test_idempotent_registration() {
        let mut registry = ComponentTypeRegistry::new(4);

        let a = registry.register::<Mana>();
        let b = registry.register::<Mana>();

        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.types(), &[a]);
    }

    #[test]
    fn test_board_families() {
        let mut registry = ComponentTypeRegistry::new(4);
        let mana = registry.register::<Mana>();
        let item = registry.register_buffer::<Item>();
        let hidden = registry.register_tag::<Hidden>();

        assert_eq!(registry.board(mana).unwrap().kind(), BoardKind::Single);
        assert_eq!(registry.board(item).unwrap().kind(), BoardKind::Buffer);
        assert_eq!(registry.board(hidden).unwrap().kind(), BoardKind::Tag);
        assert_eq!(registry.iter().count(), 3);
    }

    #[test]
    fn test_typed_downcast_checks_element_type() {
        let mut registry = ComponentTypeRegistry::new(4);
        let mana = registry.register::<Mana>();

        assert!(registry.typed::<SingleComponentBoard<Mana>>(mana).is_ok());
        assert!(matches!(
            registry.typed::<SingleComponentBoard<Stamina>>(mana),
            Err(EcsError::BoardMismatch { .. })
        ));
        assert!(matches!(
            registry.typed_mut::<SingleComponentBoard<Stamina>>(ComponentType::of::<Stamina>()),
            Err(EcsError::UnregisteredType(_))
        ));
    }
}
