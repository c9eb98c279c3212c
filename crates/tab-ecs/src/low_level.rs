//! The mutation protocol that keeps boards, the entity board and the
//! archetype board consistent.
//!
//! These are free functions over the individual containers so callers can
//! hold disjoint borrows (one board plus the entity board) at once. Invalid
//! rows, dead entities and mismatched boards are programming errors: they
//! are asserted in debug builds and skipped in release builds.

use crate::{
    archetype::{ArchetypeBoard, EntityArchetype},
    board::{BoardInternals, ComponentBoard},
    component::{ComponentReference, ComponentType},
    entity::{GameEntity, GameEntityHandle},
    entity_board::EntityBoard,
    registry::ComponentTypeRegistry,
    row::{NULL_ROW, RowId},
};

/// Allocate a fresh row in `board`.
///
/// The row has no referencers until it is assigned to an entity.
pub fn create_component(board: &mut dyn ComponentBoard) -> ComponentReference {
    let row = board.create_row();
    ComponentReference::new(board.component_type(), row)
}

/// Point the entity's slot at `reference`, releasing whatever it pointed at
/// before.
///
/// The new row gains a reference before the old one loses its own, so
/// reassigning a row that another entity still holds never frees it. The
/// slot is marked shared when the row already had a referencer.
pub fn assign_component(
    board: &mut dyn ComponentBoard,
    reference: ComponentReference,
    entity_board: &mut EntityBoard,
    entity: GameEntityHandle,
) {
    let component_type = board.component_type();
    debug_assert_eq!(
        reference.component_type,
        component_type,
        "reference to {} assigned through the {} board",
        reference.component_type.name(),
        component_type.name()
    );
    debug_assert!(
        board.core().is_live(reference.row),
        "assigning dead row {} of {} to {entity}",
        reference.row,
        component_type.name()
    );

    if entity_board.metadata(component_type, entity).id() == reference.row {
        return;
    }

    let shared = board.core().reference_count(reference.row) > 0;
    board.core_mut().add_reference(reference.row);

    let previous =
        entity_board.assign_component_reference(entity, component_type, reference.row, shared);
    if previous != NULL_ROW {
        release_reference(board, entity_board, previous);
    }
}

/// Mark `entity` as the authoritative owner of the row.
///
/// Reference counts are left alone.
pub fn set_owner(board: &mut dyn ComponentBoard, reference: ComponentReference, entity: GameEntity) {
    debug_assert_eq!(reference.component_type, board.component_type());
    board.core_mut().set_owner(reference.row, entity);
}

/// Clear the entity's slot for the board's type.
///
/// The row it pointed at is deleted once no entity references it. Returns
/// whether the entity had a reference.
pub fn remove_component_reference(
    board: &mut dyn ComponentBoard,
    entity_board: &mut EntityBoard,
    entity: GameEntityHandle,
) -> bool {
    let component_type = board.component_type();
    if entity_board.metadata(component_type, entity).is_null() {
        return false;
    }

    let previous = entity_board.assign_component_reference(entity, component_type, NULL_ROW, false);
    release_reference(board, entity_board, previous);
    true
}

/// Recompute an entity's archetype from the slots it currently holds.
///
/// Scans every registered type, so callers batch structural changes and
/// call this once per entity afterwards. Membership only changes when the
/// archetype does.
pub fn update_archetype(
    archetype_board: &mut ArchetypeBoard,
    registry: &ComponentTypeRegistry,
    entity_board: &mut EntityBoard,
    entity: GameEntityHandle,
) -> EntityArchetype {
    let signature = entity_signature(registry, entity_board, entity);
    let archetype = archetype_board.get_or_create(&signature);

    let current = entity_board.archetype(entity);
    if current != archetype {
        archetype_board.remove_entity(current, entity);
        entity_board.set_archetype(entity, archetype);
        archetype_board.add_entity(archetype, entity);
    }
    archetype
}

/// Registered types for which the entity holds a non-null slot.
pub fn entity_signature(
    registry: &ComponentTypeRegistry,
    entity_board: &EntityBoard,
    entity: GameEntityHandle,
) -> Vec<ComponentType> {
    registry
        .types()
        .iter()
        .copied()
        .filter(|&ty| !entity_board.metadata(ty, entity).is_null())
        .collect()
}

/// Drop one reference to `row`, deleting it at zero and unmarking the
/// last holder at one.
fn release_reference(board: &mut dyn ComponentBoard, entity_board: &mut EntityBoard, row: RowId) {
    match board.core_mut().remove_reference(row) {
        0 => {
            board.delete_row(row);
        }
        1 => entity_board.clear_shared(board.component_type(), row),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use bytemuck::{Pod, Zeroable};

    use super::*;
    use crate::{
        board::SingleComponentBoard,
        component::{Component, TagComponent},
    };

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Health(u32);
    impl Component for Health {}

    struct Poisoned;
    impl TagComponent for Poisoned {}

    fn setup() -> (ComponentTypeRegistry, EntityBoard, ComponentType) {
        let mut registry = ComponentTypeRegistry::new(4);
        let health = registry.register::<Health>();
        (registry, EntityBoard::new(4), health)
    }

    #[test]
    fn test_shared_component_gc() {
        let (mut registry, mut entities, health) = setup();
        let a = entities.create_entity();
        let b = entities.create_entity();

        let board = registry.board_mut(health).unwrap();
        let r1 = create_component(board);
        board
            .as_any_mut()
            .downcast_mut::<SingleComponentBoard<Health>>()
            .unwrap()
            .set(r1.row, Health(100));
        set_owner(board, r1, a);

        assign_component(board, r1, &mut entities, a.handle());
        assert_eq!(board.core().reference_count(r1.row), 1);
        assert!(!entities.metadata(health, a.handle()).is_shared());

        assign_component(board, r1, &mut entities, b.handle());
        assert_eq!(board.core().reference_count(r1.row), 2);
        assert!(entities.metadata(health, b.handle()).is_shared());

        assert!(remove_component_reference(board, &mut entities, a.handle()));
        assert!(board.core().is_live(r1.row));
        assert!(!entities.metadata(health, b.handle()).is_shared());
        let typed = registry.typed::<SingleComponentBoard<Health>>(health).unwrap();
        let row = entities.metadata(health, b.handle()).id();
        assert_eq!(typed.get(row), Some(&Health(100)));

        let board = registry.board_mut(health).unwrap();
        assert!(remove_component_reference(board, &mut entities, b.handle()));
        assert!(!board.core().is_live(r1.row));
        assert!(!remove_component_reference(board, &mut entities, b.handle()));
    }

    #[test]
    fn test_last_holder_loses_shared_flag() {
        let (mut registry, mut entities, health) = setup();
        let a = entities.create_entity().handle();
        let b = entities.create_entity().handle();
        let c = entities.create_entity().handle();

        let board = registry.board_mut(health).unwrap();
        let row = create_component(board);
        for entity in [a, b, c] {
            assign_component(board, row, &mut entities, entity);
        }

        // Two holders left, both still aliasing
        remove_component_reference(board, &mut entities, a);
        assert!(entities.metadata(health, b).is_shared());
        assert!(entities.metadata(health, c).is_shared());

        // Moving b to its own row leaves c as the only holder
        let own = create_component(board);
        assign_component(board, own, &mut entities, b);
        assert_eq!(board.core().reference_count(row.row), 1);
        assert!(!entities.metadata(health, b).is_shared());
        assert!(!entities.metadata(health, c).is_shared());
        assert_eq!(entities.metadata(health, c).id(), row.row);
    }

    #[test]
    fn test_reassign_releases_previous_row() {
        let (mut registry, mut entities, health) = setup();
        let a = entities.create_entity().handle();

        let board = registry.board_mut(health).unwrap();
        let first = create_component(board);
        assign_component(board, first, &mut entities, a);
        let second = create_component(board);
        assign_component(board, second, &mut entities, a);

        assert!(!board.core().is_live(first.row));
        assert_eq!(board.core().reference_count(second.row), 1);

        // Assigning the same row again is a no-op
        assign_component(board, second, &mut entities, a);
        assert_eq!(board.core().reference_count(second.row), 1);
    }

    #[test]
    fn test_archetype_add_then_remove_restores_id() {
        let (mut registry, mut entities, health) = setup();
        let poisoned = registry.register_tag::<Poisoned>();
        let mut archetypes = ArchetypeBoard::new();
        let a = entities.create_entity().handle();
        archetypes.add_entity(EntityArchetype::EMPTY, a);

        let board = registry.board_mut(health).unwrap();
        let hp = create_component(board);
        assign_component(board, hp, &mut entities, a);
        let with_health = update_archetype(&mut archetypes, &registry, &mut entities, a);

        let board = registry.board_mut(poisoned).unwrap();
        let tag = create_component(board);
        assign_component(board, tag, &mut entities, a);
        let both = update_archetype(&mut archetypes, &registry, &mut entities, a);
        assert_ne!(with_health, both);
        assert_eq!(archetypes.components(both), &[health, poisoned]);

        let board = registry.board_mut(poisoned).unwrap();
        remove_component_reference(board, &mut entities, a);
        let again = update_archetype(&mut archetypes, &registry, &mut entities, a);

        assert_eq!(again, with_health);
        assert_eq!(archetypes.entities(with_health), &[a]);
        assert!(archetypes.entities(both).is_empty());
        assert!(archetypes.entities(EntityArchetype::EMPTY).is_empty());
    }
}
