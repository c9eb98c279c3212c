//! Component boards - per-type columnar storage indexed by row id.
//!
//! Every board shares the same bookkeeping ([`BoardCore`]): a row
//! allocator, an owner column and a per-row reference count. The value
//! storage differs per family:
//!
//! - [`SingleComponentBoard`]: one fixed-size value per row
//! - [`BufferComponentBoard`]: one growable list per row
//! - [`TagComponentBoard`]: no value at all
//!
//! Reference counts are only touched by the low-level API, which keeps
//! boards and the entity board consistent.

mod buffer;
mod single;
mod tag;

use std::any::Any;

pub use buffer::BufferComponentBoard;
pub use single::SingleComponentBoard;
pub use tag::TagComponentBoard;

pub(crate) use sealed::BoardInternals;

use crate::{
    component::{BoardKind, ComponentType},
    entity::GameEntity,
    error::EcsResult,
    row::{RowAllocator, RowId},
};

mod sealed {
    use super::BoardCore;
    use crate::row::RowId;

    /// Mutations that must go through the low-level API.
    pub trait BoardInternals {
        fn core_mut(&mut self) -> &mut BoardCore;

        /// Reset the value at `row` to its default.
        fn clear_row(&mut self, row: RowId);

        /// Clear the value at `row` and recycle it.
        fn delete_row(&mut self, row: RowId) -> bool {
            if !self.core_mut().is_live(row) {
                return false;
            }
            self.clear_row(row);
            self.core_mut().release_row(row)
        }
    }
}

/// Bookkeeping shared by every board family.
#[derive(Clone, Debug)]
pub struct BoardCore {
    component_type: ComponentType,
    rows: RowAllocator,
    /// Authoritative owner per row, sized to the row capacity.
    owners: Vec<GameEntity>,
    /// Number of entity slots referencing each row.
    ref_counts: Vec<u32>,
}

impl BoardCore {
    /// Create bookkeeping for a board of `component_type`.
    #[must_use]
    pub fn new(component_type: ComponentType, capacity: usize) -> Self {
        let rows = RowAllocator::with_capacity(capacity);
        let capacity = rows.capacity();
        Self {
            component_type,
            rows,
            owners: vec![GameEntity::NULL; capacity],
            ref_counts: vec![0; capacity],
        }
    }

    /// Component type stored by the board.
    #[must_use]
    pub const fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// The row allocator.
    #[must_use]
    pub const fn rows(&self) -> &RowAllocator {
        &self.rows
    }

    /// Number of slots the value storage provides.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.rows.capacity()
    }

    /// Highest row id ever issued.
    #[must_use]
    pub const fn max_id(&self) -> RowId {
        self.rows.max_id()
    }

    /// Number of live rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no rows are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check if a row is live.
    #[must_use]
    pub fn is_live(&self, row: RowId) -> bool {
        self.rows.is_used(row)
    }

    /// Authoritative owner of a row (`GameEntity::NULL` if unset).
    #[must_use]
    pub fn owner(&self, row: RowId) -> GameEntity {
        self.owners
            .get(row as usize)
            .copied()
            .unwrap_or(GameEntity::NULL)
    }

    /// The owner column.
    #[must_use]
    pub fn owners(&self) -> &[GameEntity] {
        &self.owners
    }

    /// Number of entity slots referencing a row.
    #[must_use]
    pub fn reference_count(&self, row: RowId) -> u32 {
        self.ref_counts.get(row as usize).copied().unwrap_or(0)
    }

    /// The reference count column.
    #[must_use]
    pub fn ref_counts(&self) -> &[u32] {
        &self.ref_counts
    }

    pub(crate) fn create_row(&mut self) -> RowId {
        let row = self.rows.create_row();
        self.sync_columns();
        row
    }

    pub(crate) fn create_row_bulk(&mut self, count: usize, out: &mut Vec<RowId>) {
        self.rows.create_row_bulk(count, out);
        self.sync_columns();
    }

    /// Free a row and reset its owner and refcount.
    pub(crate) fn release_row(&mut self, row: RowId) -> bool {
        if !self.rows.try_set_unused_row(row) {
            return false;
        }
        self.owners[row as usize] = GameEntity::NULL;
        self.ref_counts[row as usize] = 0;
        true
    }

    pub(crate) fn add_reference(&mut self, row: RowId) -> u32 {
        debug_assert!(
            self.rows.is_used(row),
            "add_reference on dead row {row} of {}",
            self.component_type.name()
        );
        let count = &mut self.ref_counts[row as usize];
        *count += 1;
        *count
    }

    pub(crate) fn remove_reference(&mut self, row: RowId) -> u32 {
        debug_assert!(
            self.reference_count(row) > 0,
            "remove_reference on unreferenced row {row} of {}",
            self.component_type.name()
        );
        let count = &mut self.ref_counts[row as usize];
        *count = count.saturating_sub(1);
        *count
    }

    pub(crate) fn set_owner(&mut self, row: RowId, entity: GameEntity) {
        debug_assert!(
            self.rows.is_used(row),
            "set_owner on dead row {row} of {}",
            self.component_type.name()
        );
        self.owners[row as usize] = entity;
    }

    /// Rebuild rows, owners and refcounts from a snapshot.
    pub(crate) fn restore(
        &mut self,
        max_id: RowId,
        rows: &[RowId],
        owners: &[GameEntity],
        ref_counts: &[u32],
    ) -> EcsResult<()> {
        self.rows.restore(max_id, rows)?;
        self.owners.clear();
        self.ref_counts.clear();
        self.sync_columns();

        for ((&row, &owner), &count) in rows.iter().zip(owners).zip(ref_counts) {
            self.owners[row as usize] = owner;
            self.ref_counts[row as usize] = count;
        }
        Ok(())
    }

    /// Keep the owner and refcount columns sized to the row capacity.
    fn sync_columns(&mut self) {
        let capacity = self.rows.capacity();
        if self.owners.len() < capacity {
            self.owners.resize(capacity, GameEntity::NULL);
            self.ref_counts.resize(capacity, 0);
        }
    }
}

/// Type-erased interface shared by every board family.
///
/// Row lifetime, ownership and reference counting live in [`BoardCore`]
/// and only change through the low-level API. The trait is sealed: the
/// three board families are the only implementors, and rows cannot be
/// deleted from outside the crate.
///
/// ```compile_fail
/// use tab_ecs::{ComponentBoard, TagComponent, TagComponentBoard};
///
/// struct Marker;
/// impl TagComponent for Marker {}
///
/// let mut board = TagComponentBoard::<Marker>::new(1);
/// let row = board.create_row();
/// board.delete_row(row);
/// ```
pub trait ComponentBoard: BoardInternals + Any + Send + Sync {
    /// Shared bookkeeping.
    fn core(&self) -> &BoardCore;

    /// Board family.
    fn kind(&self) -> BoardKind;

    /// Size in bytes of one stored value (one list element for buffers).
    fn element_size(&self) -> usize;

    /// Make value storage hold at least `capacity` rows.
    fn resize_storage(&mut self, capacity: usize);

    /// Raw bytes of the value at `row`.
    fn row_bytes(&self, row: RowId) -> Option<&[u8]>;

    /// Overwrite the value at `row` from raw bytes.
    ///
    /// Returns `false` if the byte length does not fit the board.
    fn write_row_bytes(&mut self, row: RowId, bytes: &[u8]) -> bool;

    /// Raw bytes of the whole value storage, if it is one flat buffer.
    fn as_bytes(&self) -> Option<&[u8]> {
        None
    }

    /// Raw mutable bytes of the whole value storage, if it is one flat buffer.
    fn as_bytes_mut(&mut self) -> Option<&mut [u8]> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Component type stored by the board.
    fn component_type(&self) -> ComponentType {
        self.core().component_type()
    }

    /// Allocate a row, growing value storage if needed.
    fn create_row(&mut self) -> RowId {
        let row = self.core_mut().create_row();
        let capacity = self.core().capacity();
        self.resize_storage(capacity);
        row
    }

    /// Allocate `count` rows in one growth step.
    fn create_row_bulk(&mut self, count: usize, out: &mut Vec<RowId>) {
        self.core_mut().create_row_bulk(count, out);
        let capacity = self.core().capacity();
        self.resize_storage(capacity);
    }
}

#[cfg(test)]
mod tests {
    use bytemuck::{Pod, Zeroable};

    use super::*;
    use crate::component::Component;

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Health {
        value: u32,
    }
    impl Component for Health {}

    #[test]
    fn test_owner_column_tracks_capacity() {
        let mut board = SingleComponentBoard::<Health>::new(1);
        let mut rows = Vec::new();
        board.create_row_bulk(40, &mut rows);

        let core = board.core();
        assert!(core.owners().len() > core.max_id() as usize);
        assert_eq!(core.owners().len(), core.ref_counts().len());
        assert_eq!(core.owners().len(), board.values().len());
    }

    #[test]
    fn test_reference_counting() {
        let mut board = SingleComponentBoard::<Health>::new(4);
        let row = board.create_row();

        assert_eq!(board.core_mut().add_reference(row), 1);
        assert_eq!(board.core_mut().add_reference(row), 2);
        assert_eq!(board.core_mut().remove_reference(row), 1);
        assert_eq!(board.core().reference_count(row), 1);
    }

    #[test]
    fn test_delete_row_resets_bookkeeping() {
        let mut board = SingleComponentBoard::<Health>::new(4);
        let row = board.create_row();
        let owner = GameEntity::new(3, 1);
        board.core_mut().set_owner(row, owner);
        board.core_mut().add_reference(row);

        assert!(board.delete_row(row));
        assert!(!board.delete_row(row));
        assert_eq!(board.core().owner(row), GameEntity::NULL);
        assert_eq!(board.core().reference_count(row), 0);
        assert!(!board.core().is_live(row));
    }
}
