//! Variable-length component storage.

use std::any::Any;

use bytemuck::Zeroable;

use super::{BoardCore, BoardInternals, ComponentBoard};
use crate::{
    component::{BoardKind, BufferComponent, ComponentType},
    row::RowId,
};

/// One growable list of `T` per row.
///
/// The per-row list array is sized before a row is handed out, and a
/// deleted row's list is dropped rather than just truncated.
pub struct BufferComponentBoard<T: BufferComponent> {
    core: BoardCore,
    lists: Vec<Vec<T>>,
}

impl<T: BufferComponent> BufferComponentBoard<T> {
    /// Create a board with room for `capacity` rows.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let core = BoardCore::new(ComponentType::of_buffer::<T>(), capacity);
        let mut lists = Vec::new();
        lists.resize_with(core.capacity(), Vec::new);
        Self { core, lists }
    }

    /// The list span, indexed by row id.
    #[must_use]
    pub fn lists(&self) -> &[Vec<T>] {
        &self.lists
    }

    /// The list span, mutably.
    #[must_use]
    pub fn lists_mut(&mut self) -> &mut [Vec<T>] {
        &mut self.lists
    }

    /// List at a live row.
    #[must_use]
    pub fn list(&self, row: RowId) -> Option<&[T]> {
        if !self.core.is_live(row) {
            return None;
        }
        self.lists.get(row as usize).map(Vec::as_slice)
    }

    /// List at a live row, mutably.
    #[must_use]
    pub fn list_mut(&mut self, row: RowId) -> Option<&mut Vec<T>> {
        if !self.core.is_live(row) {
            return None;
        }
        self.lists.get_mut(row as usize)
    }
}

impl<T: BufferComponent> BoardInternals for BufferComponentBoard<T> {
    fn core_mut(&mut self) -> &mut BoardCore {
        &mut self.core
    }

    fn clear_row(&mut self, row: RowId) {
        if let Some(list) = self.lists.get_mut(row as usize) {
            *list = Vec::new();
        }
    }
}

impl<T: BufferComponent> ComponentBoard for BufferComponentBoard<T> {
    fn core(&self) -> &BoardCore {
        &self.core
    }

    fn kind(&self) -> BoardKind {
        BoardKind::Buffer
    }

    fn element_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    fn resize_storage(&mut self, capacity: usize) {
        if self.lists.len() < capacity {
            self.lists.resize_with(capacity, Vec::new);
        }
    }

    fn row_bytes(&self, row: RowId) -> Option<&[u8]> {
        let list = self.lists.get(row as usize)?;
        bytemuck::try_cast_slice(list).ok()
    }

    fn write_row_bytes(&mut self, row: RowId, bytes: &[u8]) -> bool {
        let size = std::mem::size_of::<T>();
        if size == 0 || bytes.len() % size != 0 {
            return false;
        }
        let Some(list) = self.lists.get_mut(row as usize) else {
            return false;
        };
        // The source bytes carry no alignment guarantee, copy into fresh storage
        let mut values = vec![T::zeroed(); bytes.len() / size];
        bytemuck::cast_slice_mut::<T, u8>(&mut values).copy_from_slice(bytes);
        *list = values;
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
