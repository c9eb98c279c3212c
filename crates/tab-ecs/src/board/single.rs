//! Fixed-size component storage.

use std::any::Any;

use bytemuck::Zeroable;

use super::{BoardCore, BoardInternals, ComponentBoard};
use crate::{
    component::{BoardKind, Component, ComponentType},
    row::RowId,
};

/// One fixed-size value per row, in a flat array sized to the row capacity.
///
/// The element type is fixed by `T`, so the board's element size always
/// equals `size_of::<T>()`. Deleted slots are zero-filled.
pub struct SingleComponentBoard<T: Component> {
    core: BoardCore,
    values: Vec<T>,
}

impl<T: Component> SingleComponentBoard<T> {
    /// Create a board with room for `capacity` rows.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let core = BoardCore::new(ComponentType::of::<T>(), capacity);
        let values = vec![T::zeroed(); core.capacity()];
        Self { core, values }
    }

    /// The value span, indexed by row id.
    ///
    /// Slots of dead rows read as zero.
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// The value span, mutably.
    #[must_use]
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Value at a live row.
    #[must_use]
    pub fn get(&self, row: RowId) -> Option<&T> {
        if !self.core.is_live(row) {
            return None;
        }
        self.values.get(row as usize)
    }

    /// Value at a live row, mutably.
    #[must_use]
    pub fn get_mut(&mut self, row: RowId) -> Option<&mut T> {
        if !self.core.is_live(row) {
            return None;
        }
        self.values.get_mut(row as usize)
    }

    /// Overwrite the value at a live row.
    pub fn set(&mut self, row: RowId, value: T) -> bool {
        match self.get_mut(row) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl<T: Component> BoardInternals for SingleComponentBoard<T> {
    fn core_mut(&mut self) -> &mut BoardCore {
        &mut self.core
    }

    fn clear_row(&mut self, row: RowId) {
        if let Some(slot) = self.values.get_mut(row as usize) {
            *slot = T::zeroed();
        }
    }
}

impl<T: Component> ComponentBoard for SingleComponentBoard<T> {
    fn core(&self) -> &BoardCore {
        &self.core
    }

    fn kind(&self) -> BoardKind {
        BoardKind::Single
    }

    fn element_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    fn resize_storage(&mut self, capacity: usize) {
        if self.values.len() < capacity {
            self.values.resize(capacity, T::zeroed());
        }
    }

    fn row_bytes(&self, row: RowId) -> Option<&[u8]> {
        self.values.get(row as usize).map(bytemuck::bytes_of)
    }

    fn write_row_bytes(&mut self, row: RowId, bytes: &[u8]) -> bool {
        let Some(slot) = self.values.get_mut(row as usize) else {
            return false;
        };
        let dst = bytemuck::bytes_of_mut(slot);
        if dst.len() != bytes.len() {
            return false;
        }
        dst.copy_from_slice(bytes);
        true
    }

    fn as_bytes(&self) -> Option<&[u8]> {
        bytemuck::try_cast_slice(&self.values).ok()
    }

    fn as_bytes_mut(&mut self) -> Option<&mut [u8]> {
        bytemuck::try_cast_slice_mut(&mut self.values).ok()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
