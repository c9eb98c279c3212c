//! Zero-size marker storage.

use std::{any::Any, marker::PhantomData};

use super::{BoardCore, BoardInternals, ComponentBoard};
use crate::{
    component::{BoardKind, ComponentType, TagComponent},
    row::RowId,
};

/// Rows without values. They exist so tags take part in the same
/// ownership and refcount protocol as data components.
pub struct TagComponentBoard<T: TagComponent> {
    core: BoardCore,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TagComponent> TagComponentBoard<T> {
    /// Create a board with room for `capacity` rows.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        debug_assert_eq!(
            std::mem::size_of::<T>(),
            0,
            "tag component {} must be zero-sized",
            std::any::type_name::<T>()
        );
        Self {
            core: BoardCore::new(ComponentType::of_tag::<T>(), capacity),
            _marker: PhantomData,
        }
    }
}

impl<T: TagComponent> BoardInternals for TagComponentBoard<T> {
    fn core_mut(&mut self) -> &mut BoardCore {
        &mut self.core
    }

    fn clear_row(&mut self, _row: RowId) {}
}

impl<T: TagComponent> ComponentBoard for TagComponentBoard<T> {
    fn core(&self) -> &BoardCore {
        &self.core
    }

    fn kind(&self) -> BoardKind {
        BoardKind::Tag
    }

    fn element_size(&self) -> usize {
        0
    }

    fn resize_storage(&mut self, _capacity: usize) {}

    fn row_bytes(&self, row: RowId) -> Option<&[u8]> {
        self.core.is_live(row).then_some(&[][..])
    }

    fn write_row_bytes(&mut self, _row: RowId, bytes: &[u8]) -> bool {
        bytes.is_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dead;
    impl TagComponent for Dead {}

    #[test]
    fn test_tag_rows_follow_protocol() {
        let mut board = TagComponentBoard::<Dead>::new(2);
        let a = board.create_row();
        let b = board.create_row();

        assert_ne!(a, b);
        assert_eq!(board.element_size(), 0);
        assert_eq!(board.row_bytes(a), Some(&[][..]));

        board.delete_row(a);
        assert!(board.row_bytes(a).is_none());
        assert_eq!(board.create_row(), a);
    }
}
