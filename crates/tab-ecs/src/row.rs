//! Recyclable row-id allocation shared by every board.
//!
//! Row ids are dense unsigned integers starting at 1; id 0 is the null row
//! and is never issued. Released ids go to a FIFO freelist and are handed
//! out again before the live range grows.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::error::{EcsError, EcsResult};

/// Index of a physical slot inside a board.
pub type RowId = u32;

/// The reserved "no row" id.
pub const NULL_ROW: RowId = 0;

/// Smallest backing capacity once the allocator starts growing.
const MIN_CAPACITY: usize = 16;

/// Marker for a row that is not in the used list.
const UNUSED: u32 = u32::MAX;

/// Allocator for row ids with a FIFO freelist.
///
/// Tracks the live rows in an unordered `used` list so that releasing a
/// row is an O(1) swap-remove.
#[derive(Clone, Debug)]
pub struct RowAllocator {
    /// Recycled ids, oldest first.
    free: VecDeque<RowId>,
    /// Live ids, in no particular order.
    used: Vec<RowId>,
    /// Position of each row inside `used`, indexed by row id.
    slots: Vec<u32>,
    /// Highest id ever issued.
    max_id: RowId,
    /// Number of slots the backing storage must provide (row 0 included).
    capacity: usize,
}

impl Default for RowAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl RowAllocator {
    /// Create an allocator that only holds the null row.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(1)
    }

    /// Create an allocator with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            free: VecDeque::new(),
            used: Vec::with_capacity(capacity),
            slots: vec![UNUSED; capacity],
            max_id: NULL_ROW,
            capacity,
        }
    }

    /// Allocate a row, preferring the oldest recycled id.
    pub fn create_row(&mut self) -> RowId {
        let row = match self.free.pop_front() {
            Some(row) => row,
            None => {
                self.max_id += 1;
                self.grow_to(self.max_id as usize + 1);
                self.max_id
            }
        };
        self.mark_used(row);
        row
    }

    /// Allocate `count` rows, appending them to `out`.
    ///
    /// The freelist is drained first; the remainder extends the live range
    /// contiguously with a single growth step.
    pub fn create_row_bulk(&mut self, count: usize, out: &mut Vec<RowId>) {
        out.reserve(count);

        let recycled = count.min(self.free.len());
        for _ in 0..recycled {
            if let Some(row) = self.free.pop_front() {
                self.mark_used(row);
                out.push(row);
            }
        }

        let remainder = count - recycled;
        if remainder == 0 {
            return;
        }

        let first = self.max_id + 1;
        self.max_id += remainder as RowId;
        self.grow_to(self.max_id as usize + 1);
        for row in first..=self.max_id {
            self.mark_used(row);
            out.push(row);
        }
    }

    /// Return a row to the freelist.
    ///
    /// Returns `false` if the row was not in use.
    pub fn try_set_unused_row(&mut self, row: RowId) -> bool {
        let Some(&slot) = self.slots.get(row as usize) else {
            return false;
        };
        if slot == UNUSED {
            return false;
        }

        let slot_idx = slot as usize;
        self.used.swap_remove(slot_idx);
        if let Some(&moved) = self.used.get(slot_idx) {
            self.slots[moved as usize] = slot;
        }

        self.slots[row as usize] = UNUSED;
        self.free.push_back(row);
        true
    }

    /// Rebuild the allocator from a snapshot of its live rows.
    ///
    /// Every id in `1..=max_id` that is not in `used` goes to the freelist,
    /// in ascending order. A null, out-of-range or repeated row is
    /// rejected and leaves the allocator untouched.
    pub fn restore(&mut self, max_id: RowId, used: &[RowId]) -> EcsResult<()> {
        let mut seen = FxHashSet::default();
        seen.reserve(used.len());
        for &row in used {
            if row == NULL_ROW || row > max_id || !seen.insert(row) {
                return Err(EcsError::InvalidRestore { row, max_id });
            }
        }

        self.free.clear();
        self.used.clear();
        self.slots.iter_mut().for_each(|slot| *slot = UNUSED);
        self.max_id = max_id;
        self.grow_to(max_id as usize + 1);

        for &row in used {
            self.mark_used(row);
        }
        for row in 1..=max_id {
            if !self.is_used(row) {
                self.free.push_back(row);
            }
        }
        Ok(())
    }

    /// Check if a row is currently live.
    #[must_use]
    pub fn is_used(&self, row: RowId) -> bool {
        self.slots
            .get(row as usize)
            .is_some_and(|&slot| slot != UNUSED)
    }

    /// Live rows, in no particular order.
    #[must_use]
    pub fn used_rows(&self) -> &[RowId] {
        &self.used
    }

    /// Recycled rows, in the order they will be reissued.
    pub fn free_rows(&self) -> impl Iterator<Item = RowId> + '_ {
        self.free.iter().copied()
    }

    /// Highest id ever issued.
    #[must_use]
    pub const fn max_id(&self) -> RowId {
        self.max_id
    }

    /// Number of slots backing storage must provide.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.used.len()
    }

    /// Check if no rows are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    fn mark_used(&mut self, row: RowId) {
        self.slots[row as usize] = self.used.len() as u32;
        self.used.push(row);
    }

    /// Double the capacity until `required` slots fit.
    fn grow_to(&mut self, required: usize) {
        if required <= self.capacity {
            return;
        }

        let mut new_capacity = self.capacity.max(MIN_CAPACITY);
        while new_capacity < required {
            new_capacity *= 2;
        }

        tracing::trace!(
            old = self.capacity,
            new = new_capacity,
            "growing row storage"
        );
        self.slots.resize(new_capacity, UNUSED);
        self.capacity = new_capacity;
    }
}

#[cfg(test)]
mod tests {
    use hashbrown::HashSet;

    use super::*;

    #[test]
    fn test_null_row_never_issued() {
        let mut rows = RowAllocator::new();
        let mut out = Vec::new();

        assert_eq!(rows.create_row(), 1);
        rows.create_row_bulk(100, &mut out);

        assert!(!out.contains(&NULL_ROW));
        assert!(!rows.is_used(NULL_ROW));
        assert!(!rows.try_set_unused_row(NULL_ROW));
    }

    #[test]
    fn test_live_rows_are_unique() {
        let mut rows = RowAllocator::new();
        let mut live = HashSet::new();

        for i in 0..500u32 {
            let row = rows.create_row();
            assert!(live.insert(row), "row {row} issued twice");

            // Release every third row to exercise the freelist
            if i % 3 == 0 {
                let victim = *live.iter().next().unwrap();
                assert!(rows.try_set_unused_row(victim));
                live.remove(&victim);
            }
        }

        assert_eq!(rows.len(), live.len());
        let used: HashSet<RowId> = rows.used_rows().iter().copied().collect();
        assert_eq!(used, live);
    }

    #[test]
    fn test_released_row_reused_before_growth() {
        let mut rows = RowAllocator::new();
        let a = rows.create_row();
        let b = rows.create_row();
        let c = rows.create_row();

        assert!(rows.try_set_unused_row(b));
        assert!(rows.try_set_unused_row(a));

        // FIFO: b was released first
        assert_eq!(rows.create_row(), b);
        assert_eq!(rows.create_row(), a);
        assert_eq!(rows.max_id(), c);
        assert_eq!(rows.create_row(), c + 1);
    }

    #[test]
    fn test_double_release_fails() {
        let mut rows = RowAllocator::new();
        let row = rows.create_row();

        assert!(rows.try_set_unused_row(row));
        assert!(!rows.try_set_unused_row(row));
        assert!(!rows.try_set_unused_row(999));
    }

    #[test]
    fn test_bulk_matches_sequential() {
        let mut bulk = RowAllocator::new();
        for _ in 0..10 {
            bulk.create_row();
        }
        bulk.try_set_unused_row(3);
        bulk.try_set_unused_row(7);
        let mut sequential = bulk.clone();

        let mut out = Vec::new();
        bulk.create_row_bulk(25, &mut out);
        for _ in 0..25 {
            sequential.create_row();
        }

        assert_eq!(out.len(), 25);
        assert_eq!(bulk.max_id(), sequential.max_id());

        let mut bulk_free: Vec<RowId> = bulk.free_rows().collect();
        let mut seq_free: Vec<RowId> = sequential.free_rows().collect();
        bulk_free.sort_unstable();
        seq_free.sort_unstable();
        assert_eq!(bulk_free, seq_free);

        let mut bulk_used = bulk.used_rows().to_vec();
        let mut seq_used = sequential.used_rows().to_vec();
        bulk_used.sort_unstable();
        seq_used.sort_unstable();
        assert_eq!(bulk_used, seq_used);
    }

    #[test]
    fn test_capacity_doubles() {
        let mut rows = RowAllocator::new();
        for _ in 0..MIN_CAPACITY - 1 {
            rows.create_row();
        }
        assert_eq!(rows.capacity(), MIN_CAPACITY);

        rows.create_row();
        assert_eq!(rows.capacity(), MIN_CAPACITY * 2);
        assert!(rows.max_id() as usize >= MIN_CAPACITY);
    }

    #[test]
    fn test_restore_rebuilds_freelist() {
        let mut rows = RowAllocator::new();
        rows.restore(6, &[2, 5, 6]).unwrap();

        assert_eq!(rows.max_id(), 6);
        assert!(rows.is_used(5));
        assert!(!rows.is_used(1));
        assert_eq!(rows.free_rows().collect::<Vec<_>>(), vec![1, 3, 4]);
        assert_eq!(rows.create_row(), 1);
    }

    #[test]
    fn test_restore_rejects_bad_rows() {
        let mut rows = RowAllocator::new();
        let a = rows.create_row();
        rows.create_row();

        for used in [&[1, 1][..], &[0][..], &[7][..]] {
            assert!(matches!(
                rows.restore(6, used),
                Err(EcsError::InvalidRestore { .. })
            ));
        }

        // Untouched by the failed attempts
        assert_eq!(rows.max_id(), 2);
        assert_eq!(rows.len(), 2);
        assert!(rows.is_used(a));
        assert_eq!(rows.free_rows().count(), 0);
    }
}
