//! Reverse lookup from materialized keywords to index entries

use super::BlockHandle;

/// Association of block handles with the index position they were
/// materialized from
///
/// Kept as two sorted sequences, one ordered by handle and one by position,
/// so either side can be binary searched. Inserts only append and mark the
/// map dirty; the next lookup sorts once, so loading many keywords in a row
/// costs one sort instead of one per insert. Removals keep both sequences
/// sorted.
#[derive(Debug, Clone, Default)]
pub struct InverseMap {
    by_handle: Vec<(BlockHandle, usize)>,
    by_position: Vec<(usize, BlockHandle)>,
    dirty: bool,
}

impl InverseMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `handle` was materialized from entry `position`
    pub fn insert(&mut self, handle: BlockHandle, position: usize) {
        self.by_handle.push((handle, position));
        self.by_position.push((position, handle));
        self.dirty = true;
    }

    /// Forget `handle`, returning the position it mapped to
    pub fn remove(&mut self, handle: BlockHandle) -> Option<usize> {
        self.sort_if_dirty();
        let slot = self.handle_slot(handle)?;
        let (_, position) = self.by_handle.remove(slot);
        if let Ok(slot) = self.by_position.binary_search(&(position, handle)) {
            self.by_position.remove(slot);
        }
        Some(position)
    }

    /// Index position that produced `handle`
    pub fn find_entry_for(&mut self, handle: BlockHandle) -> Option<usize> {
        self.sort_if_dirty();
        self.handle_slot(handle).map(|slot| self.by_handle[slot].1)
    }

    /// Handle currently registered for entry `position`
    pub fn handle_at(&mut self, position: usize) -> Option<BlockHandle> {
        self.sort_if_dirty();
        let slot = self.by_position.partition_point(|(p, _)| *p < position);
        match self.by_position.get(slot) {
            Some((p, handle)) if *p == position => Some(*handle),
            _ => None,
        }
    }

    /// Number of registered handles
    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    /// Whether no handle is registered
    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    /// Whether a sort is pending
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn handle_slot(&self, handle: BlockHandle) -> Option<usize> {
        self.by_handle
            .binary_search_by_key(&handle, |(h, _)| *h)
            .ok()
    }

    fn sort_if_dirty(&mut self) {
        if !self.dirty {
            return;
        }
        self.by_handle.sort_unstable();
        self.by_position.sort_unstable();
        self.dirty = false;
    }
}


#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    proptest! {
        /// Lookups agree with a plain map after any mix of inserts and removals
        #[test]
        fn lookups_match_model(ops in prop::collection::vec((any::<bool>(), 0u64..32, 0usize..100), 0..200)) {
            let mut map = InverseMap::new();
            let mut model = HashMap::new();

            for (insert, id, position) in ops {
                let handle = BlockHandle(id);
                if insert && !model.contains_key(&id) {
                    map.insert(handle, position);
                    model.insert(id, position);
                } else if !insert {
                    prop_assert_eq!(map.remove(handle), model.remove(&id));
                }
                if id % 3 == 0 {
                    prop_assert_eq!(map.find_entry_for(handle), model.get(&id).copied());
                }
            }

            prop_assert_eq!(map.len(), model.len());
            for id in 0..32 {
                prop_assert_eq!(map.find_entry_for(BlockHandle(id)), model.get(&id).copied());
            }
            for (id, position) in &model {
                let found = map.handle_at(*position).map(BlockHandle::id);
                // Several handles may share a position in the model
                prop_assert!(found.is_some());
                prop_assert_eq!(model.get(&found.unwrap_or(*id)), Some(position));
            }
        }
    }
}
