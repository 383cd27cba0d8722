use std::any::Any;

use super::Entity;

pub(super) const EMPTY: u32 = u32::MAX;

// ---------------------------------------------------------------------------
// ComponentStore — type-erased handle the world keeps per component type
// ---------------------------------------------------------------------------

pub(super) trait ComponentStore {
    fn remove_entity(&mut self, id: u32);
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ---------------------------------------------------------------------------
// SparseSet<T>
// ---------------------------------------------------------------------------

/// Packed storage for one component type.
///
/// `sparse[id]` holds the index into `dense`/`data`, or `EMPTY`. The dense
/// side stores full entity handles so iteration never needs the allocator.
pub(super) struct SparseSet<T> {
    sparse: Vec<u32>,
    dense: Vec<Entity>,
    data: Vec<T>,
}

impl<T: 'static> SparseSet<T> {
    pub(super) fn new() -> Self {
        Self {
            sparse: Vec::new(),
            dense: Vec::new(),
            data: Vec::new(),
        }
    }

    fn slot(&self, id: u32) -> Option<usize> {
        match self.sparse.get(id as usize) {
            Some(&idx) if idx != EMPTY => Some(idx as usize),
            _ => None,
        }
    }

    pub(super) fn contains(&self, id: u32) -> bool {
        self.slot(id).is_some()
    }

    pub(super) fn insert(&mut self, entity: Entity, value: T) {
        let idx = entity.id as usize;
        if idx >= self.sparse.len() {
            self.sparse.resize(idx + 1, EMPTY);
        }
        match self.slot(entity.id) {
            Some(slot) => {
                self.dense[slot] = entity;
                self.data[slot] = value;
            }
            None => {
                self.sparse[idx] = self.dense.len() as u32;
                self.dense.push(entity);
                self.data.push(value);
            }
        }
    }

    pub(super) fn remove(&mut self, id: u32) -> Option<T> {
        let slot = self.slot(id)?;
        self.sparse[id as usize] = EMPTY;

        let last = self.dense.len() - 1;
        if slot != last {
            let moved = self.dense[last].id as usize;
            self.sparse[moved] = slot as u32;
        }
        self.dense.swap_remove(slot);
        Some(self.data.swap_remove(slot))
    }

    pub(super) fn get(&self, id: u32) -> Option<&T> {
        self.slot(id).map(|slot| &self.data[slot])
    }

    pub(super) fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.slot(id).map(|slot| &mut self.data[slot])
    }

    pub(super) fn entities(&self) -> &[Entity] {
        &self.dense
    }

    pub(super) fn parts(&self) -> (&[Entity], &[T]) {
        (&self.dense, &self.data)
    }

    pub(super) fn parts_mut(&mut self) -> (&[Entity], &mut [T]) {
        (&self.dense, &mut self.data)
    }

    /// Raw view used by multi-component mutable queries, which need disjoint
    /// `&mut` access into several stores at once.
    pub(super) fn raw_column(&mut self) -> RawColumn<T> {
        RawColumn {
            sparse: self.sparse.as_ptr(),
            sparse_len: self.sparse.len(),
            data: self.data.as_mut_ptr(),
        }
    }
}

impl<T: 'static> ComponentStore for SparseSet<T> {
    fn remove_entity(&mut self, id: u32) {
        self.remove(id);
    }

    fn len(&self) -> usize {
        self.dense.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// RawColumn<T>
// ---------------------------------------------------------------------------

pub struct RawColumn<T> {
    sparse: *const u32,
    sparse_len: usize,
    data: *mut T,
}

impl<T> RawColumn<T> {
    /// # Safety
    ///
    /// The column must outlive `'a`, nothing may resize the owning set while
    /// the reference lives, and each `id` must be fetched at most once.
    pub(super) unsafe fn get_mut<'a>(&self, id: u32) -> Option<&'a mut T> {
        let idx = id as usize;
        if idx >= self.sparse_len {
            return None;
        }
        // SAFETY: idx < sparse_len, and the caller guarantees the set is alive
        // and unaliased for this slot.
        let slot = unsafe { *self.sparse.add(idx) };
        if slot == EMPTY {
            return None;
        }
        Some(unsafe { &mut *self.data.add(slot as usize) })
    }
}
