//! The garbage-collected arena backing every `Object`.
//!
//! Grounded on `original_source/src/pool.c`: one arena owns every
//! dynamically-allocated object (plain, array, function, ...); everything
//! else (the global object, call-frame environments, closures) holds an
//! opaque [`ObjectHandle`] rather than owning the allocation directly. This
//! is what makes mark-sweep collection of reference cycles possible — a
//! function object whose closure environment transitively points back at
//! the function (a closure capturing itself, or two functions capturing
//! each other's environments) cannot be freed by reference counting alone,
//! but a tracing collector handles it for free.
//!
//! Strings (`EStr`, see `estr.rs`) are deliberately *not* pool-tracked: they
//! are immutable and can never participate in a reference cycle, so plain
//! `Rc<str>` reference counting already reclaims them optimally (see
//! Open Question 3 in DESIGN.md).

use crate::object::ObjectData;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;

/// Opaque handle to a pool-owned [`ObjectData`]. Cheap to copy, compare, and
/// hash; carries no lifetime, so it can sit inside a [`crate::value::Value`]
/// or be stored on the Rust call stack across reentrant script calls.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(u32);

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHandle({})", self.0)
    }
}

struct Slot {
    data: RefCell<ObjectData>,
    marked: bool,
}

/// Slab arena + mark-sweep collector.
pub struct Pool {
    slots: Vec<Option<Slot>>,
    free: Vec<u32>,
    /// Index into `slots` recorded by [`Pool::checkpoint`]; entries created
    /// at or after this index belong to the "young generation" that a
    /// caller can cheaply sweep with [`Pool::collect_since`] without
    /// tracing the whole heap, matching spec §3's
    /// `getIndices`/`collectUnreferencedFromIndices`.
    allocations: u64,
}

impl Pool {
    #[must_use]
    pub fn new() -> Self {
        Pool { slots: Vec::new(), free: Vec::new(), allocations: 0 }
    }

    pub fn alloc(&mut self, data: ObjectData) -> ObjectHandle {
        self.allocations += 1;
        let slot = Some(Slot { data: RefCell::new(data), marked: false });
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = slot;
            ObjectHandle(index)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(slot);
            ObjectHandle(index)
        }
    }

    #[must_use]
    pub fn get(&self, handle: ObjectHandle) -> Ref<'_, ObjectData> {
        self.slot(handle).data.borrow()
    }

    #[must_use]
    pub fn get_mut(&self, handle: ObjectHandle) -> RefMut<'_, ObjectData> {
        self.slot(handle).data.borrow_mut()
    }

    fn slot(&self, handle: ObjectHandle) -> &Slot {
        self.slots[handle.0 as usize]
            .as_ref()
            .expect("use of an ObjectHandle after it was collected")
    }

    /// A snapshot marker for a bounded-scope young-generation collection:
    /// indices allocated after this point that are unreferenced by `roots`
    /// at [`Pool::collect_since`] time are reclaimed without tracing the
    /// entire heap.
    #[must_use]
    pub fn checkpoint(&self) -> usize {
        self.slots.len()
    }

    /// Full mark-sweep over the whole arena, starting from `roots`.
    /// Returns the number of slots freed.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = ObjectHandle>) -> usize {
        self.mark_sweep(roots, 0)
    }

    /// Mark-sweep restricted to slots allocated at or after `since`
    /// (see [`Pool::checkpoint`]); slots before `since` are left untouched
    /// even if unreferenced, and are never candidates for freeing here.
    pub fn collect_since(&mut self, roots: impl IntoIterator<Item = ObjectHandle>, since: usize) -> usize {
        self.mark_sweep(roots, since)
    }

    fn mark_sweep(&mut self, roots: impl IntoIterator<Item = ObjectHandle>, floor: usize) -> usize {
        for slot in &mut self.slots {
            if let Some(s) = slot {
                s.marked = false;
            }
        }
        let mut stack: Vec<ObjectHandle> = roots.into_iter().collect();
        while let Some(handle) = stack.pop() {
            let index = handle.0 as usize;
            let Some(slot) = self.slots.get_mut(index).and_then(|s| s.as_mut()) else { continue };
            if slot.marked {
                continue;
            }
            slot.marked = true;
            let data = slot.data.borrow();
            data.trace(&mut stack);
        }
        let mut freed = 0;
        for index in floor..self.slots.len() {
            let should_free = matches!(&self.slots[index], Some(s) if !s.marked);
            if should_free {
                self.slots[index] = None;
                self.free.push(index as u32);
                freed += 1;
            }
        }
        freed
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn allocation_count(&self) -> u64 {
        self.allocations
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectData, ObjectKind};

    #[test]
    fn unreferenced_object_is_collected() {
        let mut pool = Pool::new();
        let a = pool.alloc(ObjectData::new(ObjectKind::Plain, None));
        let _b = pool.alloc(ObjectData::new(ObjectKind::Plain, None));
        assert_eq!(pool.live_count(), 2);
        let freed = pool.collect(std::iter::once(a));
        assert_eq!(freed, 1);
        assert_eq!(pool.live_count(), 1);
    }

    #[test]
    fn cycle_is_collected_when_unreachable() {
        let mut pool = Pool::new();
        let a = pool.alloc(ObjectData::new(ObjectKind::Plain, None));
        let b = pool.alloc(ObjectData::new(ObjectKind::Plain, None));
        pool.get_mut(a).set_prototype(Some(b));
        pool.get_mut(b).set_prototype(Some(a));
        let freed = pool.collect(std::iter::empty());
        assert_eq!(freed, 2);
    }
}
