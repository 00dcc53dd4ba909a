//! Fiber table
//!
//! Pooled storage for every fiber slot, partitioned into per-phase active
//! lists. Slots are recycled through the slot map's free list and the
//! backing storage doubles when exhausted; it never shrinks.
//!
//! Phase lists are kept sorted by priority lazily: a dirty flag is set on
//! insertion or priority change and the list is re-sorted the next time a
//! phase snapshot is taken. Recycled fibers are left in their phase list as
//! tombstones (their handle no longer resolves) and are compacted away on
//! the next snapshot, so recycling during iteration never disturbs it.

use slotmap::SlotMap;

use crate::fiber::{Fiber, FiberHandle};
use crate::phase::{Phase, PHASE_COUNT};

/// Default number of fiber slots
pub const DEFAULT_CAPACITY: usize = 16;

#[derive(Debug, Default)]
struct PhaseList {
    handles: Vec<FiberHandle>,
    dirty: bool,
    tombstones: usize,
}

/// Pooled registry of all fibers
pub(crate) struct FiberTable {
    fibers: SlotMap<FiberHandle, Fiber>,
    phases: [PhaseList; PHASE_COUNT],
    next_order: u64,
}

impl FiberTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fibers: SlotMap::with_capacity_and_key(capacity.max(1)),
            phases: Default::default(),
            next_order: 0,
        }
    }

    /// Register a fiber, growing the backing storage if every slot is taken
    pub fn allocate(&mut self, mut fiber: Fiber) -> FiberHandle {
        let capacity = self.fibers.capacity();
        if self.fibers.len() >= capacity {
            self.fibers.reserve(capacity.max(1));
            tracing::debug!(
                "Fiber table grew from {} to {} slots",
                capacity,
                self.fibers.capacity()
            );
        }

        fiber.order = self.next_order;
        self.next_order += 1;

        let chained = fiber.is_chained();
        let phase = fiber.phase;
        let priority = fiber.priority;
        let handle = self.fibers.insert(fiber);

        if !chained {
            let list = &mut self.phases[phase.index()];
            // Appending keeps the list sorted unless the new fiber outranks the tail
            if let Some(last) = list.handles.last() {
                match self.fibers.get(*last) {
                    Some(last) if priority >= last.priority => {}
                    _ => list.dirty = true,
                }
            }
            list.handles.push(handle);
        }
        handle
    }

    /// Remove a fiber and hand back its slot
    ///
    /// Its handle goes stale immediately.
    pub fn recycle(&mut self, handle: FiberHandle) -> Option<Fiber> {
        let fiber = self.fibers.remove(handle)?;
        if !fiber.is_chained() {
            self.phases[fiber.phase.index()].tombstones += 1;
        }
        Some(fiber)
    }

    #[inline]
    pub fn get(&self, handle: FiberHandle) -> Option<&Fiber> {
        self.fibers.get(handle)
    }

    #[inline]
    pub fn get_mut(&mut self, handle: FiberHandle) -> Option<&mut Fiber> {
        self.fibers.get_mut(handle)
    }

    #[inline]
    pub fn contains(&self, handle: FiberHandle) -> bool {
        self.fibers.contains_key(handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FiberHandle, &Fiber)> {
        self.fibers.iter()
    }

    pub fn handles(&self) -> Vec<FiberHandle> {
        self.fibers.keys().collect()
    }

    /// Change a fiber's priority; the new order applies from the next snapshot
    pub fn set_priority(&mut self, handle: FiberHandle, priority: i32) -> bool {
        let Some(fiber) = self.fibers.get_mut(handle) else {
            return false;
        };
        if fiber.priority != priority {
            fiber.priority = priority;
            if !fiber.is_chained() {
                self.phases[fiber.phase.index()].dirty = true;
            }
        }
        true
    }

    /// Move a fiber to another phase list
    pub fn set_phase(&mut self, handle: FiberHandle, phase: Phase) -> bool {
        let Some(fiber) = self.fibers.get_mut(handle) else {
            return false;
        };
        let old = fiber.phase;
        if old == phase {
            return true;
        }
        fiber.phase = phase;
        if !fiber.is_chained() {
            self.phases[old.index()].handles.retain(|h| *h != handle);
            let list = &mut self.phases[phase.index()];
            list.handles.push(handle);
            list.dirty = true;
        }
        true
    }

    /// Copy the active handles of `phase`, in ascending priority, into `out`
    ///
    /// The copy is what a phase tick iterates, so priority changes and
    /// recycling during the tick only take effect on the next snapshot.
    pub fn snapshot_phase(&mut self, phase: Phase, out: &mut Vec<FiberHandle>) {
        let fibers = &self.fibers;
        let list = &mut self.phases[phase.index()];

        if list.tombstones > 0 {
            list.handles.retain(|h| fibers.contains_key(*h));
            list.tombstones = 0;
        }
        if list.dirty {
            list.handles.sort_by_key(|h| {
                let fiber = &fibers[*h];
                (fiber.priority, fiber.order)
            });
            list.dirty = false;
        }

        out.clear();
        out.extend_from_slice(&list.handles);
    }

    /// Number of slots in the backing storage
    pub fn capacity(&self) -> usize {
        self.fibers.capacity()
    }

    /// Number of live fibers, chained ones included
    pub fn active_count(&self) -> usize {
        self.fibers.len()
    }

    pub fn free_count(&self) -> usize {
        self.capacity().saturating_sub(self.active_count())
    }

    pub fn chained_count(&self) -> usize {
        self.fibers.values().filter(|f| f.is_chained()).count()
    }

    /// Number of live fibers registered to `phase`
    pub fn phase_count(&self, phase: Phase) -> usize {
        self.fibers
            .values()
            .filter(|f| !f.is_chained() && f.phase == phase)
            .count()
    }
}
