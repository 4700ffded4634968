//! Generational slot pool.

use crate::error::{CoreError, Result};
use crate::handle::{Handle, PoolKey};
use std::marker::PhantomData;

/// Slot allocator handing out generational handles.
///
/// Values live in a dense array indexed by the handle's index. A parallel
/// array stores the handle currently owning each slot (or
/// [`Handle::INVALID`] for a free slot), which is what validity checks and
/// live iteration compare against. Freed slots are recycled LIFO with their
/// generation already bumped.
///
/// Callers only ever hold copies of handles and re-resolve them through
/// [`Pool::get`] / [`Pool::get_mut`] on each use.
pub struct Pool<T, K: PoolKey = Handle> {
    values: Vec<Option<T>>,
    handles: Vec<Handle>,
    free_list: Vec<Handle>,
    capacity: Option<usize>,
    live: usize,
    _key: PhantomData<fn() -> K>,
}

impl<T, K: PoolKey> Pool<T, K> {
    /// Create a fixed-capacity pool.
    ///
    /// Creating more than `capacity` live values is a fatal precondition
    /// violation, see [`Pool::create`].
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity <= Handle::MAX_INDEX as usize,
            "pool capacity {capacity} exceeds the handle index range"
        );
        Self {
            values: Vec::with_capacity(capacity),
            handles: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            capacity: Some(capacity),
            live: 0,
            _key: PhantomData,
        }
    }

    /// Create a pool that grows on demand.
    pub fn unbounded() -> Self {
        Self {
            values: Vec::new(),
            handles: Vec::new(),
            free_list: Vec::new(),
            capacity: None,
            live: 0,
            _key: PhantomData,
        }
    }

    /// Drop every value and forget all slots.
    ///
    /// This is the only operation that lowers [`Pool::count`]. Handles
    /// issued before the clear must not be used afterwards.
    pub fn clear(&mut self) {
        self.values.clear();
        self.handles.clear();
        self.free_list.clear();
        self.live = 0;
    }

    /// Fixed capacity, or `None` for an unbounded pool.
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Number of slots ever used (highest used index + 1).
    pub fn count(&self) -> usize {
        self.handles.len()
    }

    /// Number of live values.
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Whether the pool holds no live values.
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Whether [`Pool::create`] would fail for lack of a slot.
    pub fn is_full(&self) -> bool {
        self.free_list.is_empty()
            && self
                .capacity
                .is_some_and(|capacity| self.handles.len() >= capacity)
    }

    /// Store `value` and return its handle.
    ///
    /// # Panics
    /// Panics with `CapacityExceeded` if a fixed-capacity pool is full.
    pub fn create(&mut self, value: T) -> K {
        match self.try_create(value) {
            Ok(key) => key,
            Err(e) => panic!("{e}"),
        }
    }

    /// Store `value`, reporting a full pool as an error instead of panicking.
    pub fn try_create(&mut self, value: T) -> Result<K> {
        let handle = if let Some(handle) = self.free_list.pop() {
            let index = handle.index() as usize;
            self.values[index] = Some(value);
            self.handles[index] = handle;
            handle
        } else {
            let handle = Handle::new(next_index(self.handles.len(), self.capacity)?);
            self.values.push(Some(value));
            self.handles.push(handle);
            handle
        };

        self.live += 1;
        Ok(K::from_handle(handle))
    }

    /// Destroy the value behind `key`.
    ///
    /// Returns `false` and leaves the pool untouched if the handle is stale
    /// or invalid; a warning is logged in that case.
    pub fn destroy(&mut self, key: K) -> bool {
        self.take(key).is_some()
    }

    /// Destroy the slot behind `key` and move its value out.
    pub fn take(&mut self, key: K) -> Option<T> {
        let handle = key.handle();
        if !self.is_valid(key) {
            tracing::warn!(handle = %handle, "Attempted to destroy an invalid handle");
            return None;
        }

        let index = handle.index() as usize;
        let value = self.values[index].take();
        self.handles[index] = Handle::INVALID;
        self.live -= 1;

        if handle.can_regenerate() {
            self.free_list.push(handle.regenerate());
        } else {
            tracing::warn!(
                index,
                "Pool slot exhausted its generations and is retired"
            );
        }

        value
    }

    /// Whether `key` refers to the value currently stored in its slot.
    pub fn is_valid(&self, key: K) -> bool {
        let handle = key.handle();
        self.handles
            .get(handle.index() as usize)
            .is_some_and(|&current| current == handle)
    }

    /// Whether slot `index` currently holds a live value.
    pub fn is_valid_at(&self, index: usize) -> bool {
        self.handles
            .get(index)
            .is_some_and(|current| !current.is_invalid())
    }

    /// Handle of the live value at slot `index`.
    pub fn handle_at(&self, index: usize) -> Option<K> {
        self.handles
            .get(index)
            .filter(|current| !current.is_invalid())
            .map(|&current| K::from_handle(current))
    }

    /// Borrow the value behind `key`.
    ///
    /// # Panics
    /// Panics if the handle is not valid. Check [`Pool::is_valid`] first when
    /// the handle may be stale.
    pub fn get(&self, key: K) -> &T {
        match self.try_get(key) {
            Some(value) => value,
            None => panic!("invalid handle {} passed to Pool::get", key.handle()),
        }
    }

    /// Mutably borrow the value behind `key`.
    ///
    /// # Panics
    /// Panics if the handle is not valid.
    pub fn get_mut(&mut self, key: K) -> &mut T {
        let handle = key.handle();
        match self.try_get_mut(key) {
            Some(value) => value,
            None => panic!("invalid handle {handle} passed to Pool::get_mut"),
        }
    }

    /// Borrow the value behind `key`, or `None` if the handle is stale.
    pub fn try_get(&self, key: K) -> Option<&T> {
        if self.is_valid(key) {
            self.values[key.handle().index() as usize].as_ref()
        } else {
            None
        }
    }

    /// Mutably borrow the value behind `key`, or `None` if the handle is stale.
    pub fn try_get_mut(&mut self, key: K) -> Option<&mut T> {
        if self.is_valid(key) {
            self.values[key.handle().index() as usize].as_mut()
        } else {
            None
        }
    }

    /// Handles of all live values, in slot order.
    pub fn handles(&self) -> impl Iterator<Item = K> + '_ {
        self.handles
            .iter()
            .filter(|handle| !handle.is_invalid())
            .map(|&handle| K::from_handle(handle))
    }

    /// Iterate over live values with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> + '_ {
        self.handles
            .iter()
            .zip(&self.values)
            .filter_map(|(&handle, value)| {
                value
                    .as_ref()
                    .filter(|_| !handle.is_invalid())
                    .map(|value| (K::from_handle(handle), value))
            })
    }

    /// Iterate mutably over live values with their handles.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut T)> + '_ {
        self.handles
            .iter()
            .zip(&mut self.values)
            .filter_map(|(&handle, value)| {
                if handle.is_invalid() {
                    None
                } else {
                    value.as_mut().map(|value| (K::from_handle(handle), value))
                }
            })
    }
}

impl<T, K: PoolKey> Default for Pool<T, K> {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Index for a fresh slot appended after `len` existing ones.
///
/// Unbounded pools are still limited by the handle's index bits.
fn next_index(len: usize, capacity: Option<usize>) -> Result<u32> {
    if let Some(capacity) = capacity {
        if len >= capacity {
            return Err(CoreError::CapacityExceeded { capacity });
        }
    }
    u32::try_from(len)
        .ok()
        .filter(|&index| index < Handle::MAX_INDEX)
        .ok_or(CoreError::CapacityExceeded {
            capacity: Handle::MAX_INDEX as usize,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn create_and_get() {
        let mut pool: Pool<&str> = Pool::with_capacity(4);
        let a = pool.create("a");
        let b = pool.create("b");

        assert_eq!(*pool.get(a), "a");
        assert_eq!(*pool.get(b), "b");
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.count(), 2);
    }

    #[test]
    fn destroy_then_reuse_slot() {
        // Capacity 4, fill it, free index 1, refill.
        let mut pool: Pool<u32> = Pool::with_capacity(4);
        let handles: Vec<Handle> = (0..4).map(|i| pool.create(i)).collect();
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(handle.index() as usize, i);
            assert_eq!(handle.generation(), 0);
        }

        assert!(pool.destroy(handles[1]));
        let reused = pool.create(100);

        assert_eq!(reused.index(), 1);
        assert_eq!(reused.generation(), 1);
        assert!(!pool.is_valid(handles[1]));
        assert!(pool.is_valid(handles[0]));
        assert!(pool.is_valid(handles[2]));
        assert!(pool.is_valid(handles[3]));
        assert_eq!(*pool.get(reused), 100);
        assert_eq!(pool.count(), 4);
    }

    #[test]
    fn stale_handle_detected_after_reuse() {
        let mut pool: Pool<u32> = Pool::unbounded();
        let first = pool.create(1);
        pool.destroy(first);
        let second = pool.create(2);

        assert_eq!(first.index(), second.index());
        assert!(!pool.is_valid(first));
        assert!(pool.is_valid(second));
        assert!(pool.try_get(first).is_none());
    }

    #[test]
    fn generation_increments_by_one() {
        let mut pool: Pool<u32> = Pool::unbounded();
        let mut handle = pool.create(0);
        for expected in 1..10 {
            pool.destroy(handle);
            let next = pool.create(expected);
            assert_eq!(next.index(), handle.index());
            assert_eq!(next.generation(), handle.generation() + 1);
            handle = next;
        }
    }

    #[test]
    fn double_destroy_is_noop() {
        let mut pool: Pool<u32> = Pool::unbounded();
        let handle = pool.create(7);
        let other = pool.create(8);

        assert!(pool.destroy(handle));
        assert!(!pool.destroy(handle));
        assert_eq!(pool.len(), 1);
        assert!(pool.is_valid(other));

        // Only one regenerated handle went onto the free list.
        let a = pool.create(9);
        let b = pool.create(10);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 2);
    }

    #[test]
    fn invalid_handle_never_valid() {
        let mut pool: Pool<u32> = Pool::unbounded();
        pool.create(1);
        assert!(!pool.is_valid(Handle::INVALID));
        assert!(!pool.destroy(Handle::INVALID));
    }

    #[test]
    fn live_handles_unique() {
        let mut pool: Pool<usize> = Pool::unbounded();
        let mut live: Vec<Handle> = Vec::new();

        // Deterministic create/destroy churn.
        let mut state = 0x2545_f491_u32;
        for step in 0..2000 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            if !live.is_empty() && state % 3 == 0 {
                let victim = live.swap_remove(state as usize % live.len());
                assert!(pool.destroy(victim));
                assert!(!pool.is_valid(victim));
            } else {
                live.push(pool.create(step));
            }

            let unique: HashSet<Handle> = live.iter().copied().collect();
            assert_eq!(unique.len(), live.len());
            assert_eq!(pool.len(), live.len());
        }
    }

    #[test]
    #[should_panic(expected = "Pool capacity exceeded")]
    fn capacity_exceeded_panics() {
        let mut pool: Pool<u32> = Pool::with_capacity(2);
        pool.create(1);
        pool.create(2);
        pool.create(3);
    }

    #[test]
    fn try_create_reports_capacity() {
        let mut pool: Pool<u32> = Pool::with_capacity(1);
        pool.create(1);
        assert_eq!(
            pool.try_create(2),
            Err(CoreError::CapacityExceeded { capacity: 1 })
        );
    }

    #[test]
    fn unbounded_pool_stops_at_index_limit() {
        let last = Handle::MAX_INDEX as usize - 1;
        assert_eq!(next_index(last, None).unwrap(), Handle::MAX_INDEX - 1);
        assert!(matches!(
            next_index(last + 1, None),
            Err(CoreError::CapacityExceeded { capacity }) if capacity == Handle::MAX_INDEX as usize
        ));
        assert!(matches!(
            next_index(2, Some(2)),
            Err(CoreError::CapacityExceeded { capacity: 2 })
        ));
    }

    #[test]
    fn full_pool_accepts_after_destroy() {
        let mut pool: Pool<u32> = Pool::with_capacity(1);
        let handle = pool.create(1);
        assert!(pool.is_full());
        pool.destroy(handle);
        assert!(!pool.is_full());
        assert!(pool.try_create(2).is_ok());
        assert!(!Pool::<u32>::unbounded().is_full());
    }

    #[test]
    #[should_panic(expected = "invalid handle")]
    fn get_stale_panics() {
        let mut pool: Pool<u32> = Pool::unbounded();
        let handle = pool.create(1);
        pool.destroy(handle);
        pool.get(handle);
    }

    #[test]
    fn exhausted_slot_is_retired() {
        let mut pool: Pool<u32> = Pool::unbounded();
        let mut handle = pool.create(0);
        while handle.generation() < Handle::MAX_GENERATION {
            pool.destroy(handle);
            handle = pool.create(0);
            assert_eq!(handle.index(), 0);
        }

        pool.destroy(handle);
        let fresh = pool.create(1);
        assert_eq!(fresh.index(), 1);
        assert_eq!(fresh.generation(), 0);
    }

    #[test]
    fn live_iteration_skips_free_slots() {
        let mut pool: Pool<u32> = Pool::unbounded();
        let a = pool.create(1);
        let b = pool.create(2);
        let c = pool.create(3);
        pool.destroy(b);

        assert!(pool.is_valid_at(0));
        assert!(!pool.is_valid_at(1));
        assert!(pool.is_valid_at(2));
        assert!(!pool.is_valid_at(3));
        assert_eq!(pool.handle_at(1), None);
        assert_eq!(pool.handle_at(2), Some(c));

        let live: Vec<Handle> = pool.handles().collect();
        assert_eq!(live, vec![a, c]);

        let values: Vec<u32> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 3]);

        for (_, value) in pool.iter_mut() {
            *value *= 10;
        }
        assert_eq!(*pool.get(c), 30);
    }

    #[test]
    fn take_moves_value_out() {
        let mut pool: Pool<String> = Pool::unbounded();
        let handle = pool.create("window".to_string());
        assert_eq!(pool.take(handle).as_deref(), Some("window"));
        assert_eq!(pool.take(handle), None);
        assert!(pool.is_empty());
    }

    #[test]
    fn clear_resets_count() {
        let mut pool: Pool<u32> = Pool::unbounded();
        pool.create(1);
        pool.create(2);
        pool.clear();
        assert_eq!(pool.count(), 0);
        assert!(pool.is_empty());
        assert_eq!(pool.create(3).index(), 0);
    }
}
