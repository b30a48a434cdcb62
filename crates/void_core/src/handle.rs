//! Generational handles and the arena that hands them out
//!
//! A [`Handle`] is an index plus the generation of the slot it was issued
//! for. Removing a value bumps the slot generation, so every handle that
//! still points at the old value resolves to `None` instead of aliasing
//! whatever is stored there next.

use core::marker::PhantomData;
use core::hash::{Hash, Hasher};
use core::fmt;
use alloc::vec::Vec;

/// A type-safe handle to a value of type T stored in a [`HandleMap`]
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Create a handle from raw parts
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Create an invalid/null handle
    #[inline]
    pub const fn null() -> Self {
        Self::new(u32::MAX, u32::MAX)
    }

    /// Check if this handle is null
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.index == u32::MAX
    }

    /// Slot index
    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation at the time the handle was issued
    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Pack into a single integer (generation in the upper half)
    #[inline]
    pub const fn to_bits(&self) -> u64 {
        (self.generation as u64) << 32 | self.index as u64
    }

    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self::new(bits as u32, (bits >> 32) as u32)
    }
}

// Manual trait implementations to avoid T bounds
impl<T> Clone for Handle<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.to_bits().cmp(&other.to_bits())
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_bits().hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Handle(null)")
        } else {
            write!(f, "Handle({}v{})", self.index, self.generation)
        }
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

/// Allocates handles with generation tracking
#[derive(Debug, Clone)]
pub struct HandleAllocator<T> {
    /// Current generation of each slot
    generations: Vec<u32>,
    /// Whether the slot currently holds a live handle
    live: Vec<bool>,
    /// Free list of reusable indices
    free_list: Vec<u32>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> HandleAllocator<T> {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            generations: Vec::with_capacity(capacity),
            live: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Allocate a new handle, reusing a freed slot when one exists
    pub fn allocate(&mut self) -> Handle<T> {
        if let Some(index) = self.free_list.pop() {
            self.live[index as usize] = true;
            Handle::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.live.push(true);
            Handle::new(index, 0)
        }
    }

    /// Free a handle, making its index available for reuse
    pub fn free(&mut self, handle: Handle<T>) -> bool {
        if !self.is_valid(handle) {
            return false;
        }
        let index = handle.index() as usize;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.live[index] = false;
        self.free_list.push(handle.index());
        true
    }

    /// Check if a handle still refers to a live slot
    pub fn is_valid(&self, handle: Handle<T>) -> bool {
        let index = handle.index() as usize;
        index < self.generations.len()
            && self.live[index]
            && self.generations[index] == handle.generation()
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.generations.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every handle; outstanding handles become stale
    pub fn clear(&mut self) {
        self.free_list.clear();
        for (index, (gen, live)) in self.generations.iter_mut().zip(self.live.iter_mut()).enumerate() {
            if *live {
                *gen = gen.wrapping_add(1);
                *live = false;
            }
            self.free_list.push(index as u32);
        }
    }
}

impl<T> Default for HandleAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A generational arena: values addressed by [`Handle`]
#[derive(Debug, Clone)]
pub struct HandleMap<T> {
    allocator: HandleAllocator<T>,
    values: Vec<Option<T>>,
}

impl<T> HandleMap<T> {
    pub fn new() -> Self {
        Self {
            allocator: HandleAllocator::new(),
            values: Vec::new(),
        }
    }

    /// Insert a value and get a handle to it
    pub fn insert(&mut self, value: T) -> Handle<T> {
        let handle = self.allocator.allocate();
        let index = handle.index() as usize;

        if index >= self.values.len() {
            self.values.resize_with(index + 1, || None);
        }
        self.values[index] = Some(value);
        handle
    }

    /// Remove a value by its handle
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        if !self.allocator.free(handle) {
            return None;
        }
        self.values[handle.index() as usize].take()
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        if !self.allocator.is_valid(handle) {
            return None;
        }
        self.values.get(handle.index() as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        if !self.allocator.is_valid(handle) {
            return None;
        }
        self.values.get_mut(handle.index() as usize)?.as_mut()
    }

    /// Borrow two distinct values mutably at once.
    ///
    /// Returns `None` when the handles are equal or either one is stale.
    pub fn get2_mut(&mut self, a: Handle<T>, b: Handle<T>) -> Option<(&mut T, &mut T)> {
        if a.index() == b.index() || !self.allocator.is_valid(a) || !self.allocator.is_valid(b) {
            return None;
        }
        let (ia, ib) = (a.index() as usize, b.index() as usize);
        if ia < ib {
            let (lo, hi) = self.values.split_at_mut(ib);
            Some((lo[ia].as_mut()?, hi[0].as_mut()?))
        } else {
            let (lo, hi) = self.values.split_at_mut(ia);
            Some((hi[0].as_mut()?, lo[ib].as_mut()?))
        }
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.allocator.is_valid(handle)
    }

    pub fn len(&self) -> usize {
        self.allocator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocator.is_empty()
    }

    /// Drop every value; all outstanding handles become stale
    pub fn clear(&mut self) {
        self.allocator.clear();
        for slot in &mut self.values {
            *slot = None;
        }
    }

    /// Iterate over all live handles and values, in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        let gens = &self.allocator.generations;
        self.values
            .iter()
            .enumerate()
            .filter_map(move |(i, opt)| {
                opt.as_ref().map(|v| (Handle::new(i as u32, gens[i]), v))
            })
    }

    /// Iterate over all live handles and mutable values, in slot order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        let gens = &self.allocator.generations;
        self.values
            .iter_mut()
            .enumerate()
            .filter_map(move |(i, opt)| {
                opt.as_mut().map(|v| (Handle::new(i as u32, gens[i]), v))
            })
    }

    /// Live handles, in slot order
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.iter().map(|(h, _)| h).collect()
    }
}

impl<T> Default for HandleMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::{String, ToString};

    #[test]
    fn test_handle_allocation() {
        let mut alloc: HandleAllocator<i32> = HandleAllocator::new();
        let h1 = alloc.allocate();
        let h2 = alloc.allocate();

        assert!(alloc.is_valid(h1));
        assert!(alloc.is_valid(h2));
        assert_ne!(h1, h2);

        assert!(alloc.free(h1));
        assert!(!alloc.is_valid(h1));
        assert!(!alloc.free(h1));

        let h3 = alloc.allocate();
        assert_eq!(h3.index(), h1.index());
        assert_ne!(h3.generation(), h1.generation());
    }

    #[test]
    fn test_handle_map() {
        let mut map: HandleMap<String> = HandleMap::new();
        let h1 = map.insert("hello".to_string());
        let h2 = map.insert("world".to_string());

        assert_eq!(map.get(h1), Some(&"hello".to_string()));
        assert_eq!(map.get(h2), Some(&"world".to_string()));

        map.remove(h1);
        assert_eq!(map.get(h1), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut map: HandleMap<u32> = HandleMap::new();
        let old = map.insert(1);
        map.remove(old);
        let new = map.insert(2);

        assert_eq!(old.index(), new.index());
        assert_eq!(map.get(old), None);
        assert_eq!(map.get(new), Some(&2));
    }

    #[test]
    fn test_get2_mut() {
        let mut map: HandleMap<u32> = HandleMap::new();
        let a = map.insert(1);
        let b = map.insert(2);

        {
            let (va, vb) = map.get2_mut(b, a).unwrap();
            *va += 10;
            *vb += 20;
        }
        assert_eq!(map.get(a), Some(&21));
        assert_eq!(map.get(b), Some(&12));
        assert!(map.get2_mut(a, a).is_none());

        map.remove(b);
        assert!(map.get2_mut(a, b).is_none());
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut map: HandleMap<u32> = HandleMap::new();
        let a = map.insert(1);
        map.clear();

        assert!(map.is_empty());
        assert!(!map.contains(a));
        let b = map.insert(5);
        assert_eq!(map.get(b), Some(&5));
        assert_eq!(map.iter().count(), 1);
    }

    #[test]
    fn test_bits_roundtrip() {
        let h: Handle<u8> = Handle::new(7, 3);
        assert_eq!(Handle::<u8>::from_bits(h.to_bits()), h);
        assert!(Handle::<u8>::null().is_null());
    }
}
