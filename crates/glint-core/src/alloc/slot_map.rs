use crate::profiling::profile_function;
use std::num::NonZeroU64;

/// A generational key into a [`SlotMap`].
///
/// A key stays valid until its entry is removed. After that every lookup
/// through it returns `None`, even once the slot is reused, so holding a key
/// never keeps a value alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey(NonZeroU64);

impl SlotKey {
    pub fn new(generation: u32, index: u32) -> Self {
        // The low half stores `index + 1`, which is never zero for any u32 index.
        let packed = ((generation as u64) << 32) | (index as u64 + 1);
        match NonZeroU64::new(packed) {
            Some(value) => Self(value),
            None => unreachable!("slot key low half is never zero"),
        }
    }

    pub fn generation(&self) -> u32 {
        (self.0.get() >> 32) as u32
    }

    pub fn index(&self) -> u32 {
        ((self.0.get() & u32::MAX as u64) - 1) as u32
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational storage with O(1) insert, lookup and removal.
#[derive(Debug)]
pub struct SlotMap<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> SlotMap<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> SlotKey {
        profile_function!();
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            SlotKey::new(slot.generation, index)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            SlotKey::new(0, index)
        }
    }

    fn slot(&self, key: SlotKey) -> Option<&Slot<T>> {
        self.slots
            .get(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())
    }

    pub fn get(&self, key: SlotKey) -> Option<&T> {
        self.slot(key).and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut T> {
        self.slots
            .get_mut(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, key: SlotKey) -> bool {
        self.get(key).is_some()
    }

    /// Remove the value behind `key`, bumping the slot generation so that
    /// every outstanding copy of the key goes stale.
    pub fn remove(&mut self, key: SlotKey) -> Option<T> {
        profile_function!();
        let index = key.index();
        let slot = self
            .slots
            .get_mut(index as usize)
            .filter(|slot| slot.generation == key.generation())?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn keys(&self) -> impl Iterator<Item = SlotKey> + '_ {
        self.iter().map(|(key, _)| key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotKey, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (SlotKey::new(slot.generation, index as u32), value))
        })
    }
}

impl<T> Default for SlotMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_eq_size!(SlotKey, Option<SlotKey>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_map_insert() {
        let mut map = SlotMap::<u8>::new();
        let key = map.insert(15);
        assert_eq!(key.generation(), 0);
        assert_eq!(key.index(), 0);
        assert_eq!(map.get(key), Some(&15));
    }

    #[test]
    fn test_stale_key_is_rejected() {
        let mut map = SlotMap::<u8>::new();
        let key = map.insert(15);
        assert_eq!(map.remove(key), Some(15));
        assert_eq!(map.get(key), None);
        assert_eq!(map.remove(key), None);
    }

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let mut map = SlotMap::<u8>::new();
        let old = map.insert(15);
        map.remove(old);
        let new = map.insert(45);
        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert_eq!(map.get(old), None);
        assert_eq!(map.get(new), Some(&45));
    }

    #[test]
    fn test_iter_skips_free_slots() {
        let mut map = SlotMap::<u8>::new();
        let keys: Vec<_> = (0..10).map(|i| map.insert(i)).collect();
        map.remove(keys[0]);
        map.remove(keys[5]);
        let values: Vec<_> = map.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 6, 7, 8, 9]);
        assert_eq!(map.len(), 8);
    }
}
