//! Arena-backed recency list with O(1) promotion and eviction.
//!
//! Entries live in a dense slot vector linked into a doubly linked list, most
//! recently used at the head. Freed slots are recycled, so once the list has
//! reached its working size, promotion and eviction do not allocate.

use std::hash::Hash;

use rustc_hash::FxHashMap;

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Slot<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

#[derive(Debug)]
pub struct RecencyList<K, V> {
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<usize>,
    index: FxHashMap<K, usize>,
    head: usize,
    tail: usize,
}

impl<K, V> Default for RecencyList<K, V>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RecencyList<K, V>
where
    K: Hash + Eq + Clone,
{
    /// An empty list. Storage grows with the number of resident entries.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: FxHashMap::default(),
            head: NIL,
            tail: NIL,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Look up `key` and move it to the most-recently-used position.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let slot = *self.index.get(key)?;
        self.unlink(slot);
        self.link_front(slot);
        self.slots[slot].as_mut().map(|s| &mut s.value)
    }

    /// Look up `key` without touching recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.slots[slot].as_ref().map(|s| &s.value)
    }

    /// Insert at the most-recently-used position.
    ///
    /// An existing entry for `key` is promoted and its value replaced; the old
    /// value is returned.
    pub fn push_front(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&slot) = self.index.get(&key) {
            self.unlink(slot);
            self.link_front(slot);
            return self.slots[slot].as_mut().map(|s| std::mem::replace(&mut s.value, value));
        }

        let entry = Slot {
            key: key.clone(),
            value,
            prev: NIL,
            next: NIL,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, slot);
        self.link_front(slot);
        None
    }

    /// Remove and return the least-recently-used entry.
    ///
    /// The index entry removed is the one belonging to the evicted slot's own
    /// key, never the key most recently pushed.
    pub fn pop_back(&mut self) -> Option<(K, V)> {
        if self.tail == NIL {
            return None;
        }
        let slot = self.tail;
        self.release(slot)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = *self.index.get(key)?;
        self.release(slot).map(|(_, value)| value)
    }

    /// The least-recently-used key, if any.
    pub fn back(&self) -> Option<&K> {
        self.slots.get(self.tail)?.as_ref().map(|s| &s.key)
    }

    /// Remove every entry, least recently used first.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        let mut drained = Vec::with_capacity(self.len());
        while let Some(entry) = self.pop_back() {
            drained.push(entry);
        }
        drained
    }

    /// Iterate from most to least recently used.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: &self.slots,
            cursor: self.head,
        }
    }

    fn release(&mut self, slot: usize) -> Option<(K, V)> {
        self.unlink(slot);
        let entry = self.slots[slot].take()?;
        self.index.remove(&entry.key);
        self.free.push(slot);
        Some((entry.key, entry.value))
    }

    fn unlink(&mut self, slot: usize) {
        let Some(entry) = self.slots[slot].as_ref() else {
            return;
        };
        let (prev, next) = (entry.prev, entry.next);
        match prev {
            NIL => self.head = next,
            p => self.set_next(p, next),
        }
        match next {
            NIL => self.tail = prev,
            n => self.set_prev(n, prev),
        }
        if let Some(entry) = self.slots[slot].as_mut() {
            entry.prev = NIL;
            entry.next = NIL;
        }
    }

    fn link_front(&mut self, slot: usize) {
        let old_head = self.head;
        if let Some(entry) = self.slots[slot].as_mut() {
            entry.prev = NIL;
            entry.next = old_head;
        }
        if old_head != NIL {
            self.set_prev(old_head, slot);
        }
        self.head = slot;
        if self.tail == NIL {
            self.tail = slot;
        }
    }

    #[inline]
    fn set_prev(&mut self, slot: usize, prev: usize) {
        if let Some(entry) = self.slots[slot].as_mut() {
            entry.prev = prev;
        }
    }

    #[inline]
    fn set_next(&mut self, slot: usize, next: usize) {
        if let Some(entry) = self.slots[slot].as_mut() {
            entry.next = next;
        }
    }

    /// Walk the list and the index and panic on any disagreement.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let mut seen = 0usize;
        let mut prev = NIL;
        let mut cursor = self.head;
        while cursor != NIL {
            let entry = self.slots[cursor].as_ref().expect("linked slot must be occupied");
            assert_eq!(entry.prev, prev, "broken back link at slot {cursor}");
            assert_eq!(self.index.get(&entry.key), Some(&cursor), "index disagrees with list at slot {cursor}");
            seen += 1;
            prev = cursor;
            cursor = entry.next;
        }
        assert_eq!(prev, self.tail, "tail does not terminate the list");
        assert_eq!(seen, self.index.len(), "list length differs from index length");
        assert_eq!(seen + self.free.len(), self.slots.len(), "slots leaked");
    }
}

pub struct Iter<'a, K, V> {
    slots: &'a [Option<Slot<K, V>>],
    cursor: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.slots.get(self.cursor)?.as_ref()?;
        self.cursor = entry.next;
        Some((&entry.key, &entry.value))
    }
}
