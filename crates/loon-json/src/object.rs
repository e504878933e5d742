//! Arena-backed associative container preserving insertion order.
//!
//! Elements live in a slab indexed by `u32`. A separate bucket table maps
//! hashes to chains of slab indices, and a doubly linked list threads the
//! occupied slots in insertion order. Removal leaves a vacant slot on a
//! free list for reuse, so element indices stay stable across unrelated
//! insertions and removals.

use std::fmt;
use std::hash::BuildHasher;
use std::mem;

use ahash::RandomState;

use crate::error::Result;
use crate::raw::RawBuf;
use crate::storage::{StoragePtr, default_storage};
use crate::string::Str;
use crate::value::Value;

/// Sentinel index terminating chains and lists.
const NIL: u32 = u32::MAX;

/// Smallest non-empty bucket table. Always a power of two.
const MIN_BUCKETS: usize = 16;

struct Element {
    key: Str,
    value: Value,
    hash: u64,
    /// Previous occupied slot in insertion order.
    prev: u32,
    /// Next occupied slot in insertion order.
    next: u32,
    /// Next slot in the same hash bucket.
    chain: u32,
}

enum Slot {
    Occupied(Element),
    Vacant { next_free: u32 },
}

/// A JSON object: string keys mapped to [`Value`]s, iterated in the order
/// keys were first inserted.
///
/// Inserting an existing key keeps the stored value; callers that want
/// replacement assign through the returned reference.
pub struct Object {
    slots: RawBuf<Slot>,
    buckets: RawBuf<u32>,
    hasher: RandomState,
    head: u32,
    tail: u32,
    free: u32,
    count: u32,
}

impl Object {
    /// Create an empty object in the default storage.
    pub fn new() -> Self {
        Object::with_storage(default_storage())
    }

    /// Create an empty object in `sp`.
    pub fn with_storage(sp: StoragePtr) -> Self {
        Object {
            slots: RawBuf::new(sp.clone()),
            buckets: RawBuf::new(sp),
            hasher: RandomState::new(),
            head: NIL,
            tail: NIL,
            free: NIL,
            count: 0,
        }
    }

    /// The storage owning this object's elements.
    pub fn storage(&self) -> &StoragePtr {
        self.slots.storage()
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.find(key).map(|at| &self.element(at).value)
    }

    /// Hash `key` with this object's hasher, for use with
    /// [`Object::get_with_hash`].
    pub fn hash_of(&self, key: &str) -> u64 {
        self.hasher.hash_one(key)
    }

    /// Look up a value by key with a precomputed hash.
    ///
    /// `hash` must come from [`Object::hash_of`] on this same object;
    /// hashes are salted per instance.
    pub fn get_with_hash(&self, key: &str, hash: u64) -> Option<&Value> {
        self.find_with_hash(key, hash)
            .map(|at| &self.element(at).value)
    }

    /// Look up a value by key, mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        let at = self.find(key)?;
        Some(&mut self.element_mut(at).value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Insert `value` under `key`, adopting it into this object's storage.
    ///
    /// Returns `(true, slot)` when the key was newly inserted, and
    /// `(false, slot)` with the previously stored value when the key was
    /// already present. The incoming value is dropped in the latter case.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Result<(bool, &mut Value)> {
        if let Some(at) = self.find(key) {
            return Ok((false, &mut self.element_mut(at).value));
        }
        let sp = self.slots.storage().clone();
        let value = value.into().into_storage(sp.clone())?;
        let key = Str::from_str_in(key, sp)?;
        let hash = self.hasher.hash_one(key.as_str());
        let at = self.attach(key, value, hash)?;
        Ok((true, &mut self.element_mut(at).value))
    }

    /// Remove `key`, returning its value if present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let at = self.find(key)?;
        Some(self.detach(at).1)
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.buckets.clear();
        self.head = NIL;
        self.tail = NIL;
        self.free = NIL;
        self.count = 0;
    }

    /// Move every element of `other` whose key is absent here.
    ///
    /// Colliding keys stay in `other`; on return it holds only those.
    /// Moved elements are adopted into this object's storage. On error the
    /// elements already moved stay moved.
    pub fn merge(&mut self, other: &mut Object) -> Result<()> {
        let sp = self.slots.storage().clone();
        let mut at = other.head;
        while at != NIL {
            let next = other.element(at).next;
            let hash = self.hasher.hash_one(other.element(at).key.as_str());
            if self
                .find_with_hash(other.element(at).key.as_str(), hash)
                .is_none()
            {
                let (key, value) = other.detach(at);
                let key = if StoragePtr::same(key.storage(), &sp) {
                    key
                } else {
                    key.clone_in(sp.clone())?
                };
                let value = value.into_storage(sp.clone())?;
                self.attach(key, value, hash)?;
            }
            at = next;
        }
        Ok(())
    }

    /// Iterate `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> Iter<'_> {
        Iter { obj: self, at: self.head }
    }

    /// Iterate keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(k, _)| k)
    }

    /// Iterate values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.iter().map(|(_, v)| v)
    }

    /// Deep-copy this object and its elements into `sp`.
    pub fn clone_in(&self, sp: StoragePtr) -> Result<Self> {
        let mut out = Object::with_storage(sp.clone());
        for (k, v) in self.iter() {
            out.insert(k, v.clone_in(sp.clone())?)?;
        }
        Ok(out)
    }

    /// Grow the bucket table to hold at least `bucket_count` buckets.
    ///
    /// The table never shrinks, and any growth at least doubles the
    /// current size, so chains shorten geometrically under repeated calls.
    pub fn rehash(&mut self, bucket_count: usize) -> Result<()> {
        let mut n = bucket_count.next_power_of_two().max(MIN_BUCKETS);
        if !self.buckets.is_empty() {
            n = n.max(self.buckets.len() * 2);
        }
        self.rehash_to(n)
    }

    fn bucket_of(&self, hash: u64) -> usize {
        debug_assert!(self.buckets.len().is_power_of_two());
        hash as usize & (self.buckets.len() - 1)
    }

    fn find(&self, key: &str) -> Option<u32> {
        self.find_with_hash(key, self.hasher.hash_one(key))
    }

    fn find_with_hash(&self, key: &str, hash: u64) -> Option<u32> {
        if self.buckets.is_empty() {
            return None;
        }
        let mut at = self.buckets[self.bucket_of(hash)];
        while at != NIL {
            let e = self.element(at);
            if e.hash == hash && e.key.as_str() == key {
                return Some(at);
            }
            at = e.chain;
        }
        None
    }

    /// Rebuild the bucket table at `n` buckets and relink every chain.
    ///
    /// The insertion-order list is untouched; chains are rebuilt by walking
    /// it, so relative element order survives every rehash.
    fn rehash_to(&mut self, n: usize) -> Result<()> {
        self.buckets.reserve(n.saturating_sub(self.buckets.len()))?;
        self.buckets.clear();
        self.buckets.push_n(n, NIL)?;
        let mut at = self.head;
        while at != NIL {
            let hash = self.element(at).hash;
            let b = self.bucket_of(hash);
            let old_head = self.buckets[b];
            self.element_mut(at).chain = old_head;
            self.buckets[b] = at;
            at = self.element(at).next;
        }
        Ok(())
    }

    /// Link a new element already owned by this object's storage.
    fn attach(&mut self, key: Str, value: Value, hash: u64) -> Result<u32> {
        if self.count as usize + 1 > self.buckets.len() {
            let n = (self.buckets.len() * 2).max(MIN_BUCKETS);
            self.rehash_to(n)?;
        }
        let at = self.acquire_slot(Element {
            key,
            value,
            hash,
            prev: self.tail,
            next: NIL,
            chain: NIL,
        })?;
        // thread onto the insertion-order list
        if self.tail == NIL {
            self.head = at;
        } else {
            self.element_mut(self.tail).next = at;
        }
        self.tail = at;
        // thread onto the bucket chain
        let b = self.bucket_of(hash);
        let head = self.buckets[b];
        self.element_mut(at).chain = head;
        self.buckets[b] = at;
        self.count += 1;
        Ok(at)
    }

    /// Unlink the element at `at`, returning its key and value.
    fn detach(&mut self, at: u32) -> (Str, Value) {
        let hash = self.element(at).hash;
        let chain = self.element(at).chain;
        // unlink from the bucket chain
        let b = self.bucket_of(hash);
        if self.buckets[b] == at {
            self.buckets[b] = chain;
        } else {
            let mut cur = self.buckets[b];
            loop {
                let next = self.element(cur).chain;
                if next == at {
                    self.element_mut(cur).chain = chain;
                    break;
                }
                cur = next;
            }
        }
        // unlink from the insertion-order list
        let (prev, next) = {
            let e = self.element(at);
            (e.prev, e.next)
        };
        if prev == NIL {
            self.head = next;
        } else {
            self.element_mut(prev).next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.element_mut(next).prev = prev;
        }
        let vacant = Slot::Vacant {
            next_free: self.free,
        };
        let slot = mem::replace(&mut self.slots[at as usize], vacant);
        self.free = at;
        self.count -= 1;
        match slot {
            Slot::Occupied(e) => (e.key, e.value),
            Slot::Vacant { .. } => unreachable!("detached slot was occupied"),
        }
    }

    fn acquire_slot(&mut self, e: Element) -> Result<u32> {
        if self.free != NIL {
            let at = self.free;
            match self.slots[at as usize] {
                Slot::Vacant { next_free } => self.free = next_free,
                Slot::Occupied(_) => unreachable!("free list points at occupied slot"),
            }
            self.slots[at as usize] = Slot::Occupied(e);
            Ok(at)
        } else {
            let at = u32::try_from(self.slots.len()).expect("slab within u32 range");
            self.slots.push(Slot::Occupied(e))?;
            Ok(at)
        }
    }

    fn element(&self, at: u32) -> &Element {
        match &self.slots[at as usize] {
            Slot::Occupied(e) => e,
            Slot::Vacant { .. } => unreachable!("index points at vacant slot"),
        }
    }

    fn element_mut(&mut self, at: u32) -> &mut Element {
        match &mut self.slots[at as usize] {
            Slot::Occupied(e) => e,
            Slot::Vacant { .. } => unreachable!("index points at vacant slot"),
        }
    }
}

impl Default for Object {
    fn default() -> Self {
        Object::new()
    }
}

/// Insertion-order iterator over an [`Object`].
pub struct Iter<'a> {
    obj: &'a Object,
    at: u32,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        if self.at == NIL {
            return None;
        }
        let e = self.obj.element(self.at);
        self.at = e.next;
        Some((e.key.as_str(), &e.value))
    }
}

impl<'a> IntoIterator for &'a Object {
    type Item = (&'a str, &'a Value);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl PartialEq for Object {
    /// Key-set equality, independent of insertion order.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BoundedStorage;

    #[test]
    fn test_insert_get_remove() {
        let mut o = Object::new();
        let (inserted, _) = o.insert("a", 1i64).unwrap();
        assert!(inserted);
        o.insert("b", "two").unwrap();
        assert_eq!(o.len(), 2);
        assert_eq!(o.get("a").unwrap().as_i64(), Some(1));
        assert_eq!(o.get("b").unwrap().as_str(), Some("two"));
        assert!(o.get("c").is_none());
        assert_eq!(o.remove("a").unwrap().as_i64(), Some(1));
        assert!(o.remove("a").is_none());
        assert_eq!(o.len(), 1);
    }

    #[test]
    fn test_duplicate_key_keeps_first() {
        let mut o = Object::new();
        o.insert("k", 1i64).unwrap();
        let (inserted, existing) = o.insert("k", 2i64).unwrap();
        assert!(!inserted);
        assert_eq!(existing.as_i64(), Some(1));
        assert_eq!(o.len(), 1);
    }

    #[test]
    fn test_iteration_follows_insertion_order() {
        let mut o = Object::new();
        for key in ["zulu", "alpha", "mike", "echo"] {
            o.insert(key, key).unwrap();
        }
        let keys: Vec<&str> = o.keys().collect();
        assert_eq!(keys, ["zulu", "alpha", "mike", "echo"]);
    }

    #[test]
    fn test_order_survives_removal_and_reinsertion() {
        let mut o = Object::new();
        for key in ["a", "b", "c"] {
            o.insert(key, 0i64).unwrap();
        }
        o.remove("b");
        o.insert("d", 0i64).unwrap();
        // "d" reuses "b"'s slot but lands at the end of the order
        let keys: Vec<&str> = o.keys().collect();
        assert_eq!(keys, ["a", "c", "d"]);
    }

    #[test]
    fn test_order_survives_rehash() {
        let mut o = Object::new();
        let keys: Vec<String> = (0..200).map(|i| format!("key{i:03}")).collect();
        for k in &keys {
            o.insert(k, 1i64).unwrap();
        }
        let seen: Vec<&str> = o.keys().collect();
        assert_eq!(seen, keys.iter().map(String::as_str).collect::<Vec<_>>());
        for k in &keys {
            assert!(o.contains_key(k), "lost {k} across rehash");
        }
    }

    #[test]
    fn test_forced_rehash_preserves_order_and_doubles() {
        let mut o = Object::new();
        for key in ["north", "south", "east", "west"] {
            o.insert(key, 1i64).unwrap();
        }
        o.rehash(512).unwrap();
        assert!(o.buckets.len() >= 512);
        let keys: Vec<&str> = o.keys().collect();
        assert_eq!(keys, ["north", "south", "east", "west"]);
        for key in ["north", "south", "east", "west"] {
            assert!(o.contains_key(key), "lost {key} across forced rehash");
        }
        // growth never shrinks and at least doubles
        let before = o.buckets.len();
        o.rehash(1).unwrap();
        assert_eq!(o.buckets.len(), before * 2);
    }

    #[test]
    fn test_get_with_hash_matches_get() {
        let mut o = Object::new();
        o.insert("room", "general").unwrap();
        o.insert("topic", "intro").unwrap();
        let hash = o.hash_of("room");
        assert_eq!(
            o.get_with_hash("room", hash).unwrap().as_str(),
            Some("general")
        );
        assert!(o.get_with_hash("absent", o.hash_of("absent")).is_none());
    }

    #[test]
    fn test_merge_moves_absent_keys_only() {
        let mut dst = Object::new();
        dst.insert("a", 1i64).unwrap();
        let mut src = Object::new();
        src.insert("a", 99i64).unwrap();
        src.insert("b", 2i64).unwrap();
        dst.merge(&mut src).unwrap();
        assert_eq!(dst.get("a").unwrap().as_i64(), Some(1));
        assert_eq!(dst.get("b").unwrap().as_i64(), Some(2));
        assert_eq!(src.len(), 1);
        assert_eq!(src.get("a").unwrap().as_i64(), Some(99));
    }

    #[test]
    fn test_merge_adopts_into_destination_arena() {
        let src_sp = StoragePtr::new(BoundedStorage::new(4096));
        let mut src = Object::with_storage(src_sp);
        src.insert("b", "beta").unwrap();
        let mut dst = Object::new();
        dst.insert("a", 1i64).unwrap();
        dst.merge(&mut src).unwrap();
        assert!(src.is_empty());
        assert_eq!(dst.get("b").unwrap().as_str(), Some("beta"));
        assert!(StoragePtr::same(
            dst.get("b").unwrap().storage(),
            dst.storage()
        ));
    }

    #[test]
    fn test_equality_ignores_order() {
        let mut a = Object::new();
        a.insert("x", 1i64).unwrap();
        a.insert("y", 2i64).unwrap();
        let mut b = Object::new();
        b.insert("y", 2i64).unwrap();
        b.insert("x", 1i64).unwrap();
        assert_eq!(a, b);
        b.insert("z", 3i64).unwrap();
        assert_ne!(a, b);
    }
}
