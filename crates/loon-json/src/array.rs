//! Arena-backed sequence of values.

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::error::Result;
use crate::raw::RawBuf;
use crate::storage::{StoragePtr, default_storage};
use crate::value::Value;

/// A growable sequence of [`Value`]s sharing one [`StoragePtr`] arena.
///
/// Elements pushed from a different storage are moved or deep-copied so the
/// array's contents always live in its own arena.
pub struct Array {
    buf: RawBuf<Value>,
}

impl Array {
    /// Create an empty array in the default storage.
    pub fn new() -> Self {
        Array::with_storage(default_storage())
    }

    /// Create an empty array in `sp`.
    pub fn with_storage(sp: StoragePtr) -> Self {
        Array { buf: RawBuf::new(sp) }
    }

    /// Create an empty array in `sp` with room for `capacity` elements.
    pub fn with_capacity(capacity: usize, sp: StoragePtr) -> Result<Self> {
        Ok(Array {
            buf: RawBuf::with_capacity(capacity, sp)?,
        })
    }

    /// The storage owning this array's elements.
    pub fn storage(&self) -> &StoragePtr {
        self.buf.storage()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.buf.reserve(additional)
    }

    /// Append a value, adopting it into this array's storage.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<()> {
        let v = value.into().into_storage(self.buf.storage().clone())?;
        self.buf.push(v)
    }

    /// Insert a value at `index`, shifting the tail right.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let v = value.into().into_storage(self.buf.storage().clone())?;
        self.buf.insert(index, v)
    }

    /// Append every value from `iter`, adopting each into this array's
    /// storage.
    ///
    /// On error the array keeps its pre-call elements plus the values
    /// already appended; nothing is rolled back.
    pub fn extend<I>(&mut self, iter: I) -> Result<()>
    where
        I: IntoIterator<Item = Value>,
    {
        let iter = iter.into_iter();
        let (low, _) = iter.size_hint();
        self.buf.reserve(low)?;
        for v in iter {
            self.push(v)?;
        }
        Ok(())
    }

    /// Remove and return the value at `index`, shifting the tail left.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove(&mut self, index: usize) -> Value {
        self.buf.remove(index)
    }

    /// Remove and return the last value.
    pub fn pop(&mut self) -> Option<Value> {
        self.buf.pop()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.buf.as_slice().get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.buf.as_mut_slice().get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.buf.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Value> {
        self.buf.as_mut_slice().iter_mut()
    }

    /// Deep-copy this array and its elements into `sp`.
    pub fn clone_in(&self, sp: StoragePtr) -> Result<Self> {
        let mut out = Array::with_capacity(self.len(), sp.clone())?;
        for v in self.iter() {
            out.buf.push(v.clone_in(sp.clone())?)?;
        }
        Ok(out)
    }
}

impl Default for Array {
    fn default() -> Self {
        Array::new()
    }
}

impl Deref for Array {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        self.buf.as_slice()
    }
}

impl DerefMut for Array {
    fn deref_mut(&mut self) -> &mut [Value] {
        self.buf.as_mut_slice()
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.buf.as_slice() == other.buf.as_slice()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
