//! Storage-backed growable buffer underpinning the arena containers.
//!
//! Reallocation is staged: the new block is fully populated before the old
//! one is released, so a failed allocation leaves the buffer untouched.

use std::alloc::Layout;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::slice;

use crate::error::{Error, Result};
use crate::storage::StoragePtr;

pub(crate) struct RawBuf<T> {
    sp: StoragePtr,
    ptr: NonNull<T>,
    cap: usize,
    len: usize,
    _marker: PhantomData<T>,
}

// SAFETY: RawBuf owns its elements and the storage handle is Send + Sync.
unsafe impl<T: Send> Send for RawBuf<T> {}
unsafe impl<T: Sync> Sync for RawBuf<T> {}

impl<T> RawBuf<T> {
    pub(crate) fn new(sp: StoragePtr) -> Self {
        debug_assert!(mem::size_of::<T>() != 0);
        RawBuf {
            sp,
            ptr: NonNull::dangling(),
            cap: 0,
            len: 0,
            _marker: PhantomData,
        }
    }

    pub(crate) fn with_capacity(capacity: usize, sp: StoragePtr) -> Result<Self> {
        let mut buf = RawBuf::new(sp);
        buf.reserve(capacity)?;
        Ok(buf)
    }

    pub(crate) fn storage(&self) -> &StoragePtr {
        &self.sp
    }

    pub(crate) fn capacity(&self) -> usize {
        self.cap
    }

    pub(crate) fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len` elements are always initialized.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: the first `len` elements are always initialized.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    pub(crate) fn reserve(&mut self, additional: usize) -> Result<()> {
        let need = self.len.checked_add(additional).ok_or(Error::OutOfMemory)?;
        if need <= self.cap {
            return Ok(());
        }
        let new_cap = need.max(self.cap.saturating_mul(2)).max(4);
        self.regrow(new_cap)
    }

    fn regrow(&mut self, new_cap: usize) -> Result<()> {
        let new_layout = Layout::array::<T>(new_cap).map_err(|_| Error::OutOfMemory)?;
        let new_ptr = self.sp.allocate(new_layout)?.cast::<T>();
        if self.cap != 0 {
            let old_layout = Layout::array::<T>(self.cap).expect("valid existing layout");
            // SAFETY: both blocks are live and element moves are bitwise;
            // the old block is released only after the copy completes.
            unsafe {
                ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), self.len);
                self.sp.deallocate(self.ptr.cast(), old_layout);
            }
        }
        self.ptr = new_ptr;
        self.cap = new_cap;
        Ok(())
    }

    pub(crate) fn push(&mut self, value: T) -> Result<()> {
        self.reserve(1)?;
        // SAFETY: capacity was just ensured; the slot at `len` is unused.
        unsafe { ptr::write(self.ptr.as_ptr().add(self.len), value) };
        self.len += 1;
        Ok(())
    }

    pub(crate) fn insert(&mut self, index: usize, value: T) -> Result<()> {
        assert!(index <= self.len, "insert index out of bounds");
        self.reserve(1)?;
        // SAFETY: capacity ensured; the tail shift stays within the block.
        unsafe {
            let p = self.ptr.as_ptr().add(index);
            ptr::copy(p, p.add(1), self.len - index);
            ptr::write(p, value);
        }
        self.len += 1;
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: the element at the new `len` is initialized and now unowned.
        Some(unsafe { ptr::read(self.ptr.as_ptr().add(self.len)) })
    }

    pub(crate) fn remove(&mut self, index: usize) -> T {
        assert!(index < self.len, "remove index out of bounds");
        // SAFETY: `index` is in bounds; the tail shift closes the gap.
        unsafe {
            let p = self.ptr.as_ptr().add(index);
            let value = ptr::read(p);
            ptr::copy(p.add(1), p, self.len - index - 1);
            self.len -= 1;
            value
        }
    }

    pub(crate) fn clear(&mut self) {
        let len = self.len;
        self.len = 0;
        // SAFETY: the first `len` elements were initialized and are dropped once.
        unsafe { ptr::drop_in_place(slice::from_raw_parts_mut(self.ptr.as_ptr(), len)) };
    }
}

impl<T: Copy> RawBuf<T> {
    pub(crate) fn extend_from_slice(&mut self, other: &[T]) -> Result<()> {
        self.reserve(other.len())?;
        // SAFETY: capacity ensured; source and destination do not overlap.
        unsafe {
            ptr::copy_nonoverlapping(other.as_ptr(), self.ptr.as_ptr().add(self.len), other.len());
        }
        self.len += other.len();
        Ok(())
    }

    pub(crate) fn push_n(&mut self, n: usize, value: T) -> Result<()> {
        self.reserve(n)?;
        for i in 0..n {
            // SAFETY: capacity ensured above.
            unsafe { ptr::write(self.ptr.as_ptr().add(self.len + i), value) };
        }
        self.len += n;
        Ok(())
    }
}

impl<T> Deref for RawBuf<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for RawBuf<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T> Drop for RawBuf<T> {
    fn drop(&mut self) {
        self.clear();
        if self.cap != 0 {
            let layout = Layout::array::<T>(self.cap).expect("valid existing layout");
            // SAFETY: the block was allocated from `sp` with this layout.
            unsafe { self.sp.deallocate(self.ptr.cast(), layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::default_storage;

    #[test]
    fn test_push_pop_and_growth() {
        let mut buf: RawBuf<u32> = RawBuf::new(default_storage());
        for i in 0..100 {
            buf.push(i).unwrap();
        }
        assert_eq!(buf.len(), 100);
        assert!(buf.capacity() >= 100);
        assert_eq!(buf[17], 17);
        assert_eq!(buf.pop(), Some(99));
        assert_eq!(buf.len(), 99);
    }

    #[test]
    fn test_insert_and_remove_shift() {
        let mut buf: RawBuf<u8> = RawBuf::new(default_storage());
        buf.extend_from_slice(b"acd").unwrap();
        buf.insert(1, b'b').unwrap();
        assert_eq!(buf.as_slice(), b"abcd");
        assert_eq!(buf.remove(2), b'c');
        assert_eq!(buf.as_slice(), b"abd");
    }

    #[test]
    fn test_drop_frees_elements() {
        let mut buf: RawBuf<String> = RawBuf::new(default_storage());
        buf.push(String::from("a")).unwrap();
        buf.push(String::from("b")).unwrap();
        buf.clear();
        assert!(buf.is_empty());
    }
}
