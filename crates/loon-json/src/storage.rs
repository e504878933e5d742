//! Swappable, reference-counted storage providers.
//!
//! Every container and value carries a [`StoragePtr`] naming the arena that
//! owns its bytes. Handles compare equal only when they refer to the same
//! provider instance; assigning across arenas is always an observable copy.

use std::alloc::{Layout, alloc, dealloc};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;

use crate::error::{Error, Result};

/// A raw memory provider for values and containers.
pub trait Storage: Send + Sync {
    /// Allocate a block for `layout`, or fail with [`Error::OutOfMemory`].
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>>;

    /// Release a block previously returned by [`Storage::allocate`].
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this same provider
    /// with the same `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// A cheap, clonable handle to a [`Storage`] provider.
///
/// Equality is identity: two handles are equal only if they refer to the
/// same provider instance.
#[derive(Clone)]
pub struct StoragePtr(Arc<dyn Storage>);

impl StoragePtr {
    /// Wrap a storage provider in a shared handle.
    pub fn new<S: Storage + 'static>(storage: S) -> Self {
        StoragePtr(Arc::new(storage))
    }

    /// Whether two handles refer to the same provider instance.
    pub fn same(a: &StoragePtr, b: &StoragePtr) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub(crate) fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        self.0.allocate(layout)
    }

    pub(crate) unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { self.0.deallocate(ptr, layout) }
    }
}

impl PartialEq for StoragePtr {
    fn eq(&self, other: &Self) -> bool {
        StoragePtr::same(self, other)
    }
}

impl Eq for StoragePtr {}

impl fmt::Debug for StoragePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoragePtr({:p})", Arc::as_ptr(&self.0))
    }
}

impl Default for StoragePtr {
    fn default() -> Self {
        default_storage()
    }
}

/// Return the process-wide default storage, backed by the global allocator.
pub fn default_storage() -> StoragePtr {
    static DEFAULT: Lazy<StoragePtr> = Lazy::new(|| StoragePtr::new(HeapStorage));
    DEFAULT.clone()
}

/// Storage backed directly by the global allocator.
pub struct HeapStorage;

impl Storage for HeapStorage {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        debug_assert!(layout.size() > 0);
        // SAFETY: callers never request zero-sized layouts.
        let ptr = unsafe { alloc(layout) };
        NonNull::new(ptr).ok_or(Error::OutOfMemory)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded from a matching `allocate` per the trait contract.
        unsafe { dealloc(ptr.as_ptr(), layout) }
    }
}

/// Storage with a hard byte limit.
///
/// Allocations past the limit fail with [`Error::OutOfMemory`], which makes
/// this the vehicle for exercising allocation-failure paths.
pub struct BoundedStorage {
    limit: usize,
    used: AtomicUsize,
}

impl BoundedStorage {
    /// Create a storage that refuses to exceed `limit` bytes in flight.
    pub fn new(limit: usize) -> Self {
        BoundedStorage {
            limit,
            used: AtomicUsize::new(0),
        }
    }

    /// Bytes currently allocated from this storage.
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }
}

impl Storage for BoundedStorage {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        let size = layout.size();
        self.used
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                let next = used.checked_add(size)?;
                (next <= self.limit).then_some(next)
            })
            .map_err(|_| Error::OutOfMemory)?;
        match HeapStorage.allocate(layout) {
            Ok(ptr) => Ok(ptr),
            Err(e) => {
                self.used.fetch_sub(size, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.used.fetch_sub(layout.size(), Ordering::Relaxed);
        // SAFETY: forwarded from a matching `allocate`.
        unsafe { HeapStorage.deallocate(ptr, layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_compare_by_identity() {
        let a = StoragePtr::new(HeapStorage);
        let b = StoragePtr::new(HeapStorage);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(default_storage(), default_storage());
    }

    #[test]
    fn test_bounded_storage_enforces_limit() {
        let storage = BoundedStorage::new(64);
        let layout = Layout::from_size_align(48, 8).unwrap();
        let ptr = storage.allocate(layout).unwrap();
        assert_eq!(storage.used(), 48);
        assert_eq!(storage.allocate(layout).unwrap_err(), Error::OutOfMemory);
        unsafe { storage.deallocate(ptr, layout) };
        assert_eq!(storage.used(), 0);
        assert!(storage.allocate(layout).is_ok());
    }
}
