//! Arena-backed UTF-8 string.

use std::fmt;
use std::ops::Deref;
use std::str;

use crate::error::Result;
use crate::raw::RawBuf;
use crate::storage::{StoragePtr, default_storage};

/// A growable UTF-8 string whose bytes live in a [`StoragePtr`] arena.
///
/// Unlike `std::string::String`, every growing operation is fallible and
/// surfaces allocation failure from the owning storage.
pub struct Str {
    buf: RawBuf<u8>,
}

impl Str {
    /// Create an empty string in the default storage.
    pub fn new() -> Self {
        Str::with_storage(default_storage())
    }

    /// Create an empty string in `sp`.
    pub fn with_storage(sp: StoragePtr) -> Self {
        Str { buf: RawBuf::new(sp) }
    }

    /// Copy `s` into a new string owned by `sp`.
    pub fn from_str_in(s: &str, sp: StoragePtr) -> Result<Self> {
        let mut out = Str::with_storage(sp);
        out.push_str(s)?;
        Ok(out)
    }

    /// The storage owning this string's bytes.
    pub fn storage(&self) -> &StoragePtr {
        self.buf.storage()
    }

    pub fn as_str(&self) -> &str {
        // SAFETY: every mutation keeps the buffer valid UTF-8.
        unsafe { str::from_utf8_unchecked(self.buf.as_slice()) }
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

    /// Ensure room for at least `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.buf.reserve(additional)
    }

    /// Append `s`, growing from the owning storage.
    pub fn push_str(&mut self, s: &str) -> Result<()> {
        self.buf.extend_from_slice(s.as_bytes())
    }

    /// Append a single character.
    pub fn push(&mut self, c: char) -> Result<()> {
        let mut enc = [0u8; 4];
        self.push_str(c.encode_utf8(&mut enc))
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Deep-copy this string into `sp`.
    pub fn clone_in(&self, sp: StoragePtr) -> Result<Self> {
        Str::from_str_in(self.as_str(), sp)
    }
}

impl Default for Str {
    fn default() -> Self {
        Str::new()
    }
}

impl Deref for Str {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for Str {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq for Str {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Str {}

impl PartialEq<str> for Str {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Str {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Debug for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BoundedStorage, StoragePtr};

    #[test]
    fn test_push_and_compare() {
        let mut s = Str::new();
        s.push_str("hello").unwrap();
        s.push(' ').unwrap();
        s.push_str("world").unwrap();
        assert_eq!(s, "hello world");
        assert_eq!(s.len(), 11);
    }

    #[test]
    fn test_multibyte_push() {
        let mut s = Str::new();
        s.push('\u{00e9}').unwrap();
        s.push('\u{6f22}').unwrap();
        s.push('\u{1f600}').unwrap();
        assert_eq!(s.as_str(), "\u{00e9}\u{6f22}\u{1f600}");
        assert_eq!(s.len(), 2 + 3 + 4);
    }

    #[test]
    fn test_clone_in_copies_across_storages() {
        let sp = StoragePtr::new(BoundedStorage::new(1024));
        let a = Str::from_str_in("payload", sp.clone()).unwrap();
        let b = a.clone_in(default_storage()).unwrap();
        assert_eq!(a, b);
        assert!(!StoragePtr::same(a.storage(), b.storage()));
    }

    #[test]
    fn test_bounded_storage_failure_surfaces() {
        let sp = StoragePtr::new(BoundedStorage::new(8));
        let mut s = Str::with_storage(sp);
        s.push_str("12345678").unwrap();
        assert!(s.push_str("overflow").is_err());
        // failed growth leaves the original content intact
        assert_eq!(s, "12345678");
    }
}
