//! The namespace store capability and scoped key handles.
//!
//! Everything in this crate reaches the registry through [`NamespaceStore`].
//! Handles are never cached: each read or write opens a [`KeyGuard`], uses
//! it, and lets `Drop` release it, even when the operation fails. Other
//! processes may add or remove keys between two calls, so no operation
//! assumes a stable snapshot.

use crate::error::Result;
use crate::root::{AccessFlags, RootKey};
use crate::value::ValueData;
use std::ops::Deref;

/// Windows FILETIME is 100-nanosecond intervals since 1601-01-01.
/// Unix epoch is 1970-01-01, difference is 11644473600 seconds.
const FILETIME_UNIX_DIFF: i64 = 11_644_473_600;

/// Key metadata fetched fresh from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyInfo {
    /// Number of child containers.
    pub subkey_count: u32,

    /// Number of entries held directly by the key.
    pub value_count: u32,

    /// Last written timestamp (Windows FILETIME).
    pub last_written: u64,
}

impl KeyInfo {
    /// Converts the last written timestamp to a UTC date time.
    pub fn last_written_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let seconds = (self.last_written / 10_000_000) as i64 - FILETIME_UNIX_DIFF;
        let nanos = ((self.last_written % 10_000_000) * 100) as u32;

        chrono::DateTime::from_timestamp(seconds, nanos)
    }

    /// Converts a UTC date time to a FILETIME value.
    ///
    /// Dates before 1601 clamp to zero and dates past the FILETIME range
    /// clamp to `u64::MAX`.
    pub fn filetime_from(datetime: chrono::DateTime<chrono::Utc>) -> u64 {
        let seconds = (datetime.timestamp() + FILETIME_UNIX_DIFF).max(0) as u64;
        seconds
            .saturating_mul(10_000_000)
            .saturating_add(u64::from(datetime.timestamp_subsec_nanos() / 100))
    }

    /// Returns true if the key holds neither subkeys nor values.
    pub fn is_empty(&self) -> bool {
        self.subkey_count == 0 && self.value_count == 0
    }
}

/// A hierarchical key-value store shaped like the registry.
///
/// Implementations report failures through the crate's error taxonomy:
/// `NotFound` for absent keys or values, `AccessDenied` for permission
/// failures, `AccessError` for everything else.
pub trait NamespaceStore {
    /// Open key handle.
    type Handle;

    /// Opens the key at `path` (relative to `root`; empty for the root itself).
    fn open(&self, root: RootKey, path: &str, access: AccessFlags) -> Result<Self::Handle>;

    /// Releases a handle obtained from [`NamespaceStore::open`].
    fn close(&self, handle: Self::Handle);

    /// Names of the child containers, in the store's native order.
    fn subkey_names(&self, handle: &Self::Handle) -> Result<Vec<String>>;

    /// Name and data of every entry held by the key, in the store's native order.
    fn values(&self, handle: &Self::Handle) -> Result<Vec<(String, ValueData)>>;

    /// Child counts and modification time of the key.
    fn query_info(&self, handle: &Self::Handle) -> Result<KeyInfo>;

    /// Reads a single entry.
    fn get_value(&self, handle: &Self::Handle, name: &str) -> Result<ValueData>;

    /// Deletes the child container `name`; fails if it still has subkeys.
    fn delete_subkey(&self, parent: &Self::Handle, name: &str) -> Result<()>;

    /// Deletes the entry `name`.
    fn delete_value(&self, parent: &Self::Handle, name: &str) -> Result<()>;
}

impl<S: NamespaceStore + ?Sized> NamespaceStore for &S {
    type Handle = S::Handle;

    fn open(&self, root: RootKey, path: &str, access: AccessFlags) -> Result<Self::Handle> {
        (**self).open(root, path, access)
    }

    fn close(&self, handle: Self::Handle) {
        (**self).close(handle)
    }

    fn subkey_names(&self, handle: &Self::Handle) -> Result<Vec<String>> {
        (**self).subkey_names(handle)
    }

    fn values(&self, handle: &Self::Handle) -> Result<Vec<(String, ValueData)>> {
        (**self).values(handle)
    }

    fn query_info(&self, handle: &Self::Handle) -> Result<KeyInfo> {
        (**self).query_info(handle)
    }

    fn get_value(&self, handle: &Self::Handle, name: &str) -> Result<ValueData> {
        (**self).get_value(handle, name)
    }

    fn delete_subkey(&self, parent: &Self::Handle, name: &str) -> Result<()> {
        (**self).delete_subkey(parent, name)
    }

    fn delete_value(&self, parent: &Self::Handle, name: &str) -> Result<()> {
        (**self).delete_value(parent, name)
    }
}

/// An open key handle that is released when dropped.
pub struct KeyGuard<'s, S: NamespaceStore + ?Sized> {
    store: &'s S,
    handle: Option<S::Handle>,
}

impl<'s, S: NamespaceStore + ?Sized> KeyGuard<'s, S> {
    /// Opens `path` under `root` with the requested access.
    pub fn open(store: &'s S, root: RootKey, path: &str, access: AccessFlags) -> Result<Self> {
        let handle = store.open(root, path, access)?;
        Ok(Self {
            store,
            handle: Some(handle),
        })
    }

    /// Returns the store this handle belongs to.
    pub fn store(&self) -> &'s S {
        self.store
    }
}

impl<'s, S: NamespaceStore + ?Sized> Deref for KeyGuard<'s, S> {
    type Target = S::Handle;

    fn deref(&self) -> &Self::Target {
        // Only taken in drop.
        match &self.handle {
            Some(handle) => handle,
            None => unreachable!("key handle used after release"),
        }
    }
}

impl<'s, S: NamespaceStore + ?Sized> Drop for KeyGuard<'s, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.store.close(handle);
        }
    }
}
