//! In-process namespace store.
//!
//! [`MemoryStore`] keeps a registry-shaped tree in memory. It behaves like
//! the real registry where the algorithms in this crate care: names compare
//! ASCII case-insensitively, enumeration follows insertion order, a key with
//! subkeys refuses deletion, and deleting a key drops its values with it.
//!
//! Denials, injected failures and re-created keys can be configured per
//! address, which makes protected subtrees and deletion races reproducible.

use crate::address::{Address, SEPARATOR};
use crate::error::{RegistryError, Result};
use crate::root::{AccessFlags, RootKey};
use crate::store::{KeyInfo, NamespaceStore};
use crate::value::ValueData;
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// FILETIME of 2020-01-01T00:00:00Z, the store's initial clock.
const EPOCH_FILETIME: u64 = 132_223_104_000_000_000;

/// One second in FILETIME units.
const FILETIME_SECOND: u64 = 10_000_000;

type KeyId = (RootKey, String);

#[derive(Debug, Clone, Default)]
struct KeyRecord {
    subkeys: Vec<String>,
    values: Vec<(String, ValueData)>,
    last_written: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    keys: HashMap<KeyId, KeyRecord>,
    deny_read: HashSet<KeyId>,
    deny_write: HashSet<KeyId>,
    failures: HashMap<KeyId, i32>,
    respawn: HashMap<KeyId, usize>,
    open_handles: usize,
    mutations: usize,
    clock: u64,
}

impl MemoryState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        EPOCH_FILETIME + self.clock * FILETIME_SECOND
    }

    fn record(&self, id: &KeyId) -> Result<&KeyRecord> {
        self.keys
            .get(id)
            .ok_or_else(|| RegistryError::not_found("key", &describe(id)))
    }
}

/// Handle to an open key in a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    root: RootKey,
    key: String,
    access: AccessFlags,
}

impl MemoryHandle {
    fn id(&self) -> KeyId {
        (self.root, self.key.clone())
    }

    fn require(&self, flag: u32) -> Result<()> {
        if self.access.has_flag(flag) {
            Ok(())
        } else {
            Err(RegistryError::access_denied("handle", &describe(&self.id())))
        }
    }
}

/// Normalizes a root-relative path into the store's lookup form.
fn normalize(path: &str) -> String {
    path.split(SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("\\")
}

fn join(parent: &str, name: &str) -> String {
    let name = name.to_ascii_lowercase();
    if parent.is_empty() {
        name
    } else {
        format!("{}{}{}", parent, SEPARATOR, name)
    }
}

fn describe(id: &KeyId) -> String {
    if id.1.is_empty() {
        id.0.name().to_string()
    } else {
        format!("{}{}{}", id.0.name(), SEPARATOR, id.1)
    }
}

fn key_id(address: &Address) -> Result<KeyId> {
    let root = address.root().ok_or_else(|| {
        RegistryError::malformed_address(format!("'{}' is not anchored at a root", address))
    })?;
    Ok((root, normalize(&address.store_path())))
}

/// A registry-shaped store held entirely in memory.
///
/// # Examples
///
/// ```rust
/// use reg_sweep::{Address, MemoryStore, ValueData};
///
/// let store = MemoryStore::new();
/// let key = Address::parse(r"HKCU\Software\Vendor").unwrap();
/// store.set_value(&key, "Version", ValueData::Dword(3)).unwrap();
/// assert!(store.contains_key(&key));
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates a store holding the five empty roots.
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        for root in RootKey::ALL {
            state.keys.insert(
                (root, String::new()),
                KeyRecord {
                    last_written: EPOCH_FILETIME,
                    ..KeyRecord::default()
                },
            );
        }
        Self {
            state: RwLock::new(state),
        }
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| RegistryError::access_error(-1, "memory store lock poisoned"))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| RegistryError::access_error(-1, "memory store lock poisoned"))
    }

    /// Creates the key at `address` and any missing ancestors.
    ///
    /// # Errors
    ///
    /// Returns `MalformedAddress` for a relative address or a key name that
    /// contains the separator.
    pub fn create_key(&self, address: &Address) -> Result<()> {
        let (root, _) = key_id(address)?;
        let relative = address.relative_to_root();
        let names = relative.as_ref().map(Address::segments).unwrap_or_default();
        if let Some(bad) = names.iter().find(|name| name.contains(SEPARATOR) || name.is_empty()) {
            return Err(RegistryError::malformed_address(format!(
                "'{}' is not a valid key name",
                bad
            )));
        }

        let mut state = self.write_state()?;
        let mut parent = String::new();
        for name in names {
            let child = join(&parent, name);
            if !state.keys.contains_key(&(root, child.clone())) {
                let stamp = state.tick();
                state.keys.insert(
                    (root, child.clone()),
                    KeyRecord {
                        last_written: stamp,
                        ..KeyRecord::default()
                    },
                );
                if let Some(record) = state.keys.get_mut(&(root, parent.clone())) {
                    record.subkeys.push(name.clone());
                    record.last_written = stamp;
                }
            }
            parent = child;
        }
        Ok(())
    }

    /// Sets an entry on the key at `key`, creating the key if needed.
    ///
    /// An existing entry with the same name is overwritten in place.
    pub fn set_value(&self, key: &Address, name: &str, data: ValueData) -> Result<()> {
        self.create_key(key)?;
        let id = key_id(key)?;
        let mut state = self.write_state()?;
        let stamp = state.tick();
        let record = state
            .keys
            .get_mut(&id)
            .ok_or_else(|| RegistryError::not_found("key", &describe(&id)))?;
        match record
            .values
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = data,
            None => record.values.push((name.to_string(), data)),
        }
        record.last_written = stamp;
        Ok(())
    }

    /// Makes every read-access open of `key` fail with `AccessDenied`.
    pub fn deny_read(&self, key: &Address) -> Result<()> {
        let id = key_id(key)?;
        self.write_state()?.deny_read.insert(id);
        Ok(())
    }

    /// Makes write-access opens of `key`, and deletion of `key`, fail with `AccessDenied`.
    pub fn deny_write(&self, key: &Address) -> Result<()> {
        let id = key_id(key)?;
        self.write_state()?.deny_write.insert(id);
        Ok(())
    }

    /// Makes every open of `key` fail with `AccessError` carrying `code`.
    pub fn fail_open(&self, key: &Address, code: i32) -> Result<()> {
        let id = key_id(key)?;
        self.write_state()?.failures.insert(id, code);
        Ok(())
    }

    /// Re-creates `key` (empty) the next `times` times it is deleted.
    pub fn respawn_on_delete(&self, key: &Address, times: usize) -> Result<()> {
        let id = key_id(key)?;
        self.write_state()?.respawn.insert(id, times);
        Ok(())
    }

    /// Removes all configured denials and injected failures.
    pub fn clear_denials(&self) -> Result<()> {
        let mut state = self.write_state()?;
        state.deny_read.clear();
        state.deny_write.clear();
        state.failures.clear();
        Ok(())
    }

    /// Returns true if a key exists at `key`.
    pub fn contains_key(&self, key: &Address) -> bool {
        match (key_id(key), self.read_state()) {
            (Ok(id), Ok(state)) => state.keys.contains_key(&id),
            _ => false,
        }
    }

    /// Number of handles currently open.
    pub fn open_handles(&self) -> usize {
        self.read_state().map(|state| state.open_handles).unwrap_or(0)
    }

    /// Number of mutating store calls (`delete_subkey`, `delete_value`) received.
    pub fn mutation_count(&self) -> usize {
        self.read_state().map(|state| state.mutations).unwrap_or(0)
    }

    /// Number of keys in the store, roots included.
    pub fn key_count(&self) -> usize {
        self.read_state().map(|state| state.keys.len()).unwrap_or(0)
    }
}

impl NamespaceStore for MemoryStore {
    type Handle = MemoryHandle;

    fn open(&self, root: RootKey, path: &str, access: AccessFlags) -> Result<MemoryHandle> {
        let id = (root, normalize(path));
        let mut state = self.write_state()?;

        if let Some(code) = state.failures.get(&id) {
            return Err(RegistryError::access_error(
                *code,
                format!("injected failure opening '{}'", describe(&id)),
            ));
        }
        if !state.keys.contains_key(&id) {
            return Err(RegistryError::not_found("key", &describe(&id)));
        }
        if (access.wants_read() && state.deny_read.contains(&id))
            || (access.wants_write() && state.deny_write.contains(&id))
        {
            return Err(RegistryError::access_denied("key", &describe(&id)));
        }

        state.open_handles += 1;
        Ok(MemoryHandle {
            root,
            key: id.1,
            access,
        })
    }

    fn close(&self, _handle: MemoryHandle) {
        if let Ok(mut state) = self.state.write() {
            state.open_handles = state.open_handles.saturating_sub(1);
        }
    }

    fn subkey_names(&self, handle: &MemoryHandle) -> Result<Vec<String>> {
        handle.require(AccessFlags::ENUMERATE_SUB_KEYS)?;
        let state = self.read_state()?;
        Ok(state.record(&handle.id())?.subkeys.clone())
    }

    fn values(&self, handle: &MemoryHandle) -> Result<Vec<(String, ValueData)>> {
        handle.require(AccessFlags::QUERY_VALUE)?;
        let state = self.read_state()?;
        Ok(state.record(&handle.id())?.values.clone())
    }

    fn query_info(&self, handle: &MemoryHandle) -> Result<KeyInfo> {
        handle.require(AccessFlags::QUERY_VALUE)?;
        let state = self.read_state()?;
        let record = state.record(&handle.id())?;
        Ok(KeyInfo {
            subkey_count: record.subkeys.len() as u32,
            value_count: record.values.len() as u32,
            last_written: record.last_written,
        })
    }

    fn get_value(&self, handle: &MemoryHandle, name: &str) -> Result<ValueData> {
        handle.require(AccessFlags::QUERY_VALUE)?;
        let state = self.read_state()?;
        state
            .record(&handle.id())?
            .values
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, data)| data.clone())
            .ok_or_else(|| RegistryError::not_found("value", name))
    }

    fn delete_subkey(&self, parent: &MemoryHandle, name: &str) -> Result<()> {
        if name.is_empty() || name.contains(SEPARATOR) {
            return Err(RegistryError::malformed_address(format!(
                "'{}' is not a valid subkey name",
                name
            )));
        }
        let mut state = self.write_state()?;
        state.mutations += 1;

        let parent_id = parent.id();
        state.record(&parent_id)?;
        let child_id = (parent.root, join(&parent.key, name));
        let child = state.record(&child_id)?;

        if state.deny_write.contains(&child_id) {
            return Err(RegistryError::access_denied("key", &describe(&child_id)));
        }
        if !child.subkeys.is_empty() {
            return Err(RegistryError::access_denied(
                "key with subkeys",
                &describe(&child_id),
            ));
        }

        state.keys.remove(&child_id);
        let stamp = state.tick();
        if let Some(record) = state.keys.get_mut(&parent_id) {
            record.subkeys.retain(|existing| !existing.eq_ignore_ascii_case(name));
            record.last_written = stamp;
        }
        debug!(key = %describe(&child_id), "Deleted key");

        let respawn = state.respawn.get(&child_id).copied().unwrap_or(0);
        if respawn > 0 {
            state.respawn.insert(child_id.clone(), respawn - 1);
            state.keys.insert(
                child_id.clone(),
                KeyRecord {
                    last_written: stamp,
                    ..KeyRecord::default()
                },
            );
            if let Some(record) = state.keys.get_mut(&parent_id) {
                record.subkeys.push(name.to_string());
            }
            debug!(key = %describe(&child_id), remaining = respawn - 1, "Key re-created");
        }

        Ok(())
    }

    fn delete_value(&self, parent: &MemoryHandle, name: &str) -> Result<()> {
        let mut state = self.write_state()?;
        state.mutations += 1;
        parent.require(AccessFlags::SET_VALUE)?;

        let stamp = state.tick();
        let parent_id = parent.id();
        let record = state
            .keys
            .get_mut(&parent_id)
            .ok_or_else(|| RegistryError::not_found("key", &describe(&parent_id)))?;
        let before = record.values.len();
        record.values.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        if record.values.len() == before {
            return Err(RegistryError::not_found("value", name));
        }
        record.last_written = stamp;
        debug!(key = %describe(&parent_id), value = name, "Deleted value");
        Ok(())
    }
}
