//! Convenience facade over a namespace store.

use crate::address::Address;
use crate::delete::{DeleteOptions, DeleteReport, TreeDeleter};
use crate::error::{RegistryError, Result};
use crate::key::{ContainerKey, EntryKey, Key, Node};
use crate::root::RootKey;
use crate::store::{KeyInfo, NamespaceStore};
use crate::walk::{Walk, WalkOptions};
use tracing::{debug, instrument};

/// A namespace store together with the operations of this crate.
///
/// # Examples
///
/// ```rust
/// use reg_sweep::{Address, MemoryStore, Registry, ValueData};
///
/// # fn main() -> reg_sweep::Result<()> {
/// let store = MemoryStore::new();
/// store.set_value(&Address::parse(r"HKCU\Software\Old")?, "Flag", ValueData::Dword(1))?;
///
/// let registry = Registry::new(store);
/// let software = registry.key(&Address::parse(r"HKCU\Software")?)?;
/// let stale = registry.find(&software, |key| key.name() == "Old");
/// assert_eq!(stale.len(), 1);
/// assert!(registry.delete_tree(&stale[0], Default::default()).success());
/// # Ok(())
/// # }
/// ```
pub struct Registry<S: NamespaceStore> {
    store: S,
}

impl<S: NamespaceStore> Registry<S> {
    /// Wraps a store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Unwraps the underlying store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Returns the root node with the given long or short name.
    pub fn root(&self, name: &str) -> Result<Key> {
        RootKey::from_name(name)
            .map(Key::Root)
            .ok_or_else(|| RegistryError::not_found("root", name))
    }

    /// Resolves an address to the node that currently lives there.
    ///
    /// A container wins over an entry of the same name. Addresses whose
    /// segments cannot name a container (an empty or path-shaped last
    /// segment) only resolve to entries.
    ///
    /// # Errors
    ///
    /// Returns `MalformedAddress` for relative addresses and `NotFound`
    /// when neither a container nor an entry exists.
    #[instrument(skip(self), fields(address = %address))]
    pub fn key(&self, address: &Address) -> Result<Key> {
        if address.is_relative() {
            return Err(RegistryError::malformed_address(format!(
                "'{}' is not anchored at a root",
                address
            )));
        }
        if let Some(root) = address.root().filter(|_| address.is_root()) {
            return Ok(Key::Root(root));
        }

        // Path-named entries and the default value cannot name a container.
        match ContainerKey::new(address.clone()) {
            Ok(container) => match container.metadata(&self.store) {
                Ok(_) => return Ok(Key::Container(container)),
                Err(e) if e.is_access_denied() => return Ok(Key::Container(container)),
                Err(e) if !e.is_not_found() => return Err(e),
                Err(_) => debug!("No container, trying entry"),
            },
            Err(e) => debug!(error = %e, "Not a container address, trying entry"),
        }

        let entry = EntryKey::new(address.clone())?;
        match entry.read_value(&self.store) {
            Ok(_) => Ok(Key::Entry(entry)),
            Err(e) if e.is_not_found() => Err(RegistryError::not_found("key or value", &address.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Returns true if the node is present.
    pub fn exists(&self, key: &Key) -> Result<bool> {
        key.exists(&self.store)
    }

    /// Fetches fresh metadata for a node.
    pub fn metadata(&self, key: &Key) -> Result<KeyInfo> {
        key.metadata(&self.store)
    }

    /// Lists the immediate children of a node.
    pub fn children(&self, key: &Key) -> Result<Vec<Key>> {
        key.children(&self.store)
    }

    /// Walks the descendants of a node.
    pub fn walk(&self, key: &Key) -> Walk<'_, S> {
        Walk::new(&self.store, key)
    }

    /// Walks the descendants of a node with explicit options.
    pub fn walk_with(&self, key: &Key, options: WalkOptions) -> Walk<'_, S> {
        Walk::with_options(&self.store, key, options)
    }

    /// Collects the reachable descendants that match `predicate`.
    pub fn find<P>(&self, key: &Key, mut predicate: P) -> Vec<Key>
    where
        P: FnMut(&Key) -> bool,
    {
        self.walk(key).nodes().filter(|key| predicate(key)).collect()
    }

    /// Deletes a single node (containers take their subkeys with them).
    pub fn delete(&self, key: &Key, preview: bool) -> bool {
        key.delete(&self.store, preview)
    }

    /// Deletes a node and its subtree children-first.
    pub fn delete_tree(&self, key: &Key, options: DeleteOptions) -> DeleteReport {
        TreeDeleter::with_options(&self.store, options).run(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::value::ValueData;

    fn addr(text: &str) -> Address {
        Address::parse(text).unwrap()
    }

    fn registry() -> Registry<MemoryStore> {
        let store = MemoryStore::new();
        store.set_value(&addr(r"HKLM\Software\Vendor"), "Path", ValueData::String("x".into())).unwrap();
        Registry::new(store)
    }

    #[test]
    fn test_root_lookup() {
        let registry = registry();
        assert_eq!(registry.root("HKLM").unwrap(), Key::Root(RootKey::LocalMachine));
        assert!(registry.root("HKXX").unwrap_err().is_not_found());
    }

    #[test]
    fn test_key_resolution() {
        let registry = registry();
        assert!(matches!(registry.key(&addr("HKLM")).unwrap(), Key::Root(_)));
        assert!(matches!(registry.key(&addr(r"HKLM\Software\Vendor")).unwrap(), Key::Container(_)));
        assert!(matches!(registry.key(&addr(r"HKLM\Software\Vendor\Path")).unwrap(), Key::Entry(_)));
        assert!(registry.key(&addr(r"HKLM\Missing")).unwrap_err().is_not_found());
        assert!(matches!(
            registry.key(&addr(r"Software\Vendor")),
            Err(RegistryError::MalformedAddress(_))
        ));
    }

    #[test]
    fn test_empty_segment_is_never_a_container() {
        let registry = registry();
        let address = Address::new(["HKLM", ""]).unwrap();
        assert!(registry.key(&address).unwrap_err().is_not_found());

        registry.store().set_value(&addr("HKLM"), "", ValueData::Dword(7)).unwrap();
        assert!(matches!(registry.key(&address).unwrap(), Key::Entry(_)));
        assert!(registry.exists(&registry.root("HKLM").unwrap()).unwrap());
    }

    #[test]
    fn test_find() {
        let registry = registry();
        let root = registry.root("HKLM").unwrap();
        let found = registry.find(&root, |key| key.is_entry());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "Path");
    }
}
