//! Registry nodes: roots, containers and entries.
//!
//! Nodes are ephemeral views built from an [`Address`] and a root. They
//! hold no store resources; every operation takes the store explicitly and
//! opens, uses and releases its own handle. Deleting a node does not update
//! other node values already in hand; call `exists` to revalidate them.

use crate::address::{Address, SEPARATOR};
use crate::error::{RegistryError, Result};
use crate::root::{AccessFlags, RootKey};
use crate::store::{KeyGuard, KeyInfo, NamespaceStore};
use crate::value::ValueData;
use std::borrow::Cow;
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

/// Display name used for the unnamed (default) value of a key.
pub const DEFAULT_VALUE_NAME: &str = "(default)";

/// Operations shared by every kind of node.
pub trait Node {
    /// Address of this node.
    fn address(&self) -> Cow<'_, Address>;

    /// Returns true if the node is present in the store.
    ///
    /// A name may refer to either a container or an entry, so both are
    /// checked before answering `false`. Failures other than `NotFound`
    /// are returned as errors unchanged: a permission failure stays
    /// `AccessDenied`, anything else arrives as `AccessError`.
    fn exists<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<bool>;

    /// Fetches fresh child counts and modification time.
    fn metadata<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<KeyInfo>;

    /// Immediate children: entries first, then containers, in store order.
    fn children<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<Vec<Key>>;

    /// Deletes the node, or only checks that it could be deleted when `preview` is set.
    ///
    /// Returns true on success or when the node is already absent, false on
    /// permission and other failures, which are logged rather than raised.
    fn delete<S: NamespaceStore + ?Sized>(&self, store: &S, preview: bool) -> bool;
}

fn open_key<'s, S: NamespaceStore + ?Sized>(
    store: &'s S,
    root: RootKey,
    address: &Address,
    access: AccessFlags,
) -> Result<KeyGuard<'s, S>> {
    KeyGuard::open(store, root, &address.store_path(), access)
}

fn require_root(address: &Address) -> Result<RootKey> {
    address.root().ok_or_else(|| {
        RegistryError::malformed_address(format!("'{}' is not anchored at a root", address))
    })
}

/// Checks that each segment names exactly one key below the root.
///
/// The store receives these segments joined by the separator, so an empty
/// segment or one holding a separator would address a different key.
fn check_key_segments(address: &Address, segments: &[String]) -> Result<()> {
    for segment in segments {
        if segment.is_empty() {
            return Err(RegistryError::malformed_address(format!(
                "'{}' has an empty key segment",
                address
            )));
        }
        if segment.contains(SEPARATOR) {
            return Err(RegistryError::malformed_address(format!(
                "key segment '{}' of '{}' contains a separator",
                segment, address
            )));
        }
    }
    Ok(())
}

/// Reads entries and subkeys of the key at `address` through one handle.
fn list_children<S: NamespaceStore + ?Sized>(
    store: &S,
    root: RootKey,
    address: &Address,
) -> Result<(Vec<EntryKey>, Vec<ContainerKey>)> {
    let guard = open_key(store, root, address, AccessFlags::read())?;

    let entries = store
        .values(&guard)?
        .into_iter()
        .map(|(name, data)| EntryKey {
            address: address.child(&name),
            root,
            value: Some(data),
        })
        .collect();

    let containers = store
        .subkey_names(&guard)?
        .into_iter()
        .map(|name| ContainerKey {
            address: address.child(&name),
            root,
        })
        .collect();

    Ok((entries, containers))
}

fn collect_children(entries: Vec<EntryKey>, containers: Vec<ContainerKey>) -> Vec<Key> {
    entries
        .into_iter()
        .map(Key::Entry)
        .chain(containers.into_iter().map(Key::Container))
        .collect()
}

/// Returns true if an entry named like the last segment exists in the parent.
fn entry_exists<S: NamespaceStore + ?Sized>(
    store: &S,
    root: RootKey,
    address: &Address,
) -> Result<bool> {
    let parent = match address.parent() {
        Some(parent) => parent,
        None => return Ok(false),
    };
    let guard = match open_key(store, root, &parent, AccessFlags::read()) {
        Ok(guard) => guard,
        Err(e) if e.is_not_found() => return Ok(false),
        Err(e) => return Err(e),
    };
    match store.get_value(&guard, address.raw_name()) {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Returns true if a container exists at `address`.
fn container_exists<S: NamespaceStore + ?Sized>(
    store: &S,
    root: RootKey,
    address: &Address,
) -> Result<bool> {
    match open_key(store, root, address, AccessFlags::read()) {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Maps the outcome of a delete attempt onto the boolean contract.
fn settle(address: &Address, preview: bool, outcome: Result<()>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(e) if e.is_not_found() => {
            debug!(key = %address, "Already absent");
            true
        }
        Err(e) if e.is_access_denied() => {
            warn!(key = %address, preview, error = %e, "Permission denied");
            false
        }
        Err(e) => {
            error!(key = %address, preview, error = %e, "Delete failed");
            false
        }
    }
}

impl Node for RootKey {
    fn address(&self) -> Cow<'_, Address> {
        Cow::Owned(Address::from_root(*self))
    }

    fn exists<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<bool> {
        container_exists(store, *self, &Address::from_root(*self))
    }

    fn metadata<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<KeyInfo> {
        let guard = KeyGuard::open(store, *self, "", AccessFlags::read())?;
        store.query_info(&guard)
    }

    fn children<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<Vec<Key>> {
        let (entries, containers) = list_children(store, *self, &Address::from_root(*self))?;
        Ok(collect_children(entries, containers))
    }

    fn delete<S: NamespaceStore + ?Sized>(&self, _store: &S, preview: bool) -> bool {
        warn!(root = self.name(), preview, "Roots cannot be deleted");
        false
    }
}

/// A key that may hold child containers and entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerKey {
    address: Address,
    root: RootKey,
}

impl ContainerKey {
    /// Creates a container view for an absolute, non-root address.
    ///
    /// # Errors
    ///
    /// Returns `MalformedAddress` for relative addresses, for a bare root
    /// (represented by [`RootKey`] instead), and when a segment below the
    /// root is empty or contains a separator.
    pub fn new(address: Address) -> Result<Self> {
        let root = require_root(&address)?;
        if address.is_root() {
            return Err(RegistryError::malformed_address(format!(
                "'{}' is a root, not a container",
                address
            )));
        }
        check_key_segments(&address, &address.segments()[1..])?;
        Ok(Self { address, root })
    }

    /// Returns the address of this container.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Returns the root this container lives under.
    pub fn root(&self) -> RootKey {
        self.root
    }

    /// Returns the display name of this container.
    pub fn name(&self) -> String {
        self.address.name()
    }

    /// Lists the child containers.
    pub fn subkeys<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<Vec<ContainerKey>> {
        let guard = open_key(store, self.root, &self.address, AccessFlags::read())?;
        Ok(store
            .subkey_names(&guard)?
            .into_iter()
            .map(|name| ContainerKey {
                address: self.address.child(&name),
                root: self.root,
            })
            .collect())
    }

    /// Lists the entries held directly by this container.
    pub fn entries<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<Vec<EntryKey>> {
        Ok(list_children(store, self.root, &self.address)?.0)
    }

    fn try_delete<S: NamespaceStore + ?Sized>(&self, store: &S, preview: bool) -> Result<()> {
        // Entries go with the key itself; only subkeys block deletion.
        let mut blocked = 0usize;
        for child in self.subkeys(store)? {
            if !child.delete(store, preview) {
                blocked += 1;
            }
        }
        if blocked > 0 {
            return Err(RegistryError::AccessDenied(format!(
                "{} subkey(s) of '{}' could not be deleted",
                blocked, self.address
            )));
        }

        if preview {
            open_key(store, self.root, &self.address, AccessFlags::delete())?;
            info!(key = %self.address, "Would delete key");
            return Ok(());
        }

        let parent = self
            .address
            .parent()
            .ok_or_else(|| RegistryError::malformed_address("container without parent"))?;
        let guard = open_key(store, self.root, &parent, AccessFlags::read())?;
        store.delete_subkey(&guard, self.address.raw_name())?;
        info!(key = %self.address, "Deleted key");
        Ok(())
    }
}

impl Node for ContainerKey {
    fn address(&self) -> Cow<'_, Address> {
        Cow::Borrowed(&self.address)
    }

    fn exists<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<bool> {
        if container_exists(store, self.root, &self.address)? {
            return Ok(true);
        }
        entry_exists(store, self.root, &self.address)
    }

    fn metadata<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<KeyInfo> {
        let guard = open_key(store, self.root, &self.address, AccessFlags::read())?;
        store.query_info(&guard)
    }

    fn children<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<Vec<Key>> {
        let (entries, containers) = list_children(store, self.root, &self.address)?;
        Ok(collect_children(entries, containers))
    }

    #[instrument(skip(self, store), fields(key = %self.address))]
    fn delete<S: NamespaceStore + ?Sized>(&self, store: &S, preview: bool) -> bool {
        settle(&self.address, preview, self.try_delete(store, preview))
    }
}

/// A terminal key holding one typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryKey {
    address: Address,
    root: RootKey,
    value: Option<ValueData>,
}

impl EntryKey {
    /// Creates an entry view; the last segment is the value name.
    ///
    /// The value name may be empty (the default value) or contain
    /// separators; the segments naming its parent key may not.
    ///
    /// # Errors
    ///
    /// Returns `MalformedAddress` for relative addresses, for a bare root,
    /// and for an empty or separator-holding parent segment.
    pub fn new(address: Address) -> Result<Self> {
        let root = require_root(&address)?;
        if address.is_root() {
            return Err(RegistryError::malformed_address(format!(
                "'{}' is a root, not an entry",
                address
            )));
        }
        let segments = address.segments();
        check_key_segments(&address, &segments[1..segments.len() - 1])?;
        Ok(Self {
            address,
            root,
            value: None,
        })
    }

    /// Returns the address of this entry.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Returns the root this entry lives under.
    pub fn root(&self) -> RootKey {
        self.root
    }

    /// Returns the display name, `(default)` for the unnamed value.
    pub fn name(&self) -> String {
        if self.address.raw_name().is_empty() {
            DEFAULT_VALUE_NAME.to_string()
        } else {
            self.address.name()
        }
    }

    /// Value captured when this entry was enumerated, if any.
    pub fn value(&self) -> Option<&ValueData> {
        self.value.as_ref()
    }

    /// Reads the current value from the store.
    pub fn read_value<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<ValueData> {
        let guard = open_key(store, self.root, &self.parent()?, AccessFlags::read())?;
        store.get_value(&guard, self.address.raw_name())
    }

    fn parent(&self) -> Result<Address> {
        self.address
            .parent()
            .ok_or_else(|| RegistryError::malformed_address("entry without parent"))
    }

    fn try_delete<S: NamespaceStore + ?Sized>(&self, store: &S, preview: bool) -> Result<()> {
        let access = AccessFlags::new(AccessFlags::QUERY_VALUE | AccessFlags::SET_VALUE);
        let guard = open_key(store, self.root, &self.parent()?, access)?;
        let name = self.address.raw_name();

        if preview {
            store.get_value(&guard, name)?;
            info!(entry = %self.address, "Would delete value");
            return Ok(());
        }

        store.delete_value(&guard, name)?;
        info!(entry = %self.address, "Deleted value");
        Ok(())
    }
}

impl Node for EntryKey {
    fn address(&self) -> Cow<'_, Address> {
        Cow::Borrowed(&self.address)
    }

    fn exists<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<bool> {
        if entry_exists(store, self.root, &self.address)? {
            return Ok(true);
        }
        container_exists(store, self.root, &self.address)
    }

    fn metadata<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<KeyInfo> {
        let guard = open_key(store, self.root, &self.parent()?, AccessFlags::read())?;
        store.get_value(&guard, self.address.raw_name())?;
        let parent = store.query_info(&guard)?;
        Ok(KeyInfo {
            subkey_count: 0,
            value_count: 0,
            last_written: parent.last_written,
        })
    }

    fn children<S: NamespaceStore + ?Sized>(&self, _store: &S) -> Result<Vec<Key>> {
        Ok(Vec::new())
    }

    #[instrument(skip(self, store), fields(entry = %self.address))]
    fn delete<S: NamespaceStore + ?Sized>(&self, store: &S, preview: bool) -> bool {
        settle(&self.address, preview, self.try_delete(store, preview))
    }
}

/// Any node in the namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// One of the five roots.
    Root(RootKey),

    /// A container below a root.
    Container(ContainerKey),

    /// A terminal entry.
    Entry(EntryKey),
}

impl Key {
    /// Builds a container-like node: a root address yields `Key::Root`.
    pub fn container(address: Address) -> Result<Self> {
        let root = require_root(&address)?;
        if address.is_root() {
            return Ok(Key::Root(root));
        }
        ContainerKey::new(address).map(Key::Container)
    }

    /// Builds an entry node.
    pub fn entry(address: Address) -> Result<Self> {
        EntryKey::new(address).map(Key::Entry)
    }

    /// Returns the display name of this node.
    pub fn name(&self) -> String {
        match self {
            Key::Root(root) => root.name().to_string(),
            Key::Container(container) => container.name(),
            Key::Entry(entry) => entry.name(),
        }
    }

    /// Returns the root this node lives under.
    pub fn root(&self) -> RootKey {
        match self {
            Key::Root(root) => *root,
            Key::Container(container) => container.root(),
            Key::Entry(entry) => entry.root(),
        }
    }

    /// Returns true for roots and containers.
    pub fn is_container(&self) -> bool {
        !self.is_entry()
    }

    /// Returns true for entries.
    pub fn is_entry(&self) -> bool {
        matches!(self, Key::Entry(_))
    }

    /// Returns the entry view, if this is an entry.
    pub fn as_entry(&self) -> Option<&EntryKey> {
        match self {
            Key::Entry(entry) => Some(entry),
            _ => None,
        }
    }
}

impl Node for Key {
    fn address(&self) -> Cow<'_, Address> {
        match self {
            Key::Root(root) => root.address(),
            Key::Container(container) => Node::address(container),
            Key::Entry(entry) => Node::address(entry),
        }
    }

    fn exists<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<bool> {
        match self {
            Key::Root(root) => root.exists(store),
            Key::Container(container) => container.exists(store),
            Key::Entry(entry) => entry.exists(store),
        }
    }

    fn metadata<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<KeyInfo> {
        match self {
            Key::Root(root) => root.metadata(store),
            Key::Container(container) => container.metadata(store),
            Key::Entry(entry) => entry.metadata(store),
        }
    }

    fn children<S: NamespaceStore + ?Sized>(&self, store: &S) -> Result<Vec<Key>> {
        match self {
            Key::Root(root) => root.children(store),
            Key::Container(container) => container.children(store),
            Key::Entry(entry) => entry.children(store),
        }
    }

    fn delete<S: NamespaceStore + ?Sized>(&self, store: &S, preview: bool) -> bool {
        match self {
            Key::Root(root) => root.delete(store, preview),
            Key::Container(container) => container.delete(store, preview),
            Key::Entry(entry) => entry.delete(store, preview),
        }
    }
}

impl From<RootKey> for Key {
    fn from(root: RootKey) -> Self {
        Key::Root(root)
    }
}

impl From<ContainerKey> for Key {
    fn from(container: ContainerKey) -> Self {
        Key::Container(container)
    }
}

impl From<EntryKey> for Key {
    fn from(entry: EntryKey) -> Self {
        Key::Entry(entry)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address())
    }
}
