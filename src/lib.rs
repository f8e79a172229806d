//! # Registry Namespace Sweeper
//!
//! Addressing, traversal and bulk deletion over a hierarchical,
//! Windows-registry-style namespace.
//!
//! ## Features
//!
//! - **Path-aware addresses**: values named after filesystem paths
//!   (`C:\Tools\app.exe`, `\\host\share`) stay a single segment
//! - **Typed nodes**: roots, containers and entries behind one [`Key`] type
//! - **Lazy walking**: children are read only when reached; denied branches
//!   are skipped, not fatal
//! - **Bottom-up deletion**: leaves before parents, with bounded retries for
//!   subtrees that change underneath the deleter
//! - **Pluggable stores**: every operation runs over a [`NamespaceStore`];
//!   [`MemoryStore`] ships for tests and offline use
//! - **Firewall helpers**: `netsh advfirewall` rule listing parser and
//!   rule builders
//!
//! ## Architecture
//!
//! 1. **Address**: immutable segment sequences with drive/UNC-aware composition
//! 2. **Store**: the capability trait and RAII key handles
//! 3. **Key**: nodes that open, use and close their own handles
//! 4. **Walk**: depth-first iterator, entries before containers at each level
//! 5. **Delete**: reversed walk order, worklist retried in passes
//!
//! ## Examples
//!
//! ### Walking a subtree
//!
//! ```rust
//! use reg_sweep::{walk, Address, Key, MemoryStore, ValueData};
//!
//! # fn main() -> reg_sweep::Result<()> {
//! let store = MemoryStore::new();
//! let layers = Address::parse(r"HKCU\Software\Layers")?;
//! store.set_value(&layers, r"C:\Tools\app.exe", ValueData::String("RUNASADMIN".into()))?;
//!
//! let node = Key::container(layers)?;
//! for key in walk(&store, &node).nodes() {
//!     println!("{}", key);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Deleting a subtree
//!
//! ```rust
//! use reg_sweep::{Address, DeleteOptions, Key, MemoryStore, TreeDeleter};
//!
//! # fn main() -> reg_sweep::Result<()> {
//! let store = MemoryStore::new();
//! store.create_key(&Address::parse(r"HKCU\Software\Old\Cache")?)?;
//!
//! let node = Key::container(Address::parse(r"HKCU\Software\Old")?)?;
//! let preview = TreeDeleter::with_options(&store, DeleteOptions::new().preview(true)).run(&node);
//! assert!(preview.success());
//!
//! let report = TreeDeleter::new(&store).run(&node);
//! assert!(report.success());
//! assert!(!store.contains_key(&Address::parse(r"HKCU\Software\Old")?));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod delete;
pub mod error;
pub mod firewall;
pub mod key;
pub mod memory;
pub mod netsh;
pub mod registry;
pub mod root;
pub mod store;
pub mod utils;
pub mod value;
pub mod walk;

#[cfg(feature = "python")]
pub mod python;

// Re-export main types
pub use address::{Address, Tail, SEPARATOR};
pub use delete::{delete_tree, DeleteOptions, DeleteReport, TreeDeleter};
pub use error::{RegistryError, Result};
pub use firewall::{CommandOutput, CommandRunner, Firewall, SystemRunner};
pub use key::{ContainerKey, EntryKey, Key, Node, DEFAULT_VALUE_NAME};
pub use memory::{MemoryHandle, MemoryStore};
pub use netsh::{parse_output, parse_rules, Rule};
pub use registry::Registry;
pub use root::{AccessFlags, RootKey};
pub use store::{KeyGuard, KeyInfo, NamespaceStore};
pub use value::{ValueData, ValueType};
pub use walk::{walk, Walk, WalkEntry, WalkOptions};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
