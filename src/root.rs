//! Well-known registry roots and access masks.
//!
//! The namespace has exactly five top-level anchors. Each one is known by a
//! long name (`HKEY_LOCAL_MACHINE`), an abbreviation (`HKLM`), and an opaque
//! platform handle value that stores receive when a key is opened.

use std::fmt;
use std::str::FromStr;

use crate::error::{RegistryError, Result};

/// One of the five top-level registry hives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RootKey {
    /// `HKEY_CLASSES_ROOT`.
    ClassesRoot,

    /// `HKEY_CURRENT_USER`.
    CurrentUser,

    /// `HKEY_LOCAL_MACHINE`.
    LocalMachine,

    /// `HKEY_USERS`.
    Users,

    /// `HKEY_CURRENT_CONFIG`.
    CurrentConfig,
}

impl RootKey {
    /// All roots, in platform handle order.
    pub const ALL: [RootKey; 5] = [
        RootKey::ClassesRoot,
        RootKey::CurrentUser,
        RootKey::LocalMachine,
        RootKey::Users,
        RootKey::CurrentConfig,
    ];

    /// Returns the canonical long name of this root.
    pub fn name(&self) -> &'static str {
        match self {
            RootKey::ClassesRoot => "HKEY_CLASSES_ROOT",
            RootKey::CurrentUser => "HKEY_CURRENT_USER",
            RootKey::LocalMachine => "HKEY_LOCAL_MACHINE",
            RootKey::Users => "HKEY_USERS",
            RootKey::CurrentConfig => "HKEY_CURRENT_CONFIG",
        }
    }

    /// Returns the short form of this root.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            RootKey::ClassesRoot => "HKCR",
            RootKey::CurrentUser => "HKCU",
            RootKey::LocalMachine => "HKLM",
            RootKey::Users => "HKU",
            RootKey::CurrentConfig => "HKCC",
        }
    }

    /// Returns the predefined platform handle value for this root.
    pub fn handle(&self) -> u32 {
        match self {
            RootKey::ClassesRoot => 0x8000_0000,
            RootKey::CurrentUser => 0x8000_0001,
            RootKey::LocalMachine => 0x8000_0002,
            RootKey::Users => 0x8000_0003,
            RootKey::CurrentConfig => 0x8000_0005,
        }
    }

    /// Looks up a root by long name or abbreviation, ignoring ASCII case.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use reg_sweep::RootKey;
    /// assert_eq!(RootKey::from_name("hklm"), Some(RootKey::LocalMachine));
    /// assert_eq!(RootKey::from_name("HKEY_USERS"), Some(RootKey::Users));
    /// assert_eq!(RootKey::from_name("Software"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|root| {
            root.name().eq_ignore_ascii_case(name) || root.abbreviation().eq_ignore_ascii_case(name)
        })
    }

    /// Looks up a root by its platform handle value.
    pub fn from_handle(handle: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|root| root.handle() == handle)
    }
}

impl fmt::Display for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RootKey {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| RegistryError::not_found("root", s))
    }
}

/// Access mask requested when opening a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessFlags(pub u32);

impl AccessFlags {
    /// Read value data.
    pub const QUERY_VALUE: u32 = 0x0001;

    /// Create, overwrite or delete values.
    pub const SET_VALUE: u32 = 0x0002;

    /// Create subkeys.
    pub const CREATE_SUB_KEY: u32 = 0x0004;

    /// Enumerate subkeys.
    pub const ENUMERATE_SUB_KEYS: u32 = 0x0008;

    /// Change notifications.
    pub const NOTIFY: u32 = 0x0010;

    /// Delete the key itself.
    pub const DELETE: u32 = 0x0001_0000;

    /// Standard read rights.
    pub const READ: u32 = 0x0002_0019;

    /// Standard write rights.
    pub const WRITE: u32 = 0x0002_0006;

    /// Every right.
    pub const ALL_ACCESS: u32 = 0x000F_003F;

    /// Creates a new AccessFlags from a raw mask.
    pub fn new(flags: u32) -> Self {
        Self(flags)
    }

    /// Standard read access.
    pub fn read() -> Self {
        Self(Self::READ)
    }

    /// Standard write access.
    pub fn write() -> Self {
        Self(Self::WRITE)
    }

    /// Access needed to delete the key itself.
    pub fn delete() -> Self {
        Self(Self::DELETE)
    }

    /// Returns true if the specified flag bits are all set.
    pub fn has_flag(&self, flag: u32) -> bool {
        (self.0 & flag) == flag
    }

    /// Returns true if any read right is requested.
    pub fn wants_read(&self) -> bool {
        (self.0 & (Self::QUERY_VALUE | Self::ENUMERATE_SUB_KEYS | Self::NOTIFY)) != 0
    }

    /// Returns true if any modifying right is requested.
    pub fn wants_write(&self) -> bool {
        (self.0 & (Self::SET_VALUE | Self::CREATE_SUB_KEY | Self::DELETE)) != 0
    }
}

impl Default for AccessFlags {
    fn default() -> Self {
        Self::read()
    }
}
