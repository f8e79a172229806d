//! Hierarchical addresses into the registry namespace.
//!
//! An [`Address`] is an immutable, non-empty sequence of segments. When the
//! first segment names one of the five roots the address is absolute,
//! otherwise it is relative.
//!
//! Segments are split on `\`, with one exception: a fragment that starts
//! with a drive letter (`C:\...`) or a UNC prefix (`\\host\share`) is kept as a
//! single opaque segment. Such fragments show up as value names (for example
//! under `AppCompatFlags\Layers`) and are leaves, not further hierarchy.
//!
//! ```text
//! HKLM\Software\Layers\C:\Tools\app.exe
//! [HKLM] [Software] [Layers] [C:\Tools\app.exe]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{RegistryError, Result};
use crate::root::RootKey;
use crate::utils::{has_path_prefix, sanitize_display};

/// Hierarchy separator used by the namespace.
pub const SEPARATOR: char = '\\';

/// A normalized path identifying a node in the namespace.
///
/// Equality and ordering compare the segment sequence exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    segments: Vec<String>,
}

/// The forms a tail can take when composing addresses.
#[derive(Debug, Clone, Copy)]
pub enum Tail<'a> {
    /// Text, split on the separator unless it carries a path prefix.
    Text(&'a str),

    /// Another address; its segments are appended as they are.
    Address(&'a Address),

    /// A filesystem path value.
    Path(&'a Path),
}

impl<'a> From<&'a str> for Tail<'a> {
    fn from(text: &'a str) -> Self {
        Tail::Text(text)
    }
}

impl<'a> From<&'a String> for Tail<'a> {
    fn from(text: &'a String) -> Self {
        Tail::Text(text.as_str())
    }
}

impl<'a> From<&'a Address> for Tail<'a> {
    fn from(address: &'a Address) -> Self {
        Tail::Address(address)
    }
}

impl<'a> From<&'a Path> for Tail<'a> {
    fn from(path: &'a Path) -> Self {
        Tail::Path(path)
    }
}

impl<'a> From<&'a PathBuf> for Tail<'a> {
    fn from(path: &'a PathBuf) -> Self {
        Tail::Path(path.as_path())
    }
}

/// Splits text into hierarchy segments.
///
/// Empty segments produced by doubled separators are dropped. Once the
/// remaining text starts with a drive or UNC fragment, the rest is kept whole.
fn split_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut rest = text;

    loop {
        if has_path_prefix(rest) {
            segments.push(rest.to_string());
            break;
        }

        match rest.find(SEPARATOR) {
            Some(idx) => {
                let head = &rest[..idx];
                if !head.is_empty() {
                    segments.push(head.to_string());
                }
                rest = &rest[idx + SEPARATOR.len_utf8()..];
            }
            None => {
                if !rest.is_empty() {
                    segments.push(rest.to_string());
                }
                break;
            }
        }
    }

    segments
}

impl Address {
    /// Builds an address from explicit segments.
    ///
    /// Segments are taken verbatim; no splitting happens here.
    ///
    /// # Errors
    ///
    /// Returns `MalformedAddress` if there are no segments.
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(RegistryError::malformed_address("address has no segments"));
        }
        Ok(Self { segments })
    }

    /// Parses an address from its textual form.
    ///
    /// # Errors
    ///
    /// Returns `MalformedAddress` if the text contains no segments.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use reg_sweep::Address;
    /// let address = Address::parse(r"HKLM\Software\Layers\C:\Tools\app.exe").unwrap();
    /// assert_eq!(address.segment_count(), 4);
    /// assert_eq!(address.raw_name(), r"C:\Tools\app.exe");
    /// assert!(address.is_absolute());
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let segments = split_segments(text);
        if segments.is_empty() {
            return Err(RegistryError::malformed_address(format!("'{}' has no segments", text)));
        }
        Ok(Self { segments })
    }

    /// Returns the address of a root itself.
    pub fn from_root(root: RootKey) -> Self {
        Self {
            segments: vec![root.name().to_string()],
        }
    }

    /// Re-prefixes a root-relative address with `root`.
    ///
    /// `None` yields the root address itself.
    pub fn with_relative(root: RootKey, relative: Option<&Address>) -> Self {
        let mut segments = vec![root.name().to_string()];
        if let Some(relative) = relative {
            segments.extend(relative.segments.iter().cloned());
        }
        Self { segments }
    }

    /// Returns the segments of this address.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the number of segments (always at least one).
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Returns the last segment exactly as stored.
    pub fn raw_name(&self) -> &str {
        // Non-empty by construction.
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Returns the last segment with control characters stripped, for display.
    pub fn name(&self) -> String {
        sanitize_display(self.raw_name())
    }

    /// Returns the root named by the first segment, if any.
    pub fn root(&self) -> Option<RootKey> {
        self.segments.first().and_then(|first| RootKey::from_name(first))
    }

    /// Returns the root segment as an address, spelled as it appears here.
    pub fn root_address(&self) -> Option<Address> {
        self.root().map(|_| Self {
            segments: vec![self.segments[0].clone()],
        })
    }

    /// Returns true if the first segment names a root.
    pub fn is_absolute(&self) -> bool {
        self.root().is_some()
    }

    /// Returns true if the address is not anchored at a root.
    pub fn is_relative(&self) -> bool {
        !self.is_absolute()
    }

    /// Returns true if this address is exactly a root.
    pub fn is_root(&self) -> bool {
        self.segments.len() == 1 && self.is_absolute()
    }

    /// Returns all but the last segment, or `None` for a single segment.
    pub fn parent(&self) -> Option<Address> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Returns the segments after the root.
    ///
    /// Returns `None` when the address is the root itself. A relative address
    /// has nothing to strip and is returned whole.
    pub fn relative_to_root(&self) -> Option<Address> {
        if !self.is_absolute() {
            return Some(self.clone());
        }
        if self.segments.len() == 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[1..].to_vec(),
        })
    }

    /// Returns the root-relative path submitted to a store.
    ///
    /// This is the verbatim text of the segments after the root, joined by
    /// the separator; it is empty for a root address.
    pub fn store_path(&self) -> String {
        self.relative_to_root()
            .map(|relative| relative.to_string())
            .unwrap_or_default()
    }

    /// Returns a new address with `name` appended as exactly one segment.
    ///
    /// Use this for names returned by store enumeration, which are always a
    /// single node name even when they contain separators.
    pub fn child(&self, name: &str) -> Address {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    /// Composes this address with a tail, returning a new address.
    ///
    /// Text and path tails that start with a drive letter or UNC prefix become
    /// one opaque trailing segment. Other text is split into hierarchy
    /// segments. Address tails contribute their segments unchanged.
    ///
    /// # Errors
    ///
    /// Returns `MalformedAddress` for a path tail that is not valid UTF-8.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use reg_sweep::Address;
    /// let base = Address::new(["HKLM", "a"]).unwrap();
    /// let composed = base.compose(r"C:\Users\x").unwrap();
    /// assert_eq!(composed.segments(), ["HKLM", "a", r"C:\Users\x"]);
    ///
    /// let composed = base.compose(r"b\c").unwrap();
    /// assert_eq!(composed.segments(), ["HKLM", "a", "b", "c"]);
    /// ```
    pub fn compose<'a>(&self, tail: impl Into<Tail<'a>>) -> Result<Address> {
        let extra = match tail.into() {
            Tail::Text(text) => Self::tail_segments(text),
            Tail::Address(address) => address.segments.clone(),
            Tail::Path(path) => {
                let text = path.to_str().ok_or_else(|| {
                    RegistryError::malformed_address(format!(
                        "path '{}' is not valid UTF-8",
                        path.display()
                    ))
                })?;
                Self::tail_segments(text)
            }
        };

        let mut segments = self.segments.clone();
        segments.extend(extra);
        Ok(Self { segments })
    }

    fn tail_segments(text: &str) -> Vec<String> {
        if has_path_prefix(text) {
            vec![text.to_string()]
        } else {
            split_segments(text)
        }
    }

    /// Returns true if `prefix` is this address or one of its ancestors.
    pub fn starts_with(&self, prefix: &Address) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self
                .segments
                .iter()
                .zip(&prefix.segments)
                .all(|(a, b)| a == b)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<RootKey> for Address {
    fn from(root: RootKey) -> Self {
        Self::from_root(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let address = Address::parse(r"HKEY_LOCAL_MACHINE\Software\Vendor").unwrap();
        assert_eq!(address.segments(), ["HKEY_LOCAL_MACHINE", "Software", "Vendor"]);
        assert_eq!(address.root(), Some(RootKey::LocalMachine));
        assert_eq!(address.store_path(), r"Software\Vendor");
    }

    #[test]
    fn test_parse_drops_empty_segments() {
        let address = Address::parse(r"HKCU\\Software\").unwrap();
        assert_eq!(address.segments(), ["HKCU", "Software"]);
    }

    #[test]
    fn test_parse_empty_is_malformed() {
        assert!(matches!(Address::parse(""), Err(RegistryError::MalformedAddress(_))));
        assert!(matches!(Address::parse(r"\"), Err(RegistryError::MalformedAddress(_))));
        assert!(Address::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_parse_embedded_unc() {
        let address = Address::parse(r"HKCU\Layers\\\server\share\tool.exe").unwrap();
        assert_eq!(address.segments(), ["HKCU", "Layers", r"\\server\share\tool.exe"]);
    }

    #[test]
    fn test_compose_drive_tail_is_opaque() {
        let base = Address::new(["ROOT", "a"]).unwrap();
        let composed = base.compose(r"C:\Users\x").unwrap();
        assert_eq!(composed.segment_count(), 3);
        assert_eq!(composed.raw_name(), r"C:\Users\x");
        assert_eq!(composed.parent(), Some(base));
    }

    #[test]
    fn test_compose_path_tail() {
        let base = Address::parse(r"HKLM\Layers").unwrap();
        let path = PathBuf::from(r"\\host\share\app.exe");
        let composed = base.compose(&path).unwrap();
        assert_eq!(composed.segments(), ["HKLM", "Layers", r"\\host\share\app.exe"]);
    }

    #[test]
    fn test_compose_address_tail() {
        let base = Address::parse("HKLM").unwrap();
        let tail = Address::new(["Software", r"C:\odd"]).unwrap();
        let composed = base.compose(&tail).unwrap();
        assert_eq!(composed.segments(), ["HKLM", "Software", r"C:\odd"]);
    }

    #[test]
    fn test_compose_does_not_mutate() {
        let base = Address::parse(r"HKLM\Software").unwrap();
        let _ = base.compose("Vendor").unwrap();
        assert_eq!(base.segment_count(), 2);
    }

    #[test]
    fn test_relative_addresses() {
        let address = Address::parse(r"Software\Vendor").unwrap();
        assert!(address.is_relative());
        assert_eq!(address.root(), None);
        assert_eq!(address.relative_to_root(), Some(address.clone()));
    }

    #[test]
    fn test_root_relative_is_none() {
        let address = Address::from_root(RootKey::Users);
        assert!(address.is_root());
        assert_eq!(address.relative_to_root(), None);
        assert_eq!(address.store_path(), "");
        assert_eq!(address.parent(), None);
    }

    #[test]
    fn test_display_name_is_sanitized() {
        let address = Address::new(["HKLM", "bad\u{1}name"]).unwrap();
        assert_eq!(address.name(), "badname");
        assert_eq!(address.raw_name(), "bad\u{1}name");
        assert_eq!(address.store_path(), "bad\u{1}name");
    }

    #[test]
    fn test_child_keeps_separators() {
        let address = Address::parse("HKCU").unwrap().child(r"a\b");
        assert_eq!(address.segment_count(), 2);
        assert_eq!(address.raw_name(), r"a\b");
    }

    #[test]
    fn test_starts_with() {
        let parent = Address::parse(r"HKLM\Software").unwrap();
        let child = Address::parse(r"HKLM\Software\Vendor").unwrap();
        assert!(child.starts_with(&parent));
        assert!(parent.starts_with(&parent));
        assert!(!parent.starts_with(&child));
    }
}
