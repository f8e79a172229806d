//! Utility functions for string decoding and path-fragment detection.

use crate::error::{RegistryError, Result};
use encoding_rs::UTF_16LE;

/// Reads a UTF-16LE string from a byte slice, trimming null terminators.
///
/// Registry strings are typically null-terminated. This function decodes
/// UTF-16LE data and removes trailing null characters.
///
/// # Errors
///
/// Returns an error if the data length is not even (UTF-16 requires 2-byte units)
/// or if the UTF-16 decoding fails.
pub fn read_utf16_string(data: &[u8]) -> Result<String> {
    if data.is_empty() {
        return Ok(String::new());
    }

    if data.len() % 2 != 0 {
        return Err(RegistryError::InvalidUtf16 { len: data.len() });
    }

    let (decoded, _encoding, had_errors) = UTF_16LE.decode(data);

    if had_errors {
        return Err(RegistryError::InvalidUtf16 { len: data.len() });
    }

    Ok(decoded.trim_end_matches('\0').to_string())
}

/// Encodes a string as null-terminated UTF-16LE.
pub fn write_utf16_string(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}

/// Strips control characters so a name is safe to print.
///
/// Only used for display; the unmodified name is what gets sent to a store.
pub fn sanitize_display(name: &str) -> String {
    name.chars().filter(|c| !c.is_control()).collect()
}

/// Returns true if `text` starts with a drive letter (`C:`) fragment.
///
/// The colon must be followed by a slash, a backslash, or the end of the text.
pub fn has_drive_prefix(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'\\' || bytes[2] == b'/')
}

/// Returns true if `text` starts with a UNC (`\\host\share` or `//host/share`) fragment.
pub fn has_unc_prefix(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() > 2
        && matches!(&bytes[..2], b"\\\\" | b"//")
        && bytes[2] != b'\\'
        && bytes[2] != b'/'
}

/// Returns true if `text` starts with a filesystem path fragment.
///
/// Such fragments are opaque leaf names inside the namespace and must never
/// be split on the hierarchy separator.
pub fn has_path_prefix(text: &str) -> bool {
    has_drive_prefix(text) || has_unc_prefix(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16_roundtrip() {
        let encoded = write_utf16_string("Hello");
        assert_eq!(encoded.len(), 12);
        assert_eq!(read_utf16_string(&encoded).unwrap(), "Hello");
    }

    #[test]
    fn test_utf16_odd_length() {
        assert!(read_utf16_string(&[0x41, 0x00, 0x42]).is_err());
    }

    #[test]
    fn test_sanitize_display() {
        assert_eq!(sanitize_display("Run\u{0}\u{7}Once\n"), "RunOnce");
        assert_eq!(sanitize_display("plain"), "plain");
    }

    #[test]
    fn test_drive_prefix() {
        assert!(has_drive_prefix("C:"));
        assert!(has_drive_prefix("c:\\Windows"));
        assert!(has_drive_prefix("D:/data"));
        assert!(!has_drive_prefix("C:Windows"));
        assert!(!has_drive_prefix("Software"));
        assert!(!has_drive_prefix("1:\\x"));
    }

    #[test]
    fn test_unc_prefix() {
        assert!(has_unc_prefix("\\\\server\\share"));
        assert!(has_unc_prefix("//server/share"));
        assert!(!has_unc_prefix("\\\\\\triple"));
        assert!(!has_unc_prefix("\\single"));
        assert!(!has_unc_prefix("\\\\"));
    }
}
