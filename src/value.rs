//! Typed registry values and raw data decoding.

use crate::error::{RegistryError, Result};
use crate::utils::{read_utf16_string, write_utf16_string};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::fmt;

/// Registry value data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueType {
    /// No value type.
    None,

    /// String (null-terminated).
    String,

    /// String with environment variables.
    ExpandString,

    /// Binary data.
    Binary,

    /// 32-bit little-endian integer.
    Dword,

    /// 32-bit big-endian integer.
    DwordBigEndian,

    /// Symbolic link (Unicode).
    Link,

    /// Multiple strings.
    MultiString,

    /// Resource list.
    ResourceList,

    /// Full resource descriptor.
    FullResourceDescriptor,

    /// Resource requirements list.
    ResourceRequirementsList,

    /// 64-bit little-endian integer.
    Qword,

    /// Unknown or non-standard value type.
    /// Contains the raw type value.
    Unknown(u32),
}

impl ValueType {
    /// Maps a raw type tag to a value type.
    ///
    /// Tags 0-11 are predefined; any other tag is kept as `ValueType::Unknown`.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => ValueType::None,
            1 => ValueType::String,
            2 => ValueType::ExpandString,
            3 => ValueType::Binary,
            4 => ValueType::Dword,
            5 => ValueType::DwordBigEndian,
            6 => ValueType::Link,
            7 => ValueType::MultiString,
            8 => ValueType::ResourceList,
            9 => ValueType::FullResourceDescriptor,
            10 => ValueType::ResourceRequirementsList,
            11 => ValueType::Qword,
            _ => ValueType::Unknown(value),
        }
    }

    /// Returns the raw type tag.
    pub fn as_u32(&self) -> u32 {
        match self {
            ValueType::None => 0,
            ValueType::String => 1,
            ValueType::ExpandString => 2,
            ValueType::Binary => 3,
            ValueType::Dword => 4,
            ValueType::DwordBigEndian => 5,
            ValueType::Link => 6,
            ValueType::MultiString => 7,
            ValueType::ResourceList => 8,
            ValueType::FullResourceDescriptor => 9,
            ValueType::ResourceRequirementsList => 10,
            ValueType::Qword => 11,
            ValueType::Unknown(value) => *value,
        }
    }

    /// Returns the name of this value type.
    pub fn name(&self) -> String {
        match self {
            ValueType::None => "REG_NONE".to_string(),
            ValueType::String => "REG_SZ".to_string(),
            ValueType::ExpandString => "REG_EXPAND_SZ".to_string(),
            ValueType::Binary => "REG_BINARY".to_string(),
            ValueType::Dword => "REG_DWORD".to_string(),
            ValueType::DwordBigEndian => "REG_DWORD_BIG_ENDIAN".to_string(),
            ValueType::Link => "REG_LINK".to_string(),
            ValueType::MultiString => "REG_MULTI_SZ".to_string(),
            ValueType::ResourceList => "REG_RESOURCE_LIST".to_string(),
            ValueType::FullResourceDescriptor => "REG_FULL_RESOURCE_DESCRIPTOR".to_string(),
            ValueType::ResourceRequirementsList => "REG_RESOURCE_REQUIREMENTS_LIST".to_string(),
            ValueType::Qword => "REG_QWORD".to_string(),
            ValueType::Unknown(value) => format!("REG_UNKNOWN_{:#010x}", value),
        }
    }
}

/// Typed value held by an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueData {
    /// No data.
    None,

    /// String value.
    String(String),

    /// Expandable string value.
    ExpandString(String),

    /// Binary data.
    Binary(Vec<u8>),

    /// 32-bit integer.
    Dword(u32),

    /// 32-bit big-endian integer.
    DwordBigEndian(u32),

    /// Multiple strings.
    MultiString(Vec<String>),

    /// 64-bit integer.
    Qword(u64),

    /// Any other type, kept as raw bytes with its tag.
    Unknown(ValueType, Vec<u8>),
}

fn require_len(data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(RegistryError::TruncatedData {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

impl ValueData {
    /// Decodes raw value bytes according to `value_type`.
    ///
    /// # Arguments
    ///
    /// * `data` - Raw value bytes as a store hands them out.
    /// * `value_type` - Type tag stored alongside the bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if integer data is too short or string data is not
    /// valid UTF-16LE.
    pub fn parse(data: &[u8], value_type: ValueType) -> Result<Self> {
        if data.is_empty() && value_type != ValueType::Binary {
            return Ok(ValueData::None);
        }

        match value_type {
            ValueType::None => Ok(ValueData::None),

            ValueType::String => Ok(ValueData::String(read_utf16_string(data)?)),

            ValueType::ExpandString => Ok(ValueData::ExpandString(read_utf16_string(data)?)),

            ValueType::Binary => Ok(ValueData::Binary(data.to_vec())),

            ValueType::Dword => {
                require_len(data, 4)?;
                Ok(ValueData::Dword(LittleEndian::read_u32(data)))
            }

            ValueType::DwordBigEndian => {
                require_len(data, 4)?;
                Ok(ValueData::DwordBigEndian(BigEndian::read_u32(data)))
            }

            ValueType::Qword => {
                require_len(data, 8)?;
                Ok(ValueData::Qword(LittleEndian::read_u64(data)))
            }

            ValueType::MultiString => {
                let full_string = read_utf16_string(data)?;
                let strings: Vec<String> = full_string
                    .split('\0')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect();
                Ok(ValueData::MultiString(strings))
            }

            other => Ok(ValueData::Unknown(other, data.to_vec())),
        }
    }

    /// Encodes the value back into its raw byte form.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ValueData::None => Vec::new(),
            ValueData::String(s) | ValueData::ExpandString(s) => write_utf16_string(s),
            ValueData::Binary(b) | ValueData::Unknown(_, b) => b.clone(),
            ValueData::Dword(d) => d.to_le_bytes().to_vec(),
            ValueData::DwordBigEndian(d) => d.to_be_bytes().to_vec(),
            ValueData::Qword(q) => q.to_le_bytes().to_vec(),
            ValueData::MultiString(strings) => {
                let mut bytes = Vec::new();
                for s in strings {
                    bytes.extend(write_utf16_string(s));
                }
                bytes.extend([0, 0]);
                bytes
            }
        }
    }

    /// Returns the type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            ValueData::None => ValueType::None,
            ValueData::String(_) => ValueType::String,
            ValueData::ExpandString(_) => ValueType::ExpandString,
            ValueData::Binary(_) => ValueType::Binary,
            ValueData::Dword(_) => ValueType::Dword,
            ValueData::DwordBigEndian(_) => ValueType::DwordBigEndian,
            ValueData::MultiString(_) => ValueType::MultiString,
            ValueData::Qword(_) => ValueType::Qword,
            ValueData::Unknown(value_type, _) => *value_type,
        }
    }

    /// Returns the string payload of string-typed values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ValueData::String(s) | ValueData::ExpandString(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the payload of 32-bit integer values.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ValueData::Dword(d) | ValueData::DwordBigEndian(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for ValueData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueData::None => f.write_str("(none)"),
            ValueData::String(s) | ValueData::ExpandString(s) => f.write_str(s),
            ValueData::Binary(b) | ValueData::Unknown(_, b) => f.write_str(&hex::encode_upper(b)),
            ValueData::Dword(d) | ValueData::DwordBigEndian(d) => write!(f, "{} (0x{:08X})", d, d),
            ValueData::Qword(q) => write!(f, "{} (0x{:016X})", q, q),
            ValueData::MultiString(strings) => f.write_str(&strings.join(", ")),
        }
    }
}
