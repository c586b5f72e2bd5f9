//! Parameter data types and the info byte
//!
//! Wire type codes:
//!
//! | code | type | width |
//! |------|------|-------|
//! | 0x01 | SHORT INT | 1 |
//! | 0x02 | INT | 2 |
//! | 0x03 | LONG INT | 4 |
//! | 0x04 | BYTE | 1 |
//! | 0x05 | WORD | 2 |
//! | 0x06 | DWORD | 4 |
//! | 0x07 | SHORT REAL | 4 |
//! | 0x09 | LONG REAL | 8 (not supported) |
//! | 0x0A | BOOLEAN | 1 |
//! | 0x0C | STRING | variable |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Wire code of LONG REAL, recognised but not decodable here
pub const WIRE_LONG_REAL: u8 = 0x09;

/// Declared type of a boiler parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    /// i8
    ShortInt,
    /// i16
    Int,
    /// i32
    LongInt,
    /// u8
    Byte,
    /// u16
    Word,
    /// u32
    Dword,
    /// f32, little-endian
    Float,
    /// one byte, 0 or 1
    Bool,
    /// UTF-8, NUL terminated
    String,
}

impl DataType {
    /// Fixed width in bytes, `None` for strings
    pub fn size_bytes(&self) -> Option<usize> {
        match self {
            DataType::ShortInt | DataType::Byte | DataType::Bool => Some(1),
            DataType::Int | DataType::Word => Some(2),
            DataType::LongInt | DataType::Dword | DataType::Float => Some(4),
            DataType::String => None,
        }
    }

    pub fn wire_code(&self) -> u8 {
        match self {
            DataType::ShortInt => 0x01,
            DataType::Int => 0x02,
            DataType::LongInt => 0x03,
            DataType::Byte => 0x04,
            DataType::Word => 0x05,
            DataType::Dword => 0x06,
            DataType::Float => 0x07,
            DataType::Bool => 0x0A,
            DataType::String => 0x0C,
        }
    }

    pub fn from_wire_code(code: u8) -> Result<Self, ProtocolError> {
        match code {
            0x01 => Ok(DataType::ShortInt),
            0x02 => Ok(DataType::Int),
            0x03 => Ok(DataType::LongInt),
            0x04 => Ok(DataType::Byte),
            0x05 => Ok(DataType::Word),
            0x06 => Ok(DataType::Dword),
            0x07 => Ok(DataType::Float),
            0x0A => Ok(DataType::Bool),
            0x0C => Ok(DataType::String),
            WIRE_LONG_REAL => Err(ProtocolError::config("LONG REAL (0x09) is not supported")),
            other => Err(ProtocolError::config(format!(
                "unknown data type code 0x{:02X}",
                other
            ))),
        }
    }

    /// Canonical name as used in parameter map files
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::ShortInt => "SHORT_INT",
            DataType::Int => "INT",
            DataType::LongInt => "LONG_INT",
            DataType::Byte => "BYTE",
            DataType::Word => "WORD",
            DataType::Dword => "DWORD",
            DataType::Float => "FLOAT",
            DataType::Bool => "BOOL",
            DataType::String => "STRING",
        }
    }

    /// Inclusive raw range of integer types
    pub fn integer_range(&self) -> Option<(i64, i64)> {
        match self {
            DataType::ShortInt => Some((i8::MIN.into(), i8::MAX.into())),
            DataType::Int => Some((i16::MIN.into(), i16::MAX.into())),
            DataType::LongInt => Some((i32::MIN.into(), i32::MAX.into())),
            DataType::Byte => Some((0, u8::MAX.into())),
            DataType::Word => Some((0, u16::MAX.into())),
            DataType::Dword => Some((0, u32::MAX.into())),
            _ => None,
        }
    }
}

impl FromStr for DataType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "SHORT_INT" | "SHORTINT" | "I8" => Ok(DataType::ShortInt),
            "INT" | "I16" => Ok(DataType::Int),
            "LONG_INT" | "LONGINT" | "I32" => Ok(DataType::LongInt),
            "BYTE" | "U8" => Ok(DataType::Byte),
            "WORD" | "U16" => Ok(DataType::Word),
            "DWORD" | "U32" => Ok(DataType::Dword),
            "FLOAT" | "SHORT_REAL" | "F32" => Ok(DataType::Float),
            "BOOL" | "BOOLEAN" => Ok(DataType::Bool),
            "STRING" => Ok(DataType::String),
            _ => Err(ProtocolError::config(format!("unknown data type '{}'", s))),
        }
    }
}

impl TryFrom<String> for DataType {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Parameter info byte: bits 0-3 type code, bit 4 readable, bit 5 modifiable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterInfo(pub u8);

impl ParameterInfo {
    const TYPE_MASK: u8 = 0x0F;
    const READABLE: u8 = 0x10;
    const MODIFIABLE: u8 = 0x20;

    pub fn data_type_code(&self) -> u8 {
        self.0 & Self::TYPE_MASK
    }

    pub fn data_type(&self) -> Result<DataType, ProtocolError> {
        DataType::from_wire_code(self.data_type_code())
    }

    pub fn is_readable(&self) -> bool {
        self.0 & Self::READABLE != 0
    }

    pub fn is_modifiable(&self) -> bool {
        self.0 & Self::MODIFIABLE != 0
    }
}

impl fmt::Display for ParameterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.is_readable() { 'R' } else { '-' };
        let w = if self.is_modifiable() { 'W' } else { '-' };
        match self.data_type() {
            Ok(t) => write!(f, "{}{} {}", r, w, t),
            Err(_) => write!(f, "{}{} 0x{:02X}", r, w, self.data_type_code()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("SHORT_INT".parse::<DataType>().unwrap(), DataType::ShortInt);
        assert_eq!("word".parse::<DataType>().unwrap(), DataType::Word);
        assert_eq!("Boolean".parse::<DataType>().unwrap(), DataType::Bool);
        assert_eq!("BOOL".parse::<DataType>().unwrap(), DataType::Bool);
        assert_eq!("long int".parse::<DataType>().unwrap(), DataType::LongInt);
        assert!("DOUBLE".parse::<DataType>().is_err());
    }

    #[test]
    fn test_wire_codes() {
        for t in [
            DataType::ShortInt,
            DataType::Int,
            DataType::LongInt,
            DataType::Byte,
            DataType::Word,
            DataType::Dword,
            DataType::Float,
            DataType::Bool,
            DataType::String,
        ] {
            assert_eq!(DataType::from_wire_code(t.wire_code()).unwrap(), t);
        }
        assert!(DataType::from_wire_code(WIRE_LONG_REAL).is_err());
        assert!(DataType::from_wire_code(0x0F).is_err());
    }

    #[test]
    fn test_info_byte() {
        // readable + modifiable WORD
        let info = ParameterInfo(0x35);
        assert!(info.is_readable());
        assert!(info.is_modifiable());
        assert_eq!(info.data_type().unwrap(), DataType::Word);
        assert_eq!(info.to_string(), "RW WORD");

        // read-only LONG REAL
        let info = ParameterInfo(0x19);
        assert!(info.is_readable());
        assert!(!info.is_modifiable());
        assert!(info.data_type().is_err());
        assert_eq!(info.to_string(), "R- 0x09");
    }

    #[test]
    fn test_serde_name() {
        let t: DataType = serde_json::from_str("\"dword\"").unwrap();
        assert_eq!(t, DataType::Dword);
        assert_eq!(serde_json::to_string(&DataType::Float).unwrap(), "\"FLOAT\"");
    }
}
