//! Typed parameter values and their wire encoding

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::params::ExponentConvention;
use crate::types::DataType;

/// Decoded parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric view used by validation (Bool -> 0/1, Text -> None)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Int(0) => Some(false),
            ParamValue::Int(1) => Some(true),
            ParamValue::Float(v) if *v == 0.0 => Some(false),
            ParamValue::Float(v) if *v == 1.0 => Some(true),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Parse user input according to the declared type
    pub fn parse_for(input: &str, data_type: DataType) -> Result<Self> {
        let input = input.trim();
        match data_type {
            DataType::String => Ok(ParamValue::Text(input.to_string())),
            DataType::Bool => match input.to_lowercase().as_str() {
                "1" | "true" | "on" => Ok(ParamValue::Bool(true)),
                "0" | "false" | "off" => Ok(ParamValue::Bool(false)),
                _ => Err(ProtocolError::encode(format!("'{}' is not a boolean", input))),
            },
            _ => {
                if let Ok(i) = input.parse::<i64>() {
                    Ok(ParamValue::Int(i))
                } else {
                    input
                        .parse::<f64>()
                        .map(ParamValue::Float)
                        .map_err(|_| ProtocolError::encode(format!("'{}' is not a number", input)))
                }
            },
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Encode `value` as the payload bytes of `data_type`
pub fn encode_value(
    value: &ParamValue,
    data_type: DataType,
    exponent: i32,
    convention: ExponentConvention,
) -> Result<Vec<u8>> {
    match data_type {
        DataType::String => match value {
            ParamValue::Text(s) => {
                let mut bytes = Vec::with_capacity(s.len() + 1);
                bytes.extend_from_slice(s.as_bytes());
                bytes.push(0x00);
                Ok(bytes)
            },
            other => Err(ProtocolError::encode(format!(
                "STRING parameter needs text, got {:?}",
                other
            ))),
        },
        DataType::Bool => value
            .as_bool()
            .map(|b| vec![u8::from(b)])
            .ok_or_else(|| ProtocolError::encode(format!("BOOL parameter cannot take {:?}", value))),
        DataType::Float => {
            let v = numeric(value, data_type)?;
            let f = v as f32;
            if !f.is_finite() {
                return Err(ProtocolError::encode(format!("{} does not fit FLOAT", v)));
            }
            Ok(f.to_le_bytes().to_vec())
        },
        _ => {
            let mut v = numeric(value, data_type)?;
            if exponent != 0 {
                v = convention.encode_scale(v, exponent);
            }
            let raw = v.round();
            let (lo, hi) = data_type.integer_range().ok_or_else(|| {
                ProtocolError::encode(format!("{} is not an integer type", data_type))
            })?;
            if !raw.is_finite() || raw < lo as f64 || raw > hi as f64 {
                return Err(ProtocolError::encode(format!(
                    "{} out of range for {} ({}..={})",
                    raw, data_type, lo, hi
                )));
            }
            let raw = raw as i64;
            Ok(match data_type {
                DataType::ShortInt => (raw as i8).to_le_bytes().to_vec(),
                DataType::Byte => (raw as u8).to_le_bytes().to_vec(),
                DataType::Int => (raw as i16).to_le_bytes().to_vec(),
                DataType::Word => (raw as u16).to_le_bytes().to_vec(),
                DataType::LongInt => (raw as i32).to_le_bytes().to_vec(),
                _ => (raw as u32).to_le_bytes().to_vec(),
            })
        },
    }
}

fn numeric(value: &ParamValue, data_type: DataType) -> Result<f64> {
    let v = value.as_f64().ok_or_else(|| {
        ProtocolError::encode(format!("{} parameter cannot take {:?}", data_type, value))
    })?;
    if !v.is_finite() {
        return Err(ProtocolError::encode(format!("non-finite value {}", v)));
    }
    Ok(v)
}

/// Decode payload bytes of `data_type`; trailing bytes are ignored
pub fn decode_value(
    data: &[u8],
    data_type: DataType,
    exponent: i32,
    convention: ExponentConvention,
) -> Result<ParamValue> {
    if let Some(size) = data_type.size_bytes() {
        if data.len() < size {
            return Err(ProtocolError::decode(format!(
                "{} needs {} bytes, got {}",
                data_type,
                size,
                data.len()
            )));
        }
    }

    let scale = |raw: f64| -> ParamValue {
        if exponent != 0 {
            ParamValue::Float(round2(convention.decode_scale(raw, exponent)))
        } else {
            ParamValue::Float(round2(raw))
        }
    };
    let integer = |raw: i64| -> ParamValue {
        if exponent != 0 {
            ParamValue::Float(round2(convention.decode_scale(raw as f64, exponent)))
        } else {
            ParamValue::Int(raw)
        }
    };

    let value = match data_type {
        DataType::ShortInt => integer(i64::from(data[0] as i8)),
        DataType::Byte => integer(i64::from(data[0])),
        DataType::Int => integer(i64::from(i16::from_le_bytes([data[0], data[1]]))),
        DataType::Word => integer(i64::from(u16::from_le_bytes([data[0], data[1]]))),
        DataType::LongInt => integer(i64::from(i32::from_le_bytes([
            data[0], data[1], data[2], data[3],
        ]))),
        DataType::Dword => integer(i64::from(u32::from_le_bytes([
            data[0], data[1], data[2], data[3],
        ]))),
        DataType::Float => {
            let f = f32::from_le_bytes([data[0], data[1], data[2], data[3]]);
            scale(f64::from(f))
        },
        DataType::Bool => ParamValue::Bool(data[0] != 0),
        DataType::String => {
            let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
            ParamValue::Text(String::from_utf8_lossy(&data[..end]).into_owned())
        },
    };
    Ok(value)
}
