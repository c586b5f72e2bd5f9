//! Parameter map: slug -> parameter definition
//!
//! Loaded once from JSON, validated eagerly, read-only afterwards.
//!
//! ```json
//! {
//!   "tempcwu": { "id": 1281, "type": "BYTE", "exponent": 0 },
//!   "boilertemp": { "id": 1024, "type": "FLOAT", "exponent": 0, "min": 0, "max": 95 }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProtocolError, Result};
use crate::types::DataType;

/// How a decimal exponent relates wire values to engineering values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExponentConvention {
    /// decode = raw * 10^exp, encode = value / 10^exp
    #[default]
    Multiply,
    /// decode = raw / 10^exp, encode = value * 10^exp
    Divide,
}

impl ExponentConvention {
    /// Wire value -> engineering value
    pub fn decode_scale(&self, raw: f64, exponent: i32) -> f64 {
        match self {
            ExponentConvention::Multiply => raw * 10f64.powi(exponent),
            ExponentConvention::Divide => raw / 10f64.powi(exponent),
        }
    }

    /// Engineering value -> wire value (before rounding)
    pub fn encode_scale(&self, value: f64, exponent: i32) -> f64 {
        match self {
            ExponentConvention::Multiply => value / 10f64.powi(exponent),
            ExponentConvention::Divide => value * 10f64.powi(exponent),
        }
    }
}

/// Definition of one boiler parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDef {
    pub slug: String,
    pub id: u16,
    pub data_type: DataType,
    pub exponent: i32,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub max_delta: Option<f64>,
}

impl ParameterDef {
    /// True when any of min, max, max_delta is declared
    pub fn has_declared_bounds(&self) -> bool {
        self.min.is_some() || self.max.is_some() || self.max_delta.is_some()
    }
}

/// Map file entry; unknown keys (name, unit, ...) are ignored
#[derive(Debug, Deserialize)]
struct RawParameter {
    id: i64,
    #[serde(rename = "type")]
    data_type: String,
    #[serde(default)]
    exponent: i32,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default)]
    max_delta: Option<f64>,
}

impl RawParameter {
    fn validate(self, slug: &str) -> Result<ParameterDef> {
        let fail = |reason: String| ProtocolError::config(format!("parameter '{}': {}", slug, reason));

        let id = u16::try_from(self.id)
            .map_err(|_| fail(format!("id {} outside 0..=65535", self.id)))?;
        let data_type: DataType = self
            .data_type
            .parse()
            .map_err(|_| fail(format!("unknown type '{}'", self.data_type)))?;

        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(fail(format!("min {} greater than max {}", min, max)));
            }
        }
        if let Some(delta) = self.max_delta {
            if delta < 0.0 {
                return Err(fail(format!("negative max_delta {}", delta)));
            }
        }
        if !(-9..=9).contains(&self.exponent) {
            return Err(fail(format!("exponent {} out of range", self.exponent)));
        }

        Ok(ParameterDef {
            slug: slug.to_string(),
            id,
            data_type,
            exponent: self.exponent,
            min: self.min,
            max: self.max,
            max_delta: self.max_delta,
        })
    }
}

/// Immutable slug -> definition map
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    params: BTreeMap<String, ParameterDef>,
}

impl ParameterMap {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawParameter> = serde_json::from_str(json)?;
        let params = raw
            .into_iter()
            .map(|(slug, entry)| entry.validate(&slug).map(|def| (slug, def)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { params })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::config(format!("cannot read parameter map {}: {}", path.display(), e))
        })?;
        let map = Self::from_json_str(&content)?;
        debug!("Parameter map: {} entries from {}", map.len(), path.display());
        Ok(map)
    }

    pub fn from_defs(defs: impl IntoIterator<Item = ParameterDef>) -> Self {
        Self {
            params: defs.into_iter().map(|d| (d.slug.clone(), d)).collect(),
        }
    }

    pub fn get(&self, slug: &str) -> Option<&ParameterDef> {
        self.params.get(slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.params.contains_key(slug)
    }

    /// Slugs in sorted order
    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
