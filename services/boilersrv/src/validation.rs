//! Sanitization of values read from the boiler
//!
//! Order of checks:
//! 1. absent value
//! 2. non-finite float
//! 3. the `999` "not connected" sentinel
//! 4. bounds declared in the parameter map (min, max, max_delta)
//! 5. keyword table, only when nothing is declared
//!
//! Text values pass once present.

use std::fmt;

use econet_protocol::constants::SENTINEL_VALUE;
use econet_protocol::{ParamValue, ParameterDef};

/// Plausible ranges by slug keyword, first match wins
pub const KEYWORD_RANGES: &[(&str, f64, f64)] = &[
    ("temp", -20.0, 100.0),
    ("power", 0.0, 100.0),
    ("fan", 0.0, 100.0),
    ("valveposition", 0.0, 100.0),
    ("pressure", 0.0, 4.0),
    ("lambda", 0.0, 25.0),
];

/// Why a value was not accepted
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Absent,
    NotFinite,
    Sentinel,
    BelowMin { value: f64, min: f64 },
    AboveMax { value: f64, max: f64 },
    DeltaExceeded { delta: f64, max_delta: f64 },
    OutOfRange { keyword: &'static str, value: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Absent => write!(f, "no value"),
            Rejection::NotFinite => write!(f, "not a finite number"),
            Rejection::Sentinel => write!(f, "sentinel {}", SENTINEL_VALUE),
            Rejection::BelowMin { value, min } => write!(f, "{} below min {}", value, min),
            Rejection::AboveMax { value, max } => write!(f, "{} above max {}", value, max),
            Rejection::DeltaExceeded { delta, max_delta } => {
                write!(f, "change {} exceeds max_delta {}", delta, max_delta)
            },
            Rejection::OutOfRange { keyword, value } => {
                write!(f, "{} outside the '{}' range", value, keyword)
            },
        }
    }
}

/// True for the device's `999` placeholder
pub fn is_sentinel(value: &ParamValue) -> bool {
    value.as_f64() == Some(SENTINEL_VALUE)
}

/// Check `value` for `def` against the previously accepted value
pub fn validate(
    def: &ParameterDef,
    value: Option<&ParamValue>,
    previous: Option<&ParamValue>,
) -> Result<(), Rejection> {
    let value = value.ok_or(Rejection::Absent)?;
    let Some(number) = value.as_f64() else {
        return Ok(());
    };

    if !number.is_finite() {
        return Err(Rejection::NotFinite);
    }
    if number == SENTINEL_VALUE {
        return Err(Rejection::Sentinel);
    }

    if def.has_declared_bounds() {
        return check_declared(def, number, previous.and_then(ParamValue::as_f64));
    }

    let slug = def.slug.to_lowercase();
    match KEYWORD_RANGES
        .iter()
        .find(|(keyword, _, _)| slug.contains(keyword))
    {
        Some((keyword, lo, hi)) if number < *lo || number > *hi => Err(Rejection::OutOfRange {
            keyword,
            value: number,
        }),
        _ => Ok(()),
    }
}

fn check_declared(def: &ParameterDef, value: f64, previous: Option<f64>) -> Result<(), Rejection> {
    if let Some(min) = def.min {
        if value < min {
            return Err(Rejection::BelowMin { value, min });
        }
    }
    if let Some(max) = def.max {
        if value > max {
            return Err(Rejection::AboveMax { value, max });
        }
    }
    if let (Some(max_delta), Some(prev)) = (def.max_delta, previous) {
        let delta = (value - prev).abs();
        if delta > max_delta {
            return Err(Rejection::DeltaExceeded { delta, max_delta });
        }
    }
    Ok(())
}
