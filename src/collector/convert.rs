use crate::domain::RawValue;
use crate::error::ConversionFallback;

/// Maps a raw property value onto the gauge's numeric model.
pub type Converter = fn(&RawValue) -> Result<f64, ConversionFallback>;

const MEBIBYTE: f64 = 1024.0 * 1024.0;

fn fallback(raw: &RawValue) -> ConversionFallback {
    ConversionFallback {
        kind: raw.kind(),
        value: raw.to_string(),
    }
}

/// Strict default: only native floating point values pass through.
pub fn identity(raw: &RawValue) -> Result<f64, ConversionFallback> {
    match raw {
        RawValue::Float(v) => Ok(*v),
        _ => Err(fallback(raw)),
    }
}

pub fn numeric(raw: &RawValue) -> Result<f64, ConversionFallback> {
    match raw {
        RawValue::Float(v) => Ok(*v),
        RawValue::Int(v) => Ok(*v as f64),
        _ => Err(fallback(raw)),
    }
}

pub fn boolean(raw: &RawValue) -> Result<f64, ConversionFallback> {
    match raw {
        RawValue::Bool(true) => Ok(1.0),
        RawValue::Bool(false) => Ok(0.0),
        _ => Err(fallback(raw)),
    }
}

/// Seconds since the Unix epoch.
pub fn timestamp_seconds(raw: &RawValue) -> Result<f64, ConversionFallback> {
    match raw {
        RawValue::Timestamp(ts) => Ok(ts.timestamp() as f64),
        _ => Err(fallback(raw)),
    }
}

pub fn bytes_to_megabytes(raw: &RawValue) -> Result<f64, ConversionFallback> {
    numeric(raw).map(|bytes| bytes / MEBIBYTE)
}

pub fn megabytes_to_bytes(raw: &RawValue) -> Result<f64, ConversionFallback> {
    numeric(raw).map(|mb| mb * MEBIBYTE)
}

/// poweredOn 1, poweredOff 2, standBy 3, other 0
pub fn power_state(raw: &RawValue) -> Result<f64, ConversionFallback> {
    match raw.as_text() {
        Some("poweredOn") => Ok(1.0),
        Some("poweredOff") => Ok(2.0),
        Some("standBy") => Ok(3.0),
        Some(_) => Ok(0.0),
        None => Err(fallback(raw)),
    }
}
