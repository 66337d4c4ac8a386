//! Sensor frame text format: `T:<temp>,H:<humidity>,P:<pressure>`.
//!
//! Two decoders exist. [`decode_lenient`] pulls whatever fields it can out of a
//! damaged frame and succeeds when at least one value survives.
//! [`decode_strict`] accepts only the exact `T:%d.%d,H:%d.%d,P:%d.%d` shape and
//! fails as a whole. A deployment picks one via [`DecodeStrategy`]; the two are
//! never mixed on the same stream.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::scan;
use crate::error::RelayError;

/// Placeholder for "no valid value".
pub const SENTINEL: f32 = 9999.0;
/// How [`SENTINEL`] appears on the wire.
pub const SENTINEL_TEXT: &str = "9999.00";

const LABELS: [&str; 3] = ["T:", "H:", "P:"];
const STRICT_SEPARATORS: [&str; 3] = ["T:", ",H:", ",P:"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature: f32,
    pub humidity: f32,
    pub pressure: f32,
}

impl SensorReading {
    /// Every field unknown.
    pub const UNKNOWN: SensorReading = SensorReading {
        temperature: SENTINEL,
        humidity: SENTINEL,
        pressure: SENTINEL,
    };

    pub fn new(temperature: f32, humidity: f32, pressure: f32) -> Self {
        Self {
            temperature,
            humidity,
            pressure,
        }
    }

    /// True when at least one field carries a real value.
    pub fn is_present(&self) -> bool {
        self.fields().iter().any(|&v| v != SENTINEL)
    }

    pub fn fields(&self) -> [f32; 3] {
        [self.temperature, self.humidity, self.pressure]
    }

    /// Wire form with two decimals per field.
    pub fn encode(&self) -> String {
        format!(
            "T:{},H:{},P:{}",
            format_field(self.temperature),
            format_field(self.humidity),
            format_field(self.pressure)
        )
    }
}

impl Default for SensorReading {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn format_field(value: f32) -> String {
    if value.is_finite() {
        format!("{:.2}", value)
    } else {
        SENTINEL_TEXT.to_string()
    }
}

/// Which decoder the peer's frames are read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeStrategy {
    #[default]
    Lenient,
    Strict,
}

impl DecodeStrategy {
    pub fn decode(&self, text: &str) -> Result<SensorReading, RelayError> {
        match self {
            DecodeStrategy::Lenient => decode_lenient(text),
            DecodeStrategy::Strict => decode_strict(text),
        }
    }
}

/// Field-by-field decode. Labels may come in any order; a field without a
/// numeric run becomes [`SENTINEL`]. Fails when a label is missing or no field
/// yields a value.
pub fn decode_lenient(text: &str) -> Result<SensorReading, RelayError> {
    let values = scan::label_values(text, &LABELS)
        .ok_or_else(|| RelayError::DecodeFailure("missing T:/H:/P: label".to_string()))?;

    let mut fields = [SENTINEL; 3];
    for (slot, raw) in fields.iter_mut().zip(values) {
        *slot = scan::parse_number(&scan::strip_control(raw)).unwrap_or(SENTINEL);
    }

    let reading = SensorReading::new(fields[0], fields[1], fields[2]);
    if reading.is_present() {
        Ok(reading)
    } else {
        Err(RelayError::DecodeFailure("no numeric field".to_string()))
    }
}

/// All-or-nothing decode of `T:<int>.<digits>,H:<int>.<digits>,P:<int>.<digits>`.
/// Trailing bytes after the pressure value are ignored.
pub fn decode_strict(text: &str) -> Result<SensorReading, RelayError> {
    let mut cursor = Cursor { rest: text };
    let mut fields = [0.0f32; 3];
    for (slot, label) in fields.iter_mut().zip(STRICT_SEPARATORS) {
        *slot = cursor
            .literal(label)
            .and_then(|c| c.fixed_point())
            .ok_or_else(|| {
                RelayError::DecodeFailure(format!("frame does not match strict shape at {label:?}"))
            })?;
    }
    Ok(SensorReading::new(fields[0], fields[1], fields[2]))
}

/// Forward-only scanf-style reader.
struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn literal(&mut self, lit: &str) -> Option<&mut Self> {
        self.rest = self.rest.strip_prefix(lit)?;
        Some(self)
    }

    /// `%d.%d`: optional whitespace and sign, integer digits, a dot, fraction digits.
    fn fixed_point(&mut self) -> Option<f32> {
        let s = self.rest.trim_start();
        let (negative, s) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let int_len = s.bytes().take_while(u8::is_ascii_digit).count();
        if int_len == 0 {
            return None;
        }
        let s_after_int = s[int_len..].strip_prefix('.')?;
        let frac_len = s_after_int.bytes().take_while(u8::is_ascii_digit).count();
        if frac_len == 0 {
            return None;
        }
        let number = format!("{}.{}", &s[..int_len], &s_after_int[..frac_len]);
        let magnitude = number.parse::<f32>().ok()?;
        self.rest = &s_after_int[frac_len..];
        Some(if negative { -magnitude } else { magnitude })
    }
}
