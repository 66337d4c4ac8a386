//! Location segment of the outgoing message.

use std::fmt;

use super::frame::SensorReading;
use super::scan;

/// Label the modem puts in front of the fix fields.
pub const FIX_REPLY_LABEL: &str = "+CGPSINFO:";
/// Segment sent when the modem has no fix.
pub const NO_FIX: &str = "L:No Fix0";

/// Opaque `L:<fields>` segment; the fix fields are passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationFix(String);

impl LocationFix {
    pub fn no_fix() -> Self {
        Self(NO_FIX.to_string())
    }

    /// Pull the fix out of a raw `AT+CGPSINFO` response.
    ///
    /// The fields run from the label to the next carriage return. An empty field
    /// list, or one made only of separators (`,,,,,,,,`), counts as no fix.
    pub fn from_response(response: &str) -> Self {
        let fields = scan::value_until(response, FIX_REPLY_LABEL, '\r')
            .map(str::trim)
            .unwrap_or_default();
        if fields.chars().all(|c| c == ',') {
            Self::no_fix()
        } else {
            Self(format!("L:{fields}"))
        }
    }

    pub fn has_fix(&self) -> bool {
        self.0 != NO_FIX
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `T:<ff.ff>,H:<ff.ff>,P:<ff.ff>,L:<fix>`, the shape downstream consumers parse.
pub fn outgoing_message(reading: &SensorReading, location: &LocationFix) -> String {
    format!("{},{}", reading.encode(), location)
}
