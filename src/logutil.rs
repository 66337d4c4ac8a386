//! Helpers for putting peripheral text on a single log line.
//! AT responses are full of `\r\n` pairs and radio frames may carry arbitrary bytes;
//! both are escaped before they reach the log.

use std::fmt::Write;

/// Longest preview written for one piece of peripheral text.
const MAX_PREVIEW: usize = 200;

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
/// - other control characters (including the 0x1A end-of-message byte) => `\\xNN`
///
/// Output is capped at [`MAX_PREVIEW`] characters with a trailing ellipsis.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Lowercase hex of at most `max` leading bytes, for raw radio frames.
pub fn hex_snippet(data: &[u8], max: usize) -> String {
    let mut out = String::with_capacity(max.min(data.len()) * 2);
    for b in data.iter().take(max) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
