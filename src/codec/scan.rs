//! Small label/value extractor shared by the frame and location decoders.
//!
//! Everything here works on `&str` slices and never panics on odd input:
//! missing labels, empty values, or garbage between fields all come back as
//! `None` or an empty slice.

/// Values following each of `labels`, in the order the labels were given.
///
/// Labels may appear in any order in `text`. A value runs from the end of its
/// label to the start of the nearest label that follows it, or to the end of
/// `text`. Returns `None` if any label is missing.
pub fn label_values<'a>(text: &'a str, labels: &[&str]) -> Option<Vec<&'a str>> {
    let starts = labels
        .iter()
        .map(|label| text.find(label))
        .collect::<Option<Vec<usize>>>()?;

    let values = labels
        .iter()
        .zip(&starts)
        .map(|(label, &start)| {
            let value_start = start + label.len();
            let end = starts
                .iter()
                .copied()
                .filter(|&other| other >= value_start)
                .min()
                .unwrap_or(text.len());
            &text[value_start..end]
        })
        .collect();
    Some(values)
}

/// Text after the first `label`, up to (not including) `stop` or the end of `text`.
pub fn value_until<'a>(text: &'a str, label: &str, stop: char) -> Option<&'a str> {
    let start = text.find(label)? + label.len();
    let rest = &text[start..];
    Some(rest.find(stop).map_or(rest, |end| &rest[..end]))
}

pub fn strip_control(s: &str) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}

/// First maximal run of `[0-9.-]`.
pub fn numeric_run(s: &str) -> Option<&str> {
    let is_numeric = |c: char| c.is_ascii_digit() || c == '.' || c == '-';
    let start = s.find(is_numeric)?;
    let len = s[start..]
        .find(|c: char| !is_numeric(c))
        .unwrap_or(s.len() - start);
    Some(&s[start..start + len])
}

/// Parse the first numeric run of `s`.
///
/// Runs such as `12.5.1` or `7-` are cut back to their longest parseable
/// prefix; a run with no parseable prefix (`-`, `.`) yields `None`.
pub fn parse_number(s: &str) -> Option<f32> {
    let run = numeric_run(s)?;
    (1..=run.len())
        .rev()
        .find_map(|len| run[..len].parse::<f32>().ok())
        .filter(|v| v.is_finite())
}
