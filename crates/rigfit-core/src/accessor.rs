//! Tolerant reads of specification values.
//!
//! Every helper answers `None` when it cannot decide. Callers must treat `None`
//! as "unknown", never as a negative answer.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::Component;

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-+]?\d+(?:[.,]\d+)?").expect("number pattern compiles"))
}

/// Raw value of `key` on `component`, if both exist. Blank values count as absent.
pub fn get_spec<'a>(component: Option<&'a Component>, key: &str) -> Option<&'a str> {
    component?.spec(key).filter(|v| !v.trim().is_empty())
}

/// First non-blank value found among `keys`, in order.
pub fn get_spec_any<'a>(component: Option<&'a Component>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| get_spec(component, k))
}

/// First signed integer or decimal in `raw`. Accepts `.` and `,` as the decimal separator.
///
/// `"300W"` -> 300, `"1,5 V"` -> 1.5, `"approx -12.5dB"` -> -12.5.
pub fn parse_number(raw: Option<&str>) -> Option<f64> {
    let m = number_re().find(raw?)?;
    m.as_str().replace(',', ".").parse::<f64>().ok()
}

/// Case-insensitive membership of `needle` in a list separated by `,`, `;` or `|`.
pub fn list_includes(raw: Option<&str>, needle: Option<&str>) -> Option<bool> {
    let raw = raw.filter(|r| !r.trim().is_empty())?;
    let needle = needle.map(str::trim).filter(|n| !n.is_empty())?;
    Some(
        raw.split([',', ';', '|'])
            .map(str::trim)
            .any(|item| item.eq_ignore_ascii_case(needle)),
    )
}

/// Lenient boolean parsing for values such as `yes`, `1` or `False`.
pub fn parse_bool(raw: Option<&str>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}
