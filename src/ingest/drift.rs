use serde::Deserialize;

use super::normalize::{clean_string, UNKNOWN};

/// Closed column range `[start, end]` scanned when a value has drifted away
/// from its nominal column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// First cell inside the window that is an exact whitelist member, else `unknown`.
pub fn find_in_window(fields: &[String], window: Window, whitelist: &[&str]) -> String {
    fields
        .iter()
        .enumerate()
        .skip(window.start)
        .take_while(|(i, _)| *i <= window.end)
        .map(|(_, f)| clean_string(Some(f), UNKNOWN))
        .find(|v| whitelist.contains(&v.as_str()))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Strict value at the nominal column; the window is only scanned when that fails.
pub fn recover(
    fields: &[String],
    nominal: usize,
    window: Window,
    whitelist: &[&str],
    strict: impl Fn(Option<&str>, &[&str]) -> String,
) -> String {
    let value = strict(fields.get(nominal).map(String::as_str), whitelist);
    if value != UNKNOWN {
        return value;
    }
    find_in_window(fields, window, whitelist)
}
