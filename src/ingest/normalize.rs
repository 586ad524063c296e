use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

static SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^https?://").unwrap());

pub const UNKNOWN: &str = "unknown";
pub const PLACEHOLDER: &str = "-";

/// Languages accepted from whitelist-strict sources.
pub const LANGUAGE_WHITELIST: &[&str] = &[
    "English",
    "Spanish",
    "French",
    "German",
    "Italian",
    "Portuguese",
    "Portuguese (Brazilian)",
    "Chinese",
    "Japanese",
    "Korean",
    "Arabic",
    "Russian",
    "Hindi",
    "Turkish",
    "Dutch",
    "Ukrainian",
    "Polish",
    "Swedish",
    "Norwegian",
    "Danish",
    "Greek",
    "Hebrew",
    "Thai",
    "Vietnamese",
    "Indonesian",
];

/// Coursera level labels, matched case-sensitively.
pub const LEVEL_WHITELIST: &[&str] = &[
    "Beginner Level",
    "Intermediate Level",
    "Advanced Level",
    "Mixed",
    "All Levels",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y"];

/// Trim a raw cell, drop BOM artifacts and wrapping quotes. Empty cells and
/// the `-` placeholder collapse to `fallback`.
pub fn clean_string(v: Option<&str>, fallback: &str) -> String {
    let Some(raw) = v else {
        return fallback.to_string();
    };

    let s = raw.replace('\u{FEFF}', "");
    let s = s.trim().trim_matches('"').trim();

    if s.is_empty() || s == PLACEHOLDER {
        fallback.to_string()
    } else {
        s.to_string()
    }
}

/// Canonical absolute URL for a course link, or an empty string when none can
/// be derived. Query string, fragment and one trailing slash are dropped.
pub fn normalize_url(v: Option<&str>, origin: &str) -> String {
    let s = clean_string(v, "");
    if s.is_empty() {
        return s;
    }

    let absolute = if SCHEME_RE.is_match(&s) {
        s
    } else if s.starts_with('/') {
        format!("{}{}", origin.trim_end_matches('/'), s)
    } else if s.starts_with("www.") {
        format!("https://{s}")
    } else {
        return String::new();
    };

    let base = absolute
        .split('#')
        .next()
        .unwrap_or_default()
        .split('?')
        .next()
        .unwrap_or_default();
    let base = base.strip_suffix('/').unwrap_or(base);

    // scheme with no host
    let host = base.split_once("://").map_or("", |(_, rest)| rest);
    if host.trim_matches('/').is_empty() {
        return String::new();
    }
    base.to_string()
}

/// Loose level mapping for free-text sources.
pub fn normalize_level(v: Option<&str>) -> String {
    let s = clean_string(v, "").to_lowercase();
    let level = if s.contains("beginner") {
        "beginner"
    } else if s.contains("intermediate") {
        "intermediate"
    } else if s.contains("advanced") {
        "advanced"
    } else {
        UNKNOWN
    };
    level.to_string()
}

pub fn normalize_level_strict(v: Option<&str>, whitelist: &[&str]) -> String {
    strict_member(v, whitelist)
}

pub fn normalize_language(v: Option<&str>) -> String {
    clean_string(v, UNKNOWN)
}

pub fn normalize_language_strict(v: Option<&str>, whitelist: &[&str]) -> String {
    strict_member(v, whitelist)
}

fn strict_member(v: Option<&str>, whitelist: &[&str]) -> String {
    let s = clean_string(v, UNKNOWN);
    if whitelist.contains(&s.as_str()) {
        s
    } else {
        UNKNOWN.to_string()
    }
}

/// Best-effort date parsing. Placeholders and anything unparsable give `None`.
pub fn parse_date(v: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = v?.split(';').next().unwrap_or_default().replace('"', "");
    let s = clean_string(Some(&raw), "");
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(&s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

pub fn parse_number(v: Option<&str>) -> Option<f64> {
    let s = clean_string(v, "").replace(',', "");
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Deduplicated keyword list; empty cells and placeholders are dropped.
pub fn build_keywords<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    for candidate in candidates {
        let kw = clean_string(candidate, "");
        if kw.is_empty() || kw == UNKNOWN || seen.contains(&kw) {
            continue;
        }
        seen.insert(kw.clone());
        keywords.push(kw);
    }

    keywords
}
