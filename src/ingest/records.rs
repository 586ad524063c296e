use std::collections::HashMap;
use std::io::Read;

use csv::{ByteRecord, Reader, ReaderBuilder};

use super::normalize::clean_string;

/// Reader for header-mapped exports. A quote only opens a quoted cell at the
/// start of a field, so quoted cells may span lines while a stray `"` inside
/// an unquoted cell stays literal. Ragged rows are returned as found.
pub fn header_mapped_reader<R: Read>(rdr: R) -> Reader<R> {
    ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(rdr)
}

/// Invalid UTF-8 is replaced, never rejected.
pub fn decode_record(record: &ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|f| String::from_utf8_lossy(f).into_owned())
        .collect()
}

/// Header name → column position, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    columns: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn from_fields(fields: &[String]) -> Self {
        let mut columns = HashMap::new();
        for (i, name) in fields.iter().enumerate() {
            let key = clean_string(Some(name), "").to_lowercase();
            if !key.is_empty() {
                columns.entry(key).or_insert(i);
            }
        }
        Self { columns }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    pub fn get<'a>(&self, fields: &'a [String], name: &str) -> Option<&'a str> {
        self.position(name)
            .and_then(|i| fields.get(i))
            .map(String::as_str)
    }

    /// Number of fields a row needs so that every named column is present.
    pub fn width_for(&self, names: &[&str]) -> usize {
        names
            .iter()
            .filter_map(|n| self.position(n))
            .max()
            .map_or(0, |i| i + 1)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}
