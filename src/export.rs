use std::io::Write;

use anyhow::Result;
use chrono::SecondsFormat;
use clap::ValueEnum;
use serde::Serialize;

use crate::db::StoredCourse;
use crate::ingest::mapper::SourceIdentity;
use crate::ingest::normalize::UNKNOWN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Jsonl,
    Json,
}

/// Outward shape of a stored course: absent scalars read as `unknown`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedCourse {
    pub id: i64,
    pub title: String,
    pub short_description: String,
    pub keywords: Vec<String>,
    pub language: String,
    pub level: String,
    pub source: SourceIdentity,
    pub access_link: String,
    pub last_updated: String,
}

fn or_unknown(s: &str) -> String {
    if s.trim().is_empty() {
        UNKNOWN.to_string()
    } else {
        s.to_string()
    }
}

impl From<&StoredCourse> for ExportedCourse {
    fn from(stored: &StoredCourse) -> Self {
        let c = &stored.course;
        ExportedCourse {
            id: stored.id,
            title: or_unknown(&c.title),
            short_description: or_unknown(&c.short_description),
            keywords: c.keywords.clone(),
            language: or_unknown(&c.language),
            level: or_unknown(&c.level),
            source: SourceIdentity {
                name: or_unknown(&c.source.name),
                url: or_unknown(&c.source.url),
            },
            access_link: or_unknown(&c.access_link),
            last_updated: c
                .last_updated
                .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

pub fn write_courses(out: &mut impl Write, courses: &[StoredCourse], format: ExportFormat) -> Result<usize> {
    let exported: Vec<ExportedCourse> = courses.iter().map(ExportedCourse::from).collect();
    match format {
        ExportFormat::Jsonl => {
            for c in &exported {
                serde_json::to_writer(&mut *out, c)?;
                out.write_all(b"\n")?;
            }
        }
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &exported)?;
            out.write_all(b"\n")?;
        }
    }
    out.flush()?;
    Ok(exported.len())
}
