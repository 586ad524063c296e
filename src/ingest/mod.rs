pub mod drift;
pub mod line;
pub mod mapper;
pub mod normalize;
pub mod records;
pub mod writer;

use clap::ValueEnum;
use tracing::warn;

use crate::error::RowError;
use mapper::{DriftWindows, NormalizedCourse, SourceIdentity};
use records::HeaderIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Platform {
    Udemy,
    Coursera,
}

impl Platform {
    pub fn source(self) -> SourceIdentity {
        let (name, url) = match self {
            Platform::Udemy => ("Udemy CSV", "https://www.udemy.com"),
            Platform::Coursera => ("Coursera CSV", "https://www.coursera.org"),
        };
        SourceIdentity {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    pub fn default_file(self) -> &'static str {
        match self {
            Platform::Udemy => "Course_info.csv",
            Platform::Coursera => "coursera.csv",
        }
    }
}

/// Per-run row state: source identity, drift windows and, once seen, the header.
pub struct RowPipeline {
    platform: Platform,
    source: SourceIdentity,
    windows: DriftWindows,
    header: Option<HeaderIndex>,
    seen_first: bool,
}

impl RowPipeline {
    pub fn new(platform: Platform, windows: DriftWindows) -> Self {
        Self {
            platform,
            source: platform.source(),
            windows,
            header: None,
            seen_first: false,
        }
    }

    pub fn source(&self) -> &SourceIdentity {
        &self.source
    }

    pub fn set_header(&mut self, fields: &[String]) {
        let header = HeaderIndex::from_fields(fields);
        if header.position("course_url").is_none() {
            warn!(
                "Udemy header has no course_url column ({} columns); every row will be skipped",
                header.len()
            );
        }
        self.header = Some(header);
        self.seen_first = true;
    }

    /// Map one physical line of a line-oriented export: BOM strip, quote
    /// repair, tolerant split. Blank lines give `Ok(None)`.
    pub fn map_line(&mut self, text: &str) -> Result<Option<NormalizedCourse>, RowError> {
        let raw = line::strip_bom(text.trim()).trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let fields = line::parse_line(line::fix_malformed_leading_quote(raw));
        self.map_fields(&fields)
    }

    /// Map one split record. `Ok(None)` means the record carried no data
    /// (all cells blank, or a header) and is not counted.
    pub fn map_fields(&mut self, fields: &[String]) -> Result<Option<NormalizedCourse>, RowError> {
        if fields.iter().all(|f| f.trim().is_empty()) {
            return Ok(None);
        }
        let first = !self.seen_first;
        self.seen_first = true;

        match self.platform {
            Platform::Coursera => {
                if first && mapper::is_coursera_header(fields) {
                    return Ok(None);
                }
                mapper::map_coursera(fields, &self.source, &self.windows).map(Some)
            }
            Platform::Udemy => match &self.header {
                Some(header) => mapper::map_udemy(fields, header, &self.source).map(Some),
                None => {
                    self.set_header(fields);
                    Ok(None)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn udemy_header_then_rows() {
        let mut p = RowPipeline::new(Platform::Udemy, DriftWindows::default());
        p.set_header(&strings(&["\u{FEFF}id", "title", "course_url"]));
        let c = p.map_fields(&strings(&["1", "Intro", "/course/intro"])).unwrap().unwrap();
        assert_eq!(c.access_link, "https://www.udemy.com/course/intro");
        assert_eq!(c.source.name, "Udemy CSV");
    }

    #[test]
    fn udemy_first_record_is_header_when_none_was_set() {
        let mut p = RowPipeline::new(Platform::Udemy, DriftWindows::default());
        assert_eq!(p.map_fields(&strings(&["id", "title", "course_url"])), Ok(None));
        assert!(p.map_fields(&strings(&["1", "Intro", "/course/intro"])).unwrap().is_some());
    }

    #[test]
    fn blank_records_are_ignored() {
        let mut p = RowPipeline::new(Platform::Coursera, DriftWindows::default());
        assert_eq!(p.map_line("   "), Ok(None));
        assert_eq!(p.map_line("\u{FEFF}"), Ok(None));
        assert_eq!(p.map_fields(&strings(&["", " ", ""])), Ok(None));
    }

    #[test]
    fn coursera_header_only_skipped_on_first_line() {
        let mut p = RowPipeline::new(Platform::Coursera, DriftWindows::default());
        let header = "url,title,org,type,image,category,certificate,description,duration,language,level,rating,timestamp";
        assert_eq!(p.map_line(header), Ok(None));
        assert_eq!(p.map_line(header), Err(RowError::IdentityMissing));
    }

    #[test]
    fn coursera_without_header_maps_first_line() {
        let mut p = RowPipeline::new(Platform::Coursera, DriftWindows::default());
        let row = "\"https://www.coursera.org/learn/a,A,Org,Course,img,Cat,Cert,\"Desc, long\",1 week,English,Mixed,4.0,2021-01-01";
        let c = p.map_line(row).unwrap().unwrap();
        assert_eq!(c.access_link, "https://www.coursera.org/learn/a");
        assert_eq!(c.short_description, "Desc, long");
        assert_eq!(c.level, "Mixed");
    }
}
