use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::drift::{self, Window};
use super::records::HeaderIndex;
use super::normalize::{
    build_keywords, clean_string, normalize_language, normalize_language_strict, normalize_level,
    normalize_level_strict, normalize_url, parse_date, parse_number, LANGUAGE_WHITELIST,
    LEVEL_WHITELIST,
};
use crate::error::RowError;

pub const UNTITLED: &str = "Untitled course";
pub const NO_DESCRIPTION: &str = "No description";

/// Coursera rows shorter than this are rejected outright.
pub const COURSERA_MIN_FIELDS: usize = 12;

const UDEMY_REQUIRED: &[&str] = &["title", "course_url"];

/// Origin dataset of a document. One import run carries exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIdentity {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCourse {
    pub title: String,
    pub short_description: String,
    pub keywords: Vec<String>,
    pub language: String,
    pub level: String,
    pub source: SourceIdentity,
    pub access_link: String,
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub num_reviews: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DriftWindows {
    pub language: Window,
    pub level: Window,
}

impl Default for DriftWindows {
    fn default() -> Self {
        Self {
            language: Window::new(8, 12),
            level: Window::new(8, 14),
        }
    }
}

// ── Coursera (positional) ──
//
// 0 url, 1 title, 2 org, 3 type, 4 image, 5 category, 6 certificate,
// 7 description, 8 duration, 9 language, 10 level, ..., last = timestamp

pub fn map_coursera(
    fields: &[String],
    source: &SourceIdentity,
    windows: &DriftWindows,
) -> Result<NormalizedCourse, RowError> {
    if fields.len() < COURSERA_MIN_FIELDS {
        return Err(RowError::Format {
            found: fields.len(),
            expected: COURSERA_MIN_FIELDS,
        });
    }
    let cell = |i: usize| fields.get(i).map(String::as_str);

    let access_link = normalize_url(cell(0), &source.url);
    if access_link.is_empty() {
        return Err(RowError::IdentityMissing);
    }

    let org = clean_string(cell(2), "");
    let category = clean_string(cell(5), "");

    let language = drift::recover(
        fields,
        9,
        windows.language,
        LANGUAGE_WHITELIST,
        normalize_language_strict,
    );
    let level = drift::recover(
        fields,
        10,
        windows.level,
        LEVEL_WHITELIST,
        normalize_level_strict,
    );

    Ok(NormalizedCourse {
        title: clean_string(cell(1), UNTITLED),
        short_description: clean_string(cell(7), NO_DESCRIPTION),
        keywords: build_keywords([Some(org.as_str()), Some(category.as_str())]),
        language,
        level,
        source: source.clone(),
        access_link,
        last_updated: parse_date(fields.last().map(String::as_str)),
        external_id: String::new(),
        category,
        subcategory: String::new(),
        price: None,
        rating: None,
        num_reviews: None,
    })
}

/// The Coursera export sometimes ships its column names as the first line.
pub fn is_coursera_header(fields: &[String]) -> bool {
    fields
        .first()
        .is_some_and(|f| clean_string(Some(f), "").eq_ignore_ascii_case("url"))
}

// ── Udemy (header-mapped) ──

pub fn udemy_min_fields(header: &HeaderIndex) -> usize {
    header.width_for(UDEMY_REQUIRED)
}

pub fn map_udemy(
    fields: &[String],
    header: &HeaderIndex,
    source: &SourceIdentity,
) -> Result<NormalizedCourse, RowError> {
    let expected = udemy_min_fields(header);
    if fields.len() < expected {
        return Err(RowError::Format {
            found: fields.len(),
            expected,
        });
    }
    let col = |name: &str| header.get(fields, name);

    let access_link = normalize_url(col("course_url"), &source.url);
    if access_link.is_empty() {
        return Err(RowError::IdentityMissing);
    }

    let short_description = [col("desc"), col("headline")]
        .into_iter()
        .map(|v| clean_string(v, ""))
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| NO_DESCRIPTION.to_string());

    let last_updated = parse_date(col("last_update_date")).or_else(|| parse_date(col("published_time")));

    Ok(NormalizedCourse {
        title: clean_string(col("title"), UNTITLED),
        short_description,
        keywords: build_keywords([col("category"), col("subcategory"), col("topic")]),
        language: normalize_language(col("language")),
        level: normalize_level(col("level")),
        source: source.clone(),
        access_link,
        last_updated,
        external_id: clean_string(col("id"), ""),
        category: clean_string(col("category"), ""),
        subcategory: clean_string(col("subcategory"), ""),
        price: parse_number(col("price")),
        rating: parse_number(col("avg_rating").or_else(|| col("rating"))),
        num_reviews: parse_number(col("num_reviews")).map(|n| n as i64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::line::parse_line;
    use crate::ingest::normalize::UNKNOWN;

    fn coursera() -> SourceIdentity {
        SourceIdentity {
            name: "Coursera CSV".into(),
            url: "https://www.coursera.org".into(),
        }
    }

    fn udemy() -> SourceIdentity {
        SourceIdentity {
            name: "Udemy CSV".into(),
            url: "https://www.udemy.com".into(),
        }
    }

    const COURSERA_ROW: &str = "https://www.coursera.org/learn/ml?utm=x,Machine Learning,Stanford,Course,img.png,Data Science,Shareable,\"Learn ML, fast\",3 weeks,English,Beginner Level,4.9,2023-05-01;;;;";

    #[test]
    fn coursera_row_maps_all_fields() {
        let fields = parse_line(COURSERA_ROW);
        let c = map_coursera(&fields, &coursera(), &DriftWindows::default()).unwrap();
        assert_eq!(c.access_link, "https://www.coursera.org/learn/ml");
        assert_eq!(c.title, "Machine Learning");
        assert_eq!(c.short_description, "Learn ML, fast");
        assert_eq!(c.language, "English");
        assert_eq!(c.level, "Beginner Level");
        assert_eq!(c.keywords, vec!["Stanford", "Data Science"]);
        assert_eq!(c.category, "Data Science");
        assert_eq!(c.source, coursera());
        assert!(c.last_updated.is_some());
    }

    #[test]
    fn coursera_drifted_level_is_recovered() {
        // unquoted comma in the duration pushes language and level one column right
        let line = "https://www.coursera.org/learn/x,X,Org,Course,img,Cat,Cert,Desc,1,2 weeks,Spanish,Mixed,4.5,2022-01-01";
        let fields = parse_line(line);
        let c = map_coursera(&fields, &coursera(), &DriftWindows::default()).unwrap();
        assert_eq!(c.language, "Spanish");
        assert_eq!(c.level, "Mixed");
    }

    #[test]
    fn coursera_short_row_is_format_error() {
        let fields = parse_line("https://www.coursera.org/learn/x,Title,Org");
        assert_eq!(
            map_coursera(&fields, &coursera(), &DriftWindows::default()),
            Err(RowError::Format { found: 3, expected: COURSERA_MIN_FIELDS })
        );
    }

    #[test]
    fn coursera_missing_url_is_identity_error() {
        let fields = parse_line(",Title,Org,Course,img,Cat,Cert,Desc,1 week,English,Mixed,4.1,2022-01-01");
        assert_eq!(
            map_coursera(&fields, &coursera(), &DriftWindows::default()),
            Err(RowError::IdentityMissing)
        );
    }

    #[test]
    fn coursera_unknown_vocabulary_stays_unknown() {
        let fields = parse_line("https://www.coursera.org/learn/k,K,Org,Course,img,Cat,Cert,Desc,1 week,Klingon,Expert,4.1,-");
        let c = map_coursera(&fields, &coursera(), &DriftWindows::default()).unwrap();
        assert_eq!(c.language, UNKNOWN);
        assert_eq!(c.level, UNKNOWN);
        assert_eq!(c.last_updated, None);
    }

    #[test]
    fn coursera_header_detection() {
        assert!(is_coursera_header(&parse_line("\u{FEFF}url,title,org")));
        assert!(!is_coursera_header(&parse_line("https://x.org,title")));
    }

    fn udemy_header() -> HeaderIndex {
        HeaderIndex::from_fields(&parse_line(
            "id,title,is_paid,price,headline,num_subscribers,avg_rating,num_reviews,published_time,last_update_date,category,subcategory,topic,language,course_url,level",
        ))
    }

    #[test]
    fn udemy_row_maps_all_fields() {
        let fields = parse_line(
            "4715,Rust Basics,True,19.99,Learn Rust,100,4.6,1200,2019-01-02T10:00:00Z,nan,Development,Programming Languages,Rust,English,/course/rust-basics/?ref=home,All Levels",
        );
        let c = map_udemy(&fields, &udemy_header(), &udemy()).unwrap();
        assert_eq!(c.access_link, "https://www.udemy.com/course/rust-basics");
        assert_eq!(c.title, "Rust Basics");
        assert_eq!(c.short_description, "Learn Rust");
        assert_eq!(c.keywords, vec!["Development", "Programming Languages", "Rust"]);
        assert_eq!(c.language, "English");
        assert_eq!(c.level, UNKNOWN);
        assert_eq!(c.external_id, "4715");
        assert_eq!(c.price, Some(19.99));
        assert_eq!(c.rating, Some(4.6));
        assert_eq!(c.num_reviews, Some(1200));
        // last_update_date is nan, falls back to published_time
        assert_eq!(c.last_updated, parse_date(Some("2019-01-02T10:00:00Z")));
    }

    #[test]
    fn udemy_defaults_for_blank_cells() {
        let fields = parse_line(",,,,,,,,,,,,,,/course/empty,");
        let c = map_udemy(&fields, &udemy_header(), &udemy()).unwrap();
        assert_eq!(c.title, UNTITLED);
        assert_eq!(c.short_description, NO_DESCRIPTION);
        assert!(c.keywords.is_empty());
        assert_eq!(c.language, UNKNOWN);
        assert_eq!(c.last_updated, None);
        assert_eq!(c.price, None);
    }

    #[test]
    fn udemy_empty_course_url_is_identity_error() {
        let fields = parse_line("1,Title,True,0,h,0,0,0,-,-,Dev,Web,Topic,English,,Beginner");
        assert_eq!(map_udemy(&fields, &udemy_header(), &udemy()), Err(RowError::IdentityMissing));
    }

    #[test]
    fn udemy_row_short_of_identity_column_is_format_error() {
        let fields = parse_line("1,Title,True");
        assert_eq!(
            map_udemy(&fields, &udemy_header(), &udemy()),
            Err(RowError::Format { found: 3, expected: 15 })
        );
    }

    #[test]
    fn serialized_shape_is_camel_case() {
        let fields = parse_line(COURSERA_ROW);
        let c = map_coursera(&fields, &coursera(), &DriftWindows::default()).unwrap();
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["accessLink"], "https://www.coursera.org/learn/ml");
        assert_eq!(v["shortDescription"], "Learn ML, fast");
        assert_eq!(v["source"]["name"], "Coursera CSV");
        let back: NormalizedCourse = serde_json::from_value(v).unwrap();
        assert_eq!(back, c);
    }
}
