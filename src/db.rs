use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::ImportError;
use crate::ingest::mapper::NormalizedCourse;

pub const DEFAULT_DB_PATH: &str = "data/courses.sqlite";

pub fn connect(path: &Path) -> Result<Connection, ImportError> {
    let context = format!("open {}", path.display());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ImportError::StoreUnavailable {
            context: context.clone(),
            source: Box::new(e),
        })?;
    }
    let conn = Connection::open(path).map_err(ImportError::store(context.clone()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .map_err(ImportError::store(context))?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<(), ImportError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS courses (
            id            INTEGER PRIMARY KEY,
            source_name   TEXT NOT NULL,
            access_link   TEXT NOT NULL CHECK(access_link <> ''),
            title         TEXT NOT NULL,
            language      TEXT NOT NULL,
            level         TEXT NOT NULL,
            last_updated  TEXT,
            body          TEXT NOT NULL,
            created_at    TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at    TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(source_name, access_link)
        );
        CREATE INDEX IF NOT EXISTS idx_courses_language ON courses(language);
        CREATE INDEX IF NOT EXISTS idx_courses_level ON courses(level);
        ",
    )
    .map_err(ImportError::store("init schema"))
}

// ── Upserts ──

/// Counts from one unordered batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub upserted: usize,
    pub modified: usize,
    pub failed: usize,
}

/// Upsert a batch keyed by (source name, access link), replacing the stored
/// body on match. Operations are independent: a rejected document is counted
/// in `failed` and its siblings still land. Only losing the transaction itself
/// is an error.
pub fn upsert_courses(conn: &Connection, docs: &[NormalizedCourse]) -> Result<BatchOutcome, ImportError> {
    let tx = conn
        .unchecked_transaction()
        .map_err(ImportError::store("begin batch"))?;
    let mut outcome = BatchOutcome::default();
    {
        let mut exists_stmt = tx
            .prepare("SELECT 1 FROM courses WHERE source_name = ?1 AND access_link = ?2")
            .map_err(ImportError::store("prepare batch"))?;
        let mut upsert_stmt = tx
            .prepare(
                "INSERT INTO courses (source_name, access_link, title, language, level, last_updated, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(source_name, access_link) DO UPDATE SET
                    title = excluded.title,
                    language = excluded.language,
                    level = excluded.level,
                    last_updated = excluded.last_updated,
                    body = excluded.body,
                    updated_at = datetime('now')",
            )
            .map_err(ImportError::store("prepare batch"))?;

        for doc in docs {
            let result = serde_json::to_string(doc)
                .map_err(anyhow::Error::from)
                .and_then(|body| {
                    let existed = exists_stmt.exists(rusqlite::params![doc.source.name, doc.access_link])?;
                    upsert_stmt.execute(rusqlite::params![
                        doc.source.name,
                        doc.access_link,
                        doc.title,
                        doc.language,
                        doc.level,
                        doc.last_updated.map(|d| d.to_rfc3339()),
                        body,
                    ])?;
                    Ok(existed)
                });

            match result {
                Ok(true) => outcome.modified += 1,
                Ok(false) => outcome.upserted += 1,
                Err(e) => {
                    warn!("Upsert rejected for {}: {}", doc.access_link, e);
                    outcome.failed += 1;
                }
            }
        }
    }
    tx.commit().map_err(ImportError::store("commit batch"))?;
    debug!(
        "Batch of {}: {} upserted, {} modified, {} failed",
        docs.len(),
        outcome.upserted,
        outcome.modified,
        outcome.failed
    );
    Ok(outcome)
}

pub fn delete_source(conn: &Connection, source_name: &str) -> Result<usize, ImportError> {
    conn.execute("DELETE FROM courses WHERE source_name = ?1", [source_name])
        .map_err(ImportError::store("delete source"))
}

// ── Queries ──

#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub source: Option<String>,
    pub language: Option<String>,
    pub level: Option<String>,
}

impl CourseFilter {
    fn where_clause(&self) -> (String, Vec<String>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        for (column, value) in [
            ("source_name", &self.source),
            ("language", &self.language),
            ("level", &self.level),
        ] {
            if let Some(v) = value {
                params.push(v.clone());
                conditions.push(format!("{} = ?{}", column, params.len()));
            }
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        (clause, params)
    }
}

pub struct StoredCourse {
    pub id: i64,
    pub course: NormalizedCourse,
}

/// Stored documents matching the filter, oldest first. Bodies that no longer
/// deserialize are skipped with a warning.
pub fn fetch_courses(
    conn: &Connection,
    filter: &CourseFilter,
    limit: Option<usize>,
) -> Result<Vec<StoredCourse>> {
    let (where_clause, params) = filter.where_clause();
    let sql = format!(
        "SELECT id, body FROM courses{} ORDER BY id{}",
        where_clause,
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let courses = rows
        .into_iter()
        .filter_map(|(id, body)| match serde_json::from_str(&body) {
            Ok(course) => Some(StoredCourse { id, course }),
            Err(e) => {
                warn!("Skipping course {} with unreadable body: {}", id, e);
                None
            }
        })
        .collect();
    Ok(courses)
}

pub fn count_courses(conn: &Connection) -> Result<usize> {
    Ok(conn.query_row("SELECT COUNT(*) FROM courses", [], |r| r.get(0))?)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub by_source: Vec<(String, usize)>,
    pub by_language: Vec<(String, usize)>,
    pub by_level: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection, top: usize) -> Result<Stats> {
    let total = count_courses(conn)?;
    let grouped = |column: &str, limit: Option<usize>| -> Result<Vec<(String, usize)>> {
        let sql = format!(
            "SELECT {column}, COUNT(*) AS n FROM courses GROUP BY {column} ORDER BY n DESC, {column}{}",
            match limit {
                Some(n) => format!(" LIMIT {}", n),
                None => String::new(),
            }
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    };

    Ok(Stats {
        total,
        by_source: grouped("source_name", None)?,
        by_language: grouped("language", Some(top))?,
        by_level: grouped("level", None)?,
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::{course, memory_store};
    use super::*;

    #[test]
    fn upsert_inserts_then_modifies() {
        let conn = memory_store();
        let docs = vec![course("Udemy CSV", "https://a", "A"), course("Udemy CSV", "https://b", "B")];

        let first = upsert_courses(&conn, &docs).unwrap();
        assert_eq!(first, BatchOutcome { upserted: 2, modified: 0, failed: 0 });

        let second = upsert_courses(&conn, &docs).unwrap();
        assert_eq!(second, BatchOutcome { upserted: 0, modified: 2, failed: 0 });
        assert_eq!(count_courses(&conn).unwrap(), 2);
    }

    #[test]
    fn same_link_under_other_source_is_distinct() {
        let conn = memory_store();
        let docs = vec![course("Udemy CSV", "https://a", "A"), course("Coursera CSV", "https://a", "A")];
        let out = upsert_courses(&conn, &docs).unwrap();
        assert_eq!(out.upserted, 2);
        assert_eq!(count_courses(&conn).unwrap(), 2);
    }

    #[test]
    fn match_replaces_body() {
        let conn = memory_store();
        upsert_courses(&conn, &[course("Udemy CSV", "https://a", "Old")]).unwrap();
        upsert_courses(&conn, &[course("Udemy CSV", "https://a", "New")]).unwrap();

        let stored = fetch_courses(&conn, &CourseFilter::default(), None).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].course.title, "New");
    }

    #[test]
    fn rejected_document_does_not_abort_siblings() {
        let conn = memory_store();
        let docs = vec![
            course("Udemy CSV", "https://a", "A"),
            course("Udemy CSV", "", "no identity"),
            course("Udemy CSV", "https://c", "C"),
        ];
        let out = upsert_courses(&conn, &docs).unwrap();
        assert_eq!(out, BatchOutcome { upserted: 2, modified: 0, failed: 1 });
        assert_eq!(count_courses(&conn).unwrap(), 2);
    }

    #[test]
    fn filters_and_stats() {
        let conn = memory_store();
        let mut fr = course("Coursera CSV", "https://c", "C");
        fr.language = "French".into();
        upsert_courses(
            &conn,
            &[course("Udemy CSV", "https://a", "A"), course("Udemy CSV", "https://b", "B"), fr],
        )
        .unwrap();

        let filter = CourseFilter {
            source: Some("Udemy CSV".into()),
            ..Default::default()
        };
        assert_eq!(fetch_courses(&conn, &filter, None).unwrap().len(), 2);

        let filter = CourseFilter {
            language: Some("French".into()),
            level: Some("beginner".into()),
            ..Default::default()
        };
        let hits = fetch_courses(&conn, &filter, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].course.title, "C");
        assert_eq!(fetch_courses(&conn, &CourseFilter::default(), Some(1)).unwrap().len(), 1);

        let s = get_stats(&conn, 10).unwrap();
        assert_eq!(s.total, 3);
        assert_eq!(s.by_source[0], ("Udemy CSV".to_string(), 2));
        assert_eq!(s.by_language.len(), 2);
        assert_eq!(s.by_level, vec![("beginner".to_string(), 3)]);
    }

    #[test]
    fn delete_source_only_touches_that_source() {
        let conn = memory_store();
        upsert_courses(
            &conn,
            &[course("Udemy CSV", "https://a", "A"), course("Coursera CSV", "https://b", "B")],
        )
        .unwrap();
        assert_eq!(delete_source(&conn, "Udemy CSV").unwrap(), 1);
        assert_eq!(count_courses(&conn).unwrap(), 1);
    }
}
