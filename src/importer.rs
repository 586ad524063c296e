use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use csv::ByteRecord;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::db;
use crate::error::{ImportError, RowError};
use crate::ingest::mapper::{DriftWindows, NormalizedCourse};
use crate::ingest::writer::BatchWriter;
use crate::ingest::{records, Platform, RowPipeline};

pub struct ImportOptions {
    pub platform: Platform,
    pub file: PathBuf,
    pub batch_size: usize,
    pub windows: DriftWindows,
    /// Purge the source's documents before streaming.
    pub reset: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Connecting,
    Streaming,
    Draining,
    Reporting,
    Done,
    Failed,
}

/// Counters for one run, reported once and then discarded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub processed: usize,
    pub skipped: usize,
    pub upserted: usize,
    pub modified: usize,
    pub failed: usize,
    pub skipped_format: usize,
    pub skipped_identity: usize,
    pub removed: usize,
}

impl ImportSummary {
    fn record_skip(&mut self, err: &RowError) {
        self.skipped += 1;
        match err {
            RowError::Format { .. } => self.skipped_format += 1,
            RowError::IdentityMissing => self.skipped_identity += 1,
        }
    }

    pub fn print(&self, source_name: &str) {
        println!("{} import finished!", source_name);
        println!("Processed: {}", self.processed);
        println!(
            "Skipped:   {} ({} malformed, {} without link)",
            self.skipped, self.skipped_format, self.skipped_identity
        );
        println!("Upserted:  {}", self.upserted);
        println!("Modified:  {}", self.modified);
        if self.failed > 0 {
            println!("Failed:    {}", self.failed);
        }
        if self.removed > 0 {
            println!("Removed before import: {}", self.removed);
        }
    }
}

struct Run {
    state: RunState,
}

impl Run {
    fn new() -> Self {
        Self {
            state: RunState::Connecting,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug!("Import state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: ImportError) -> anyhow::Error {
        self.advance(RunState::Failed);
        err.into()
    }
}

/// Row-level state while streaming: mapping, buffering and counting.
struct Stream<'c> {
    pipeline: RowPipeline,
    writer: BatchWriter<'c>,
    summary: ImportSummary,
}

impl Stream<'_> {
    /// Row problems become skips; only a store failure escapes.
    fn accept(&mut self, mapped: Result<Option<NormalizedCourse>, RowError>) -> Result<(), ImportError> {
        match mapped {
            Ok(None) => Ok(()),
            Ok(Some(doc)) => {
                self.summary.processed += 1;
                self.writer.push(doc)
            }
            Err(e) => {
                self.summary.processed += 1;
                self.summary.record_skip(&e);
                debug!("Skipping row {}: {}", self.summary.processed, e);
                Ok(())
            }
        }
    }
}

/// Open the store at `db_path` and run one import against it. The connection
/// is released when the run ends, successfully or not.
pub async fn run_import(db_path: &Path, opts: &ImportOptions) -> Result<ImportSummary> {
    let mut run = Run::new();
    let conn = db::connect(db_path)
        .and_then(|conn| db::init_schema(&conn).map(|_| conn))
        .map_err(|e| run.fail(e))?;
    info!("Connected to {}", db_path.display());

    stream_into(&conn, opts, &mut run).await
}

/// Stream `opts.file` into an already-open store.
pub async fn import_into(conn: &Connection, opts: &ImportOptions) -> Result<ImportSummary> {
    stream_into(conn, opts, &mut Run::new()).await
}

async fn stream_into(conn: &Connection, opts: &ImportOptions, run: &mut Run) -> Result<ImportSummary> {
    let t0 = Instant::now();
    run.advance(RunState::Streaming);

    let file_len = match tokio::fs::metadata(&opts.file).await {
        Ok(m) if m.is_file() => m.len(),
        _ => return Err(run.fail(ImportError::SourceFileMissing(opts.file.clone()))),
    };

    let pipeline = RowPipeline::new(opts.platform, opts.windows);
    let source_name = pipeline.source().name.clone();
    info!("Reading {} from {}", source_name, opts.file.display());

    let mut summary = ImportSummary::default();
    if opts.reset {
        summary.removed = db::delete_source(conn, &source_name).map_err(|e| run.fail(e))?;
        info!("Removed {} existing {} documents", summary.removed, source_name);
    }

    let pb = ProgressBar::new(file_len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {bytes}/{total_bytes} ({bytes_per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut stream = Stream {
        pipeline,
        writer: BatchWriter::new(conn, opts.batch_size),
        summary,
    };
    match opts.platform {
        Platform::Coursera => read_lines(&opts.file, &mut stream, run, &pb).await?,
        Platform::Udemy => read_records(&opts.file, &mut stream, run, &pb)?,
    }
    pb.finish_and_clear();

    run.advance(RunState::Draining);
    debug!(
        "Draining {} pending documents after {} flushes",
        stream.writer.pending(),
        stream.writer.flushes()
    );
    let Stream { writer, mut summary, .. } = stream;
    let totals = writer.finish().map_err(|e| run.fail(e))?;

    run.advance(RunState::Reporting);
    summary.upserted = totals.upserted;
    summary.modified = totals.modified;
    summary.failed = totals.failed;
    info!(
        "{}: {} processed, {} skipped, {} upserted, {} modified in {:.1}s",
        source_name,
        summary.processed,
        summary.skipped,
        summary.upserted,
        summary.modified,
        t0.elapsed().as_secs_f64()
    );

    run.advance(RunState::Done);
    Ok(summary)
}

/// Line-oriented export: one record per physical line, decoded lossily.
async fn read_lines(path: &Path, stream: &mut Stream<'_>, run: &mut Run, pb: &ProgressBar) -> Result<()> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut lines = BufReader::new(file).split(b'\n');

    while let Some(bytes) = lines
        .next_segment()
        .await
        .with_context(|| format!("Failed reading {}", path.display()))?
    {
        pb.inc(bytes.len() as u64 + 1);
        let decoded = String::from_utf8_lossy(&bytes);
        let line = decoded.strip_suffix('\r').unwrap_or(decoded.as_ref());

        let mapped = stream.pipeline.map_line(line);
        stream.accept(mapped).map_err(|e| run.fail(e))?;
    }
    Ok(())
}

/// Header-mapped export read as CSV records; quoted cells may span lines.
fn read_records(path: &Path, stream: &mut Stream<'_>, run: &mut Run, pb: &ProgressBar) -> Result<()> {
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = records::header_mapped_reader(file);

    let header = reader
        .byte_headers()
        .with_context(|| format!("Failed reading header of {}", path.display()))?;
    stream.pipeline.set_header(&records::decode_record(header));

    let mut record = ByteRecord::new();
    while reader
        .read_byte_record(&mut record)
        .with_context(|| format!("Failed reading {}", path.display()))?
    {
        pb.set_position(reader.position().byte());
        let mapped = stream.pipeline.map_fields(&records::decode_record(&record));
        stream.accept(mapped).map_err(|e| run.fail(e))?;
    }
    Ok(())
}
