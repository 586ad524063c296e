use std::mem::replace;

use rusqlite::Connection;
use tracing::debug;

use super::mapper::NormalizedCourse;
use crate::db::{self, BatchOutcome};
use crate::error::ImportError;

pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Buffers documents for one run and flushes them as unordered upsert batches.
/// Owned by a single import; counters never outlive it.
pub struct BatchWriter<'c> {
    conn: &'c Connection,
    batch_size: usize,
    pending: Vec<NormalizedCourse>,
    totals: BatchOutcome,
    flushes: usize,
}

impl<'c> BatchWriter<'c> {
    pub fn new(conn: &'c Connection, batch_size: usize) -> Self {
        let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        Self {
            conn,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            totals: BatchOutcome::default(),
            flushes: 0,
        }
    }

    /// Queue one document; a full batch is flushed before this returns.
    pub fn push(&mut self, doc: NormalizedCourse) -> Result<(), ImportError> {
        self.pending.push(doc);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ImportError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        let outcome = db::upsert_courses(self.conn, &batch)?;

        self.totals.upserted += outcome.upserted;
        self.totals.modified += outcome.modified;
        self.totals.failed += outcome.failed;
        self.flushes += 1;
        debug!("Flush #{} ({} docs)", self.flushes, batch.len());
        Ok(())
    }

    /// Flush the trailing partial batch and hand back the run totals.
    pub fn finish(mut self) -> Result<BatchOutcome, ImportError> {
        self.flush()?;
        Ok(self.totals)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }
}
