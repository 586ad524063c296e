use std::path::PathBuf;

use thiserror::Error;

/// Fatal, run-level failures. Anything here aborts the import.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("source file not found: {}", .0.display())]
    SourceFileMissing(PathBuf),

    #[error("document store unavailable ({context}): {source}")]
    StoreUnavailable {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ImportError {
    pub fn store(
        context: impl Into<String>,
    ) -> impl FnOnce(rusqlite::Error) -> ImportError {
        let context = context.into();
        move |e| ImportError::StoreUnavailable {
            context,
            source: Box::new(e),
        }
    }
}

/// Per-row failures. These are counted as skips and never stop the stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("row has {found} fields, expected at least {expected}")]
    Format { found: usize, expected: usize },

    #[error("row has no usable access link")]
    IdentityMissing,
}
