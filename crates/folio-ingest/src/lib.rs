//! Folio Ingest - Turning raw sources into chunks
//!
//! Sources handled here:
//! - The structured profile record
//! - The resume document (PDF or plain text)
//! - Code repositories fetched through a hosting API
//!
//! Everything ends up as `folio_core::Chunk` values produced by the
//! recursive splitter in [`chunker`].

pub mod chunker;
pub mod github;
pub mod portfolio;
pub mod resume;

pub use chunker::{ChunkConfig, Chunker, RecursiveSplitter};
pub use github::{FetchLimits, GitHubClient, RepoFetcher, RepoHost, TreeEntry};
pub use portfolio::portfolio_chunks;
pub use resume::{load_resume_chunks, resume_chunks};

use folio_core::FolioError;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while reading source documents
#[derive(Error, Debug)]
pub enum IngestError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// PDF parsing error
    #[error("PDF parsing error: {0}")]
    PdfError(String),

    /// Malformed payload from a hosting API
    #[error("Malformed payload: {0}")]
    Decode(String),
}

impl From<IngestError> for FolioError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::IoError { source, .. } => FolioError::Io(source),
            IngestError::Decode(msg) => FolioError::Fetch(msg),
            other => FolioError::InvalidInput(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
