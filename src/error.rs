//! Unified error types for activity-ingest.
//!
//! This module provides a single [`IngestError`] enum that covers all error
//! cases in the crate, following the same shape as `thiserror`-based errors
//! in `reqwest` and `serde_json`: typed variants callers can match on, with
//! source error chains preserved for debugging.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A specialized [`Result`] type for activity-ingest operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// The error type for all activity-ingest operations.
///
/// Each variant carries enough structured context to reconstruct the
/// taxonomy of section 7 (`rate_limit`, `auth`, `quota`, `network`,
/// `invalid_response`, `invalid_request`, plus the scrape-specific
/// `parse`/`blocked`/`not_found`/`unsupported`) without a stack trace
/// crossing a module boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngestError {
    /// An I/O error occurred reading an export file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A single record failed to parse; parsing continues past it.
    #[error("failed to parse {source_format} record{}: {reason}", path.as_ref().map(|p| format!(" (file: {})", p.display())).unwrap_or_default())]
    ParseRecord {
        source_format: &'static str,
        reason: String,
        path: Option<PathBuf>,
    },

    /// The input doesn't match any known export format.
    #[error("could not detect export format: {message}")]
    UnknownFormat { message: String },

    /// An embedding-query bundle didn't match the current query catalogue.
    #[error("query embedding bundle is stale: {diffs}")]
    StaleQueryBundle { diffs: String },

    /// Embedding vectors being compared have mismatched dimensions.
    #[error("embedding dimension mismatch: {a} vs {b}")]
    DimensionMismatch { a: usize, b: usize },

    /// The response cache held content that failed to deserialize.
    ///
    /// Per section 7, a corrupted cache entry behaves as a miss, never
    /// as an error surfaced to the caller — this variant exists for callers
    /// implementing their own [`crate::cache::ResponseCache`] who want to
    /// log the corruption before treating it as absent.
    #[error("corrupted cache entry for key {key}: {reason}")]
    CacheCorrupt { key: String, reason: String },

    /// A URL metadata scrape failed.
    #[error("scrape failed for {url}: {kind:?} ({message})")]
    Scrape {
        url: String,
        kind: ScrapeErrorKind,
        message: String,
        final_url: Option<String>,
    },

    /// The embedding provider failed after exhausting retries.
    #[error("embedding provider error: {kind:?} ({message})")]
    Embedding {
        kind: ProviderErrorKind,
        message: String,
    },
}

/// Kinds of scrape failure, matching section 7's taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeErrorKind {
    Network,
    Parse,
    Blocked,
    NotFound,
    Unsupported,
}

/// Kinds of embedding-provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    RateLimit,
    Auth,
    Quota,
    Network,
    InvalidResponse,
    InvalidRequest,
}

impl IngestError {
    pub fn parse_record(
        source_format: &'static str,
        reason: impl Into<String>,
        path: Option<PathBuf>,
    ) -> Self {
        IngestError::ParseRecord {
            source_format,
            reason: reason.into(),
            path,
        }
    }

    pub fn unknown_format(message: impl Into<String>) -> Self {
        IngestError::UnknownFormat {
            message: message.into(),
        }
    }

    pub fn scrape(
        url: impl Into<String>,
        kind: ScrapeErrorKind,
        message: impl Into<String>,
        final_url: Option<String>,
    ) -> Self {
        IngestError::Scrape {
            url: url.into(),
            kind,
            message: message.into(),
            final_url,
        }
    }

    /// Returns `true` if this is a parse-record error (non-fatal to a run).
    pub fn is_parse_record(&self) -> bool {
        matches!(self, IngestError::ParseRecord { .. })
    }

    /// Returns `true` if this is a scrape error, and if so its tagged kind.
    pub fn scrape_kind(&self) -> Option<ScrapeErrorKind> {
        match self {
            IngestError::Scrape { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_display() {
        let err = IngestError::parse_record("whatsapp", "bad timestamp", None);
        let display = err.to_string();
        assert!(display.contains("whatsapp"));
        assert!(display.contains("bad timestamp"));
        assert!(err.is_parse_record());
    }

    #[test]
    fn test_scrape_error_roundtrip() {
        let err = IngestError::scrape(
            "https://bit.ly/x",
            ScrapeErrorKind::NotFound,
            "404",
            Some("https://target.example/page".to_string()),
        );
        assert_eq!(err.scrape_kind(), Some(ScrapeErrorKind::NotFound));
        assert!(err.to_string().contains("bit.ly"));
    }

    #[test]
    fn test_io_error_source_chain() {
        use std::error::Error;
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err = IngestError::from(io_err);
        assert!(err.source().is_some());
    }
}
