//! # activity-ingest
//!
//! Turns WhatsApp and iMessage chat exports into a deduplicated, context-
//! enriched list of activity candidates: messages where someone proposed or
//! agreed to do something, with enough surrounding conversation attached to
//! judge the suggestion, optionally enriched with scraped metadata for any
//! URL mentioned.
//!
//! ## Pipeline
//!
//! ```text
//! raw export text
//!   -> formats::{whatsapp, imessage}  (line assembly, one Message per turn)
//!   -> chunker                        (splits oversized bodies, section 4.1)
//!   -> fingerprint                    (monthly buckets + dedup against prior runs)
//!   -> extract::{heuristic, semantic} (two independent candidate sources)
//!   -> merge                          (dedup, context windows, final ordering)
//!   -> scrape (optional)              (URL metadata enrichment, feature "scrape")
//! ```
//!
//! [`parser`] is the façade over [`formats`]: it auto-detects the export
//! format and drives either a batch [`parser::parse`] or a streaming
//! [`parser::StreamParser`] over the same per-line assembly code, so the two
//! modes are guaranteed to agree (see `tests/streaming_tests.rs`).
//!
//! ## Feature flags
//!
//! | Feature | Description | Dependencies |
//! |---------|-------------|--------------|
//! | `scrape` (default) | URL metadata scraper ([`scrape`]) and its batch driver | `reqwest`, `scraper`, `url`, `tokio`, `futures` |
//!
//! Parsing, chunking, fingerprinting, and both extractors never touch the
//! network and are always available; `scrape` is the only feature gate.
//!
//! ## Module structure
//!
//! - [`model`] - shared types: [`model::Message`], [`model::Candidate`], [`model::ScrapedMetadata`]
//! - [`error`] - [`error::IngestError`], [`error::Result`]
//! - [`chunker`] - oversized-body splitting (section 4.1)
//! - [`formats`] - WhatsApp iOS/Android and iMessage line assembly (section 4.2)
//! - [`parser`] - format auto-detection and the unified batch/streaming entry point (section 4.3)
//! - [`fingerprint`] - monthly chunking and content-hash dedup (section 4.4)
//! - [`extract`] - [`extract::heuristic`] regex/URL catalogue and [`extract::semantic`] embedding search (sections 4.5-4.6)
//! - [`merge`] - candidate reconciliation and context-window attachment (section 4.7)
//! - [`scrape`] - URL metadata enrichment, gated behind the `scrape` feature (section 4.8)
//! - [`cache`] - the [`cache::ResponseCache`] trait shared by the semantic extractor and the scraper (section 4.9)

pub mod cache;
pub mod chunker;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod formats;
pub mod merge;
pub mod model;
pub mod parser;
pub mod progress;

#[cfg(feature = "scrape")]
pub mod scrape;

pub use error::{IngestError, Result};
pub use model::{Candidate, Message};

/// Convenient re-exports for common usage.
///
/// ```rust
/// use activity_ingest::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{IngestError, Result};
    pub use crate::model::{
        Candidate, CandidateSource, CandidateType, ChatSource, ContextMessage, Message,
        MonthlyChunk, ScrapedMetadata, SemanticQueryType,
    };

    pub use crate::chunker::{chunk, ChunkConfig};
    pub use crate::formats::FormatConfig;
    pub use crate::parser::{detect_source, parse, Format, ParseStats, StreamParser};

    pub use crate::fingerprint::{build_monthly_chunks, plan_dedup, DedupPlan, FingerprintConfig};

    pub use crate::extract::heuristic;
    pub use crate::extract::semantic::{self, Embedder, QueryBundle, SemanticConfig};

    pub use crate::merge::{merge, MergeConfig, MergeStats};

    pub use crate::cache::{cache_key, FileCache, MemoryCache, ResponseCache};

    #[cfg(feature = "scrape")]
    pub use crate::scrape::{scrape_batch, scrape_url, Platform, ScrapeConfig, ScrapeFailure};

    pub use crate::progress::{no_progress, Progress, ProgressCallback};
}
