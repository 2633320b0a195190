//! Core data types shared across every stage of the pipeline.
//!
//! [`Message`] is produced once by the parser and never mutated afterwards.
//! [`MonthlyChunk`] and [`Candidate`] are derived views rebuilt from the
//! message list by the fingerprinter and the extractors/merger respectively.
//! [`ScrapedMetadata`] and [`CachedResponse`] belong to the URL scraper and
//! response cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which chat export produced a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSource {
    WhatsApp,
    IMessage,
}

/// The kind of media placeholder detected in a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Gif,
    Sticker,
    Document,
    Contact,
}

/// A single chat message, possibly one chunk of a longer logical message.
///
/// Invariants (section 3): `id` is dense and monotonic in emission order;
/// `timestamp` never decreases within a chunked group; chunks of one logical
/// message share `(timestamp, sender)` and differ only in `id`, `chunk_index`,
/// and `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Monotonic id assigned at parse time, sequential including chunks.
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    /// Body text, at most 280 Unicode scalar values after chunking.
    pub content: String,
    /// The un-normalised source line. Only present on a chunk's first part.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub raw_line: Option<String>,
    pub has_media: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub media_type: Option<MediaType>,
    /// URLs found in the body, first-occurrence order. Only on the first chunk.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub urls: Option<Vec<String>>,
    pub source: ChatSource,
    /// Set iff this logical message was split into >= 2 chunks.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chunk_index: Option<usize>,
}

impl Message {
    /// Returns `true` if this message is one chunk of a larger logical message.
    pub fn is_chunk(&self) -> bool {
        self.chunk_index.is_some()
    }

    /// Returns `true` if `other` is part of the same logical message as
    /// `self` — same `(timestamp, sender)` and contiguous ids. Per Design
    /// Note 9, this is how a "logical message" view is reconstructed instead
    /// of storing a cyclic parent reference.
    pub fn same_logical_message(&self, other: &Message) -> bool {
        self.timestamp == other.timestamp
            && self.sender == other.sender
            && (self.id as i64 - other.id as i64).abs() == 1
    }
}

/// A calendar-month bucket of messages with a fingerprint stable across
/// re-exports despite timestamp drift (section 4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyChunk {
    /// `YYYY-MM`, deterministic from `month_start`.
    pub month_key: String,
    /// UTC midnight of day 1 of the month.
    pub month_start: DateTime<Utc>,
    pub message_count: usize,
    /// Lowercase SHA-256 hex digest, 64 characters.
    pub fingerprint: String,
    pub first_message_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    /// Dropped before persistence; present only while building a plan.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub messages: Option<Vec<Message>>,
}

/// Where a [`Candidate`] was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CandidateSource {
    Regex { pattern: String },
    Url { url_type: String },
    Semantic {
        query: String,
        query_type: SemanticQueryType,
        similarity: f32,
    },
}

/// The two canonical query families the semantic extractor searches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticQueryType {
    Suggestion,
    Agreement,
}

/// The two candidate polarities (Glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateType {
    /// Proposes an activity.
    Suggestion,
    /// Reactive endorsement of a preceding suggestion.
    Agreement,
}

/// A message plus metadata proposing it for downstream activity classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique within a result set (section 3 invariant).
    pub message_id: u64,
    pub content: String,
    pub sender: String,
    pub timestamp: DateTime<Utc>,
    pub source: CandidateSource,
    pub confidence: f32,
    pub candidate_type: CandidateType,
    pub context_before: Vec<ContextMessage>,
    pub context_after: Vec<ContextMessage>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub urls: Option<Vec<String>>,
}

/// A message referenced by a candidate's context window. Carries only the
/// fields a downstream consumer needs (id, sender, timestamp, content) —
/// never a cyclic reference back to the candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMessage {
    pub id: u64,
    pub sender: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

impl From<&Message> for ContextMessage {
    fn from(m: &Message) -> Self {
        ContextMessage {
            id: m.id,
            sender: m.sender.clone(),
            timestamp: m.timestamp,
            content: m.content.clone(),
        }
    }
}

/// Metadata scraped from a URL, post-redirect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapedMetadata {
    /// The URL actually fetched, after following redirects.
    pub canonical_url: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub creator_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub suggested_keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub raw_data: Option<serde_json::Value>,
}

/// Either a successfully cached value, or a first-class negative result.
///
/// A negative result may carry the post-redirect URL observed before the
/// failure (section 4.8) — e.g. a shortened URL whose destination 404s.
/// Callers that need that slug even out of a cached negative should prefer
/// [`CachedValue::final_url`] over pattern-matching the variant directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CachedValue<T> {
    Ok(T),
    Err {
        error: bool,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        final_url: Option<String>,
    },
}

impl<T> CachedValue<T> {
    pub fn err(message: impl Into<String>) -> Self {
        CachedValue::Err {
            error: true,
            message: message.into(),
            final_url: None,
        }
    }

    /// A negative result that still observed a post-redirect URL.
    pub fn err_with_final_url(message: impl Into<String>, final_url: impl Into<String>) -> Self {
        CachedValue::Err {
            error: true,
            message: message.into(),
            final_url: Some(final_url.into()),
        }
    }

    pub fn is_err(&self) -> bool {
        matches!(self, CachedValue::Err { .. })
    }

    pub fn ok(&self) -> Option<&T> {
        match self {
            CachedValue::Ok(v) => Some(v),
            CachedValue::Err { .. } => None,
        }
    }

    pub fn final_url(&self) -> Option<&str> {
        match self {
            CachedValue::Err { final_url, .. } => final_url.as_deref(),
            CachedValue::Ok(_) => None,
        }
    }
}

/// A cache entry: either kind of value plus when it was stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse<T> {
    pub data: CachedValue<T>,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedResponse<T> {
    pub fn success(data: T, cached_at: DateTime<Utc>) -> Self {
        CachedResponse {
            data: CachedValue::Ok(data),
            cached_at,
        }
    }

    pub fn failure(message: impl Into<String>, cached_at: DateTime<Utc>) -> Self {
        CachedResponse {
            data: CachedValue::err(message),
            cached_at,
        }
    }

    pub fn is_expired(&self, ttl_seconds: i64, now: DateTime<Utc>) -> bool {
        (now - self.cached_at).num_seconds() >= ttl_seconds
    }
}
