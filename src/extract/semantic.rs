//! Semantic extractor (C6): embedding-similarity search against a fixed
//! canonical query catalogue.
//!
//! Embedding generation is an injected collaborator ([`Embedder`]), never a
//! network call made by this module directly — the crate has no opinion on
//! which provider produced the vectors, only that they are cosine-comparable
//! and share one dimension (section 4.6).

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::{cache_key, ResponseCache};
use crate::error::{IngestError, Result};
use crate::model::{Candidate, CandidateSource, CandidateType, Message, SemanticQueryType};

/// `(text) -> vector` contract for an external embedding model. Batches are
/// capped at [`SemanticConfig::batch_size`] messages per call.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// One entry in the canonical query catalogue, supplied pre-embedded by the
/// caller (section 6: the query-embedding bundle is validated externally).
#[derive(Debug, Clone)]
pub struct CanonicalQuery {
    pub text: String,
    pub query_type: SemanticQueryType,
    pub embedding: Vec<f32>,
}

/// A caller-supplied bundle of canonical queries plus their precomputed
/// embeddings.
#[derive(Debug, Clone, Default)]
pub struct QueryBundle {
    pub queries: Vec<CanonicalQuery>,
}

impl QueryBundle {
    /// Validates this bundle against the catalogue of query texts the
    /// caller expects to be current. A mismatch in either direction
    /// (missing or extra) is reported in `diffs` and aborts the run.
    pub fn validate(&self, expected_texts: &[&str]) -> Result<()> {
        let have: std::collections::HashSet<&str> =
            self.queries.iter().map(|q| q.text.as_str()).collect();
        let want: std::collections::HashSet<&str> = expected_texts.iter().copied().collect();

        let missing: Vec<&str> = want.difference(&have).copied().collect();
        let extra: Vec<&str> = have.difference(&want).copied().collect();

        if missing.is_empty() && extra.is_empty() {
            return Ok(());
        }

        let mut diffs = Vec::new();
        if !missing.is_empty() {
            diffs.push(format!("missing: {}", missing.join(", ")));
        }
        if !extra.is_empty() {
            diffs.push(format!("extra: {}", extra.join(", ")));
        }
        Err(IngestError::StaleQueryBundle {
            diffs: diffs.join("; "),
        })
    }
}

/// Cosine similarity on raw vectors: `⟨a,b⟩ / (‖a‖·‖b‖)`. A dimension
/// mismatch is fatal; a zero-norm vector yields `0.0` rather than `NaN`
/// (section 4.6).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(IngestError::DimensionMismatch { a: a.len(), b: b.len() });
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Configuration for [`extract`]. `top_k` and `min_similarity` are
/// deliberately required rather than defaulted (Open Question, section 9).
#[derive(Debug, Clone, Copy)]
pub struct SemanticConfig {
    pub top_k: usize,
    pub min_similarity: f32,
    pub batch_size: usize,
    pub concurrency: usize,
    pub cache_ttl: Duration,
}

impl SemanticConfig {
    pub fn new(top_k: usize, min_similarity: f32) -> Self {
        Self {
            top_k,
            min_similarity,
            batch_size: 100,
            concurrency: 4,
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

/// Emitted per embedded batch so callers can observe cache effectiveness
/// without polling (section 4.6: "a cache-hit batch reports `cacheHit`").
#[derive(Debug, Clone, Copy)]
pub struct BatchEvent {
    pub batch_index: usize,
    pub batch_len: usize,
    pub cache_hit: bool,
}

pub type BatchCallback<'a> = &'a (dyn Fn(BatchEvent) + Send + Sync);

fn eligible(message: &Message) -> bool {
    !message.has_media && message.content.chars().count() > 10
}

fn batch_fingerprint(messages: &[&Message]) -> String {
    messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

/// Embeds all eligible messages in order-preserving, fixed-size batches,
/// consulting `cache` first and filling it in on a miss. Concurrency is
/// bounded by `config.concurrency` but output order always matches input
/// order, regardless of which batch's HTTP round-trip finishes first.
fn embed_messages(
    messages: &[&Message],
    embedder: &dyn Embedder,
    cache: Option<&dyn ResponseCache<Vec<Vec<f32>>>>,
    config: SemanticConfig,
    on_batch: Option<BatchCallback<'_>>,
) -> Result<Vec<Vec<f32>>> {
    let chunks: Vec<&[&Message]> = messages.chunks(config.batch_size.max(1)).collect();

    // Each slot holds the batch's embeddings once resolved, in input order.
    let mut resolved: Vec<Option<Vec<Vec<f32>>>> = vec![None; chunks.len()];

    let pending: Vec<usize> = (0..chunks.len())
        .filter(|&i| {
            let key = cache_key(&batch_fingerprint(chunks[i]));
            let cached = cache.and_then(|c| c.get(&key)).and_then(|r| r.data.ok().cloned());
            if let Some(vectors) = cached {
                if let Some(cb) = on_batch {
                    cb(BatchEvent { batch_index: i, batch_len: chunks[i].len(), cache_hit: true });
                }
                resolved[i] = Some(vectors);
                false
            } else {
                true
            }
        })
        .collect();

    // Bounded-concurrency embedding of the cache misses via a scoped thread
    // pool; `concurrency` caps how many batches are in flight at once.
    let results: Mutex<HashMap<usize, Result<Vec<Vec<f32>>>>> = Mutex::new(HashMap::new());
    std::thread::scope(|scope| {
        let mut work = pending.iter().copied();
        let mut handles = Vec::new();
        loop {
            while handles.len() < config.concurrency.max(1) {
                let Some(idx) = work.next() else { break };
                let batch = chunks[idx];
                let texts: Vec<String> = batch.iter().map(|m| m.content.clone()).collect();
                let results_ref = &results;
                handles.push(scope.spawn(move || {
                    let outcome = embedder.embed(&texts);
                    results_ref.lock().insert(idx, outcome);
                }));
            }
            if handles.is_empty() {
                break;
            }
            handles.remove(0).join().expect("embedding worker panicked");
        }
    });

    let mut outcomes = results.into_inner();
    for idx in pending {
        let outcome = outcomes.remove(&idx).expect("every pending batch produces an outcome");
        let vectors = outcome?;
        if let Some(cb) = on_batch {
            cb(BatchEvent { batch_index: idx, batch_len: chunks[idx].len(), cache_hit: false });
        }
        if let Some(cache) = cache {
            let key = cache_key(&batch_fingerprint(chunks[idx]));
            cache.set(
                &key,
                crate::model::CachedResponse::success(vectors.clone(), chrono::Utc::now()),
                config.cache_ttl,
            );
        }
        resolved[idx] = Some(vectors);
    }

    Ok(resolved
        .into_iter()
        .flat_map(|v| v.expect("every batch is resolved by cache hit or embed"))
        .collect())
}

/// Runs top-K semantic search over `messages` against `queries`, emitting
/// one candidate per message for its single strongest `(query, similarity)`
/// match (section 4.6's per-message dedup rule).
#[allow(clippy::too_many_arguments)]
pub fn extract(
    messages: &[Message],
    queries: &QueryBundle,
    embedder: &dyn Embedder,
    cache: Option<&dyn ResponseCache<Vec<Vec<f32>>>>,
    config: SemanticConfig,
    on_batch: Option<BatchCallback<'_>>,
) -> Result<Vec<Candidate>> {
    let eligible_messages: Vec<&Message> = messages.iter().filter(|m| eligible(m)).collect();
    if eligible_messages.is_empty() || queries.queries.is_empty() {
        return Ok(Vec::new());
    }

    let embeddings = embed_messages(&eligible_messages, embedder, cache, config, on_batch)?;

    // For each message, track its single best (query, similarity) pair.
    let mut best: HashMap<u64, (usize, f32)> = HashMap::new();
    for (msg, vector) in eligible_messages.iter().zip(&embeddings) {
        for (qi, query) in queries.queries.iter().enumerate() {
            let sim = cosine_similarity(vector, &query.embedding)?;
            if sim < config.min_similarity {
                continue;
            }
            let better = match best.get(&msg.id) {
                Some((_, best_sim)) => sim > *best_sim,
                None => true,
            };
            if better {
                best.insert(msg.id, (qi, sim));
            }
        }
    }

    let mut ranked: Vec<(u64, usize, f32)> =
        best.into_iter().map(|(id, (qi, sim))| (id, qi, sim)).collect();
    ranked.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap().then(a.0.cmp(&b.0)));
    ranked.truncate(config.top_k);

    let by_id: HashMap<u64, &Message> = eligible_messages.iter().map(|m| (m.id, *m)).collect();

    let candidates = ranked
        .into_iter()
        .filter_map(|(id, qi, sim)| {
            let message = *by_id.get(&id)?;
            let query = &queries.queries[qi];
            let candidate_type = match query.query_type {
                SemanticQueryType::Suggestion => CandidateType::Suggestion,
                SemanticQueryType::Agreement => CandidateType::Agreement,
            };
            Some(Candidate {
                message_id: message.id,
                content: message.content.clone(),
                sender: message.sender.clone(),
                timestamp: message.timestamp,
                source: CandidateSource::Semantic {
                    query: query.text.clone(),
                    query_type: query.query_type,
                    similarity: sim,
                },
                confidence: sim.max(0.0),
                candidate_type,
                context_before: Vec::new(),
                context_after: Vec::new(),
                urls: message.urls.clone(),
            })
        })
        .collect();

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatSource;
    use chrono::Utc;

    struct StubEmbedder;

    impl Embedder for StubEmbedder {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| if t.contains("hike") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect())
        }
    }

    fn msg(id: u64, content: &str) -> Message {
        Message {
            id,
            timestamp: Utc::now(),
            sender: "Nathan".into(),
            content: content.to_string(),
            raw_line: None,
            has_media: false,
            media_type: None,
            urls: None,
            source: ChatSource::WhatsApp,
            chunk_index: None,
        }
    }

    fn bundle() -> QueryBundle {
        QueryBundle {
            queries: vec![CanonicalQuery {
                text: "wants to go hiking".into(),
                query_type: SemanticQueryType::Suggestion,
                embedding: vec![1.0, 0.0],
            }],
        }
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap() + 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap()).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch_is_fatal() {
        let err = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, IngestError::DimensionMismatch { a: 2, b: 3 }));
    }

    #[test]
    fn test_query_bundle_validate_reports_diffs() {
        let bundle = bundle();
        let err = bundle.validate(&["wants to go hiking", "wants to eat out"]).unwrap_err();
        match err {
            IngestError::StaleQueryBundle { diffs } => assert!(diffs.contains("missing")),
            _ => panic!("expected StaleQueryBundle"),
        }
        assert!(bundle.validate(&["wants to go hiking"]).is_ok());
    }

    #[test]
    fn test_extract_finds_best_matching_message() {
        let messages = vec![
            msg(0, "I want to go hiking this weekend for sure"),
            msg(1, "what time is the dentist appointment tomorrow"),
        ];
        let candidates = extract(
            &messages,
            &bundle(),
            &StubEmbedder,
            None,
            SemanticConfig::new(5, 0.5),
            None,
        )
        .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].message_id, 0);
    }

    #[test]
    fn test_extract_excludes_short_and_media_messages() {
        let mut short = msg(0, "hike?");
        short.has_media = false;
        let mut media = msg(1, "a message long enough to pass the filter");
        media.has_media = true;
        let candidates = extract(
            &[short, media],
            &bundle(),
            &StubEmbedder,
            None,
            SemanticConfig::new(5, 0.0),
            None,
        )
        .unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_extract_respects_top_k() {
        let messages: Vec<Message> = (0..5)
            .map(|i| msg(i, "I want to go hiking this weekend with everyone"))
            .collect();
        let candidates = extract(
            &messages,
            &bundle(),
            &StubEmbedder,
            None,
            SemanticConfig::new(2, 0.0),
            None,
        )
        .unwrap();
        assert_eq!(candidates.len(), 2);
    }
}
