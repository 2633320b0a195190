//! Edge cases and boundary conditions across the pipeline: Unicode handling
//! in parsing and chunking, empty/degenerate inputs, and off-by-one cases
//! in the fingerprinter and merger.

use activity_ingest::cache::{cache_key, MemoryCache, ResponseCache};
use activity_ingest::chunker::{chunk, ChunkConfig};
use activity_ingest::extract::heuristic::{self, HeuristicConfig};
use activity_ingest::fingerprint::{self, FingerprintConfig};
use activity_ingest::formats::FormatConfig;
use activity_ingest::merge::{self, MergeConfig};
use activity_ingest::model::{ChatSource, Message};
use activity_ingest::parser::{self, Format};
use chrono::Utc;

fn msg(id: u64, sender: &str, content: &str) -> Message {
    Message {
        id,
        timestamp: Utc::now(),
        sender: sender.to_string(),
        content: content.to_string(),
        raw_line: None,
        has_media: false,
        media_type: None,
        urls: None,
        source: ChatSource::WhatsApp,
        chunk_index: None,
    }
}

// ---------------------------------------------------------------------
// Unicode in parsing and chunking
// ---------------------------------------------------------------------

#[test]
fn test_parse_preserves_non_latin_scripts() {
    let text = "[10/10/23, 2:16:42 PM] Иван: Привет, давайте сходим в поход!\n\
                [10/10/23, 2:17:00 PM] 田中太郎: こんにちは、行きましょう！\n";
    let (messages, _, errors) = parser::parse(text, None, Format::Auto, FormatConfig::default());
    assert!(errors.is_empty());
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender, "Иван");
    assert_eq!(messages[1].content, "こんにちは、行きましょう！");
}

#[test]
fn test_chunk_counts_code_points_not_bytes() {
    // Each CJK character is 3 bytes in UTF-8 but one Unicode scalar value;
    // chunking must bound by `.chars().count()`, not `.len()`.
    let body = "世".repeat(300);
    let chunks = chunk(&body, ChunkConfig::default());
    assert!(chunks.len() >= 2);
    for c in &chunks {
        assert!(c.chars().count() <= 280 + 32 - 1);
    }
}

#[test]
fn test_chunk_does_not_split_inside_emoji_sequence() {
    // A family emoji built from ZWJ-joined scalars should never be split at
    // a non-whitespace boundary; padding it with plain words either side
    // gives the splitter whitespace to prefer instead.
    let family = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}";
    let body = format!("{}{} {}", "word ".repeat(60), family, "word ".repeat(5));
    let chunks = chunk(&body, ChunkConfig::default());
    let rejoined: String = chunks.iter().map(|c| c.replace('\u{2026}', "")).collect();
    assert!(rejoined.contains(family));
}

#[test]
fn test_empty_body_is_not_chunked() {
    assert_eq!(chunk("", ChunkConfig::default()), vec!["".to_string()]);
}

// ---------------------------------------------------------------------
// Fingerprinting edge cases
// ---------------------------------------------------------------------

#[test]
fn test_fingerprint_of_empty_message_list() {
    let chunks = fingerprint::build_monthly_chunks(&[], FingerprintConfig::default());
    assert!(chunks.is_empty());
}

#[test]
fn test_fingerprint_single_message_month() {
    let messages = vec![msg(1, "Nathan", "hi")];
    let chunks = fingerprint::build_monthly_chunks(&messages, FingerprintConfig::default());
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].message_count, 1);
}

#[test]
fn test_plan_dedup_with_no_known_fingerprints_processes_everything() {
    let messages = vec![msg(1, "Nathan", "hi"), msg(2, "Maria", "hey")];
    let chunks = fingerprint::build_monthly_chunks(&messages, FingerprintConfig::default());
    let plan = fingerprint::plan_dedup(chunks, &std::collections::HashSet::new());
    assert_eq!(plan.duplicate.len(), 0);
    assert_eq!(plan.to_process.len(), 1);
}

// ---------------------------------------------------------------------
// Heuristic extractor edge cases
// ---------------------------------------------------------------------

#[test]
fn test_heuristic_ignores_empty_content() {
    let messages = vec![msg(1, "Nathan", "")];
    let (candidates, _) = heuristic::extract(&messages, HeuristicConfig::default());
    assert!(candidates.is_empty());
}

#[test]
fn test_heuristic_content_with_only_emoji_no_match() {
    let messages = vec![msg(1, "Nathan", "🎉🎉🎉")];
    let (candidates, _) = heuristic::extract(&messages, HeuristicConfig::default());
    assert!(candidates.is_empty());
}

#[test]
fn test_heuristic_is_case_insensitive() {
    let messages = vec![msg(1, "Nathan", "LET'S GO hiking this weekend")];
    let (candidates, _) = heuristic::extract(&messages, HeuristicConfig::default());
    assert_eq!(candidates.len(), 1);
}

// ---------------------------------------------------------------------
// Merge edge cases
// ---------------------------------------------------------------------

#[test]
fn test_merge_with_no_candidates_returns_empty() {
    let messages = vec![msg(1, "Nathan", "hi")];
    let (merged, stats) = merge::merge(vec![], vec![], &messages, MergeConfig::default());
    assert!(merged.is_empty());
    assert_eq!(stats.total, 0);
}

#[test]
fn test_context_window_at_start_of_conversation_only_has_after() {
    use activity_ingest::model::{Candidate, CandidateSource, CandidateType};
    let messages: Vec<Message> = (0..10).map(|i| msg(i, "Nathan", &"word ".repeat(60))).collect();
    let first = Candidate {
        message_id: 0,
        content: "x".into(),
        sender: "Nathan".into(),
        timestamp: Utc::now(),
        source: CandidateSource::Regex { pattern: "p".into() },
        confidence: 0.8,
        candidate_type: CandidateType::Suggestion,
        context_before: Vec::new(),
        context_after: Vec::new(),
        urls: None,
    };
    let (merged, _) = merge::merge(vec![first], vec![], &messages, MergeConfig::default());
    assert!(merged[0].context_before.is_empty());
    assert!(!merged[0].context_after.is_empty());
}

// ---------------------------------------------------------------------
// Cache edge cases
// ---------------------------------------------------------------------

#[test]
fn test_cache_key_handles_empty_fingerprint() {
    assert_eq!(cache_key("").len(), 64);
}

#[test]
fn test_memory_cache_overwrite_replaces_value() {
    use activity_ingest::model::CachedResponse;
    use std::time::Duration;

    let cache: MemoryCache<u32> = MemoryCache::new();
    let key = cache_key("x");
    cache.set(&key, CachedResponse::success(1, Utc::now()), Duration::from_secs(60));
    cache.set(&key, CachedResponse::success(2, Utc::now()), Duration::from_secs(60));
    assert_eq!(cache.get(&key).unwrap().data.ok(), Some(&2));
}
