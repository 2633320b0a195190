//! Candidate merger (C7): reconciles the heuristic and semantic candidate
//! sets into one ordered list with context windows attached.

use std::collections::HashMap;

use crate::model::{Candidate, CandidateSource, CandidateType, ContextMessage, Message};

/// Configuration for [`merge`].
#[derive(Debug, Clone, Copy)]
pub struct MergeConfig {
    /// Minimum messages attached on each side of a context window, when
    /// that many exist.
    pub context_min_messages: usize,
    /// Minimum code points of concatenated content on each side, when
    /// enough input exists.
    pub context_min_code_points: usize,
    /// An `agreement` within this many message ids of any `suggestion` is
    /// dropped — the suggestion already carries the activity.
    pub agreement_proximity: u64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            context_min_messages: 2,
            context_min_code_points: 280,
            agreement_proximity: 5,
        }
    }
}

/// Aggregate counts returned alongside the merged list.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeStats {
    pub total: usize,
    pub agreements_removed: usize,
}

fn source_rank(source: &CandidateSource) -> u8 {
    match source {
        CandidateSource::Regex { .. } => 0,
        CandidateSource::Url { .. } => 1,
        CandidateSource::Semantic { .. } => 2,
    }
}

/// Step 1: index by `messageId`, keeping the higher-confidence candidate
/// per id; ties broken `regex > url > semantic`.
fn dedupe_by_message_id(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut by_id: HashMap<u64, Candidate> = HashMap::new();
    for candidate in candidates {
        match by_id.get(&candidate.message_id) {
            None => {
                by_id.insert(candidate.message_id, candidate);
            }
            Some(existing) => {
                let replace = match candidate.confidence.partial_cmp(&existing.confidence).unwrap() {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => {
                        source_rank(&candidate.source) < source_rank(&existing.source)
                    }
                };
                if replace {
                    by_id.insert(candidate.message_id, candidate);
                }
            }
        }
    }
    by_id.into_values().collect()
}

/// Step 2: attaches the smallest prefix/suffix of surrounding messages that
/// satisfies both the message-count and code-point floors.
fn attach_context(candidates: &mut [Candidate], messages: &[Message], config: MergeConfig) {
    let index_by_id: HashMap<u64, usize> =
        messages.iter().enumerate().map(|(i, m)| (m.id, i)).collect();

    for candidate in candidates.iter_mut() {
        let Some(&pos) = index_by_id.get(&candidate.message_id) else { continue };

        let mut before = Vec::new();
        let mut before_len = 0usize;
        let mut i = pos;
        while i > 0 {
            i -= 1;
            before.push(ContextMessage::from(&messages[i]));
            before_len += messages[i].content.chars().count();
            if before.len() >= config.context_min_messages && before_len >= config.context_min_code_points {
                break;
            }
        }
        before.reverse();

        let mut after = Vec::new();
        let mut after_len = 0usize;
        let mut j = pos + 1;
        while j < messages.len() {
            after.push(ContextMessage::from(&messages[j]));
            after_len += messages[j].content.chars().count();
            if after.len() >= config.context_min_messages && after_len >= config.context_min_code_points {
                break;
            }
            j += 1;
        }

        candidate.context_before = before;
        candidate.context_after = after;
    }
}

/// Step 3: drops an `agreement` candidate if any `suggestion` candidate
/// lies within `agreement_proximity` message ids, before or after.
fn dedup_agreement_proximity(candidates: Vec<Candidate>, config: MergeConfig) -> (Vec<Candidate>, usize) {
    let mut sorted = candidates;
    sorted.sort_by_key(|c| c.message_id);

    let suggestion_ids: Vec<u64> = sorted
        .iter()
        .filter(|c| c.candidate_type == CandidateType::Suggestion)
        .map(|c| c.message_id)
        .collect();

    let mut removed = 0usize;
    let kept: Vec<Candidate> = sorted
        .into_iter()
        .filter(|c| {
            if c.candidate_type != CandidateType::Agreement {
                return true;
            }
            let near_suggestion = suggestion_ids
                .iter()
                .any(|&sid| sid.abs_diff(c.message_id) <= config.agreement_proximity);
            if near_suggestion {
                removed += 1;
                false
            } else {
                true
            }
        })
        .collect();

    (kept, removed)
}

/// Merges heuristic and semantic candidates over the same message list.
pub fn merge(
    heuristic: Vec<Candidate>,
    semantic: Vec<Candidate>,
    messages: &[Message],
    config: MergeConfig,
) -> (Vec<Candidate>, MergeStats) {
    let mut all = heuristic;
    all.extend(semantic);

    let mut deduped = dedupe_by_message_id(all);
    attach_context(&mut deduped, messages, config);

    let (mut kept, agreements_removed) = dedup_agreement_proximity(deduped, config);

    kept.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap()
            .then(a.message_id.cmp(&b.message_id))
    });

    let stats = MergeStats {
        total: kept.len(),
        agreements_removed,
    };
    (kept, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatSource;
    use chrono::Utc;

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

    fn candidate(message_id: u64, confidence: f32, source: CandidateSource, ct: CandidateType) -> Candidate {
        Candidate {
            message_id,
            content: "x".into(),
            sender: "Nathan".into(),
            timestamp: Utc::now(),
            source,
            confidence,
            candidate_type: ct,
            context_before: Vec::new(),
            context_after: Vec::new(),
            urls: None,
        }
    }

    #[test]
    fn test_dedupe_keeps_higher_confidence() {
        let a = candidate(1, 0.6, CandidateSource::Regex { pattern: "p".into() }, CandidateType::Suggestion);
        let b = candidate(
            1,
            0.9,
            CandidateSource::Semantic { query: "q".into(), query_type: crate::model::SemanticQueryType::Suggestion, similarity: 0.9 },
            CandidateType::Suggestion,
        );
        let messages: Vec<Message> = (0..3).map(|i| msg(i, "hi")).collect();
        let (merged, stats) = merge(vec![a], vec![b], &messages, MergeConfig::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(stats.total, 1);
        assert!((merged[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_dedupe_tie_prefers_regex_over_url_over_semantic() {
        let regex = candidate(1, 0.8, CandidateSource::Regex { pattern: "p".into() }, CandidateType::Suggestion);
        let url = candidate(1, 0.8, CandidateSource::Url { url_type: "airbnb".into() }, CandidateType::Suggestion);
        let messages: Vec<Message> = (0..3).map(|i| msg(i, "hi")).collect();
        let (merged, _) = merge(vec![regex, url], vec![], &messages, MergeConfig::default());
        assert_eq!(merged.len(), 1);
        assert!(matches!(merged[0].source, CandidateSource::Regex { .. }));
    }

    #[test]
    fn test_agreement_near_suggestion_is_dropped() {
        let suggestion = candidate(1, 0.85, CandidateSource::Regex { pattern: "we_should".into() }, CandidateType::Suggestion);
        let agreement = candidate(2, 0.75, CandidateSource::Regex { pattern: "sounds_fun".into() }, CandidateType::Agreement);
        let messages: Vec<Message> = (0..5).map(|i| msg(i, "hi")).collect();
        let (merged, stats) = merge(vec![suggestion, agreement], vec![], &messages, MergeConfig::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(stats.agreements_removed, 1);
        assert_eq!(merged[0].candidate_type, CandidateType::Suggestion);
    }

    #[test]
    fn test_agreement_far_from_suggestion_survives() {
        let suggestion = candidate(1, 0.85, CandidateSource::Regex { pattern: "we_should".into() }, CandidateType::Suggestion);
        let agreement = candidate(20, 0.75, CandidateSource::Regex { pattern: "sounds_fun".into() }, CandidateType::Agreement);
        let messages: Vec<Message> = (0..25).map(|i| msg(i, "hi")).collect();
        let (merged, stats) = merge(vec![suggestion, agreement], vec![], &messages, MergeConfig::default());
        assert_eq!(merged.len(), 2);
        assert_eq!(stats.agreements_removed, 0);
    }

    #[test]
    fn test_final_sort_is_confidence_desc_then_id_asc() {
        let a = candidate(5, 0.6, CandidateSource::Regex { pattern: "a".into() }, CandidateType::Suggestion);
        let b = candidate(1, 0.6, CandidateSource::Regex { pattern: "b".into() }, CandidateType::Suggestion);
        let c = candidate(3, 0.9, CandidateSource::Regex { pattern: "c".into() }, CandidateType::Suggestion);
        let messages: Vec<Message> = (0..10).map(|i| msg(i, "hi")).collect();
        let (merged, _) = merge(vec![a, b, c], vec![], &messages, MergeConfig::default());
        let ids: Vec<u64> = merged.iter().map(|c| c.message_id).collect();
        assert_eq!(ids, vec![3, 1, 5]);
    }

    #[test]
    fn test_context_window_respects_minimums() {
        let messages: Vec<Message> = (0..10)
            .map(|i| msg(i, &"word ".repeat(60)))
            .collect();
        let mid = candidate(5, 0.8, CandidateSource::Regex { pattern: "p".into() }, CandidateType::Suggestion);
        let (merged, _) = merge(vec![mid], vec![], &messages, MergeConfig::default());
        assert!(merged[0].context_before.len() >= 2);
        assert!(merged[0].context_after.len() >= 2);
    }

    #[test]
    fn test_no_duplicate_message_ids_in_output() {
        let messages: Vec<Message> = (0..10).map(|i| msg(i, "hi")).collect();
        let a = candidate(1, 0.6, CandidateSource::Regex { pattern: "a".into() }, CandidateType::Suggestion);
        let b = candidate(1, 0.7, CandidateSource::Regex { pattern: "b".into() }, CandidateType::Suggestion);
        let (merged, _) = merge(vec![a, b], vec![], &messages, MergeConfig::default());
        let mut ids: Vec<u64> = merged.iter().map(|c| c.message_id).collect();
        let before = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }
}
