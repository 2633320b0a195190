//! Heuristic extractor (C5): a fixed, ordered catalogue of regex patterns
//! plus a URL-type confidence table.
//!
//! The `regex` crate has no lookaround, so the catalogue's negative
//! lookaheads (`we should` excludes `...not|stop|avoid`) are expressed as a
//! separate exclude pattern tested against the text immediately following
//! the trigger match, rather than folded into one regex.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Candidate, CandidateSource, CandidateType, Message};

/// Confidence tier a pattern belongs to; bounds the keyword-boosted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    fn ceiling(self) -> f32 {
        match self {
            Tier::High => 1.0,
            Tier::Medium => 0.80,
            Tier::Low => 0.65,
        }
    }
}

struct PatternDef {
    name: &'static str,
    trigger: Regex,
    /// Tested against the text following the trigger match; a hit vetoes it.
    exclude: Option<Regex>,
    confidence: f32,
    tier: Tier,
    candidate_type: CandidateType,
}

/// Catalogue order matters: it is the tie-break when two patterns report
/// the same confidence.
static CATALOGUE: Lazy<Vec<PatternDef>> = Lazy::new(|| {
    use CandidateType::{Agreement, Suggestion};
    vec![
        PatternDef {
            name: "lets_go",
            trigger: Regex::new(r"(?i)\blet'?s go\b").unwrap(),
            exclude: Some(Regex::new(r"(?i)^\s*(home|back|now|already)\b").unwrap()),
            confidence: 0.85,
            tier: Tier::High,
            candidate_type: Suggestion,
        },
        PatternDef {
            name: "count_me_in",
            trigger: Regex::new(r"(?i)\bcount me in\b").unwrap(),
            exclude: None,
            confidence: 0.90,
            tier: Tier::High,
            candidate_type: Agreement,
        },
        PatternDef {
            name: "im_down",
            trigger: Regex::new(r"(?i)\bi'?m down\b").unwrap(),
            exclude: None,
            confidence: 0.88,
            tier: Tier::High,
            candidate_type: Agreement,
        },
        PatternDef {
            name: "lets_do_it",
            trigger: Regex::new(r"(?i)\blet'?s do it\b").unwrap(),
            exclude: None,
            confidence: 0.88,
            tier: Tier::High,
            candidate_type: Agreement,
        },
        PatternDef {
            name: "should_we",
            trigger: Regex::new(r"(?i)\bshould we\b").unwrap(),
            exclude: None,
            confidence: 0.85,
            tier: Tier::High,
            candidate_type: Suggestion,
        },
        PatternDef {
            name: "we_should",
            trigger: Regex::new(r"(?i)\bwe should\b").unwrap(),
            exclude: Some(Regex::new(r"(?i)^\s*(not|stop|avoid|have|be careful)\b").unwrap()),
            confidence: 0.75,
            tier: Tier::Medium,
            candidate_type: Suggestion,
        },
        PatternDef {
            name: "i_want_to",
            trigger: Regex::new(r"(?i)\bi want to\b").unwrap(),
            exclude: Some(
                Regex::new(r"(?i)^\s*(die|cry|leave|sleep|quit|go home)\b").unwrap(),
            ),
            confidence: 0.70,
            tier: Tier::Medium,
            candidate_type: Suggestion,
        },
        PatternDef {
            name: "how_about",
            trigger: Regex::new(r"(?i)\bhow about\b").unwrap(),
            exclude: None,
            confidence: 0.70,
            tier: Tier::Medium,
            candidate_type: Suggestion,
        },
        PatternDef {
            name: "what_about",
            trigger: Regex::new(r"(?i)\bwhat about\b").unwrap(),
            exclude: None,
            confidence: 0.65,
            tier: Tier::Medium,
            candidate_type: Suggestion,
        },
        PatternDef {
            name: "sounds_good",
            trigger: Regex::new(r"(?i)\bsounds good\b").unwrap(),
            exclude: None,
            confidence: 0.75,
            tier: Tier::Medium,
            candidate_type: Agreement,
        },
        PatternDef {
            name: "sounds_fun",
            trigger: Regex::new(r"(?i)\bsounds (fun|amazing|great)\b").unwrap(),
            exclude: None,
            confidence: 0.75,
            tier: Tier::Medium,
            candidate_type: Agreement,
        },
        PatternDef {
            name: "im_in",
            trigger: Regex::new(r"(?i)\bi'?m in\b").unwrap(),
            exclude: None,
            confidence: 0.72,
            tier: Tier::Medium,
            candidate_type: Agreement,
        },
        PatternDef {
            name: "maybe_we_could",
            trigger: Regex::new(r"(?i)\bmaybe we could\b").unwrap(),
            exclude: None,
            confidence: 0.55,
            tier: Tier::Low,
            candidate_type: Suggestion,
        },
        PatternDef {
            name: "thinking_about",
            trigger: Regex::new(r"(?i)\bthinking about\b").unwrap(),
            exclude: None,
            confidence: 0.50,
            tier: Tier::Low,
            candidate_type: Suggestion,
        },
        PatternDef {
            name: "ok_lets",
            trigger: Regex::new(r"(?i)\bok(ay)? let'?s\b").unwrap(),
            exclude: None,
            confidence: 0.60,
            tier: Tier::Low,
            candidate_type: Agreement,
        },
    ]
});

/// Exclusion categories (work, medical, chores, negation, past tense): a
/// hit on any of these disqualifies the message regardless of which
/// activity pattern matched.
static EXCLUSION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(meeting|deadline|conference call|office|boss|shift|timesheet)\b",
        r"(?i)\b(doctor|dentist|appointment|hospital|prescription|surgery|therapist)\b",
        r"(?i)\b(laundry|dishes|groceries|vacuum|clean the|chores)\b",
        r"(?i)\b(don'?t|do not|can'?t|cannot|won'?t|never)\b",
        r"(?i)\b(went|did|was|were|have been|had gone)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

fn is_excluded(content: &str) -> bool {
    EXCLUSION_PATTERNS.iter().any(|re| re.is_match(content))
}

struct KeywordGroup {
    words: &'static [&'static str],
}

static KEYWORD_GROUPS: Lazy<Vec<KeywordGroup>> = Lazy::new(|| {
    vec![
        KeywordGroup { words: &["restaurant", "dinner", "lunch", "brunch", "coffee", "drinks", "bar", "food"] },
        KeywordGroup { words: &["beach", "pool", "swim", "surf", "lake", "ocean"] },
        KeywordGroup { words: &["hike", "hiking", "trail", "mountain", "summit"] },
        KeywordGroup { words: &["park", "garden", "botanical"] },
        KeywordGroup { words: &["museum", "gallery", "theatre", "theater", "concert", "exhibit"] },
        KeywordGroup { words: &["market", "bazaar", "fair"] },
        KeywordGroup { words: &["hotel", "hostel", "airbnb", "resort", "stay"] },
        KeywordGroup { words: &["climbing", "kayak", "kayaking", "ski", "diving", "zipline"] },
        KeywordGroup { words: &["flight", "trip", "itinerary", "passport", "visa"] },
    ]
});

const KEYWORD_BOOST_STEP: f32 = 0.05;
const KEYWORD_BOOST_MAX: f32 = 0.15;

/// Additive, clamped `[0, 0.15]` boost from advisory activity keywords.
fn keyword_boost(content: &str) -> f32 {
    let lower = content.to_lowercase();
    let hits = KEYWORD_GROUPS
        .iter()
        .filter(|g| g.words.iter().any(|w| lower.contains(w)))
        .count();
    (hits as f32 * KEYWORD_BOOST_STEP).min(KEYWORD_BOOST_MAX)
}

/// Classifies a URL into a known type with its table confidence (section
/// 4.5). Unrecognised hosts fall back to the generic `website` entry.
fn classify_url(url: &str) -> (&'static str, f32) {
    let lower = url.to_lowercase();
    if lower.contains("tiktok.com") {
        ("tiktok", 0.50)
    } else if lower.contains("youtube.com") || lower.contains("youtu.be") {
        ("youtube", 0.40)
    } else if lower.contains("airbnb.") {
        ("airbnb", 0.80)
    } else if lower.contains("booking.com") {
        ("booking", 0.80)
    } else if lower.contains("tripadvisor.") {
        ("tripadvisor", 0.75)
    } else if lower.contains("eventbrite.") {
        ("event", 0.85)
    } else if lower.contains("facebook.com/groups") {
        ("facebook_group", 0.75)
    } else if lower.contains("facebook.com") {
        ("facebook", 0.40)
    } else if lower.contains("instagram.com") {
        ("instagram", 0.35)
    } else if lower.contains("twitter.com") || lower.contains("x.com") {
        ("x", 0.35)
    } else if lower.contains("google.com/maps") || lower.contains("maps.app.goo.gl") || lower.contains("goo.gl/maps") {
        ("google_maps", 0.70)
    } else {
        ("website", 0.30)
    }
}

/// Configuration for [`extract`].
#[derive(Debug, Clone, Copy)]
pub struct HeuristicConfig {
    pub min_confidence: f32,
    /// Messages attached before/after a candidate when context is desired.
    /// The merger (C7) is responsible for the windowing rule; the extractor
    /// itself emits empty windows.
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self { min_confidence: 0.50 }
    }
}

/// Counts of emitted candidates by source, per section 4.5.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicStats {
    pub regex_count: usize,
    pub url_count: usize,
}

enum Winner<'a> {
    Regex { confidence: f32, def: &'a PatternDef },
    Url { confidence: f32, url_type: &'static str },
}

impl Winner<'_> {
    fn confidence(&self) -> f32 {
        match self {
            Winner::Regex { confidence, .. } => *confidence,
            Winner::Url { confidence, .. } => *confidence,
        }
    }
}

fn best_regex_match(content: &str) -> Option<(usize, &'static PatternDef, f32)> {
    let mut best: Option<(usize, &'static PatternDef, f32)> = None;
    for (i, def) in CATALOGUE.iter().enumerate() {
        let Some(m) = def.trigger.find(content) else { continue };
        if let Some(exclude) = &def.exclude {
            if exclude.is_match(&content[m.end()..]) {
                continue;
            }
        }
        let boosted = (def.confidence + keyword_boost(content)).min(def.tier.ceiling());
        let better = match &best {
            None => true,
            Some((_, _, best_conf)) => boosted > *best_conf,
        };
        if better {
            best = Some((i, def, boosted));
        }
    }
    best
}

fn best_url_match(urls: &[String]) -> Option<(&'static str, f32)> {
    urls.iter()
        .map(|u| classify_url(u))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
}

/// Runs the heuristic catalogue and URL-type table over `messages`.
///
/// Per message, at most one candidate is emitted: the highest-confidence
/// match across regex patterns and URL types, ties broken in favour of
/// regex (catalogue order within regex, which mirrors the merger's
/// `regex > url` precedence in section 4.7). A hit on any exclusion
/// category disqualifies the message outright.
pub fn extract(messages: &[Message], config: HeuristicConfig) -> (Vec<Candidate>, HeuristicStats) {
    let mut candidates = Vec::new();
    let mut stats = HeuristicStats::default();

    for message in messages {
        if message.has_media || is_excluded(&message.content) {
            continue;
        }

        let regex_hit = best_regex_match(&message.content);
        let url_hit = message.urls.as_deref().and_then(best_url_match);

        let winner = match (regex_hit, url_hit) {
            (Some((_, def, conf)), Some((ty, url_conf))) => {
                if conf >= url_conf {
                    Some(Winner::Regex { confidence: conf, def })
                } else {
                    Some(Winner::Url { confidence: url_conf, url_type: ty })
                }
            }
            (Some((_, def, conf)), None) => Some(Winner::Regex { confidence: conf, def }),
            (None, Some((ty, url_conf))) => Some(Winner::Url { confidence: url_conf, url_type: ty }),
            (None, None) => None,
        };

        let Some(winner) = winner else { continue };
        if winner.confidence() < config.min_confidence {
            continue;
        }

        let (source, candidate_type) = match &winner {
            Winner::Regex { def, .. } => (
                CandidateSource::Regex { pattern: def.name.to_string() },
                def.candidate_type,
            ),
            Winner::Url { url_type, .. } => (
                CandidateSource::Url { url_type: url_type.to_string() },
                CandidateType::Suggestion,
            ),
        };

        match &winner {
            Winner::Regex { .. } => stats.regex_count += 1,
            Winner::Url { .. } => stats.url_count += 1,
        }

        candidates.push(Candidate {
            message_id: message.id,
            content: message.content.clone(),
            sender: message.sender.clone(),
            timestamp: message.timestamp,
            source,
            confidence: winner.confidence(),
            candidate_type,
            context_before: Vec::new(),
            context_after: Vec::new(),
            urls: message.urls.clone(),
        });
    }

    (candidates, stats)
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

    #[test]
    fn test_lets_go_fires_as_suggestion() {
        let m = msg(0, "Let's go hiking at Queenstown!");
        let (candidates, stats) = extract(&[m], HeuristicConfig::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].candidate_type, CandidateType::Suggestion);
        assert!(candidates[0].confidence >= 0.85);
        assert_eq!(stats.regex_count, 1);
    }

    #[test]
    fn test_lets_go_home_is_excluded() {
        let m = msg(0, "let's go home now");
        let (candidates, _) = extract(&[m], HeuristicConfig::default());
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_we_should_not_is_excluded() {
        let m = msg(0, "we should not go there");
        let (candidates, _) = extract(&[m], HeuristicConfig::default());
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_work_exclusion_overrides_pattern_match() {
        let m = msg(0, "we should go to the meeting early");
        let (candidates, _) = extract(&[m], HeuristicConfig::default());
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_url_candidate_classified_as_airbnb() {
        let mut m = msg(0, "check this place out https://www.airbnb.com/rooms/123");
        m.urls = Some(vec!["https://www.airbnb.com/rooms/123".to_string()]);
        let (candidates, stats) = extract(&[m], HeuristicConfig::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].source,
            CandidateSource::Url { url_type: "airbnb".to_string() }
        );
        assert!((candidates[0].confidence - 0.80).abs() < 1e-6);
        assert_eq!(stats.url_count, 1);
    }

    #[test]
    fn test_keyword_boost_does_not_exceed_tier_ceiling() {
        let m = msg(0, "thinking about a hike at the market near the beach museum hotel");
        let (candidates, _) = extract(&[m], HeuristicConfig::default());
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].confidence <= Tier::Low.ceiling());
    }

    #[test]
    fn test_min_confidence_drops_low_tier() {
        let m = msg(0, "thinking about it");
        let (candidates, _) = extract(&[m], HeuristicConfig { min_confidence: 0.9 });
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_media_message_never_emits_candidate() {
        let mut m = msg(0, "let's go hiking!");
        m.has_media = true;
        let (candidates, _) = extract(&[m], HeuristicConfig::default());
        assert!(candidates.is_empty());
    }
}
