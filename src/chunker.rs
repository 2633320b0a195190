//! Splits oversized message bodies at word boundaries (C1).
//!
//! WhatsApp and iMessage bodies can run arbitrarily long; downstream
//! consumers want a hard ceiling per [`Message`](crate::model::Message).
//! [`chunk`] performs that split losslessly: concatenating the returned
//! chunks after stripping the ellipsis markers and collapsing whitespace
//! reproduces the input's whitespace-collapsed form (tested in
//! `tests/proptest.rs`).

/// Marker appended/prepended at chunk boundaries. U+2026 HORIZONTAL ELLIPSIS.
pub const MARKER: char = '\u{2026}';

/// Configuration for [`chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChunkConfig {
    /// Ceiling on chunk length, in Unicode scalar values. Default 280.
    pub max_len: usize,
    /// Minimum tail length before it gets merged into the preceding chunk
    /// instead of becoming its own chunk. Default 32.
    pub min_len: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_len: 280,
            min_len: 32,
        }
    }
}

impl ChunkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    #[must_use]
    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }
}

/// Splits `body` into chunks obeying [`ChunkConfig`], per section 4.1.
///
/// Returns `[body]` unchanged if `body` already fits, or if the only
/// possible split point would immediately be absorbed back (the degenerate
/// case where splitting buys nothing).
pub fn chunk(body: &str, config: ChunkConfig) -> Vec<String> {
    let chars: Vec<char> = body.chars().collect();
    if chars.len() <= config.max_len {
        return vec![body.to_string()];
    }

    let mut pieces: Vec<Vec<char>> = Vec::new();
    let mut remaining: Vec<char> = chars;
    let mut is_first = true;

    loop {
        let reserve = if is_first { 1 } else { 2 };
        let budget = config.max_len.saturating_sub(reserve);

        if remaining.len() <= budget {
            pieces.push(remaining);
            break;
        }

        let split_at = find_split_point(&remaining, budget);
        let is_whitespace_boundary = split_at < remaining.len() && remaining[split_at].is_whitespace();
        let tail_start = skip_leading_whitespace(&remaining, split_at);
        let tail_len = remaining.len() - tail_start;

        if tail_len < config.min_len {
            // Absorb: this chunk takes everything rather than leave a
            // dangling sliver shorter than min_len.
            pieces.push(remaining);
            break;
        }

        let mut head: Vec<char> = remaining[..trim_trailing_whitespace(&remaining, split_at)].to_vec();
        if is_whitespace_boundary {
            // The boundary whitespace itself is excluded from both head and
            // tail by the trims above; keep a single space on the head so
            // the word break survives the round trip.
            head.push(' ');
        }
        pieces.push(head);
        remaining = remaining[tail_start..].to_vec();
        is_first = false;
    }

    if pieces.len() == 1 {
        return vec![body.to_string()];
    }

    let last = pieces.len() - 1;
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, mut content)| {
            let mut out = String::new();
            if i != 0 {
                out.push(MARKER);
            }
            out.extend(content.drain(..));
            if i != last {
                out.push(MARKER);
            }
            out
        })
        .collect()
}

/// Finds the last whitespace boundary at or before `budget` that is at
/// least `0.5 * budget` in, falling back to a hard cut at `budget`.
fn find_split_point(chars: &[char], budget: usize) -> usize {
    let limit = budget.min(chars.len());
    let threshold = (budget as f64 * 0.5).ceil() as usize;

    for i in (threshold..=limit).rev() {
        if i < chars.len() && chars[i].is_whitespace() {
            return i;
        }
    }
    limit
}

fn trim_trailing_whitespace(chars: &[char], end: usize) -> usize {
    let mut e = end.min(chars.len());
    while e > 0 && chars[e - 1].is_whitespace() {
        e -= 1;
    }
    e
}

fn skip_leading_whitespace(chars: &[char], start: usize) -> usize {
    let mut s = start;
    while s < chars.len() && chars[s].is_whitespace() {
        s += 1;
    }
    s
}

/// Strips boundary markers and collapses whitespace, for round-trip checks.
pub fn normalize_for_comparison(s: &str) -> String {
    s.chars()
        .filter(|&c| c != MARKER)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
