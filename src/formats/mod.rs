//! Format-agnostic helpers shared by every chat export parser (C2).
//!
//! Each format module (`whatsapp`, `imessage`) owns its own timestamp
//! recognizer and line-assembly loop, but all of them normalise text the
//! same way, detect the same media placeholders, extract URLs identically,
//! and hand the assembled body to the [chunker](crate::chunker) the same
//! way before allocating ids. Keeping that here means the two formats can
//! never silently drift apart on these shared rules.

pub mod imessage;
pub mod whatsapp;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::chunker::{self, ChunkConfig};
use crate::model::{ChatSource, MediaType, Message};

/// Configuration shared by every format parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatConfig {
    pub chunk: ChunkConfig,
}

/// Normalises apostrophe variants and line endings before any pattern
/// matching happens, per section 4.2.
pub fn normalize_text(input: &str) -> String {
    input
        .replace('\r', "")
        .chars()
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' | '\u{02BC}' | '`' => '\'',
            other => other,
        })
        .collect()
}

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s<>"')\]]+"#).unwrap());

/// Extracts URLs in first-occurrence order, stripping trailing punctuation.
pub fn extract_urls(content: &str) -> Vec<String> {
    URL_RE
        .find_iter(content)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']).to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// One (pattern, media type) pair used to detect media placeholders.
struct MediaPattern {
    re: Regex,
    media_type: MediaType,
}

static MEDIA_PATTERNS: Lazy<Vec<MediaPattern>> = Lazy::new(|| {
    let defs: &[(&str, MediaType)] = &[
        (r"(?i)^\x{200e}?image omitted$", MediaType::Image),
        (r"(?i)^\x{200e}?video omitted$", MediaType::Video),
        (r"(?i)^\x{200e}?audio omitted$", MediaType::Audio),
        (r"(?i)^\x{200e}?gif omitted$", MediaType::Gif),
        (r"(?i)^\x{200e}?sticker omitted$", MediaType::Sticker),
        (r"(?i)^\x{200e}?document omitted$", MediaType::Document),
        (r"(?i)^\x{200e}?contact card omitted$", MediaType::Contact),
        (r"(?i)^\x{200e}?<attached:.*>$", MediaType::Image),
    ];
    defs.iter()
        .map(|(pat, mt)| MediaPattern {
            re: Regex::new(pat).unwrap(),
            media_type: *mt,
        })
        .collect()
});

/// Detects a media placeholder, optionally LRM-prefixed and case-insensitive.
pub fn detect_media(content: &str) -> Option<MediaType> {
    let trimmed = content.trim();
    MEDIA_PATTERNS
        .iter()
        .find(|p| p.re.is_match(trimmed))
        .map(|p| p.media_type)
}

static SYSTEM_LINE_RE: Lazy<Vec<Regex>> = Lazy::new(|| {
    let patterns = [
        r"(?i)messages and calls are end-to-end encrypted",
        r"(?i)this message was deleted",
        r"(?i)you deleted this message",
        r"(?i)missed (voice|video) call",
        r"(?i)\bcreated group\b",
        r"(?i)\bchanged the subject\b",
        r"(?i)\bchanged this group'?s icon\b",
        r"(?i)\badded\b.*\bto the group\b",
        r"(?i)\bremoved\b.*\bfrom the group\b",
        r"(?i)\bjoined using this group'?s invite link\b",
        r"(?i)\bis now an admin\b",
        r"(?i)\bno longer an admin\b",
        r"(?i)security code changed",
        r"(?i)waiting for this message",
    ];
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
});

/// Returns `true` if a finalised message body is a system notice rather
/// than user content, per section 4.2's finalisation rule.
pub fn is_system_line(content: &str) -> bool {
    SYSTEM_LINE_RE.iter().any(|re| re.is_match(content))
}

/// Turns one assembled logical message into one or more [`Message`] chunks,
/// allocating sequential ids starting at `*next_id`. Returns `None` if the
/// body is a system notice (dropped per section 4.2).
#[allow(clippy::too_many_arguments)]
pub fn finalize_message(
    timestamp: chrono::DateTime<chrono::Utc>,
    sender: &str,
    raw_body: &str,
    raw_line: Option<String>,
    source: ChatSource,
    config: &FormatConfig,
    next_id: &mut u64,
) -> Option<Vec<Message>> {
    let content = raw_body.trim();
    if content.is_empty() {
        return None;
    }
    if is_system_line(content) {
        tracing::debug!(sender, "dropping system-line message");
        return None;
    }

    let media_type = detect_media(content);
    let urls = if media_type.is_none() {
        let found = extract_urls(content);
        if found.is_empty() { None } else { Some(found) }
    } else {
        None
    };

    let chunks = chunker::chunk(content, config.chunk);
    let chunked = chunks.len() > 1;

    let messages = chunks
        .into_iter()
        .enumerate()
        .map(|(i, body)| {
            let id = *next_id;
            *next_id += 1;
            Message {
                id,
                timestamp,
                sender: sender.to_string(),
                content: body,
                raw_line: if i == 0 { raw_line.clone() } else { None },
                has_media: media_type.is_some(),
                media_type,
                urls: if i == 0 { urls.clone() } else { None },
                source,
                chunk_index: if chunked { Some(i) } else { None },
            }
        })
        .collect();

    Some(messages)
}
