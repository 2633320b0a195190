//! Parser façade (C3): format auto-detection plus a unified batch/streaming
//! entry point.
//!
//! Source auto-detection looks at the head of the input for each format's
//! recognizable shape, defaulting to WhatsApp when nothing matches (section
//! 4.3). Both [`parse`] and [`stream`] share the same per-line assembly code
//! in [`crate::formats`], which is what gives us the streaming-equals-batch
//! guarantee tested in `tests/streaming_tests.rs`.

use std::io::BufRead;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::IngestError;
use crate::formats::whatsapp::{self, WhatsAppVariant};
use crate::formats::{imessage, FormatConfig};
use crate::model::{ChatSource, Message};

/// Which chat export format to parse as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    WhatsAppIos,
    WhatsAppAndroid,
    IMessage,
    /// Auto-detect from the head of the input.
    Auto,
}

static IOS_HEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\x{200e}?\[\d{1,2}/\d{1,2}/\d{2,4}, ").unwrap());
static ANDROID_HEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\x{200e}?\d{1,2}/\d{1,2}/\d{2,4}, \d{1,2}:\d{2}(?::\d{2})? - ").unwrap());

/// Detects the source format from the first lines of `text`. Defaults to
/// [`ChatSource::WhatsApp`] if nothing matches, per section 4.3.
pub fn detect_source(text: &str) -> ChatSource {
    for line in text.lines().take(20) {
        if imessage::looks_like_header(line) {
            return ChatSource::IMessage;
        }
        if IOS_HEAD_RE.is_match(line) || ANDROID_HEAD_RE.is_match(line) {
            return ChatSource::WhatsApp;
        }
    }
    ChatSource::WhatsApp
}

fn resolve_whatsapp_variant(text: &str, format: Format) -> WhatsAppVariant {
    match format {
        Format::WhatsAppIos => WhatsAppVariant::Ios,
        Format::WhatsAppAndroid => WhatsAppVariant::Android,
        _ => {
            let lines: Vec<&str> = text.lines().collect();
            whatsapp::detect_variant(&lines)
        }
    }
}

/// Aggregate statistics over a parsed message list (section 4.3).
#[derive(Debug, Clone)]
pub struct ParseStats {
    pub senders: Vec<String>,
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub message_count: usize,
    pub url_count: usize,
}

impl ParseStats {
    pub fn compute(messages: &[Message]) -> Self {
        let mut senders: Vec<String> = Vec::new();
        let mut url_count = 0usize;
        let mut min_ts = None;
        let mut max_ts = None;

        for m in messages {
            if !senders.contains(&m.sender) {
                senders.push(m.sender.clone());
            }
            url_count += m.urls.as_ref().map_or(0, Vec::len);
            min_ts = Some(min_ts.map_or(m.timestamp, |t: DateTime<Utc>| t.min(m.timestamp)));
            max_ts = Some(max_ts.map_or(m.timestamp, |t: DateTime<Utc>| t.max(m.timestamp)));
        }

        ParseStats {
            senders,
            date_range: min_ts.zip(max_ts),
            message_count: messages.len(),
            url_count,
        }
    }
}

/// Batch-parses the full `text`, auto-detecting source/format unless
/// overridden. Returns the ordered message list plus derived stats.
pub fn parse(
    text: &str,
    source: Option<ChatSource>,
    format: Format,
    config: FormatConfig,
) -> (Vec<Message>, ParseStats, Vec<IngestError>) {
    let source = source.unwrap_or_else(|| detect_source(text));

    let (messages, errors) = match source {
        ChatSource::WhatsApp => {
            let variant = resolve_whatsapp_variant(text, format);
            whatsapp::parse(text, Some(variant), config)
        }
        ChatSource::IMessage => imessage::parse(text, config),
    };

    let stats = ParseStats::compute(&messages);
    (messages, stats, errors)
}

/// A pull-based iterator over messages from a line source, used for large
/// exports. Per Design Note 2, dropping the iterator releases the
/// underlying reader; there is no separate cancellation handle.
///
/// Streaming correctness requirement (section 4.3): the sequence this
/// yields equals a batch parse of the concatenated input, which holds here
/// because both modes drive the exact same [`whatsapp::LineAssembler`] /
/// [`imessage::LineAssembler`] line-by-line.
pub struct StreamParser<R: BufRead> {
    reader: R,
    inner: AssemblerKind,
    queued: std::collections::VecDeque<Message>,
    done: bool,
}

enum AssemblerKind {
    WhatsApp(whatsapp::LineAssembler),
    IMessage(imessage::LineAssembler),
}

impl AssemblerKind {
    fn push_line(&mut self, line: &str) -> Option<Vec<Message>> {
        match self {
            AssemblerKind::WhatsApp(a) => a.push_line(line),
            AssemblerKind::IMessage(a) => a.push_line(line),
        }
    }

    fn flush(&mut self) -> Option<Vec<Message>> {
        match self {
            AssemblerKind::WhatsApp(a) => a.flush(),
            AssemblerKind::IMessage(a) => a.flush(),
        }
    }
}

impl<R: BufRead> StreamParser<R> {
    /// Creates a streaming parser. When `source`/`format` are not given,
    /// the first up-to-20 lines are buffered from `reader` to decide, then
    /// replayed through the assembler — the caller-facing behaviour is
    /// identical either way.
    pub fn new(
        mut reader: R,
        source: Option<ChatSource>,
        format: Format,
        config: FormatConfig,
    ) -> std::io::Result<Self> {
        let mut sample_lines: Vec<String> = Vec::new();
        for _ in 0..20 {
            let mut line = String::new();
            let bytes = reader.read_line(&mut line)?;
            if bytes == 0 {
                break;
            }
            if line.ends_with('\n') {
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
            }
            sample_lines.push(line);
        }

        let joined = sample_lines.join("\n");
        let source = source.unwrap_or_else(|| detect_source(&joined));
        let inner = match source {
            ChatSource::WhatsApp => {
                let variant = resolve_whatsapp_variant(&joined, format);
                AssemblerKind::WhatsApp(whatsapp::LineAssembler::new(variant, config))
            }
            ChatSource::IMessage => AssemblerKind::IMessage(imessage::LineAssembler::new(config)),
        };

        let mut parser = StreamParser {
            reader,
            inner,
            queued: std::collections::VecDeque::new(),
            done: false,
        };

        for line in &sample_lines {
            if let Some(finished) = parser.inner.push_line(line) {
                parser.queued.extend(finished);
            }
        }

        Ok(parser)
    }
}

impl<R: BufRead> Iterator for StreamParser<R> {
    type Item = std::io::Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(m) = self.queued.pop_front() {
                return Some(Ok(m));
            }
            if self.done {
                return None;
            }

            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    self.done = true;
                    if let Some(finished) = self.inner.flush() {
                        self.queued.extend(finished);
                    }
                }
                Ok(_) => {
                    if line.ends_with('\n') {
                        line.pop();
                        if line.ends_with('\r') {
                            line.pop();
                        }
                    }
                    if let Some(finished) = self.inner.push_line(&line) {
                        self.queued.extend(finished);
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const IOS_SAMPLE: &str =
        "[10/10/23, 2:16:42 PM] Nathan: hi\n[10/10/23, 2:17:00 PM] Maria: let's go hiking!\n";

    #[test]
    fn test_detect_source_whatsapp_ios() {
        assert_eq!(detect_source(IOS_SAMPLE), ChatSource::WhatsApp);
    }

    #[test]
    fn test_detect_source_imessage() {
        let text = "Oct 10, 2023  2:16:42 PM\nNathan\nhi\n";
        assert_eq!(detect_source(text), ChatSource::IMessage);
    }

    #[test]
    fn test_detect_source_defaults_to_whatsapp() {
        assert_eq!(detect_source("no recognisable header here"), ChatSource::WhatsApp);
    }

    #[test]
    fn test_batch_parse_stats() {
        let (messages, stats, errors) =
            parse(IOS_SAMPLE, None, Format::Auto, FormatConfig::default());
        assert!(errors.is_empty());
        assert_eq!(messages.len(), 2);
        assert_eq!(stats.message_count, 2);
        assert_eq!(stats.senders, vec!["Nathan".to_string(), "Maria".to_string()]);
    }

    #[test]
    fn test_streaming_matches_batch() {
        let (batch_messages, _, _) =
            parse(IOS_SAMPLE, None, Format::Auto, FormatConfig::default());

        let cursor = Cursor::new(IOS_SAMPLE.as_bytes());
        let stream = StreamParser::new(cursor, None, Format::Auto, FormatConfig::default()).unwrap();
        let streamed: Vec<Message> = stream.filter_map(Result::ok).collect();

        assert_eq!(batch_messages, streamed);
    }
}
