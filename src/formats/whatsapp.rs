//! WhatsApp iOS/Android TXT export parser.
//!
//! Both variants share one assembly algorithm (section 4.2): a timestamp
//! match finalises the in-progress message and starts a new one; any other
//! line is a continuation appended to the current body. [`LineAssembler`]
//! implements that algorithm once and is driven either by [`parse`] (batch)
//! or line-by-line by the streaming façade.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{normalize_text, finalize_message, FormatConfig};
use crate::error::IngestError;
use crate::model::{ChatSource, Message};

/// Which WhatsApp export flavour a line matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhatsAppVariant {
    /// `[M/D/YY, H:MM:SS AM/PM] Sender: body`
    Ios,
    /// `M/D/YY, H:MM - Sender: body`
    Android,
}

static IOS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\x{200e}?\[(\d{1,2}/\d{1,2}/\d{2,4}), (\d{1,2}:\d{2}:\d{2}[\s\x{202f}\x{00a0}]?[AaPp][Mm])\] ([^:]+): ?(.*)$",
    )
    .unwrap()
});

static ANDROID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\x{200e}?(\d{1,2}/\d{1,2}/\d{2,4}), (\d{1,2}:\d{2}(?::\d{2})?) - ([^:]+): ?(.*)$")
        .unwrap()
});

impl WhatsAppVariant {
    fn regex(self) -> &'static Regex {
        match self {
            WhatsAppVariant::Ios => &IOS_RE,
            WhatsAppVariant::Android => &ANDROID_RE,
        }
    }
}

/// Auto-detects the variant by counting matches over up to 20 sample lines.
/// Ties resolve to iOS (section 4.2).
pub fn detect_variant(lines: &[&str]) -> WhatsAppVariant {
    let sample = &lines[..lines.len().min(20)];
    let ios_count = sample.iter().filter(|l| IOS_RE.is_match(l)).count();
    let android_count = sample.iter().filter(|l| ANDROID_RE.is_match(l)).count();
    if android_count > ios_count {
        WhatsAppVariant::Android
    } else {
        WhatsAppVariant::Ios
    }
}

fn parse_date_parts(date_str: &str) -> Option<(i32, u32, u32)> {
    let parts: Vec<&str> = date_str.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let m: u32 = parts[0].parse().ok()?;
    let d: u32 = parts[1].parse().ok()?;
    let mut y: i32 = parts[2].parse().ok()?;
    if parts[2].len() <= 2 {
        y += 2000;
    }
    Some((y, m, d))
}

fn parse_time_parts(time_str: &str) -> Option<(u32, u32, u32)> {
    let normalized: String = time_str
        .chars()
        .map(|c| if c == '\u{202f}' || c == '\u{00a0}' { ' ' } else { c })
        .collect();
    let normalized = normalized.trim();
    let lower = normalized.to_lowercase();

    let (time_part, is_pm) = if let Some(stripped) = lower.strip_suffix("am") {
        (&normalized[..stripped.len()], Some(false))
    } else if let Some(stripped) = lower.strip_suffix("pm") {
        (&normalized[..stripped.len()], Some(true))
    } else {
        (normalized, None)
    };

    let comps: Vec<&str> = time_part.trim().split(':').collect();
    let mut h: u32 = comps.first()?.parse().ok()?;
    let mi: u32 = comps.get(1)?.parse().ok()?;
    let s: u32 = comps
        .get(2)
        .and_then(|x| x.parse().ok())
        .unwrap_or(0);

    if let Some(pm) = is_pm {
        if h == 12 {
            h = 0;
        }
        if pm {
            h += 12;
        }
    }
    Some((h, mi, s))
}

/// Parses a WhatsApp date/time pair into a UTC timestamp.
pub fn parse_whatsapp_timestamp(date_str: &str, time_str: &str) -> Option<DateTime<Utc>> {
    let (y, mo, d) = parse_date_parts(date_str)?;
    let (h, mi, s) = parse_time_parts(time_str)?;
    let date = NaiveDate::from_ymd_opt(y, mo, d)?;
    let time = NaiveTime::from_hms_opt(h, mi, s)?;
    Some(NaiveDateTime::new(date, time).and_utc())
}

struct Pending {
    sender: String,
    body: String,
    timestamp: DateTime<Utc>,
    raw_line: String,
}

/// Drives the shared WhatsApp assembly algorithm one line at a time.
///
/// Used directly by [`parse`] for batch parsing and wrapped by the
/// streaming façade (C3) so both modes share identical behaviour (section
/// 8, property 4: batch and streaming are byte-identical).
pub struct LineAssembler {
    variant: WhatsAppVariant,
    config: FormatConfig,
    next_id: u64,
    pending: Option<Pending>,
}

impl LineAssembler {
    pub fn new(variant: WhatsAppVariant, config: FormatConfig) -> Self {
        Self {
            variant,
            config,
            next_id: 0,
            pending: None,
        }
    }

    /// Feeds one (already `\n`-stripped) line. Returns the finished messages
    /// for the previous logical message if this line starts a new one.
    pub fn push_line(&mut self, raw_line: &str) -> Option<Vec<Message>> {
        let line = normalize_text(raw_line);
        if let Some(caps) = self.variant.regex().captures(&line) {
            let date_str = caps.get(1).map_or("", |m| m.as_str());
            let time_str = caps.get(2).map_or("", |m| m.as_str());
            let sender = caps.get(3).map_or("", |m| m.as_str()).trim();
            let content = caps.get(4).map_or("", |m| m.as_str());

            let finished = self.flush_pending();

            if let Some(timestamp) = parse_whatsapp_timestamp(date_str, time_str) {
                self.pending = Some(Pending {
                    sender: sender.to_string(),
                    body: content.to_string(),
                    timestamp,
                    raw_line: raw_line.to_string(),
                });
            } else {
                tracing::warn!(date = date_str, time = time_str, "unparsable WhatsApp timestamp, skipping record");
            }
            finished
        } else {
            if let Some(pending) = &mut self.pending {
                if !line.trim().is_empty() {
                    pending.body.push('\n');
                    pending.body.push_str(&line);
                }
            }
            None
        }
    }

    /// Finalises any in-progress message. Call once after the last line.
    pub fn flush(&mut self) -> Option<Vec<Message>> {
        self.flush_pending()
    }

    fn flush_pending(&mut self) -> Option<Vec<Message>> {
        let pending = self.pending.take()?;
        finalize_message(
            pending.timestamp,
            &pending.sender,
            &pending.body,
            Some(pending.raw_line),
            ChatSource::WhatsApp,
            &self.config,
            &mut self.next_id,
        )
    }
}

/// Batch-parses a full WhatsApp export. If `variant` is `None`, it is
/// auto-detected from the first 20 lines.
pub fn parse(
    text: &str,
    variant: Option<WhatsAppVariant>,
    config: FormatConfig,
) -> (Vec<Message>, Vec<IngestError>) {
    let normalized = normalize_text(text);
    let lines: Vec<&str> = normalized.lines().collect();
    let variant = variant.unwrap_or_else(|| detect_variant(&lines));

    let mut assembler = LineAssembler::new(variant, config);
    let mut messages = Vec::new();
    let errors = Vec::new();

    for line in &lines {
        if let Some(mut finished) = assembler.push_line(line) {
            messages.append(&mut finished);
        }
    }
    if let Some(mut finished) = assembler.flush() {
        messages.append(&mut finished);
    }

    (messages, errors)
}
