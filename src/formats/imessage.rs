//! iMessage TXT export parser.
//!
//! iMessage exports are three-line records: a timestamp header (optionally
//! followed by a read-receipt annotation), a sender line (`"Me"` is a valid
//! sender), then one or more body lines, terminated by the next header or
//! EOF (section 4.2).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{finalize_message, normalize_text, FormatConfig};
use crate::error::IngestError;
use crate::model::{ChatSource, Message};

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([A-Z][a-z]{2} \d{1,2}, \d{4})\s{1,2}(\d{1,2}:\d{2}:\d{2}\s?[AP]M)(?:\s*\(Read.*\))?\s*$",
    )
    .unwrap()
});

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn parse_imessage_timestamp(date_str: &str, time_str: &str) -> Option<DateTime<Utc>> {
    // "Oct 10, 2023"
    let parts: Vec<&str> = date_str.split(|c: char| c == ' ' || c == ',').filter(|s| !s.is_empty()).collect();
    if parts.len() != 3 {
        return None;
    }
    let month = MONTHS.iter().position(|m| *m == parts[0])? as u32 + 1;
    let day: u32 = parts[1].parse().ok()?;
    let year: i32 = parts[2].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let time_str = time_str.trim();
    let lower = time_str.to_lowercase();
    let is_pm = lower.ends_with("pm");
    let digits = &time_str[..time_str.len() - 2];
    let comps: Vec<&str> = digits.trim().split(':').collect();
    let mut h: u32 = comps.first()?.parse().ok()?;
    let mi: u32 = comps.get(1)?.parse().ok()?;
    let s: u32 = comps.get(2)?.parse().ok()?;
    if h == 12 {
        h = 0;
    }
    if is_pm {
        h += 12;
    }
    let time = NaiveTime::from_hms_opt(h, mi, s)?;
    Some(NaiveDateTime::new(date, time).and_utc())
}

enum State {
    ExpectHeader,
    ExpectSender {
        timestamp: DateTime<Utc>,
        header_line: String,
    },
    InBody {
        timestamp: DateTime<Utc>,
        sender: String,
        body: String,
        header_line: String,
    },
}

/// Drives the iMessage three-line assembly algorithm, one line at a time.
pub struct LineAssembler {
    config: FormatConfig,
    next_id: u64,
    state: State,
}

impl LineAssembler {
    pub fn new(config: FormatConfig) -> Self {
        Self {
            config,
            next_id: 0,
            state: State::ExpectHeader,
        }
    }

    pub fn push_line(&mut self, raw_line: &str) -> Option<Vec<Message>> {
        let line = normalize_text(raw_line);

        if let Some(caps) = HEADER_RE.captures(&line) {
            let date_str = caps.get(1).map_or("", |m| m.as_str());
            let time_str = caps.get(2).map_or("", |m| m.as_str());

            let finished = self.finalize_current();

            if let Some(timestamp) = parse_imessage_timestamp(date_str, time_str) {
                self.state = State::ExpectSender {
                    timestamp,
                    header_line: raw_line.to_string(),
                };
            } else {
                tracing::warn!(date = date_str, time = time_str, "unparsable iMessage timestamp, skipping record");
                self.state = State::ExpectHeader;
            }
            return finished;
        }

        match std::mem::replace(&mut self.state, State::ExpectHeader) {
            State::ExpectHeader => {
                // Blank/leading noise before the first record; ignore.
                self.state = State::ExpectHeader;
                None
            }
            State::ExpectSender {
                timestamp,
                header_line,
            } => {
                let sender = line.trim().to_string();
                self.state = State::InBody {
                    timestamp,
                    sender,
                    body: String::new(),
                    header_line,
                };
                None
            }
            State::InBody {
                timestamp,
                sender,
                mut body,
                header_line,
            } => {
                if !body.is_empty() {
                    body.push('\n');
                }
                body.push_str(&line);
                self.state = State::InBody {
                    timestamp,
                    sender,
                    body,
                    header_line,
                };
                None
            }
        }
    }

    pub fn flush(&mut self) -> Option<Vec<Message>> {
        self.finalize_current()
    }

    fn finalize_current(&mut self) -> Option<Vec<Message>> {
        match std::mem::replace(&mut self.state, State::ExpectHeader) {
            State::InBody {
                timestamp,
                sender,
                body,
                header_line,
            } => finalize_message(
                timestamp,
                &sender,
                &body,
                Some(header_line),
                ChatSource::IMessage,
                &self.config,
                &mut self.next_id,
            ),
            _ => None,
        }
    }
}

/// Batch-parses a full iMessage export.
pub fn parse(text: &str, config: FormatConfig) -> (Vec<Message>, Vec<IngestError>) {
    let normalized = normalize_text(text);
    let mut assembler = LineAssembler::new(config);
    let mut messages = Vec::new();
    let errors = Vec::new();

    for line in normalized.lines() {
        if let Some(mut finished) = assembler.push_line(line) {
            messages.append(&mut finished);
        }
    }
    if let Some(mut finished) = assembler.flush() {
        messages.append(&mut finished);
    }

    (messages, errors)
}

/// Returns `true` if `line` looks like an iMessage timestamp header, used
/// by the parser façade for format auto-detection.
pub fn looks_like_header(line: &str) -> bool {
    HEADER_RE.is_match(line)
}
