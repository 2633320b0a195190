//! Monthly-chunk fingerprinting (C4).
//!
//! Buckets messages into UTC calendar months and hashes a bounded prefix of
//! `(sender, content)` tuples. Timestamps never enter the hash input — that
//! is the load-bearing decision (section 4.4) that keeps the fingerprint
//! stable across repeat exports of the same conversation despite the ±1–2s
//! timestamp drift the exporting apps introduce, while still detecting a
//! changed month (via content) or a partial export (via `message_count`).

use std::collections::HashSet;

use chrono::{Datelike, TimeZone, Utc};
use sha2::{Digest, Sha256};

use crate::model::{Message, MonthlyChunk};

/// Configuration for [`build_monthly_chunks`].
#[derive(Debug, Clone, Copy)]
pub struct FingerprintConfig {
    /// Number of leading messages per month hashed into the fingerprint.
    pub sample_size: usize,
    /// Whether `message_count` is part of the hash input.
    pub include_count: bool,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            sample_size: 10,
            include_count: true,
        }
    }
}

/// Returns the `YYYY-MM` key for `message`'s UTC timestamp.
pub fn month_key(message: &Message) -> String {
    format!("{:04}-{:02}", message.timestamp.year(), message.timestamp.month())
}

fn month_start(message: &Message) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(message.timestamp.year(), message.timestamp.month(), 1, 0, 0, 0)
        .single()
        .expect("valid calendar month")
}

/// Computes the fingerprint input bytes for one bucket, per section 4.4's
/// three-part concatenation.
fn fingerprint_input(key: &str, messages: &[&Message], config: FingerprintConfig) -> String {
    let mut input = String::new();
    input.push_str(key);
    input.push('\n');
    if config.include_count {
        input.push_str(&messages.len().to_string());
        input.push('\n');
    }

    let sample: Vec<String> = messages
        .iter()
        .take(config.sample_size.min(messages.len()))
        .map(|m| format!("{}\n{}", m.sender, m.content))
        .collect();
    input.push_str(&sample.join("\n---\n"));
    input
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Buckets `messages` by UTC month and computes a stable fingerprint per
/// bucket. Each bucket's `messages` are sorted ascending by timestamp, and
/// buckets are returned ordered by `month_key` ascending.
pub fn build_monthly_chunks(messages: &[Message], config: FingerprintConfig) -> Vec<MonthlyChunk> {
    use std::collections::BTreeMap;

    let mut buckets: BTreeMap<String, Vec<&Message>> = BTreeMap::new();
    for m in messages {
        buckets.entry(month_key(m)).or_default().push(m);
    }

    buckets
        .into_iter()
        .map(|(key, mut msgs)| {
            msgs.sort_by_key(|m| m.timestamp);
            let fingerprint = sha256_hex(&fingerprint_input(&key, &msgs, config));
            let first = msgs.first().unwrap();
            let last = msgs.last().unwrap();
            MonthlyChunk {
                month_key: key,
                month_start: month_start(first),
                message_count: msgs.len(),
                fingerprint,
                first_message_at: first.timestamp,
                last_message_at: last.timestamp,
                messages: Some(msgs.into_iter().cloned().collect()),
            }
        })
        .collect()
}

/// A deduplication plan: which monthly chunks are genuinely new versus
/// already seen in a prior run.
#[derive(Debug, Clone)]
pub struct DedupPlan {
    pub to_process: Vec<MonthlyChunk>,
    pub duplicate: Vec<MonthlyChunk>,
    pub messages_to_process: usize,
    pub messages_skipped: usize,
}

/// Partitions `chunks` against a set of fingerprints already known to the
/// caller (section 4.4).
pub fn plan_dedup(chunks: Vec<MonthlyChunk>, known_fingerprints: &HashSet<String>) -> DedupPlan {
    let mut to_process = Vec::new();
    let mut duplicate = Vec::new();
    let mut messages_to_process = 0;
    let mut messages_skipped = 0;

    for chunk in chunks {
        if known_fingerprints.contains(&chunk.fingerprint) {
            messages_skipped += chunk.message_count;
            duplicate.push(chunk);
        } else {
            messages_to_process += chunk.message_count;
            to_process.push(chunk);
        }
    }

    DedupPlan {
        to_process,
        duplicate,
        messages_to_process,
        messages_skipped,
    }
}

/// Strips the transient `messages` field before persistence, per the
/// `MonthlyChunk` lifecycle note in section 3.
pub fn strip_for_persistence(mut chunk: MonthlyChunk) -> MonthlyChunk {
    chunk.messages = None;
    chunk
}
