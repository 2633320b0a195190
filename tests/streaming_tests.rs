//! Streaming-equals-batch integration tests (section 4.3's core guarantee).

use std::io::Cursor;

use activity_ingest::formats::FormatConfig;
use activity_ingest::parser::{self, Format, StreamParser};
use activity_ingest::model::ChatSource;

fn ios_export(lines: usize) -> String {
    let mut out = String::new();
    for i in 0..lines {
        let sender = if i % 2 == 0 { "Nathan" } else { "Maria" };
        out.push_str(&format!("[10/10/23, 2:{:02}:00 PM] {sender}: message number {i}\n", i % 60));
    }
    out
}

#[test]
fn test_streaming_matches_batch_for_large_export() {
    let text = ios_export(500);
    let (batch_messages, _, errors) = parser::parse(&text, None, Format::Auto, FormatConfig::default());
    assert!(errors.is_empty());

    let cursor = Cursor::new(text.as_bytes());
    let stream = StreamParser::new(cursor, None, Format::Auto, FormatConfig::default()).unwrap();
    let streamed: Vec<_> = stream.filter_map(Result::ok).collect();

    assert_eq!(batch_messages, streamed);
    assert_eq!(streamed.len(), 500);
}

#[test]
fn test_streaming_handles_imessage_multiline_bodies() {
    let text = "Oct 10, 2023  2:16:42 PM\nNathan\nfirst line\nsecond line\n\nOct 10, 2023  2:17:00 PM\nMaria\nok!\n";
    let (batch_messages, _, _) = parser::parse(text, Some(ChatSource::IMessage), Format::Auto, FormatConfig::default());

    let cursor = Cursor::new(text.as_bytes());
    let stream = StreamParser::new(cursor, Some(ChatSource::IMessage), Format::Auto, FormatConfig::default()).unwrap();
    let streamed: Vec<_> = stream.filter_map(Result::ok).collect();

    assert_eq!(batch_messages, streamed);
    assert_eq!(streamed[0].content, "first line\nsecond line");
}

#[test]
fn test_streaming_respects_auto_detected_source() {
    let android_text = "10/10/23, 14:16 - Nathan: hey, let's go hiking\n10/10/23, 14:17 - Maria: count me in!\n";
    let cursor = Cursor::new(android_text.as_bytes());
    let stream = StreamParser::new(cursor, None, Format::Auto, FormatConfig::default()).unwrap();
    let streamed: Vec<_> = stream.filter_map(Result::ok).collect();

    assert_eq!(streamed.len(), 2);
    assert_eq!(streamed[0].source, ChatSource::WhatsApp);
}

#[test]
fn test_streaming_empty_input_yields_no_messages() {
    let cursor = Cursor::new(b"".as_slice());
    let stream = StreamParser::new(cursor, None, Format::Auto, FormatConfig::default()).unwrap();
    let streamed: Vec<_> = stream.filter_map(Result::ok).collect();
    assert!(streamed.is_empty());
}
