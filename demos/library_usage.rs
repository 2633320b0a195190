//! Example: using activity-ingest as a library.
//!
//! Run with: cargo run --example library_usage

use activity_ingest::prelude::*;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== activity-ingest library usage ===\n");

    // 1. Parse a WhatsApp iOS export.
    println!("1. Parsing a WhatsApp export:");
    let export = "\
[10/10/23, 2:16:42 PM] Nathan: hey, how's it going?\n\
[10/10/23, 2:17:01 PM] Maria: good! let's go hiking at Queenstown this weekend\n\
[10/10/23, 2:17:30 PM] Nathan: sounds amazing, count me in\n\
[10/10/23, 2:18:00 PM] Maria: we could also check out https://www.airbnb.com/rooms/123456 for a place to stay\n";

    let (messages, stats, errors) = parse(export, None, Format::Auto, FormatConfig::default());
    for m in &messages {
        println!("   {}: {}", m.sender, m.content);
    }
    println!("   senders: {:?}, url_count: {}, parse errors: {}", stats.senders, stats.url_count, errors.len());

    // 2. Monthly fingerprinting and dedup planning.
    println!("\n2. Fingerprinting for incremental re-runs:");
    let chunks = build_monthly_chunks(&messages, FingerprintConfig::default());
    for c in &chunks {
        println!("   month {}: {} messages, fingerprint {}", c.month_key, c.message_count, &c.fingerprint[..12]);
    }
    let known_fingerprints = std::collections::HashSet::new();
    let plan = plan_dedup(chunks, &known_fingerprints);
    println!("   to process: {}, already seen: {}", plan.messages_to_process, plan.messages_skipped);

    // 3. Heuristic candidate extraction.
    println!("\n3. Heuristic extraction:");
    let (heuristic_candidates, heuristic_stats) = heuristic::extract(&messages, heuristic::HeuristicConfig::default());
    println!("   {} regex matches, {} url matches", heuristic_stats.regex_count, heuristic_stats.url_count);

    // 4. Merge into the final candidate list (no semantic extractor wired up
    // in this example; its queries come from an embedding provider).
    println!("\n4. Merging candidates:");
    let (candidates, merge_stats) = merge(heuristic_candidates, Vec::new(), &messages, MergeConfig::default());
    for c in &candidates {
        println!(
            "   [{:?}] {:.2} confidence: \"{}\" ({} before / {} after context)",
            c.candidate_type,
            c.confidence,
            c.content,
            c.context_before.len(),
            c.context_after.len()
        );
    }
    println!("   total: {}, agreements merged away: {}", merge_stats.total, merge_stats.agreements_removed);

    // 5. JSON serialization of the final output.
    println!("\n5. JSON serialization:");
    if let Some(first) = candidates.first() {
        println!("{}", serde_json::to_string_pretty(first)?);
    }

    println!("\n=== done ===");
    Ok(())
}
