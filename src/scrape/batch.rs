//! Batch scrape driver (section 4.8): pulls every distinct URL out of a
//! candidate's content and context windows, serves cache hits (including
//! cached negatives) without a network call, and runs cache misses through
//! [`super::scrape_url`] with bounded concurrency.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};

use crate::cache::{cache_key, ResponseCache};
use crate::formats;
use crate::model::{Candidate, CachedResponse, CachedValue, ScrapedMetadata};

use super::{ScrapeConfig, ScrapeFailure, ScrapeOutcome};

/// Fired once per URL processed, whether served from cache or fetched live.
#[derive(Debug, Clone)]
pub struct BatchEvent {
    pub url: String,
    pub cache_hit: bool,
    pub outcome_is_ok: bool,
}

/// Collects the distinct URLs referenced by a candidate set: its own
/// `urls`, plus any found in its context window messages' content (section
/// 4.8/6 — context messages carry raw content, not a pre-extracted URL
/// list, so they're scanned the same way a message body is).
fn urls_for_candidates(candidates: &[Candidate]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    let mut push = |url: String| {
        if seen.insert(url.clone()) {
            ordered.push(url);
        }
    };

    for candidate in candidates {
        if let Some(urls) = &candidate.urls {
            for url in urls {
                push(url.clone());
            }
        }
        for ctx in candidate.context_before.iter().chain(&candidate.context_after) {
            for url in formats::extract_urls(&ctx.content) {
                push(url);
            }
        }
    }
    ordered
}

async fn scrape_one(
    url: String,
    cache: &(dyn ResponseCache<ScrapedMetadata>),
    config: ScrapeConfig,
    on_event: &(dyn Fn(BatchEvent) + Send + Sync),
) -> (String, ScrapeOutcome) {
    let key = cache_key(&url);
    if let Some(cached) = cache.get(&key) {
        // A cached negative that still observed a post-redirect URL is
        // surfaced as minimal metadata rather than a failure, so downstream
        // stages get the slug even though the original fetch never
        // succeeded (section 4.8).
        let outcome = match cached.data {
            CachedValue::Ok(metadata) => Ok(metadata),
            CachedValue::Err {
                final_url: Some(final_url),
                ..
            } => Ok(ScrapedMetadata {
                canonical_url: final_url,
                ..Default::default()
            }),
            CachedValue::Err {
                message,
                final_url: None,
                ..
            } => Err(ScrapeFailure {
                url: url.clone(),
                kind: crate::error::ScrapeErrorKind::Network,
                message,
                final_url: None,
            }),
        };
        on_event(BatchEvent {
            url: url.clone(),
            cache_hit: true,
            outcome_is_ok: outcome.is_ok(),
        });
        return (url, outcome);
    }

    let outcome = super::scrape_url(&url, config).await;
    match &outcome {
        Ok(metadata) => {
            cache.set(&key, CachedResponse::success(metadata.clone(), chrono::Utc::now()), config.success_ttl);
        }
        Err(failure) => {
            let message = format!("{:?}: {}", failure.kind, failure.message);
            let cached = match &failure.final_url {
                Some(final_url) => CachedResponse {
                    data: CachedValue::err_with_final_url(message, final_url.clone()),
                    cached_at: chrono::Utc::now(),
                },
                None => CachedResponse::failure(message, chrono::Utc::now()),
            };
            cache.set(&key, cached, config.negative_ttl);
        }
    }

    on_event(BatchEvent {
        url: url.clone(),
        cache_hit: false,
        outcome_is_ok: outcome.is_ok(),
    });
    (url, outcome)
}

/// Scrapes every URL referenced by `candidates`, returning outcomes keyed by
/// URL. Cache hits (positive or negative) are served without touching the
/// network; misses run `config.concurrency` at a time.
pub async fn scrape_batch(
    candidates: &[Candidate],
    cache: &(dyn ResponseCache<ScrapedMetadata>),
    config: ScrapeConfig,
    on_event: &(dyn Fn(BatchEvent) + Send + Sync),
) -> Vec<(String, ScrapeOutcome)> {
    let urls = urls_for_candidates(candidates);

    stream::iter(urls.into_iter().map(|url| scrape_one(url, cache, config, on_event)))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await
}
