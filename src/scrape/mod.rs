//! URL metadata scraper (C8).
//!
//! Dispatches by platform, short-circuits a small domain blocklist, and
//! normalises every platform scraper's result to one `Ok(ScrapedMetadata) |
//! Err(ScrapeFailure)` contract. Gated behind the `scrape` feature since it
//! is the only part of the crate that makes network calls.

mod batch;
mod generic;
mod platforms;

pub use batch::{scrape_batch, BatchEvent};

use std::time::Duration;

use crate::error::ScrapeErrorKind;
use crate::model::ScrapedMetadata;

/// The platform a URL belongs to, used to select a scraper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    TikTok,
    YouTube,
    Airbnb,
    Eventbrite,
    Reddit,
    Spotify,
    Instagram,
    X,
    Facebook,
    GoogleMaps,
    Other,
}

const BLOCKLIST_SUBSTRINGS: &[&str] = &["booking.com", "tripadvisor."];

/// Platforms this scraper does not handle: Instagram/X/Facebook require
/// authenticated APIs, and google_maps is the geocoder collaborator's job.
const UNSUPPORTED: &[Platform] = &[Platform::Instagram, Platform::X, Platform::Facebook, Platform::GoogleMaps];

/// Detects the platform of a URL from its host, defaulting to [`Platform::Other`].
pub fn classify_platform(url: &str) -> Platform {
    let lower = url.to_lowercase();
    if lower.contains("tiktok.com") {
        Platform::TikTok
    } else if lower.contains("youtube.com") || lower.contains("youtu.be") {
        Platform::YouTube
    } else if lower.contains("airbnb.") {
        Platform::Airbnb
    } else if lower.contains("eventbrite.") {
        Platform::Eventbrite
    } else if lower.contains("reddit.com") {
        Platform::Reddit
    } else if lower.contains("open.spotify.com") {
        Platform::Spotify
    } else if lower.contains("instagram.com") {
        Platform::Instagram
    } else if lower.contains("twitter.com") || lower.contains("x.com") {
        Platform::X
    } else if lower.contains("facebook.com") {
        Platform::Facebook
    } else if lower.contains("google.com/maps") || lower.contains("maps.app.goo.gl") {
        Platform::GoogleMaps
    } else {
        Platform::Other
    }
}

fn is_blocked(url: &str) -> bool {
    let lower = url.to_lowercase();
    BLOCKLIST_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

/// A failed scrape outcome, carrying the post-redirect URL when one was
/// observed even though the fetch ultimately failed (section 4.8: this
/// preserves value from shortened URLs whose destination is unreachable).
#[derive(Debug, Clone)]
pub struct ScrapeFailure {
    pub url: String,
    pub kind: ScrapeErrorKind,
    pub message: String,
    pub final_url: Option<String>,
}

pub type ScrapeOutcome = Result<ScrapedMetadata, ScrapeFailure>;

/// Configuration shared by every platform scraper and the batch driver.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeConfig {
    pub concurrency: usize,
    pub per_url_timeout: Duration,
    pub max_redirects: u8,
    pub success_ttl: Duration,
    pub negative_ttl: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            per_url_timeout: Duration::from_secs(4),
            max_redirects: 10,
            success_ttl: Duration::from_secs(24 * 3600),
            negative_ttl: Duration::from_secs(3600),
        }
    }
}

/// Scrapes a single URL, dispatching on its platform. The blocklist and the
/// unsupported-platform list (section 4.8) short-circuit before any network
/// call is made.
pub async fn scrape_url(url: &str, config: ScrapeConfig) -> ScrapeOutcome {
    if is_blocked(url) {
        return Err(ScrapeFailure {
            url: url.to_string(),
            kind: ScrapeErrorKind::Blocked,
            message: "domain is blocklisted".to_string(),
            final_url: None,
        });
    }

    let platform = classify_platform(url);
    if UNSUPPORTED.contains(&platform) {
        return Err(ScrapeFailure {
            url: url.to_string(),
            kind: ScrapeErrorKind::Unsupported,
            message: format!("{platform:?} is not scraped by this module"),
            final_url: None,
        });
    }

    match platform {
        Platform::TikTok => platforms::scrape_tiktok(url, config).await,
        Platform::YouTube => platforms::scrape_youtube(url, config).await,
        Platform::Eventbrite => platforms::scrape_eventbrite(url, config).await,
        Platform::Airbnb => platforms::scrape_airbnb(url, config).await,
        Platform::Reddit => platforms::scrape_reddit(url, config).await,
        Platform::Spotify => platforms::scrape_spotify(url, config).await,
        Platform::Other => generic::scrape_generic(url, config).await,
        Platform::Instagram | Platform::X | Platform::Facebook | Platform::GoogleMaps => {
            unreachable!("filtered out by the unsupported-platform check above")
        }
    }
}
