//! Per-platform scrapers named in section 4.8. Each returns the same
//! `ScrapeOutcome` contract as [`super::generic::scrape_generic`] and reuses
//! its redirect-following fetch and HTML/JSON-LD helpers rather than
//! duplicating them.

use reqwest::redirect::Policy;
use reqwest::Client;
use scraper::Html;
use serde_json::Value;

use crate::error::ScrapeErrorKind;
use crate::model::ScrapedMetadata;

use super::generic::{
    categories_for, decode_entities, extract_braced_json_after, fetch_following_redirects,
    json_ld_entries, matching_json_ld, og_tags,
};
use super::{ScrapeConfig, ScrapeFailure, ScrapeOutcome};

/// Resolves a short-URL redirect chain with `HEAD` requests only, without
/// pulling down a response body. TikTok and Reddit both hand out share links
/// that 30x to the canonical page.
async fn resolve_redirect_head(start_url: &str, config: ScrapeConfig) -> Result<String, ScrapeFailure> {
    let client = Client::builder()
        .redirect(Policy::none())
        .timeout(config.per_url_timeout)
        .build()
        .map_err(|e| ScrapeFailure {
            url: start_url.to_string(),
            kind: ScrapeErrorKind::Network,
            message: format!("failed to build HTTP client: {e}"),
            final_url: None,
        })?;

    let mut current = url::Url::parse(start_url).map_err(|e| ScrapeFailure {
        url: start_url.to_string(),
        kind: ScrapeErrorKind::Parse,
        message: format!("invalid URL: {e}"),
        final_url: None,
    })?;

    for _ in 0..config.max_redirects {
        let response = client.head(current.clone()).send().await.map_err(|e| ScrapeFailure {
            url: start_url.to_string(),
            kind: ScrapeErrorKind::Network,
            message: e.to_string(),
            final_url: Some(current.to_string()),
        })?;

        if !response.status().is_redirection() {
            return Ok(current.to_string());
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ScrapeFailure {
                url: start_url.to_string(),
                kind: ScrapeErrorKind::Network,
                message: "redirect response missing Location header".to_string(),
                final_url: Some(current.to_string()),
            })?;
        current = current.join(location).map_err(|e| ScrapeFailure {
            url: start_url.to_string(),
            kind: ScrapeErrorKind::Parse,
            message: format!("invalid redirect location: {e}"),
            final_url: Some(current.to_string()),
        })?;
    }

    Ok(current.to_string())
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = value;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.as_str()
}

/// TikTok: resolves `vm.tiktok.com` share links, fetches the canonical video
/// page, and locates whichever of the known inline-JSON blobs the page
/// shipped. TikTok has changed this blob's name more than once, so every
/// known name is tried in order.
pub async fn scrape_tiktok(url: &str, config: ScrapeConfig) -> ScrapeOutcome {
    let resolved = resolve_redirect_head(url, config).await.unwrap_or_else(|_| url.to_string());
    let fetched = fetch_following_redirects(&resolved, config).await?;

    const BLOB_NAMES: &[&str] = &[
        "__UNIVERSAL_DATA_FOR_REHYDRATION__",
        "SIGI_STATE",
    ];
    let blob = BLOB_NAMES
        .iter()
        .find_map(|needle| extract_braced_json_after(&fetched.body, needle).map(|json| (*needle, json)));

    let Some((_, json_str)) = blob else {
        return Err(ScrapeFailure {
            url: url.to_string(),
            kind: ScrapeErrorKind::Parse,
            message: "no known TikTok data blob found in page".to_string(),
            final_url: Some(fetched.final_url),
        });
    };

    let parsed: Value = serde_json::from_str(json_str).map_err(|e| ScrapeFailure {
        url: url.to_string(),
        kind: ScrapeErrorKind::Parse,
        message: format!("TikTok data blob did not parse as JSON: {e}"),
        final_url: Some(fetched.final_url.clone()),
    })?;

    // `__UNIVERSAL_DATA_FOR_REHYDRATION__` nests the video under
    // `__DEFAULT_SCOPE__["webapp.video-detail"].itemInfo.itemStruct`;
    // `SIGI_STATE` nests it under `ItemModule.<id>`.
    let item = parsed
        .pointer("/__DEFAULT_SCOPE__/webapp.video-detail/itemInfo/itemStruct")
        .or_else(|| {
            parsed
                .get("ItemModule")
                .and_then(Value::as_object)
                .and_then(|m| m.values().next())
        });

    let Some(item) = item else {
        return Err(ScrapeFailure {
            url: url.to_string(),
            kind: ScrapeErrorKind::Parse,
            message: "TikTok data blob had no recognised item shape".to_string(),
            final_url: Some(fetched.final_url),
        });
    };

    let description = item.get("desc").and_then(Value::as_str).map(|s| decode_entities(s));
    let hashtags = item
        .get("textExtra")
        .and_then(Value::as_array)
        .map(|extras| {
            extras
                .iter()
                .filter_map(|e| e.get("hashtagName").and_then(Value::as_str))
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    let creator = str_at(item, &["author", "nickname"]).or_else(|| str_at(item, &["author", "uniqueId"])).map(String::from);
    let creator_id = str_at(item, &["author", "uniqueId"]).map(String::from);
    let image_url = item
        .pointer("/video/cover")
        .or_else(|| item.pointer("/video/originCover"))
        .and_then(Value::as_str)
        .map(String::from);
    let suggested_keywords = item
        .pointer("/diversificationLabels")
        .and_then(Value::as_array)
        .map(|labels| labels.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_else(|| {
            item.pointer("/suggestedWords")
                .and_then(Value::as_array)
                .map(|words| words.iter().filter_map(Value::as_str).map(String::from).collect())
                .unwrap_or_default()
        });

    Ok(ScrapedMetadata {
        canonical_url: fetched.final_url.clone(),
        content_id: item.get("id").and_then(Value::as_str).map(String::from),
        title: description.clone(),
        description,
        hashtags,
        creator,
        creator_id,
        image_url,
        categories: categories_for(&fetched.final_url, None),
        suggested_keywords,
        raw_data: Some(item.clone()),
    })
}

/// YouTube: canonicalises to `watch?v=ID`, pulls `ytInitialPlayerResponse`
/// out of the page's inline script, and reads `videoDetails` plus the
/// microformat category.
pub async fn scrape_youtube(url: &str, config: ScrapeConfig) -> ScrapeOutcome {
    let video_id = youtube_video_id(url);
    let canonical = match &video_id {
        Some(id) => format!("https://www.youtube.com/watch?v={id}"),
        None => url.to_string(),
    };

    let fetched = fetch_following_redirects(&canonical, config).await?;

    let Some(json_str) = extract_braced_json_after(&fetched.body, "ytInitialPlayerResponse") else {
        return Err(ScrapeFailure {
            url: url.to_string(),
            kind: ScrapeErrorKind::Parse,
            message: "ytInitialPlayerResponse not found in page".to_string(),
            final_url: Some(fetched.final_url),
        });
    };

    let parsed: Value = serde_json::from_str(json_str).map_err(|e| ScrapeFailure {
        url: url.to_string(),
        kind: ScrapeErrorKind::Parse,
        message: format!("ytInitialPlayerResponse did not parse as JSON: {e}"),
        final_url: Some(fetched.final_url.clone()),
    })?;

    let details = parsed.get("videoDetails");
    let title = details.and_then(|d| d.get("title")).and_then(Value::as_str).map(|s| decode_entities(s));
    let description = details
        .and_then(|d| d.get("shortDescription"))
        .and_then(Value::as_str)
        .map(|s| decode_entities(s));
    let creator = details.and_then(|d| d.get("author")).and_then(Value::as_str).map(String::from);
    let creator_id = details.and_then(|d| d.get("channelId")).and_then(Value::as_str).map(String::from);
    let content_id = details
        .and_then(|d| d.get("videoId"))
        .and_then(Value::as_str)
        .map(String::from)
        .or(video_id);
    let image_url = content_id
        .as_ref()
        .map(|id| format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg"));
    let category = parsed
        .pointer("/microformat/playerMicroformatRenderer/category")
        .and_then(Value::as_str)
        .map(String::from);

    let mut categories = categories_for(&fetched.final_url, None);
    if let Some(category) = category {
        categories.push(category);
    }

    Ok(ScrapedMetadata {
        canonical_url: fetched.final_url.clone(),
        content_id,
        title,
        description,
        hashtags: Vec::new(),
        creator,
        creator_id,
        image_url,
        categories,
        suggested_keywords: Vec::new(),
        raw_data: details.cloned(),
    })
}

fn youtube_video_id(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    if parsed.host_str().is_some_and(|h| h.contains("youtu.be")) {
        return parsed.path_segments()?.next().map(String::from).filter(|s| !s.is_empty());
    }
    parsed
        .query_pairs()
        .find(|(k, _)| k == "v")
        .map(|(_, v)| v.into_owned())
}

/// Eventbrite: uses the page's JSON-LD `Event` entity; categories come from
/// the event's location rather than a dedicated category field.
pub async fn scrape_eventbrite(url: &str, config: ScrapeConfig) -> ScrapeOutcome {
    let fetched = fetch_following_redirects(url, config).await?;
    let document = Html::parse_document(&fetched.body);
    let entries = json_ld_entries(&document);
    let event = entries
        .iter()
        .find(|v| v.get("@type").and_then(Value::as_str) == Some("Event"))
        .or_else(|| matching_json_ld(&entries));

    let Some(event) = event else {
        return Err(ScrapeFailure {
            url: url.to_string(),
            kind: ScrapeErrorKind::Parse,
            message: "no Event JSON-LD entity found".to_string(),
            final_url: Some(fetched.final_url),
        });
    };

    let title = event.get("name").and_then(Value::as_str).map(|s| decode_entities(s));
    let description = event.get("description").and_then(Value::as_str).map(|s| decode_entities(s));
    let image_url = match event.get("image") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => items.first().and_then(Value::as_str).map(String::from),
        _ => None,
    };

    let mut categories = categories_for(&fetched.final_url, Some("Event"));
    if let Some(name) = str_at(event, &["location", "name"]) {
        categories.push(name.to_string());
    }
    if let Some(locality) = str_at(event, &["location", "address", "addressLocality"]) {
        categories.push(locality.to_string());
    }

    let content_id = eventbrite_event_id(&fetched.final_url);

    Ok(ScrapedMetadata {
        canonical_url: fetched.final_url.clone(),
        content_id,
        title,
        description,
        hashtags: Vec::new(),
        creator: str_at(event, &["organizer", "name"]).map(String::from),
        creator_id: None,
        image_url,
        categories,
        suggested_keywords: Vec::new(),
        raw_data: Some(event.clone()),
    })
}

fn eventbrite_event_id(url: &str) -> Option<String> {
    let digits: String = url.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    let digits: String = digits.chars().rev().collect();
    if digits.is_empty() { None } else { Some(digits) }
}

/// Airbnb: OpenGraph only. Airbnb's listing pages don't ship stable JSON-LD,
/// so this reuses the generic OG extraction rather than a bespoke parser.
pub async fn scrape_airbnb(url: &str, config: ScrapeConfig) -> ScrapeOutcome {
    let fetched = fetch_following_redirects(url, config).await?;
    let document = Html::parse_document(&fetched.body);
    let og = og_tags(&document);

    let title = og.get("title").cloned().map(|s| decode_entities(&s));
    let description = og.get("description").cloned().map(|s| decode_entities(&s));
    let image_url = og.get("image").cloned();
    let content_id = airbnb_listing_id(&fetched.final_url);

    Ok(ScrapedMetadata {
        canonical_url: fetched.final_url.clone(),
        content_id,
        title,
        description,
        hashtags: Vec::new(),
        creator: None,
        creator_id: None,
        image_url,
        categories: categories_for(&fetched.final_url, None),
        suggested_keywords: Vec::new(),
        raw_data: None,
    })
}

fn airbnb_listing_id(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .skip_while(|s| *s != "rooms")
        .nth(1)
        .map(String::from)
}

/// Reddit: resolves `/r/.../s/...` short share links, then requests the
/// permalink's `.json` API endpoint rather than scraping rendered HTML.
pub async fn scrape_reddit(url: &str, config: ScrapeConfig) -> ScrapeOutcome {
    let resolved = resolve_redirect_head(url, config).await.unwrap_or_else(|_| url.to_string());
    let json_url = format!("{}.json", resolved.trim_end_matches('/'));

    let fetched = fetch_following_redirects(&json_url, config).await?;
    let parsed: Value = serde_json::from_str(&fetched.body).map_err(|e| ScrapeFailure {
        url: url.to_string(),
        kind: ScrapeErrorKind::Parse,
        message: format!("Reddit JSON API response did not parse: {e}"),
        final_url: Some(fetched.final_url.clone()),
    })?;

    let post = parsed
        .get(0)
        .and_then(|listing| listing.pointer("/data/children/0/data"));

    let Some(post) = post else {
        return Err(ScrapeFailure {
            url: url.to_string(),
            kind: ScrapeErrorKind::Parse,
            message: "Reddit JSON API response had no post data".to_string(),
            final_url: Some(fetched.final_url),
        });
    };

    let title = post.get("title").and_then(Value::as_str).map(|s| decode_entities(s));
    let description = post.get("selftext").and_then(Value::as_str).filter(|s| !s.is_empty()).map(|s| decode_entities(s));
    let image_url = post
        .get("thumbnail")
        .and_then(Value::as_str)
        .filter(|s| s.starts_with("http"))
        .map(String::from);

    let mut categories = categories_for(&resolved, None);
    if let Some(subreddit) = post.get("subreddit").and_then(Value::as_str) {
        categories.push(format!("r/{subreddit}"));
    }

    Ok(ScrapedMetadata {
        canonical_url: resolved,
        content_id: post.get("id").and_then(Value::as_str).map(String::from),
        title,
        description,
        hashtags: Vec::new(),
        creator: post.get("author").and_then(Value::as_str).map(String::from),
        creator_id: None,
        image_url,
        categories,
        suggested_keywords: Vec::new(),
        raw_data: Some(post.clone()),
    })
}

/// Spotify: the public oEmbed endpoint returns metadata directly as JSON, no
/// HTML scraping needed.
pub async fn scrape_spotify(url: &str, config: ScrapeConfig) -> ScrapeOutcome {
    let oembed_url = format!("https://open.spotify.com/oembed?url={}", urlencoding_minimal(url));
    let fetched = fetch_following_redirects(&oembed_url, config).await?;
    let parsed: Value = serde_json::from_str(&fetched.body).map_err(|e| ScrapeFailure {
        url: url.to_string(),
        kind: ScrapeErrorKind::Parse,
        message: format!("Spotify oEmbed response did not parse: {e}"),
        final_url: Some(fetched.final_url.clone()),
    })?;

    let title = parsed.get("title").and_then(Value::as_str).map(|s| decode_entities(s));
    let image_url = parsed.get("thumbnail_url").and_then(Value::as_str).map(String::from);
    let creator = parsed
        .get("provider_name")
        .and_then(Value::as_str)
        .map(String::from)
        .or_else(|| Some("Spotify".to_string()));

    Ok(ScrapedMetadata {
        canonical_url: url.to_string(),
        content_id: spotify_content_id(url),
        title,
        description: None,
        hashtags: Vec::new(),
        creator,
        creator_id: None,
        image_url,
        categories: categories_for(url, None),
        suggested_keywords: Vec::new(),
        raw_data: Some(parsed),
    })
}

fn spotify_content_id(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let mut segments = parsed.path_segments()?;
    let kind = segments.next()?;
    let id = segments.next()?;
    if matches!(kind, "track" | "album" | "playlist" | "episode" | "show" | "artist") {
        Some(id.to_string())
    } else {
        None
    }
}

fn urlencoding_minimal(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            ':' => "%3A".to_string(),
            '/' => "%2F".to_string(),
            '?' => "%3F".to_string(),
            '=' => "%3D".to_string(),
            '&' => "%26".to_string(),
            c => c.to_string(),
        })
        .collect()
}
