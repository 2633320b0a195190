//! Generic OpenGraph/JSON-LD scraper, and the shared redirect-following
//! HTTP helper every platform scraper builds on (section 4.8).

use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::ScrapeErrorKind;
use crate::model::ScrapedMetadata;

use super::{ScrapeConfig, ScrapeFailure, ScrapeOutcome};

/// JSON-LD `@type` values this scraper knows how to treat as a metadata
/// source, in preference order.
const KNOWN_LD_TYPES: &[&str] = &[
    "Article", "NewsArticle", "BlogPosting", "WebPage", "Product", "Place",
    "LocalBusiness", "Restaurant", "Event", "Organization",
];

pub(super) fn classify_status(status: StatusCode) -> ScrapeErrorKind {
    match status.as_u16() {
        404 => ScrapeErrorKind::NotFound,
        403 | 429 => ScrapeErrorKind::Blocked,
        _ => ScrapeErrorKind::Network,
    }
}

/// The outcome of following redirects by hand: the final response body (if
/// any) plus the chain of URLs visited.
pub(super) struct FetchResult {
    pub body: String,
    pub final_url: String,
    pub redirected: bool,
}

/// Manually follows up to `config.max_redirects` redirects, resolving
/// relative `Location` headers against the current URL, per section 4.8
/// (`redirect: manual` is mandatory so the chain can be captured).
pub(super) async fn fetch_following_redirects(
    start_url: &str,
    config: ScrapeConfig,
) -> Result<FetchResult, ScrapeFailure> {
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
    let mut redirected = false;

    for _ in 0..config.max_redirects {
        let response = client.get(current.clone()).send().await.map_err(|e| ScrapeFailure {
            url: start_url.to_string(),
            kind: ScrapeErrorKind::Network,
            message: e.to_string(),
            final_url: if redirected { Some(current.to_string()) } else { None },
        })?;

        if response.status().is_redirection() {
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
            redirected = true;
            continue;
        }

        if !response.status().is_success() {
            let kind = classify_status(response.status());
            return Err(ScrapeFailure {
                url: start_url.to_string(),
                kind,
                message: format!("HTTP {}", response.status()),
                final_url: if redirected { Some(current.to_string()) } else { None },
            });
        }

        let final_url = current.to_string();
        let body = response.text().await.map_err(|e| ScrapeFailure {
            url: start_url.to_string(),
            kind: ScrapeErrorKind::Network,
            message: e.to_string(),
            final_url: if redirected { Some(final_url.clone()) } else { None },
        })?;
        return Ok(FetchResult { body, final_url, redirected });
    }

    Err(ScrapeFailure {
        url: start_url.to_string(),
        kind: ScrapeErrorKind::Network,
        message: "exceeded maximum redirect hops".to_string(),
        final_url: Some(current.to_string()),
    })
}

pub(super) fn og_tags(document: &Html) -> std::collections::HashMap<String, String> {
    let mut tags = std::collections::HashMap::new();
    // OpenGraph order is not standardised; accept both attribute orders.
    let Ok(forward) = Selector::parse(r#"meta[property^="og:"]"#) else { return tags };
    let Ok(reversed) = Selector::parse(r#"meta[name^="og:"]"#) else { return tags };

    for el in document.select(&forward).chain(document.select(&reversed)) {
        let key = el
            .value()
            .attr("property")
            .or_else(|| el.value().attr("name"))
            .unwrap_or_default();
        if let Some(content) = el.value().attr("content") {
            tags.insert(key.trim_start_matches("og:").to_string(), content.to_string());
        }
    }
    tags
}

pub(super) fn json_ld_entries(document: &Html) -> Vec<Value> {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|el| {
            let text: String = el.text().collect();
            serde_json::from_str::<Value>(&text).ok()
        })
        .flat_map(|v| match v {
            Value::Array(items) => items,
            other => vec![other],
        })
        .collect()
}

pub(super) fn matching_json_ld(entries: &[Value]) -> Option<&Value> {
    entries.iter().find(|v| {
        let ty = v.get("@type").and_then(Value::as_str).unwrap_or_default();
        KNOWN_LD_TYPES.contains(&ty)
    })
}

pub(super) fn decode_entities(input: &str) -> String {
    input
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

pub(super) fn categories_for(url: &str, ld_type: Option<&str>) -> Vec<String> {
    let mut categories = Vec::new();
    if let Some(host) = url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) {
        categories.push(host);
    }
    if let Some(ty) = ld_type {
        categories.push(ty.to_string());
    }
    categories
}

/// Extracts the first brace-balanced `{...}` object following `needle` in
/// `body`, robust to nested braces inside quoted strings. Used by the
/// TikTok and YouTube scrapers to pull an inline `var X = {...};` blob out
/// of a `<script>` tag without a full JS parser.
pub(super) fn extract_braced_json_after<'a>(body: &'a str, needle: &str) -> Option<&'a str> {
    let start_of_needle = body.find(needle)?;
    let after = &body[start_of_needle + needle.len()..];
    let open = after.find('{')?;
    let bytes = after.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        let c = b as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&after[open..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Scrapes a generic page for OpenGraph and JSON-LD metadata, preferring OG
/// for title/description/image and falling back to JSON-LD, then `None`.
pub async fn scrape_generic(url: &str, config: ScrapeConfig) -> ScrapeOutcome {
    let fetched = fetch_following_redirects(url, config).await?;
    let document = Html::parse_document(&fetched.body);

    let og = og_tags(&document);
    let entries = json_ld_entries(&document);
    let ld = matching_json_ld(&entries);
    let ld_type = ld.and_then(|v| v.get("@type")).and_then(Value::as_str);

    let title = og
        .get("title")
        .cloned()
        .or_else(|| ld.and_then(|v| v.get("name")).and_then(Value::as_str).map(String::from))
        .map(|s| decode_entities(&s));
    let description = og
        .get("description")
        .cloned()
        .or_else(|| ld.and_then(|v| v.get("description")).and_then(Value::as_str).map(String::from))
        .map(|s| decode_entities(&s));
    let image_url = og
        .get("image")
        .cloned()
        .or_else(|| ld.and_then(|v| v.get("image")).and_then(Value::as_str).map(String::from));

    Ok(ScrapedMetadata {
        canonical_url: fetched.final_url.clone(),
        content_id: None,
        title,
        description,
        hashtags: Vec::new(),
        creator: None,
        creator_id: None,
        image_url,
        categories: categories_for(&fetched.final_url, ld_type),
        suggested_keywords: Vec::new(),
        raw_data: ld.cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("Tom &amp; Jerry&#39;s"), "Tom & Jerry's");
    }

    #[test]
    fn test_og_tags_accepts_both_attribute_orders() {
        let html = r#"<html><head>
            <meta property="og:title" content="Forward order">
            <meta content="Reversed order" name="og:description">
        </head></html>"#;
        let document = Html::parse_document(html);
        let tags = og_tags(&document);
        assert_eq!(tags.get("title"), Some(&"Forward order".to_string()));
        assert_eq!(tags.get("description"), Some(&"Reversed order".to_string()));
    }

    #[test]
    fn test_json_ld_picks_known_type() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@type": "Event", "name": "Concert"}
        </script></head></html>"#;
        let document = Html::parse_document(html);
        let entries = json_ld_entries(&document);
        let matched = matching_json_ld(&entries).unwrap();
        assert_eq!(matched.get("name").unwrap().as_str(), Some("Concert"));
    }
}
