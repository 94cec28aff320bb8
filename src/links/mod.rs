//! The per-URL pipeline: fetch, resolve every redirect kind under one
//! hop counter, extract metadata, and assemble the enriched record.

pub mod record;

pub use record::{CachedRecord, ErrorRecord, FetchRecord};

use std::time::Instant;

use reqwest::header::{self, HeaderMap};
use tracing::warn;
use url::Url;

use crate::app_state::AppState;
use crate::extractor::{self, heuristics};
use crate::fetcher::body::read_body;
use crate::fetcher::FetchError;
use crate::urls;

/// Responses advertising more than this are rejected before the body
/// is read.
const CONTENT_LENGTH_LIMIT_BYTES: u64 = 1024 * 512;

/// Drive one URL to a terminal record.
///
/// `url` and `root_url` arrive canonicalized (shortener rewrite and
/// query cleaning already applied). HTTP 3xx responses, Link-header
/// canonicals and in-page script redirects all re-enter the loop,
/// sharing one hop counter capped by configuration; 3xx targets also
/// pass through the shortener rewriter.
pub async fn fetch_link(
    state: &AppState,
    original_url: &str,
    mut url: Url,
    mut root_url: String,
) -> Result<FetchRecord, FetchError> {
    let mut redirect_count: u32 = 0;

    loop {
        if urls::is_blacklisted(&root_url, &state.config.blacklist) {
            return Err(FetchError::Blacklisted);
        }

        let fetch_start = Instant::now();
        let response = state.fetcher.get(&url).await?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| FetchError::MissingLocation(url.to_string()))?;
            let target = urls::rewrite_shortener(&location);
            let next = resolve_redirect(&url, &target)?;
            if redirect_count >= state.config.max_redirects {
                return Err(FetchError::MaxRedirects(original_url.to_string()));
            }
            root_url = urls::root_url(&next);
            url = next;
            redirect_count += 1;
            continue;
        }

        if status.as_u16() != 200 {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(target) = header_canonical(response.headers()) {
            if redirect_count >= state.config.max_redirects {
                return Err(FetchError::MaxRedirects(original_url.to_string()));
            }
            let next = resolve_redirect(&url, &target)?;
            root_url = urls::root_url(&next);
            url = next;
            redirect_count += 1;
            continue;
        }

        if response
            .content_length()
            .is_some_and(|length| length > CONTENT_LENGTH_LIMIT_BYTES)
        {
            return Err(FetchError::TooLarge);
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_lowercase());
        if let Some(ct) = &content_type {
            if !ct.contains("text") {
                return Err(FetchError::ContentType(ct.clone()));
            }
        }
        let content_encoding = response
            .headers()
            .get(header::CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let final_root = root_url.to_lowercase().trim_end_matches('/').to_string();
        let fetch_duration = fetch_start.elapsed().as_millis() as u64;

        let parse_start = Instant::now();
        let raw = response.bytes().await.map_err(FetchError::from_reqwest)?;
        let body = read_body(
            &raw,
            content_encoding.as_deref(),
            content_type.as_deref().unwrap_or(""),
        )?;

        let host = url.host_str().unwrap_or("").to_string();
        let extraction = extractor::extract(&body, &host, &state.multi_tags);

        if let Some(js_target) = extraction.js_redirect {
            let cleaned = js_target.replace('\\', "");
            let next = resolve_redirect(&url, &cleaned)?;
            if redirect_count >= state.config.max_redirects {
                return Err(FetchError::MaxRedirects(original_url.to_string()));
            }
            // The script path never carries a query across.
            root_url = format!("{}{}", urls::host_with_port(&next), next.path());
            url = next;
            redirect_count += 1;
            continue;
        }

        return Ok(build_record(
            state,
            original_url,
            &url,
            final_root,
            fetch_duration,
            parse_start,
            extraction.tags,
        ));
    }
}

/// Assemble the terminal record from the final hop's URL and tag map.
fn build_record(
    state: &AppState,
    original_url: &str,
    url: &Url,
    mut root_url: String,
    fetch_duration: u64,
    parse_start: Instant,
    tags: std::collections::HashMap<String, String>,
) -> FetchRecord {
    let config = &state.config;
    let mut final_url = url.to_string();
    let mut provider_url = format!("http://{}", urls::host_with_port(url));

    // A same-host canonical replaces the identity fields wholesale;
    // cross-host canonicals are ignored.
    if let Some(canonical) = tags.get("canonical") {
        if let Ok(canonical_url) = Url::parse(canonical) {
            if urls::host_with_port(&canonical_url) == urls::host_with_port(url) {
                root_url = urls::root_url(&canonical_url)
                    .to_lowercase()
                    .trim_end_matches('/')
                    .to_string();
                final_url = canonical_url.to_string();
                provider_url = format!("http://{}", urls::host_with_port(&canonical_url));
            }
        }
    }

    let empty = String::new();
    let full_title = tags.get("title").unwrap_or(&empty);
    let title = tags.get("og:title").unwrap_or(full_title);

    let provider_name = heuristics::provider_name(
        &urls::host_with_port(url),
        full_title,
        title,
        &state.providers,
    );
    let stripped = heuristics::strip_provider(title, &provider_name);
    let record_title = heuristics::trim_description(
        stripped.trim(),
        config.description_max_words,
        config.description_max_chars,
    );

    let link_type = tags
        .get("og:type")
        .cloned()
        .unwrap_or_else(|| "website".to_string());

    let description = tags
        .get("og:description")
        .or_else(|| tags.get("description"))
        .map(|desc| {
            heuristics::trim_description(
                desc,
                config.description_max_words,
                config.description_max_chars,
            )
        });

    let image_url = tags.get("og:image").and_then(|image| {
        let resolved = heuristics::resolve_media_url(url, image, config.max_image_url_len);
        if resolved.is_none() {
            warn!(image = %image, "image URL rejected");
        }
        resolved
    });

    let keywords = heuristics::split_keywords(&tags, &config.keywords_tags);
    let provider_keywords = if keywords.is_empty() {
        None
    } else {
        Some(keywords)
    };

    let favicon = tags
        .get("favicon")
        .and_then(|favicon| heuristics::resolve_favicon(url, favicon, config.max_image_url_len));

    FetchRecord {
        fetch_duration,
        original_url: original_url.to_string(),
        root_url: root_url.clone(),
        id: root_url,
        url: final_url,
        provider_url,
        provider_name,
        title: record_title,
        link_type,
        description,
        image_url,
        provider_keywords,
        favicon,
        parse_duration: parse_start.elapsed().as_millis() as u64,
        cache_hit: None,
    }
}

/// A `Link` header nominates a canonical target when it splits at `;`
/// into exactly two comma-free parts and the second is
/// `rel="canonical"`. The target is the first part minus its `<>`.
pub fn header_canonical(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(header::LINK)?.to_str().ok()?;
    let parts: Vec<&str> = link.split(';').collect();
    if parts.len() != 2 || parts.iter().any(|part| part.contains(',')) {
        return None;
    }
    if parts[1].trim() != "rel=\"canonical\"" {
        return None;
    }
    Some(
        parts[0]
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>')
            .to_string(),
    )
}

/// Parse a redirect target, inheriting scheme and host from the
/// previous URL when the target is relative.
fn resolve_redirect(base: &Url, target: &str) -> Result<Url, FetchError> {
    match Url::parse(target) {
        Ok(next) => Ok(next),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            base.join(target).map_err(|_| FetchError::UrlParse)
        }
        Err(_) => Err(FetchError::UrlParse),
    }
}
