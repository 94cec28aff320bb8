//! Heuristics that turn the collected tag map into record fields:
//! provider identification, title stripping, description trimming,
//! keyword splitting, and media URL resolution.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

// Preserved from the production rule set; the bracketed suffix group
// effectively admits any of its member characters, which is what
// callers depend on.
static PROVIDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9-]+)[.co|.com|.ne|.net|.org]*.[a-zA-Z]+$").unwrap());

/// Derive a display name for the site serving the page.
///
/// Order: known-hosts map (with and without a `www.` prefix), then the
/// title/og:title split trick, then the domain-label fallback.
pub fn provider_name(
    host: &str,
    full_title: &str,
    og_title: &str,
    known: &HashMap<String, String>,
) -> String {
    let host = host.to_lowercase();
    if let Some(name) = known.get(&host) {
        return name.clone();
    }
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if let Some(name) = known.get(&host) {
        return name.clone();
    }

    // A `<title>` of the form "Article | Site" (or "Article - Site")
    // where one side equals og:title names the provider on the other.
    if !og_title.is_empty() && full_title != og_title {
        let parts: Vec<&str> = if full_title.contains('|') {
            full_title.split('|').collect()
        } else {
            full_title.split(" - ").collect()
        };
        if parts.len() == 2 {
            if og_title.trim() == parts[0].trim() {
                return parts[1].trim().to_string();
            }
            if og_title.trim() == parts[1].trim() {
                return parts[0].trim().to_string();
            }
        }
    }

    if let Some(caps) = PROVIDER_RE.captures(&host) {
        let name = capitalize(&caps[1]);
        if name == "In" {
            return host.strip_prefix("www.").unwrap_or(&host).to_string();
        }
        return name;
    }

    String::new()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Strip the provider name from a page title when it leads or trails a
/// `|`- or `-`-separated title.
pub fn strip_provider(title: &str, provider_name: &str) -> String {
    let (parts, join_char): (Vec<&str>, char) = if title.contains('|') {
        (title.split('|').collect(), '|')
    } else {
        (title.split('-').collect(), '-')
    };

    if parts.len() > 1 {
        let provider = provider_name.to_lowercase();
        let normalize = |part: &str| part.replace(' ', "").to_lowercase().trim().to_string();
        if normalize(parts[0]) == provider {
            return parts[1..].join(&join_char.to_string()).trim().to_string();
        }
        if normalize(parts[parts.len() - 1]) == provider {
            return parts[..parts.len() - 1]
                .join(&join_char.to_string())
                .trim()
                .to_string();
        }
    }
    title.to_string()
}

/// Cut a description at a word budget or a character cap, whichever is
/// reached first, appending an ellipsis. The budget counts spaces, so a
/// cut never lands inside a word.
pub fn trim_description(text: &str, max_words: usize, max_chars: usize) -> String {
    let result = text.trim();
    let mut budget = max_words as i64;
    for (i, c) in result.char_indices() {
        if c == ' ' {
            budget -= 1;
            if budget == 0 {
                return format!("{}…", &result[..i]);
            }
        }
        if i >= max_chars {
            return format!("{}…", &result[..i]);
        }
    }
    result.to_string()
}

/// Collect keywords from the configured tags: `;`/`,`-separated lists,
/// trimmed, deduplicated, sorted.
pub fn split_keywords(tags: &HashMap<String, String>, keyword_tags: &[String]) -> Vec<String> {
    let mut words = BTreeSet::new();
    for tag in keyword_tags {
        if let Some(value) = tags.get(tag) {
            let splitter = value.replace(';', "////").replace(',', "////");
            for word in splitter.split("////") {
                let trimmed = word.trim();
                if !trimmed.is_empty() {
                    words.insert(trimmed.to_string());
                }
            }
        }
    }
    words.into_iter().collect()
}

/// Resolve an image-like URL against the page URL. Accepted when the
/// resolved scheme is http(s), or as a fallback when the resolved form
/// stays under the length cap.
pub fn resolve_media_url(base: &Url, raw: &str, max_len: usize) -> Option<String> {
    let resolved = base.join(raw).ok()?;
    let full = resolved.to_string();
    if resolved.scheme() == "http" || resolved.scheme() == "https" || full.len() < max_len {
        Some(full)
    } else {
        None
    }
}

/// Favicons that are already absolute URLs are kept verbatim; anything
/// else resolves like an image URL.
pub fn resolve_favicon(base: &Url, raw: &str, max_len: usize) -> Option<String> {
    if Url::parse(raw).is_ok() {
        return Some(raw.to_string());
    }
    resolve_media_url(base, raw, max_len)
}
