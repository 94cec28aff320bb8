//! Streaming-order metadata extraction. The document is walked in
//! source order, so "first favicon wins" and "last canonical wins"
//! behave exactly as a token stream would see them.

pub mod encoding;
pub mod heuristics;

use std::collections::{HashMap, HashSet};

use scraper::{ElementRef, Html};

use encoding::repair_mojibake;

/// The one host whose pages hide their real target in an inline
/// `window.location.replace('…')` call.
pub const JS_REDIRECT_HOST: &str = "thr.cm";

/// Everything a page walk produces: the tag map consumed by the
/// heuristics, and an optional in-page redirect target that aborts
/// extraction when found.
#[derive(Debug, Default)]
pub struct Extraction {
    pub tags: HashMap<String, String>,
    pub js_redirect: Option<String>,
}

/// Walk the page and collect meta/link/title hints. `multi_tags` names
/// the tags whose repeated values are `;`-joined instead of
/// overwritten. Malformed markup degrades to whatever the parser could
/// recover; it is never an error.
pub fn extract(html: &str, host: &str, multi_tags: &HashSet<String>) -> Extraction {
    let document = Html::parse_document(html);
    let mut tags: HashMap<String, String> = HashMap::new();
    let mut icon_set = false;

    for node in document.tree.root().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        match element.value().name() {
            "script" if host == JS_REDIRECT_HOST => {
                let js: String = element.text().collect();
                if let Some(target) = js_redirect_target(&js) {
                    return Extraction {
                        tags,
                        js_redirect: Some(target),
                    };
                }
            }
            "meta" => {
                let mut tag = String::new();
                let mut content = String::new();
                for (key, value) in element.value().attrs() {
                    match key.to_lowercase().as_str() {
                        "name" | "property" => tag = value.to_lowercase(),
                        "content" => content = value.to_string(),
                        _ => {}
                    }
                }
                if !tag.is_empty() && !content.is_empty() {
                    let repaired = repair_mojibake(&content);
                    if multi_tags.contains(&tag) {
                        let entry = tags.entry(tag).or_default();
                        entry.push(';');
                        entry.push_str(&repaired);
                    } else {
                        tags.insert(tag, repaired);
                    }
                }
            }
            "link" => {
                let mut rel = String::new();
                let mut href = String::new();
                for (key, value) in element.value().attrs() {
                    match key.to_lowercase().as_str() {
                        "rel" => rel = value.to_lowercase(),
                        "href" => href = value.to_string(),
                        _ => {}
                    }
                }
                if (rel == "icon" || rel == "shortcut icon") && !href.is_empty() && !icon_set {
                    tags.insert("favicon".to_string(), href.clone());
                    icon_set = true;
                }
                if rel == "canonical" && !href.is_empty() {
                    tags.insert("canonical".to_string(), href);
                }
            }
            "title" => {
                let text: String = element.text().collect();
                tags.insert("title".to_string(), repair_mojibake(&text));
            }
            _ => {}
        }
    }

    Extraction {
        tags,
        js_redirect: None,
    }
}

/// Scan script text for `window.location.replace('…')` and return the
/// quoted target. The offset skips the call name and opening
/// delimiters; only single-quoted literals are recognized.
fn js_redirect_target(js: &str) -> Option<String> {
    let at = js.find("window.location.replace")?;
    let rest = js.get(at + 25..)?;
    let end = rest.find('\'')?;
    Some(rest[..end].to_string())
}
