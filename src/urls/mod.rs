//! URL canonicalization: shortener rewrites, utm stripping, rootUrl
//! construction and the content-addressed cache key.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Known URL-shortener patterns. The single capture group IS the payload
/// URL; the first matching pattern wins.
static REWRITE_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\Ahttp://adf.ly/[0-9]*/([\.0-9a-zA-Z:/-]*)").unwrap(),
        Regex::new(r"\Ahttp://weightless.mysharebar.com/view[?]iframe=([\.0-9a-zA-Z:/-]*)").unwrap(),
    ]
});

/// Rewrite a known shortener URL to its embedded payload, or return the
/// input unchanged.
pub fn rewrite_shortener(url: &str) -> String {
    for rule in REWRITE_RULES.iter() {
        if let Some(caps) = rule.captures(url) {
            return caps[1].to_string();
        }
    }
    url.to_string()
}

/// Strip every query parameter whose name starts with `utm` and re-encode
/// the remainder sorted by name. Returns `None` when nothing survives.
pub fn clean_query(url: &Url) -> Option<String> {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !name.starts_with("utm"))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    if pairs.is_empty() {
        return None;
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    serializer.extend_pairs(pairs);
    Some(serializer.finish())
}

/// Host with the explicit port, when one is present in the URL.
pub fn host_with_port(url: &Url) -> String {
    let host = url.host_str().unwrap_or("");
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// `host + path` followed by `"?" + query` when the URL carries one. The
/// caller is expected to have cleaned the query first.
pub fn root_url(url: &Url) -> String {
    let mut root = format!("{}{}", host_with_port(url), url.path());
    if let Some(query) = url.query() {
        if !query.is_empty() {
            root.push('?');
            root.push_str(query);
        }
    }
    root
}

/// MD5 hex over the rootUrl string.
pub fn cache_key(root_url: &str) -> String {
    format!("{:x}", md5::compute(root_url.as_bytes()))
}

/// Substring blacklist over the lowercased rootUrl.
pub fn is_blacklisted(root_url: &str, blacklist: &[String]) -> bool {
    let lowered = root_url.to_lowercase();
    blacklist.iter().any(|entry| lowered.contains(entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_adfly_to_payload() {
        let rewritten = rewrite_shortener("http://adf.ly/13775363/http://www.google.com/");
        assert_eq!(rewritten, "http://www.google.com/");
    }

    #[test]
    fn rewrites_mysharebar_iframe() {
        let rewritten =
            rewrite_shortener("http://weightless.mysharebar.com/view?iframe=http://example.com/a");
        assert_eq!(rewritten, "http://example.com/a");
    }

    #[test]
    fn leaves_ordinary_urls_alone() {
        let url = "http://example.com/path?q=1";
        assert_eq!(rewrite_shortener(url), url);
    }

    #[test]
    fn strips_utm_parameters() {
        let url = Url::parse("http://example.com/a?utm_source=x&q=1&utm_campaign=y").unwrap();
        assert_eq!(clean_query(&url).as_deref(), Some("q=1"));
    }

    #[test]
    fn clean_query_sorts_by_name() {
        let url = Url::parse("http://example.com/a?z=1&a=2").unwrap();
        assert_eq!(clean_query(&url).as_deref(), Some("a=2&z=1"));
    }

    #[test]
    fn clean_query_empty_when_only_utm() {
        let url = Url::parse("http://example.com/a?utm_source=x").unwrap();
        assert_eq!(clean_query(&url), None);
    }

    fn key_for(raw: &str) -> String {
        let mut url = Url::parse(raw).unwrap();
        let cleaned = clean_query(&url);
        url.set_query(cleaned.as_deref());
        cache_key(&root_url(&url))
    }

    #[test]
    fn cache_key_ignores_utm_parameters() {
        assert_eq!(
            key_for("http://example.com/a?q=1&utm_source=feed"),
            key_for("http://example.com/a?q=1")
        );
    }

    #[test]
    fn cache_key_ignores_scheme_and_fragment() {
        assert_eq!(
            key_for("http://example.com/a?q=1#frag"),
            key_for("https://example.com/a?q=1")
        );
    }

    #[test]
    fn cache_key_depends_on_host_and_path() {
        assert_ne!(key_for("http://example.com/a"), key_for("http://example.com/b"));
        assert_ne!(key_for("http://example.com/a"), key_for("http://example.org/a"));
    }

    #[test]
    fn cache_key_is_md5_hex() {
        let key = cache_key("www.google.com");
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn root_url_includes_port_when_explicit() {
        let url = Url::parse("http://example.com:8080/a").unwrap();
        assert_eq!(root_url(&url), "example.com:8080/a");
        let url = Url::parse("http://example.com/a").unwrap();
        assert_eq!(root_url(&url), "example.com/a");
    }

    #[test]
    fn blacklist_is_case_insensitive_substring_match() {
        let blacklist = vec!["squidos".to_string()];
        assert!(is_blacklisted("SQUIDOS.com/", &blacklist));
        assert!(is_blacklisted("www.squidos.com/page", &blacklist));
        assert!(!is_blacklisted("www.example.com/", &blacklist));
    }
}
