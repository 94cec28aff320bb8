//! Wire records. Field order matters: serialization follows struct
//! order, and cached values deserialize back into the same shape, so a
//! cache hit replays the original serialization byte for byte (plus
//! the `cacheHit` marker).

use serde::{Deserialize, Serialize};

/// A successfully enriched URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRecord {
    /// Milliseconds spent on the final hop's request and header checks.
    pub fetch_duration: u64,
    /// The request input, after shortener rewriting.
    pub original_url: String,
    /// Lowercased host+path[+?query] with the trailing slash removed.
    pub root_url: String,
    /// Always equal to `root_url`.
    pub id: String,
    /// Final URL after all redirects (canonical when same-host).
    pub url: String,
    pub provider_url: String,
    pub provider_name: String,
    pub title: String,
    #[serde(rename = "type")]
    pub link_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_keywords: Option<Vec<String>>,
    /// Always serialized; `null` when no favicon resolved.
    pub favicon: Option<String>,
    /// Milliseconds spent reading, decoding and deriving.
    pub parse_duration: u64,
    /// Attached at response time only, never stored in the cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
}

/// The error payload for a failed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
}

/// A cache entry is one or the other, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CachedRecord {
    Link(FetchRecord),
    Error(ErrorRecord),
}

impl CachedRecord {
    pub fn set_cache_hit(&mut self, hit: bool) {
        match self {
            CachedRecord::Link(record) => record.cache_hit = Some(hit),
            CachedRecord::Error(record) => record.cache_hit = Some(hit),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CachedRecord::Error(_))
    }
}
