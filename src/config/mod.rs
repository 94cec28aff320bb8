//! Configuration for the enrichment service, loaded from a YAML file.
//! Every field has a development default so a partial file (or none, in
//! tests) still yields a usable config.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Port for the service endpoint.
    pub listen_port: u16,
    /// Port for the Prometheus scrape endpoint.
    pub metrics_port: u16,
    /// Cache lifetime for successful records, in days.
    #[serde(rename = "successTTLDays")]
    pub success_ttl_days: u64,
    /// Cache lifetime for error records, in minutes.
    #[serde(rename = "errorTTLMins")]
    pub error_ttl_mins: u64,
    /// Whole-request timeout for one GET (connect, TLS, response).
    pub http_get_timeout_secs: u64,
    /// Redirect hops allowed per URL, across all redirect kinds.
    pub max_redirects: u32,
    /// Length cap for image/favicon URLs with non-http(s) schemes.
    pub max_image_url_len: usize,
    /// Description trimming: word budget.
    pub description_max_words: usize,
    /// Description trimming: character cap.
    pub description_max_chars: usize,
    /// Path to the host → display-name JSON file.
    pub provider_names_file: String,
    /// Meta tags whose repeated values are joined instead of replaced.
    pub multi_tags: Vec<String>,
    /// Meta tags mined for providerKeywords.
    pub keywords_tags: Vec<String>,
    /// Substrings that make a rootUrl unfetchable.
    pub blacklist: Vec<String>,
    /// Cache backend address (`host:port`); empty selects the
    /// in-process cache.
    pub cache_host: String,
    /// Cache database number.
    #[serde(rename = "cacheDB")]
    pub cache_db: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            metrics_port: 9090,
            success_ttl_days: 30,
            error_ttl_mins: 30,
            http_get_timeout_secs: 10,
            max_redirects: 5,
            max_image_url_len: 500,
            description_max_words: 50,
            description_max_chars: 350,
            provider_names_file: "providers.json".to_string(),
            multi_tags: vec![
                "keywords".to_string(),
                "news_keywords".to_string(),
                "article:tag".to_string(),
            ],
            keywords_tags: vec![
                "keywords".to_string(),
                "news_keywords".to_string(),
                "article:tag".to_string(),
            ],
            blacklist: vec!["squidos".to_string()],
            cache_host: String::new(),
            cache_db: 0,
        }
    }
}

impl Config {
    /// Load and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.http_get_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "httpGetTimeoutSecs",
                reason: "must be positive".to_string(),
            });
        }
        if self.description_max_chars == 0 {
            return Err(ConfigError::Invalid {
                field: "descriptionMaxChars",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn success_ttl(&self) -> Duration {
        Duration::from_secs(self.success_ttl_days * 24 * 60 * 60)
    }

    pub fn error_ttl(&self) -> Duration {
        Duration::from_secs(self.error_ttl_mins * 60)
    }

    pub fn http_get_timeout(&self) -> Duration {
        Duration::from_secs(self.http_get_timeout_secs)
    }

    pub fn multi_tag_set(&self) -> HashSet<String> {
        self.multi_tags.iter().cloned().collect()
    }
}

/// Load the provider-names file: a JSON object mapping lowercased host
/// to display name.
pub fn load_provider_names(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
