//! URL enrichment service.
//!
//! Accepts batches of URLs, fetches each resource while resolving four
//! kinds of redirect (shortener patterns, HTTP 3xx, `Link` header
//! canonicals, in-page script redirects), extracts page metadata, and
//! returns normalized records cached by a content-addressed key.

pub mod app_state;
pub mod cache;
pub mod config;
pub mod extractor;
pub mod fetcher;
pub mod http;
pub mod links;
pub mod metrics;
pub mod urls;
