//! HTTP front-end: request demultiplexing, the batch driver, and the
//! static usage/404 responses.

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::warn;
use url::Url;

use crate::app_state::AppState;
use crate::links::{fetch_link, CachedRecord, ErrorRecord};
use crate::urls;

/// Inbound request bodies are truncated to this size.
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

const INVALID_JSON_MESSAGE: &str = "Unable to parse request - invalid JSON detected";
const NOT_FOUND_BODY: &str = r#"{"error":"Not found"}"#;

/// Static usage document served on `GET /`.
pub const USAGE: &str = r#"{
  "result": {
    "name": "links",
    "description": "Fetches resources identified by URLs",
    "in": {
      "url": {"type": "string"}
    },
    "out": {
      "link": {
        "type": "object",
        "fields": {
          "cacheHit": {
            "type": "boolean"
          },
          "description": {
            "type": "string"
          },
          "error": {
            "type": "string"
          },
          "fetchDuration": {
            "type": "number"
          },
          "favicon": {
            "type": "string"
          },
          "id": {
            "type": "string"
          },
          "imageUrl": {
            "type": "string"
          },
          "originalUrl": {
            "type": "string"
          },
          "providerKeywords": {
            "type": "string"
          },
          "parseDuration": {
            "type": "number"
          },
          "providerName": {
            "type": "string"
          },
          "providerUrl": {
            "type": "string"
          },
          "title": {
            "type": "string"
          },
          "type": {
            "type": "string"
          },
          "url": {
            "type": "string"
          },
          "rootUrl": {
            "type": "string"
          }
        }
      }
    }
  }
}"#;

/// Batch-level status classes, worst last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ItemStatus {
    Ok,
    Failed,
    Malformed,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(usage).post(links_batch))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_requests,
        ))
        .with_state(state)
}

/// Observe every request (count + duration), whatever the handler.
async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();
    state.metrics.requests_total.inc();
    state.metrics.request_duration_ms.add(elapsed.as_millis() as u64);
    state.metrics.request_duration.observe(elapsed);
    response
}

fn json_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        body,
    )
        .into_response()
}

fn error_response(state: &AppState, message: &str, status: StatusCode) -> Response {
    state.metrics.errors_logged_total.inc();
    json_response(status, json!({ "error": message }).to_string())
}

async fn usage() -> Response {
    json_response(StatusCode::OK, USAGE.to_string())
}

async fn not_found(State(state): State<AppState>) -> Response {
    state.metrics.invalid_requests_total.inc();
    json_response(StatusCode::NOT_FOUND, NOT_FOUND_BODY.to_string())
}

/// The batch endpoint: `{"request":[{"url":…},…]}` in,
/// `{"response":[…]}` out. Items are processed sequentially and every
/// item produces an entry; the batch status is the worst item class
/// observed (400 structural, 203 fetch/parse, 200 clean).
async fn links_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if content_type != "application/json" {
        state.metrics.invalid_requests_total.inc();
        warn!(content_type, "client request did not set Content-Type to application/json");
        return error_response(
            &state,
            "Content-Type must be set to application/json",
            StatusCode::BAD_REQUEST,
        );
    }

    let body = &body[..body.len().min(BODY_LIMIT_BYTES)];
    let parsed: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => {
            state.metrics.invalid_requests_total.inc();
            warn!(%err, "client request was invalid JSON");
            return error_response(&state, INVALID_JSON_MESSAGE, StatusCode::BAD_REQUEST);
        }
    };
    let requests = match parsed.get("request").and_then(Value::as_array) {
        Some(items) if !items.is_empty() => items,
        _ => {
            state.metrics.invalid_requests_total.inc();
            warn!("client request was invalid JSON - missing/empty request array");
            return error_response(&state, INVALID_JSON_MESSAGE, StatusCode::BAD_REQUEST);
        }
    };

    let mut worst = ItemStatus::Ok;
    let mut responses = Vec::with_capacity(requests.len());
    for item in requests {
        let (value, status) = process_item(&state, item).await;
        worst = worst.max(status);
        if value.get("error").is_some() {
            responses.push(value);
        } else {
            state.metrics.processed_successful.inc();
            responses.push(json!({ "link": value }));
        }
        state.log_processed();
    }

    let status = match worst {
        ItemStatus::Ok => StatusCode::OK,
        ItemStatus::Failed => StatusCode::NON_AUTHORITATIVE_INFORMATION,
        ItemStatus::Malformed => StatusCode::BAD_REQUEST,
    };
    json_response(status, json!({ "response": responses }).to_string())
}

/// One batch item: canonicalize, consult the cache, fetch on a miss,
/// write the outcome back with the TTL matching its kind.
async fn process_item(state: &AppState, item: &Value) -> (Value, ItemStatus) {
    let Some(request_url) = item.get("url").and_then(Value::as_str) else {
        state.metrics.processed_unsuccessful.inc();
        return (json!({ "error": "Missing url key" }), ItemStatus::Malformed);
    };

    let rewritten = urls::rewrite_shortener(request_url);
    let mut url = match Url::parse(&rewritten) {
        Ok(url) => url,
        Err(err) => {
            warn!(%err, url = %rewritten, "url parse error");
            state.metrics.processed_unsuccessful.inc();
            return (json!({ "error": "URL parse error" }), ItemStatus::Failed);
        }
    };
    let cleaned = urls::clean_query(&url);
    url.set_query(cleaned.as_deref());
    let root = urls::root_url(&url);
    let key = urls::cache_key(&root);

    if let Ok(Some(stored)) = state.cache.get(&key).await {
        if let Ok(mut cached) = serde_json::from_str::<CachedRecord>(&stored) {
            cached.set_cache_hit(true);
            state.metrics.cache_hits.inc();
            let value = serde_json::to_value(&cached).unwrap_or_default();
            return (value, ItemStatus::Ok);
        }
        warn!(%key, "discarding unparseable cache entry");
    }

    match fetch_link(state, &rewritten, url, root).await {
        Ok(mut record) => {
            store(state, &key, &serde_json::to_value(&record).unwrap_or_default(), true).await;
            record.cache_hit = Some(false);
            state.metrics.cache_misses.inc();
            let value = serde_json::to_value(&record).unwrap_or_default();
            (value, ItemStatus::Ok)
        }
        Err(err) => {
            warn!(%err, "fetch pipeline failed");
            state.metrics.processed_unsuccessful.inc();
            let record = ErrorRecord {
                error: err.to_string(),
                cache_hit: None,
            };
            let value = serde_json::to_value(&record).unwrap_or_default();
            store(state, &key, &value, false).await;
            (value, ItemStatus::Failed)
        }
    }
}

/// Cache write-back; failures are logged, never surfaced.
async fn store(state: &AppState, key: &str, value: &Value, success: bool) {
    let ttl = if success {
        state.config.success_ttl()
    } else {
        state.config.error_ttl()
    };
    let serialized = value.to_string();
    if let Err(err) = state.cache.set(key, &serialized, ttl).await {
        tracing::error!(%err, key, "error saving response in cache");
    }
}
