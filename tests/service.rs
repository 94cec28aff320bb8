//! End-to-end tests: the service is bound to an ephemeral port and
//! exercised over HTTP, with origin pages served by a wiremock server.
//! Hostname-dependent scenarios pin DNS for the test hosts to
//! localhost and carry the mock port in the URL.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use links::app_state::AppState;
use links::cache::MemoryCache;
use links::config::Config;
use links::fetcher::HttpFetcher;
use links::http::{router, USAGE};
use links::metrics::ServiceMetrics;

const GOOGLE_PAGE: &str = include_str!("fixtures/google.html");
const BAD_IMAGE_PAGE: &str = include_str!("fixtures/badimage.html");

/// Start the service with an in-process cache, resolving the given
/// hostnames to localhost. Returns the service base URL.
async fn spawn_service(resolve_hosts: &[&str]) -> String {
    let config = Config::default();
    let overrides: Vec<(&str, IpAddr)> = resolve_hosts
        .iter()
        .map(|host| (*host, IpAddr::V4(Ipv4Addr::LOCALHOST)))
        .collect();
    let fetcher =
        HttpFetcher::with_resolve_overrides(config.http_get_timeout(), &overrides).unwrap();

    let mut providers = HashMap::new();
    providers.insert("www.google.com".to_string(), "Google".to_string());

    let state = AppState::new(
        config,
        Arc::new(MemoryCache::new()),
        fetcher,
        providers,
        ServiceMetrics::new(),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

async fn post_batch(service: &str, body: String) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(service)
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    let value: Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    (status, value)
}

fn first_link(value: &Value) -> &Value {
    &value["response"][0]["link"]
}

#[tokio::test]
async fn usage_document_served_on_root() {
    let service = spawn_service(&[]).await;
    let response = reqwest::get(&service).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    let expected: Value = serde_json::from_str(USAGE).unwrap();
    assert_eq!(body, expected);
}

#[tokio::test]
async fn unknown_path_returns_404() {
    let service = spawn_service(&[]).await;
    let response = reqwest::get(format!("{service}/wibble")).await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(response.text().await.unwrap(), r#"{"error":"Not found"}"#);
}

#[tokio::test]
async fn invalid_json_rejected() {
    let service = spawn_service(&[]).await;
    let (status, body) = post_batch(&service, "{]}".to_string()).await;
    assert_eq!(status, 400);
    assert_eq!(
        body,
        serde_json::json!({"error": "Unable to parse request - invalid JSON detected"})
    );
}

#[tokio::test]
async fn wrong_content_type_rejected() {
    let service = spawn_service(&[]).await;
    let response = reqwest::Client::new()
        .post(&service)
        .header("Content-Type", "text/plain")
        .body(r#"{"request":[{"url":"http://example.com/"}]}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"error": "Content-Type must be set to application/json"})
    );
}

#[tokio::test]
async fn missing_request_array_rejected() {
    let service = spawn_service(&[]).await;
    let (status, body) = post_batch(
        &service,
        r#"{"bad_request": [{"url": "http://www.google.com"}]}"#.to_string(),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(
        body,
        serde_json::json!({"error": "Unable to parse request - invalid JSON detected"})
    );
}

#[tokio::test]
async fn missing_url_key_reported_per_item() {
    let service = spawn_service(&[]).await;
    let (status, body) = post_batch(
        &service,
        r#"{"request": [{"bad_url": "http://www.google.com"}]}"#.to_string(),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(
        body,
        serde_json::json!({"response": [{"error": "Missing url key"}]})
    );
}

#[tokio::test]
async fn blacklisted_url_rejected_without_fetching() {
    let service = spawn_service(&[]).await;
    let (status, body) =
        post_batch(&service, r#"{"request": [{"url": "http://squidos.com/"}]}"#.to_string()).await;
    assert_eq!(status, 203);
    assert_eq!(
        body,
        serde_json::json!({"response": [{"error": "Invalid URL (blacklisted)"}]})
    );
}

#[tokio::test]
async fn successful_fetch_builds_record() {
    let mock = MockServer::start().await;
    let port = mock.address().port();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(GOOGLE_PAGE)
                .insert_header("Content-Type", "text/html; charset=utf-8"),
        )
        .mount(&mock)
        .await;

    let service = spawn_service(&["www.google.com"]).await;
    let url = format!("http://www.google.com:{port}/");
    let (status, body) =
        post_batch(&service, format!(r#"{{"request": [{{"url": "{url}"}}]}}"#)).await;

    assert_eq!(status, 200);
    let link = first_link(&body);
    assert_eq!(link["title"], "Google");
    assert_eq!(link["id"], format!("www.google.com:{port}"));
    assert_eq!(link["rootUrl"], link["id"]);
    assert_eq!(link["type"], "website");
    assert_eq!(link["originalUrl"], url);
    assert_eq!(link["providerUrl"], format!("http://www.google.com:{port}"));
    assert_eq!(link["cacheHit"], false);
    assert_eq!(
        link["favicon"],
        format!("http://www.google.com:{port}/images/branding/product/ico/googleg_lodp.ico")
    );
    assert!(link["description"]
        .as_str()
        .unwrap()
        .starts_with("Search the world's information"));
    assert!(link["fetchDuration"].is_u64());
    assert!(link["parseDuration"].is_u64());
}

#[tokio::test]
async fn second_call_is_served_from_cache() {
    let mock = MockServer::start().await;
    let port = mock.address().port();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(GOOGLE_PAGE)
                .insert_header("Content-Type", "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&mock)
        .await;

    let service = spawn_service(&["www.google.com"]).await;
    let batch = format!(r#"{{"request": [{{"url": "http://www.google.com:{port}/"}}]}}"#);

    let (_, first) = post_batch(&service, batch.clone()).await;
    let (status, second) = post_batch(&service, batch).await;
    assert_eq!(status, 200);

    assert_eq!(first_link(&first)["cacheHit"], false);
    assert_eq!(first_link(&second)["cacheHit"], true);

    // Apart from the cacheHit marker the records are identical.
    let mut a = first_link(&first).as_object().unwrap().clone();
    let mut b = first_link(&second).as_object().unwrap().clone();
    a.remove("cacheHit");
    b.remove("cacheHit");
    assert_eq!(a, b);
}

#[tokio::test]
async fn cache_key_ignores_utm_parameters_end_to_end() {
    let mock = MockServer::start().await;
    let port = mock.address().port();
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(GOOGLE_PAGE)
                .insert_header("Content-Type", "text/html; charset=utf-8"),
        )
        .mount(&mock)
        .await;

    let service = spawn_service(&["www.google.com"]).await;
    let (_, first) = post_batch(
        &service,
        format!(r#"{{"request": [{{"url": "http://www.google.com:{port}/?q=1"}}]}}"#),
    )
    .await;
    let (_, second) = post_batch(
        &service,
        format!(
            r#"{{"request": [{{"url": "http://www.google.com:{port}/?q=1&utm_source=feed"}}]}}"#
        ),
    )
    .await;

    assert_eq!(first_link(&first)["cacheHit"], false);
    // The utm variant maps to the same key, so it hits.
    assert_eq!(first_link(&second)["cacheHit"], true);
}

#[tokio::test]
async fn shortener_url_rewritten_before_fetching() {
    let mock = MockServer::start().await;
    let port = mock.address().port();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(GOOGLE_PAGE)
                .insert_header("Content-Type", "text/html; charset=utf-8"),
        )
        .mount(&mock)
        .await;

    let service = spawn_service(&["www.google.com"]).await;
    let shortened = format!("http://adf.ly/13775363/http://www.google.com:{port}/");
    let (status, body) =
        post_batch(&service, format!(r#"{{"request": [{{"url": "{shortened}"}}]}}"#)).await;

    assert_eq!(status, 200);
    let link = first_link(&body);
    assert_eq!(link["title"], "Google");
    assert_eq!(link["id"], format!("www.google.com:{port}"));
    assert_eq!(link["originalUrl"], format!("http://www.google.com:{port}/"));
}

#[tokio::test]
async fn script_redirect_followed_to_target_page() {
    let mock = MockServer::start().await;
    let port = mock.address().port();

    let thr_page = format!(
        "<html><head><script>window.location.replace('http://trib.al:{port}/QNAQUT9');</script></head><body></body></html>"
    );
    Mock::given(method("GET"))
        .and(path("/scmf/RedirectMe"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(thr_page)
                .insert_header("Content-Type", "text/html; charset=utf-8"),
        )
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/QNAQUT9"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><head><title>Basic Test Page</title></head><body>Hi</body></html>")
                .insert_header("Content-Type", "text/html; charset=utf-8"),
        )
        .mount(&mock)
        .await;

    let service = spawn_service(&["thr.cm", "trib.al"]).await;
    let (status, body) = post_batch(
        &service,
        format!(r#"{{"request": [{{"url": "http://thr.cm:{port}/scmf/RedirectMe"}}]}}"#),
    )
    .await;

    assert_eq!(status, 200);
    let link = first_link(&body);
    assert_eq!(link["title"], "Basic Test Page");
    assert_eq!(link["id"], format!("trib.al:{port}/qnaqut9"));
}

#[tokio::test]
async fn malformed_og_image_is_dropped() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2016/05/frotissanguineo.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(BAD_IMAGE_PAGE)
                .insert_header("Content-Type", "text/html; charset=utf-8"),
        )
        .mount(&mock)
        .await;

    let service = spawn_service(&[]).await;
    let url = format!("{}/2016/05/frotissanguineo.html", mock.uri());
    let (status, body) =
        post_batch(&service, format!(r#"{{"request": [{{"url": "{url}"}}]}}"#)).await;

    assert_eq!(status, 200);
    let link = first_link(&body);
    assert!(link.get("imageUrl").is_none());
    assert_eq!(link["title"], "Frotis Sanguineo");
}

#[tokio::test]
async fn http_redirect_followed_and_title_repaired() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/redirect"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/final"))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/final"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    "<html><head><title>CafÃ© Culture</title></head><body></body></html>",
                )
                .insert_header("Content-Type", "text/html; charset=utf-8"),
        )
        .mount(&mock)
        .await;

    let service = spawn_service(&[]).await;
    let url = format!("{}/redirect", mock.uri());
    let (status, body) =
        post_batch(&service, format!(r#"{{"request": [{{"url": "{url}"}}]}}"#)).await;

    assert_eq!(status, 200);
    let link = first_link(&body);
    assert_eq!(link["title"], "Café Culture");
    assert!(link["id"].as_str().unwrap().ends_with("/final"));
}

#[tokio::test]
async fn redirect_loop_hits_the_hop_limit() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&mock)
        .await;

    let service = spawn_service(&[]).await;
    let url = format!("{}/loop", mock.uri());
    let (status, body) =
        post_batch(&service, format!(r#"{{"request": [{{"url": "{url}"}}]}}"#)).await;

    assert_eq!(status, 203);
    let message = body["response"][0]["error"].as_str().unwrap();
    assert_eq!(message, format!("Max redirects limit reached! Request URL: {url}"));
}

#[tokio::test]
async fn non_text_content_type_rejected() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/image"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0xFF, 0xD8, 0xFF])
                .insert_header("Content-Type", "image/jpeg"),
        )
        .mount(&mock)
        .await;

    let service = spawn_service(&[]).await;
    let url = format!("{}/image", mock.uri());
    let (status, body) =
        post_batch(&service, format!(r#"{{"request": [{{"url": "{url}"}}]}}"#)).await;

    assert_eq!(status, 203);
    assert_eq!(
        body["response"][0]["error"],
        "Invalid content-type detected: image/jpeg"
    );
}

#[tokio::test]
async fn upstream_error_status_reported() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock)
        .await;

    let service = spawn_service(&[]).await;
    let url = format!("{}/missing", mock.uri());
    let (status, body) =
        post_batch(&service, format!(r#"{{"request": [{{"url": "{url}"}}]}}"#)).await;

    assert_eq!(status, 203);
    assert_eq!(
        body["response"][0]["error"],
        format!("HTTP GET result status code: 404 url: {url}")
    );
}

#[tokio::test]
async fn gzip_encoded_pages_are_decoded() {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let page = "<html><head><title>Compressed Page</title></head><body></body></html>";
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(page.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gzipped"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(compressed)
                .insert_header("Content-Type", "text/html; charset=utf-8")
                .insert_header("Content-Encoding", "gzip"),
        )
        .mount(&mock)
        .await;

    let service = spawn_service(&[]).await;
    let url = format!("{}/gzipped", mock.uri());
    let (status, body) =
        post_batch(&service, format!(r#"{{"request": [{{"url": "{url}"}}]}}"#)).await;

    assert_eq!(status, 200);
    assert_eq!(first_link(&body)["title"], "Compressed Page");
}

#[tokio::test]
async fn batch_preserves_order_and_reports_worst_status() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><head><title>Fine</title></head></html>")
                .insert_header("Content-Type", "text/html; charset=utf-8"),
        )
        .mount(&mock)
        .await;

    let service = spawn_service(&[]).await;
    let batch = format!(
        r#"{{"request": [{{"url": "{}/ok"}}, {{"url": "http://squidos.com/"}}, {{"nourl": true}}]}}"#,
        mock.uri()
    );
    let (status, body) = post_batch(&service, batch).await;

    // One structurally malformed item makes the whole batch a 400.
    assert_eq!(status, 400);
    let responses = body["response"].as_array().unwrap();
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["link"]["title"], "Fine");
    assert_eq!(responses[1]["error"], "Invalid URL (blacklisted)");
    assert_eq!(responses[2]["error"], "Missing url key");
}
