//! End-to-end proxy behaviour against recording mock upstreams.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use function_gateway::config::GatewayConfig;
use function_gateway::http::build_router;
use function_gateway::AppContext;
use serde_json::Value;

mod common;

use common::{http_response, send, test_config, MockUpstream};

fn router(config: GatewayConfig) -> Router {
    build_router(AppContext::new(config).unwrap())
}

async fn ok_upstream() -> MockUpstream {
    MockUpstream::start(http_response(
        "200 OK",
        &[("Content-Type", "text/plain")],
        "from upstream",
    ))
    .await
}

#[tokio::test]
async fn get_targets_local_runtime_with_exact_query_and_host() {
    let mut upstream = ok_upstream().await;
    let app = router(test_config(&upstream.url()));

    let request = Request::builder()
        .method(Method::GET)
        .uri("/functions/hello?x=1&y=a%20b")
        .header("x-custom", "kept")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"from upstream");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let seen = upstream.next_request().await;
    assert_eq!(seen.method, "GET");
    assert_eq!(seen.target, "/hello?x=1&y=a%20b");
    assert!(seen.body.is_empty());
    assert_eq!(seen.header("host"), Some(upstream.addr.to_string().as_str()));
    assert_eq!(seen.header("x-custom"), Some("kept"));
}

#[tokio::test]
async fn query_reaches_upstream_without_reencoding() {
    let mut upstream = ok_upstream().await;
    let app = router(test_config(&upstream.url()));

    let request = Request::builder()
        .uri("/functions/hello?name=O'Brien&tag=a+b&raw=%7e")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let seen = upstream.next_request().await;
    assert_eq!(seen.target, "/hello?name=O'Brien&tag=a+b&raw=%7e");
}

#[tokio::test]
async fn encoded_slug_stays_a_single_path_segment() {
    let mut upstream = ok_upstream().await;
    let app = router(test_config(&upstream.url()));

    let request = Request::builder()
        .uri("/functions/a%3Fadmin=1?x=1")
        .body(Body::empty())
        .unwrap();
    send(&app, request).await;

    let seen = upstream.next_request().await;
    assert_eq!(seen.target, "/a%3Fadmin=1?x=1");

    let request = Request::builder()
        .uri("/functions/..%2Fsecret")
        .body(Body::empty())
        .unwrap();
    send(&app, request).await;

    let seen = upstream.next_request().await;
    assert_eq!(seen.target, "/..%2Fsecret");
}

#[tokio::test]
async fn dot_slug_is_rejected_without_proxying() {
    let mut upstream = ok_upstream().await;
    let app = router(test_config(&upstream.url()));

    let request = Request::builder()
        .uri("/functions/%2E%2E")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "GATEWAY_ERROR");
    assert!(upstream.try_next().is_none());
}

#[tokio::test]
async fn head_never_carries_a_body() {
    let mut upstream = MockUpstream::start(http_response("200 OK", &[], "")).await;
    let app = router(test_config(&upstream.url()));

    let request = Request::builder()
        .method(Method::HEAD)
        .uri("/functions/hello")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"ignored":true}"#))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let seen = upstream.next_request().await;
    assert_eq!(seen.method, "HEAD");
    assert!(seen.body.is_empty());
}

#[tokio::test]
async fn post_sends_parsed_body_as_json() {
    let mut upstream = ok_upstream().await;
    let app = router(test_config(&upstream.url()));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/functions/echo")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{ "name": "ada",  "tags": [1, 2] }"#))
        .unwrap();
    send(&app, request).await;

    let seen = upstream.next_request().await;
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.target, "/echo");
    let forwarded: Value = serde_json::from_slice(&seen.body).unwrap();
    assert_eq!(forwarded, serde_json::json!({"name": "ada", "tags": [1, 2]}));
    assert_eq!(seen.body_text(), r#"{"name":"ada","tags":[1,2]}"#);
    assert_eq!(
        seen.header("content-length"),
        Some(seen.body.len().to_string().as_str())
    );
}

#[tokio::test]
async fn form_body_is_reserialized_as_json() {
    let mut upstream = ok_upstream().await;
    let app = router(test_config(&upstream.url()));

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/functions/form")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("a=1&b=two+words"))
        .unwrap();
    send(&app, request).await;

    let seen = upstream.next_request().await;
    assert_eq!(seen.body_text(), r#"{"a":"1","b":"two words"}"#);
}

#[tokio::test]
async fn multi_valued_headers_are_dropped() {
    let mut upstream = ok_upstream().await;
    let app = router(test_config(&upstream.url()));

    let request = Request::builder()
        .uri("/functions/hello")
        .header("x-multi", "one")
        .header("x-multi", "two")
        .header("x-single", "only")
        .body(Body::empty())
        .unwrap();
    send(&app, request).await;

    let seen = upstream.next_request().await;
    assert!(seen.header("x-multi").is_none());
    assert_eq!(seen.header("x-single"), Some("only"));
}

#[tokio::test]
async fn relay_keeps_status_and_strips_encoding_headers() {
    let mut upstream = MockUpstream::start(http_response(
        "201 Created",
        &[
            ("Content-Type", "application/octet-stream"),
            ("Content-Encoding", "identity"),
            ("Access-Control-Allow-Origin", "https://only.example"),
            ("X-Upstream", "yes"),
        ],
        "raw-bytes",
    ))
    .await;
    let app = router(test_config(&upstream.url()));

    let request = Request::builder()
        .uri("/functions/blob")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app, request).await;
    upstream.next_request().await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(&body[..], b"raw-bytes");
    assert!(headers.get(header::CONTENT_ENCODING).is_none());
    assert!(headers.get(header::CONNECTION).is_none());
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers["x-upstream"], "yes");
    assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
}

#[tokio::test]
async fn managed_deployment_wins_over_local_runtime() {
    let mut local = ok_upstream().await;
    let mut managed = MockUpstream::start(http_response("200 OK", &[], "managed")).await;

    let mut config = test_config(&local.url());
    config.deployment.url = Some(managed.url());
    let app = router(config);

    let request = Request::builder()
        .uri("/functions/hello?x=1")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"managed");
    let seen = managed.next_request().await;
    assert_eq!(seen.target, "/hello?x=1");
    assert_eq!(seen.header("host"), Some(managed.addr.to_string().as_str()));
    assert!(local.try_next().is_none());
}

#[tokio::test]
async fn unreachable_upstream_yields_gateway_error() {
    let app = router(test_config(&common::closed_port_url().await));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/functions/hello")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, headers, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "GATEWAY_ERROR");
    assert!(json["message"].is_string());
    assert!(!json["details"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_json_body_is_rejected_before_proxying() {
    let mut upstream = ok_upstream().await;
    let app = router(test_config(&upstream.url()));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/functions/hello")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "INVALID_BODY");
    assert!(upstream.try_next().is_none());
}

#[tokio::test]
async fn settings_update_applies_to_next_call() {
    let mut first = ok_upstream().await;
    let mut second = MockUpstream::start(http_response("200 OK", &[], "second")).await;

    let ctx = AppContext::new(test_config(&first.url())).unwrap();
    let app = build_router(ctx.clone());

    let call = || Request::builder().uri("/functions/a").body(Body::empty()).unwrap();
    send(&app, call()).await;
    first.next_request().await;

    let mut settings = (*ctx.gateway.settings()).clone();
    settings.local_runtime_url = second.url();
    ctx.gateway.update_settings(settings);

    let (_, _, body) = send(&app, call()).await;
    assert_eq!(&body[..], b"second");
    second.next_request().await;
}
