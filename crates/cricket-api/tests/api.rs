//! API integration tests for cricket-api routes.
//!
//! Requests go straight to the router through `tower::ServiceExt`; feeds and
//! streams are served by a local wiremock server.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cricket_api::app::build_app;
use cricket_api::state::AppState;
use cricket_core::{FeedConfig, PlayerConfig, ResolverConfig, SourceDef};

const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:1
#EXTINF:6.000,
seg1.ts
";

fn app_with_sources(sources: Vec<SourceDef>) -> axum::Router {
    let feed = FeedConfig::default().with_max_retries(0).with_sources(sources);
    let state = AppState::from_configs(feed, ResolverConfig::default(), PlayerConfig::default()).unwrap();
    build_app(state)
}

/// No sources configured, so every list is the placeholder set.
fn app() -> axum::Router {
    app_with_sources(Vec::new())
}

async fn live_app() -> (axum::Router, MockServer) {
    let server = MockServer::start().await;
    let feed = json!({
        "matches": [
            {
                "id": "m1",
                "team1": "India",
                "team2": "Pakistan",
                "status": "live",
                "stream_url": format!("{}/live.m3u8", server.uri())
            },
            {
                "id": "m2",
                "team1": "Sri Lanka",
                "team2": "Bangladesh",
                "status": "live",
                "stream_url": format!("{}/dead.m3u8", server.uri())
            }
        ]
    });
    let app = feed_app(&server, feed).await;
    (app, server)
}

/// Serves `feed` at `/feed.json` and a playable `/live.m3u8` from `server`.
async fn feed_app(server: &MockServer, feed: Value) -> axum::Router {
    Mock::given(method("GET"))
        .and(path("/feed.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(feed))
        .mount(server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/live.m3u8"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/live.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MEDIA))
        .mount(server)
        .await;

    app_with_sources(vec![SourceDef {
        name: "local".into(),
        url: format!("{}/feed.json", server.uri()),
        proxy: false,
    }])
}

async fn body_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(b) = body {
        builder.body(Body::from(serde_json::to_vec(&b).unwrap())).unwrap()
    } else {
        builder.body(Body::empty()).unwrap()
    }
}

/// Polls a session until its `runs`-th attempt loop has settled.
async fn settled_session(app: &axum::Router, id: &str, runs: u64) -> Value {
    for _ in 0..200 {
        let resp = app
            .clone()
            .oneshot(get(&format!("/api/v1/sessions/{id}")))
            .await
            .unwrap();
        let body = body_json(resp.into_body()).await;
        let settled = body["state"] == "playing" || body["state"] == "unavailable";
        if settled && body["runs"].as_u64() >= Some(runs) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("session {id} did not settle");
}

async fn create_session(app: &axum::Router, match_id: &str) -> String {
    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/sessions", Some(json!({ "match_id": match_id }))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp.into_body()).await;
    assert!(body["state"] == "idle" || body["state"] == "loading", "{body}");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_returns_ok() {
    let resp = app().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn metrics_returns_openmetrics() {
    let app = app();
    app.clone().oneshot(get("/api/v1/matches")).await.unwrap();

    let resp = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(ct.contains("openmetrics-text"));
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("cricket_feed_mock_fallbacks_total 1"));
    assert!(text.contains("cricket_sessions{state=\"playing\"} 0"));
    assert!(text.ends_with("# EOF\n"));
}

#[tokio::test]
async fn metrics_escape_feed_supplied_ids() {
    let server = MockServer::start().await;
    let feed = json!([{
        "id": "a\"b\nc\\d",
        "team1": "Nepal",
        "team2": "Oman",
        "status": "live",
        "stream_url": format!("{}/live.m3u8", server.uri())
    }]);
    let app = feed_app(&server, feed).await;

    let id = create_session(&app, "a\"b\nc\\d").await;
    settled_session(&app, &id, 1).await;

    let resp = app.oneshot(get("/metrics")).await.unwrap();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("match_id=\"a\\\"b\\nc\\\\d\"} 1"), "{text}");
    assert!(
        text.lines().all(|l| l.starts_with('#') || l.starts_with("cricket_")),
        "{text}"
    );
}

#[tokio::test]
async fn refresh_skips_the_cache() {
    let (app, _server) = live_app().await;

    let resp = app.clone().oneshot(get("/api/v1/matches")).await.unwrap();
    assert_eq!(body_json(resp.into_body()).await["origin"], "live");
    let resp = app.clone().oneshot(get("/api/v1/matches")).await.unwrap();
    assert_eq!(body_json(resp.into_body()).await["origin"], "cache");

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/matches/refresh?status=live", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp.into_body()).await;
    assert_eq!(body["origin"], "live");
    assert_eq!(body["matches"].as_array().unwrap().len(), 2);

    let resp = app
        .oneshot(json_request("POST", "/api/v1/matches/refresh?status=bogus", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn matches_fall_back_to_placeholders() {
    let resp = app().oneshot(get("/api/v1/matches")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp.into_body()).await;
    assert_eq!(body["origin"], "mock");
    assert_eq!(body["refresh_interval_secs"], 10);
    assert_eq!(body["matches"].as_array().unwrap().len(), 3);
    assert_eq!(body["matches"][0]["status"], "live");
    assert_eq!(body["matches"][0]["team1"]["shortName"], "IND");
}

#[tokio::test]
async fn matches_filter_by_status() {
    let app = app();
    let resp = app.clone().oneshot(get("/api/v1/matches?status=upcoming")).await.unwrap();
    let body = body_json(resp.into_body()).await;
    let matches = body["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["id"], "mock-2");

    let resp = app.oneshot(get("/api/v1/matches?status=postponed")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_match_by_id() {
    let app = app();
    let resp = app.clone().oneshot(get("/api/v1/matches/mock-3")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp.into_body()).await;
    assert_eq!(body["status"], "completed");

    let resp = app.oneshot(get("/api/v1/matches/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp.into_body()).await;
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn stream_for_match_without_source_is_unprocessable() {
    let app = app();
    let resp = app.clone().oneshot(get("/api/v1/matches/mock-1/stream")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app.oneshot(get("/api/v1/matches/nope/stream")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stream_resolves_live_feed() {
    let (app, server) = live_app().await;
    let resp = app.oneshot(get("/api/v1/matches/m1/stream")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp.into_body()).await;
    assert_eq!(body["url"], format!("{}/live.m3u8", server.uri()));
    assert_eq!(body["kind"], "provided");
    assert_eq!(body["verified"], true);
}

#[tokio::test]
async fn session_lifecycle() {
    let (app, _server) = live_app().await;

    let id = create_session(&app, "m1").await;
    let body = settled_session(&app, &id, 1).await;
    assert_eq!(body["state"], "playing");
    assert_eq!(body["mode"], "hls");

    let resp = app.clone().oneshot(get("/api/v1/sessions")).await.unwrap();
    let body = body_json(resp.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let resp = app
        .clone()
        .oneshot(json_request("POST", &format!("/api/v1/sessions/{id}/retry"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body = settled_session(&app, &id, 2).await;
    assert_eq!(body["state"], "playing");
    assert_eq!(body["runs"], 2);

    let resp = app
        .clone()
        .oneshot(get(&format!("/api/v1/sessions/{id}/events")))
        .await
        .unwrap();
    let body = body_json(resp.into_body()).await;
    let events = body["events"].as_array().unwrap();
    assert_eq!(events[0]["kind"], "attached");
    assert!(events.iter().any(|e| e["kind"] == "retry_requested"));

    let resp = app
        .clone()
        .oneshot(json_request("DELETE", &format!("/api/v1/sessions/{id}"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(get(&format!("/api/v1/sessions/{id}"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dead_stream_session_is_unavailable() {
    let (app, _server) = live_app().await;
    let id = create_session(&app, "m2").await;
    let body = settled_session(&app, &id, 1).await;
    assert_eq!(body["state"], "unavailable");
    assert!(body["last_error"].is_string());
}

#[tokio::test]
async fn create_session_rejects_bad_input() {
    let app = app();
    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/sessions", Some(json!({ "match_id": " " }))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/sessions", Some(json!({ "match_id": "nope" }))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .oneshot(json_request("POST", "/api/v1/sessions", Some(json!({ "match_id": "mock-2" }))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn session_routes_validate_ids() {
    let app = app();
    let resp = app.clone().oneshot(get("/api/v1/sessions/not-a-uuid")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .oneshot(get("/api/v1/sessions/00000000-0000-0000-0000-000000000000/events"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
