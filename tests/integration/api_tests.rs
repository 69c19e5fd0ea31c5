//! API integration tests for tile retrieval and error handling.
//!
//! Tests verify:
//! - Tile retrieval from upstream, store and memory
//! - Error cases (upstream failure, malformed and out-of-grid paths)
//! - HTTP response codes and headers, including CORS

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use tile_proxy::tile::TileCoord;

use super::test_utils::{test_app, MockTileSource, PNG_BYTES};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// =============================================================================
// Tile Retrieval
// =============================================================================

#[tokio::test]
async fn test_tile_miss_fetches_and_persists() {
    let app = test_app(MockTileSource::new().with_tile(TileCoord::new(3, 2, 5), b"tile-3-2-5")).await;

    let response = app.router.oneshot(get("/tiles/3/2/5")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=31536000"
    );
    assert_eq!(response.headers().get("x-tile-cache-hit").unwrap(), "miss");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"tile-3-2-5");

    assert_eq!(
        app.store.get_tile(3, 2, 5).await.unwrap(),
        Some(b"tile-3-2-5".to_vec())
    );
    assert_eq!(app.source.requests().await, vec![TileCoord::new(3, 2, 5)]);
}

#[tokio::test]
async fn test_stored_tile_served_without_upstream() {
    let app = test_app(MockTileSource::failing(503, "Service Unavailable")).await;
    app.store.save_tile(4, 1, 2, b"from-disk").await;

    let response = app.router.oneshot(get("/tiles/4/1/2")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-tile-cache-hit").unwrap(), "store");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"from-disk");
    assert_eq!(app.source.request_count(), 0);
}

#[tokio::test]
async fn test_repeated_request_served_from_memory() {
    let app = test_app(MockTileSource::new()).await;

    let first = app.router.clone().oneshot(get("/tiles/2/1/1")).await.unwrap();
    assert_eq!(first.headers().get("x-tile-cache-hit").unwrap(), "miss");

    let second = app.router.clone().oneshot(get("/tiles/2/1/1")).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers().get("x-tile-cache-hit").unwrap(), "memory");

    let body = second.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], PNG_BYTES);
    assert_eq!(app.source.request_count(), 1);
}

// =============================================================================
// Error Handling
// =============================================================================

#[tokio::test]
async fn test_upstream_failure_returns_500_with_reason() {
    let app = test_app(MockTileSource::failing(503, "Service Unavailable")).await;

    let response = app.router.oneshot(get("/tiles/5/3/3")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("503"), "body was: {}", text);
    assert!(text.contains("Service Unavailable"), "body was: {}", text);

    // Failures are not persisted
    assert!(!app.store.has_tile(5, 3, 3).await.unwrap());
    assert_eq!(app.source.request_count(), 1);
}

#[tokio::test]
async fn test_non_numeric_path_is_404() {
    let app = test_app(MockTileSource::new()).await;

    for uri in ["/tiles/a/0/0", "/tiles/1/x/0", "/tiles/1/0/0.png", "/tiles/1/-1/0"] {
        let response = app.router.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri: {}", uri);
    }
    assert_eq!(app.source.request_count(), 0);
}

#[tokio::test]
async fn test_out_of_grid_tile_is_404() {
    let app = test_app(MockTileSource::new()).await;

    for uri in ["/tiles/1/2/0", "/tiles/3/0/8", "/tiles/23/0/0"] {
        let response = app.router.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri: {}", uri);
    }
    assert_eq!(app.source.request_count(), 0);
}

#[tokio::test]
async fn test_unknown_paths_are_404_with_cors() {
    let app = test_app(MockTileSource::new()).await;

    for uri in ["/", "/tiles", "/tiles/1/0", "/tiles/1/0/0/extra", "/nope"] {
        let response = app.router.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri: {}", uri);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*",
            "uri: {}",
            uri
        );
    }
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn test_tile_response_allows_any_origin() {
    let app = test_app(MockTileSource::new()).await;

    let request = Request::builder()
        .uri("/tiles/0/0/0")
        .header(header::ORIGIN, "https://map.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_preflight_returns_no_content() {
    let app = test_app(MockTileSource::new()).await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/tiles/1/0/0")
        .header(header::ORIGIN, "https://map.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    assert!(headers
        .get(header::ACCESS_CONTROL_ALLOW_METHODS)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("GET"));
    assert!(headers
        .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
        .unwrap()
        .to_str()
        .unwrap()
        .eq_ignore_ascii_case("content-type"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());
    assert_eq!(app.source.request_count(), 0);
}

#[tokio::test]
async fn test_options_on_any_path_is_no_content() {
    let app = test_app(MockTileSource::new()).await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/anything/at/all")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app(MockTileSource::new()).await;

    let response = app.router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
