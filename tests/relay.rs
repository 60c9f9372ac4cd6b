use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Body,
    response::IntoResponse,
    Router,
};
use bytes::Bytes;
use cdn_relay::{
    assets::PreloadedAsset,
    helper::CDN_CACHE_CONTROL,
    relay_router,
    route::{ProxyRoute, RouteTable},
    RelayConfig, RelayState,
};
use http::{
    header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION},
    HeaderMap, Method, Request, Response, StatusCode, Uri,
};
use tower::ServiceExt;

const MAX_AGE: u64 = 600;

/// Echoes what it received, with cache headers the relay must replace.
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> impl IntoResponse {
    let host = headers
        .get("host")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let custom = headers
        .get("x-custom")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    (
        [
            (CACHE_CONTROL, "no-store"),
            (CONTENT_TYPE, "text/plain"),
        ],
        format!("{method} {uri} host={host} custom={custom} body={body}"),
    )
}

async fn spawn_upstream() -> SocketAddr {
    let app = Router::new().fallback(echo);

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(app.into_make_service());
    tokio::spawn(server);

    addr
}

fn relay(routes: Vec<ProxyRoute>, homepage: PreloadedAsset, favicon: PreloadedAsset) -> Router {
    let mut config = RelayConfig::with_routes(RouteTable::new(routes)).unwrap();
    config.cache = cdn_relay::helper::CachePolicy::new(MAX_AGE).unwrap();

    // Keep loopback traffic away from any proxy configured in the environment.
    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    relay_router(Arc::new(
        RelayState::with_assets(config, homepage, favicon).with_client(client),
    ))
}

/// Routes pointing at a port nothing listens on.
fn unreachable_relay() -> Router {
    relay(
        vec![
            ProxyRoute::new("/image/", "http://127.0.0.1:1/image/", None).unwrap(),
            ProxyRoute::new(
                "/image/raw/",
                "http://127.0.0.1:1/raw/",
                Some("https://origin.example/{path}".to_owned()),
            )
            .unwrap(),
        ],
        PreloadedAsset::missing(),
        PreloadedAsset::missing(),
    )
}

async fn send(app: Router, request: Request<Body>) -> Response<axum::body::BoxBody> {
    app.oneshot(request).await.unwrap()
}

async fn body_text(response: Response<axum::body::BoxBody>) -> String {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn serves_preloaded_assets() {
    let app = relay(
        Vec::new(),
        PreloadedAsset::from(Bytes::from_static(b"<h1>relay</h1>")),
        PreloadedAsset::from(Bytes::from_static(b"\x00\x00\x01\x00")),
    );

    let response = send(app.clone(), get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(response.headers()[CACHE_CONTROL], "public, max-age=600");
    assert_eq!(response.headers()[CDN_CACHE_CONTROL], "max-age=600");
    assert_eq!(body_text(response).await, "<h1>relay</h1>");

    let response = send(app, get("/favicon.ico")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/x-icon");
}

#[tokio::test]
async fn missing_assets() {
    let app = unreachable_relay();

    assert_eq!(
        send(app.clone(), get("/favicon.ico")).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        send(app, get("/")).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn unmatched_path_is_not_found() {
    let response = send(unreachable_relay(), get("/does/not/exist")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn raw_mode_redirects_without_upstream() {
    let app = unreachable_relay();

    let response = send(app.clone(), get("/image/raw/foo.png?raw=true&w=100")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[LOCATION],
        "https://origin.example/foo.png?w=100"
    );
    assert_eq!(
        response.headers()[CACHE_CONTROL],
        "no-cache, no-store, must-revalidate"
    );

    let response = send(app, get("/image//a|b.png?raw=true")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[LOCATION],
        "http://127.0.0.1:1/image/ab.png"
    );
}

#[tokio::test]
async fn upstream_failure_is_bad_gateway() {
    let response = send(unreachable_relay(), get("/image/foo.png")).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(response.headers()[CACHE_CONTROL], "public, max-age=600");
    assert_eq!(body_text(response).await, "Bad Gateway");
}

#[tokio::test]
async fn proxies_to_upstream() {
    let addr = spawn_upstream().await;
    let app = relay(
        vec![
            ProxyRoute::new("/cdn/", &format!("http://{addr}/assets/"), None).unwrap(),
            ProxyRoute::new("/cdn/deep/", &format!("http://{addr}/deep/"), None).unwrap(),
        ],
        PreloadedAsset::missing(),
        PreloadedAsset::missing(),
    );

    let request = Request::builder()
        .method(Method::POST)
        .uri("/cdn//img|/cat.png?w=100&raw=false")
        .header("host", "relay.example")
        .header("x-custom", "kept")
        .body(Body::from("payload"))
        .unwrap();

    let response = send(app.clone(), request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CACHE_CONTROL], "public, max-age=600");
    assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(
        body_text(response).await,
        format!("POST /assets/img/cat.png?w=100&raw=false host={addr} custom=kept body=payload")
    );

    let response = send(app, get("/cdn/deep/x.png")).await;
    assert!(body_text(response)
        .await
        .starts_with("GET /deep/x.png host="));
}
