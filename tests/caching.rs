//! Response caching through a live gateway.

mod common;

use std::time::Duration;

use api_gateway::config::RouteConfig;
use common::{Gateway, MockBackend, Reply};

async fn cached_gateway(backend: &MockBackend, ttl_secs: u64) -> Gateway {
    Gateway::start(common::config(vec![
        RouteConfig::new("products", "/api/products", backend.url()).with_cache_ttl(ttl_secs),
        RouteConfig::new("orders", "/api/orders", backend.url()),
    ]))
    .await
}

#[tokio::test]
async fn test_hit_skips_backend() {
    let backend = MockBackend::fixed(r#"[{"id":1,"name":"lamp"}]"#).await;
    let gateway = cached_gateway(&backend, 600).await;

    let first = gateway.get("/api/products").await;
    assert_eq!(first.status(), 200);
    assert_eq!(first.headers()["x-cache"], "MISS");
    let first_body = first.text().await.unwrap();

    let second = gateway.get("/api/products").await;
    assert_eq!(second.status(), 200);
    assert_eq!(second.headers()["x-cache"], "HIT");
    assert!(second.headers().contains_key("age"));
    assert_eq!(second.text().await.unwrap(), first_body);

    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_query_order_shares_entry() {
    let backend = MockBackend::fixed("[]").await;
    let gateway = cached_gateway(&backend, 600).await;

    gateway.get("/api/products?page=2&sort=name").await;
    let res = gateway.get("/api/products?sort=name&page=2").await;
    assert_eq!(res.headers()["x-cache"], "HIT");

    let res = gateway.get("/api/products?page=3&sort=name").await;
    assert_eq!(res.headers()["x-cache"], "MISS");
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let backend = MockBackend::fixed("[]").await;
    let gateway = cached_gateway(&backend, 1).await;

    gateway.get("/api/products/1").await;
    gateway.get("/api/products/1").await;
    assert_eq!(backend.calls(), 1);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    let res = gateway.get("/api/products/1").await;
    assert_eq!(res.headers()["x-cache"], "MISS");
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_non_get_and_uncached_routes_always_reach_backend() {
    let backend = MockBackend::fixed("{}").await;
    let gateway = cached_gateway(&backend, 600).await;

    for _ in 0..2 {
        let res = gateway
            .client
            .post(gateway.url("/api/products"))
            .body("{}")
            .send()
            .await
            .unwrap();
        assert!(!res.headers().contains_key("x-cache"));
    }
    for _ in 0..2 {
        gateway.get("/api/orders/5").await;
    }
    assert_eq!(backend.calls(), 4);
}

#[tokio::test]
async fn test_error_responses_are_not_cached() {
    let backend = MockBackend::start(|_| Reply::status(500, r#"{"error":"boom"}"#)).await;
    let gateway = cached_gateway(&backend, 600).await;

    for _ in 0..2 {
        let res = gateway.get("/api/products").await;
        assert_eq!(res.status(), 500);
        assert_eq!(res.headers()["x-cache"], "MISS");
    }
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_no_cache_request_refreshes_entry() {
    let backend = MockBackend::fixed("[]").await;
    let gateway = cached_gateway(&backend, 600).await;

    gateway.get("/api/products").await;
    let res = gateway
        .client
        .get(gateway.url("/api/products"))
        .header("cache-control", "no-cache")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-cache"], "MISS");
    assert_eq!(backend.calls(), 2);

    let res = gateway.get("/api/products").await;
    assert_eq!(res.headers()["x-cache"], "HIT");
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_chunked_response_streams_uncached() {
    let backend = MockBackend::start(|_| Reply::ok(r#"[{"id":1}]"#).chunked()).await;
    let gateway = cached_gateway(&backend, 600).await;

    for _ in 0..2 {
        let res = gateway.get("/api/products").await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["x-cache"], "MISS");
        assert_eq!(res.text().await.unwrap(), r#"[{"id":1}]"#);
    }
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_oversized_response_streams_uncached() {
    let large = format!("[{}]", "1,".repeat(64) + "1");
    let body = large.clone();
    let backend = MockBackend::start(move |_| Reply::ok(body.clone())).await;
    let mut config = common::config(vec![
        RouteConfig::new("products", "/api/products", backend.url()).with_cache_ttl(600),
    ]);
    config.cache.max_body_bytes = 32;
    let gateway = Gateway::start(config).await;

    for _ in 0..2 {
        let res = gateway.get("/api/products").await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["x-cache"], "MISS");
        assert_eq!(res.text().await.unwrap(), large);
    }
    assert_eq!(backend.calls(), 2);
}
