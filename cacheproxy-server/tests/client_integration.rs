//! End-to-end tests driving the real `cacheproxy-client` against a real
//! `CacheProxyService` over a loopback TCP socket — the closest thing to
//! the literal scenarios of spec.md §8 this workspace can exercise without
//! an external test harness, in the style of `r2e-grpc/tests/identity.rs`.

use std::collections::HashSet;

use bytes::Bytes;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;

use cacheproxy_client::{CacheProxy, ClientError};
use cacheproxy_core::ProxyConfig;
use cacheproxy_server::{AppState, CacheProxyService};
use cacheproxy_wire::proto::cache_service_server::CacheServiceServer;

async fn spawn_server() -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(ProxyConfig::default()).unwrap();
    let service = CacheProxyService::new(state);
    let handle = tokio::spawn(async move {
        let _ = tonic::transport::Server::builder()
            .add_service(CacheServiceServer::new(service))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await;
    });
    (format!("http://{addr}"), handle)
}

async fn connect(url: &str) -> tonic::transport::Channel {
    tonic::transport::Endpoint::from_shared(url.to_string()).unwrap().connect().await.unwrap()
}

#[tokio::test]
async fn put_then_get_round_trips_the_value() {
    let (url, _server) = spawn_server().await;
    let channel = connect(&url).await;
    let proxy = CacheProxy::new(channel, "", "raw", &ProxyConfig::default());
    let cache = proxy.ensure_cache("people").await.unwrap();

    let previous = cache.put(Bytes::from_static(b"k1"), Bytes::from_static(b"v1"), 0).await.unwrap();
    assert!(previous.is_none());

    let value = cache.get(Bytes::from_static(b"k1")).await.unwrap();
    assert_eq!(value, Some(Bytes::from_static(b"v1")));
}

#[tokio::test]
async fn cross_format_get_bridges_json_and_raw() {
    // testable property 1: a put via one registered format followed by a
    // get via another yields the same logical value.
    let (url, _server) = spawn_server().await;
    let channel = connect(&url).await;

    let json_proxy = CacheProxy::new(channel.clone(), "", "json", &ProxyConfig::default());
    let json_cache = json_proxy.ensure_cache("people").await.unwrap();
    json_cache.put(Bytes::from_static(b"k1"), Bytes::from_static(br#"{"id":1}"#), 0).await.unwrap();

    let raw_proxy = CacheProxy::new(channel, "", "raw", &ProxyConfig::default());
    let raw_cache = raw_proxy.ensure_cache("people").await.unwrap();
    let stored = raw_cache.get(Bytes::from_static(b"k1")).await.unwrap().unwrap();

    let value: serde_json::Value = serde_json::from_slice(&stored).unwrap();
    assert_eq!(value, serde_json::json!({"id": 1}));
}

#[tokio::test]
async fn destroy_propagates_failed_precondition_to_other_clients() {
    // testable scenario: destroy propagation.
    let (url, _server) = spawn_server().await;
    let channel = connect(&url).await;

    let proxy_a = CacheProxy::new(channel.clone(), "", "raw", &ProxyConfig::default());
    let cache_a = proxy_a.ensure_cache("orders").await.unwrap();
    cache_a.put(Bytes::from_static(b"k"), Bytes::from_static(b"v"), 0).await.unwrap();

    let proxy_b = CacheProxy::new(channel, "", "raw", &ProxyConfig::default());
    let cache_b = proxy_b.ensure_cache("orders").await.unwrap();

    proxy_a.destroy("orders").await.unwrap();

    let err = cache_b.get(Bytes::from_static(b"k")).await.unwrap_err();
    match err {
        ClientError::Status(code, _) => assert_eq!(code, tonic::Code::FailedPrecondition),
        other => panic!("expected a FailedPrecondition status, got {other:?}"),
    }
}

#[tokio::test]
async fn partitioned_put_all_reports_a_shard_count_and_every_entry_lands() {
    let (url, _server) = spawn_server().await;
    let channel = connect(&url).await;
    let proxy = CacheProxy::new(channel, "", "raw", &ProxyConfig::default());
    let cache = proxy.ensure_cache("bulk").await.unwrap();

    let entries: Vec<_> =
        (0..20u32).map(|i| (Bytes::from(i.to_be_bytes().to_vec()), Bytes::from(i.to_le_bytes().to_vec()))).collect();
    let shards = cache.put_all(entries, 0).await.unwrap();
    assert!(shards >= 1);

    let size = cache.size().await.unwrap();
    assert_eq!(size, 20);
}

#[tokio::test]
async fn paged_key_set_visits_every_key_exactly_once() {
    let (url, _server) = spawn_server().await;
    let channel = connect(&url).await;
    let proxy = CacheProxy::new(channel, "", "raw", &ProxyConfig::default());
    let cache = proxy.ensure_cache("paged").await.unwrap();

    for i in 0..50u32 {
        cache.put(Bytes::from(i.to_be_bytes().to_vec()), Bytes::from_static(b"v"), 0).await.unwrap();
    }

    let keys = cache.drain_key_pages().await.unwrap();
    let unique: HashSet<_> = keys.iter().cloned().collect();
    assert_eq!(unique.len(), keys.len());
    assert_eq!(unique.len(), 50);
}

#[tokio::test]
async fn release_then_ensure_cache_again_builds_a_fresh_active_handle() {
    let (url, _server) = spawn_server().await;
    let channel = connect(&url).await;
    let proxy = CacheProxy::new(channel, "", "raw", &ProxyConfig::default());

    let first = proxy.ensure_cache("sessions").await.unwrap();
    first.put(Bytes::from_static(b"k"), Bytes::from_static(b"v"), 0).await.unwrap();
    proxy.release("sessions");
    assert!(!first.is_active());

    let second = proxy.ensure_cache("sessions").await.unwrap();
    assert!(second.is_active());
    // release doesn't clear the backend, only the local handle store.
    assert_eq!(second.get(Bytes::from_static(b"k")).await.unwrap(), Some(Bytes::from_static(b"v")));
}
