//! Binary entrypoint: reads `ProxyConfig` from the environment, builds the
//! shared `AppState`, and serves `CacheService` on a plain `tonic::transport`
//! server. Transport setup (listeners, TLS, HTTP/2 plumbing) beyond this is
//! an explicit out-of-scope collaborator (spec.md §1) — no DI framework, no
//! plugin registry, just `Server::builder()`.

use std::net::SocketAddr;

use cacheproxy_core::ProxyConfig;
use cacheproxy_server::{AppState, CacheProxyService};
use cacheproxy_wire::proto::cache_service_server::CacheServiceServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    cacheproxy_server::tracing_setup::init_tracing();

    let config = ProxyConfig::from_env();
    let addr: SocketAddr = std::env::var("CACHEPROXY_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:50061".to_string())
        .parse()?;

    tracing::info!(%addr, worker_threads = config.worker_threads, "starting cache proxy");

    let state = AppState::new(config)?;
    let service = CacheProxyService::new(state);

    tonic::transport::Server::builder()
        .add_service(CacheServiceServer::new(service))
        .serve(addr)
        .await?;

    Ok(())
}
