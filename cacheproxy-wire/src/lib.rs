//! Generated wire schema (C1) for the remote cache access proxy.
//!
//! Message shapes mirror spec.md §4.1: every request carries `scope`/`cache`/
//! `format` plus raw-byte payload fields. Nothing here interprets those
//! bytes — that happens in `cacheproxy-core`/`cacheproxy-server`.

pub mod proto {
    tonic::include_proto!("cacheproxy");
}

pub use proto::cache_service_client;
pub use proto::cache_service_server;
pub use proto::*;

// Re-exported so downstream crates pin the same tonic/prost versions the
// generated code was built against.
pub use prost;
pub use tonic;
