//! Operation dispatcher (C6), paged cursor engine (C7) and event stream
//! multiplexer (C8) for the remote cache access proxy, plus the tonic
//! service that wires them to the wire schema (`cacheproxy-wire`).

pub mod cursor;
pub mod dispatch;
pub mod events;
pub mod service;
pub mod state;
pub mod tracing_setup;

pub use service::CacheProxyService;
pub use state::AppState;
