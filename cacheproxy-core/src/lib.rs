//! Serializer registry, request holder, cache resolver, executor pool and
//! backend contract (C2–C5, §6) for the remote cache access proxy. The
//! transport-facing dispatcher, cursor engine and event multiplexer (C6–C8)
//! live in `cacheproxy-server`; this crate has no dependency on a tonic
//! transport stack so `cacheproxy-client` can share the error/config types
//! without pulling one in.

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod executor;
pub mod holder;
pub mod resolver;

pub use backend::{
    Aggregator, CacheEvent, EntryProcessor, EntryResult, Filter, ListenerId, ListenerSpec,
    MemberId, PartitionedCache, RegistrationKey, UserProcessor,
};
pub use codec::{Codec, CodecRegistry, JsonCodec, RawCodec, Value};
pub use config::ProxyConfig;
pub use error::ProxyError;
pub use executor::ExecutorPool;
pub use holder::RequestHolder;
pub use resolver::CacheResolver;
