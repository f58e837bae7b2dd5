//! Client cache proxy (C9): implements the embedded cache contract by
//! delegating every operation to the wire schema (`cacheproxy-wire`),
//! maintaining a scoped store of active handles and reacting to remote
//! truncate/destroy notifications on the shared event stream.

pub mod channel;
pub mod error;
pub mod handle;
pub mod listener;
pub mod proxy;

pub use error::ClientError;
pub use handle::{KeyValue, NamedCacheHandle};
pub use listener::{LifecycleEvent, LifecycleListener};
pub use proxy::CacheProxy;
