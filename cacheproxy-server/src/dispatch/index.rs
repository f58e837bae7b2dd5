//! Index maintenance (spec §4.6): `addIndex`/`removeIndex`. The reference
//! backend keeps no secondary index structures — these calls are bookkeeping
//! only, validating the cache is alive and the extractor bytes are present,
//! exactly as a production backend's index calls would still validate before
//! doing the (here absent) acceleration work.

use cacheproxy_core::ProxyError;
use cacheproxy_wire::proto;

use crate::state::AppState;

pub async fn add_index(state: &AppState, req: proto::IndexRequest) -> Result<(), ProxyError> {
    if req.extractor.is_empty() {
        return Err(ProxyError::invalid_argument("extractor bytes must not be empty"));
    }
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    holder.cache().add_index()
}

pub async fn remove_index(state: &AppState, req: proto::IndexRequest) -> Result<(), ProxyError> {
    if req.extractor.is_empty() {
        return Err(ProxyError::invalid_argument("extractor bytes must not be empty"));
    }
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    holder.cache().remove_index()
}
