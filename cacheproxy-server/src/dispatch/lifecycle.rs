//! Cache-level lifecycle operations (spec §4.6): `clear`/`truncate`/
//! `destroy`, and the unary status predicates `isEmpty`/`isReady`/`size`.
//! `destroy` invalidates the cache handle process-wide; the backend fires
//! the corresponding lifecycle event to every listener (spec §4.8).

use cacheproxy_core::ProxyError;
use cacheproxy_wire::proto;

use crate::state::AppState;

pub async fn clear(state: &AppState, req: proto::CacheRequest) -> Result<(), ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    holder.cache().clear()
}

pub async fn truncate(state: &AppState, req: proto::CacheRequest) -> Result<(), ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    holder.cache().truncate()
}

pub async fn destroy(state: &AppState, req: proto::CacheRequest) -> Result<(), ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    holder.cache().destroy()
}

pub async fn is_empty(state: &AppState, req: proto::CacheRequest) -> Result<proto::BoolResponse, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    Ok(proto::BoolResponse { value: holder.cache().is_empty()? })
}

pub async fn is_ready(state: &AppState, req: proto::CacheRequest) -> Result<proto::BoolResponse, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    Ok(proto::BoolResponse { value: holder.cache().is_ready()? })
}

pub async fn size(state: &AppState, req: proto::CacheRequest) -> Result<proto::SizeResponse, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    Ok(proto::SizeResponse { value: holder.cache().size()? })
}
