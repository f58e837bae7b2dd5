//! Point and bulk key/value operations (spec §4.6): `get`/`getAll`,
//! `put`/`putIfAbsent`/`putAll`, `replace`/`replaceMapping`,
//! `remove`/`removeMapping`, `containsEntry`/`containsValue`. Every point
//! mutation funnels through [`EntryProcessor`] rather than a raw backend
//! call, per spec.md §9's entry-processor polymorphism note.

use std::time::Duration;

use cacheproxy_core::{EntryProcessor, ProxyError};
use cacheproxy_wire::proto;

use crate::state::AppState;

fn optional_ttl(ttl_millis: i64) -> Option<Duration> {
    if ttl_millis <= 0 {
        None
    } else {
        Some(Duration::from_millis(ttl_millis as u64))
    }
}

fn to_optional_value(value: Option<bytes::Bytes>) -> proto::OptionalValue {
    match value {
        Some(value) => proto::OptionalValue { present: true, value },
        None => proto::OptionalValue { present: false, value: bytes::Bytes::new() },
    }
}

pub async fn get(state: &AppState, req: proto::GetRequest) -> Result<proto::OptionalValue, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let key = holder.convert_down(&req.key)?;
    let cache = holder.cache().clone();
    let result = state
        .executor
        .spawn(async move { cache.invoke_entry(key, EntryProcessor::Get).await })
        .await??;
    let value = holder.convert_up_optional(result.into_optional())?;
    Ok(to_optional_value(value))
}

pub async fn get_all(
    state: &AppState,
    req: proto::GetAllRequest,
) -> Result<Vec<proto::Entry>, ProxyError> {
    if req.keys.is_empty() {
        return Ok(Vec::new());
    }
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let mut entries = Vec::with_capacity(req.keys.len());
    for key in req.keys {
        let backend_key = holder.convert_down(&key)?;
        let cache = holder.cache().clone();
        let result = state
            .executor
            .spawn(async move { cache.invoke_entry(backend_key, EntryProcessor::Get).await })
            .await??;
        if let Some(value) = result.into_optional() {
            let value = holder.convert_up(&value)?;
            entries.push(proto::Entry { key, value });
        }
    }
    Ok(entries)
}

pub async fn put(state: &AppState, req: proto::PutRequest) -> Result<proto::OptionalValue, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let key = holder.convert_down(&req.key)?;
    let value = holder.convert_down(&req.value)?;
    let ttl = optional_ttl(req.ttl_millis);
    let cache = holder.cache().clone();
    let prior = state
        .executor
        .spawn(async move { cache.invoke_entry(key, EntryProcessor::Put { value, ttl }).await })
        .await??;
    let prior = holder.convert_up_optional(prior.into_optional())?;
    Ok(to_optional_value(prior))
}

pub async fn put_if_absent(
    state: &AppState,
    req: proto::PutRequest,
) -> Result<proto::OptionalValue, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let key = holder.convert_down(&req.key)?;
    let value = holder.convert_down(&req.value)?;
    let ttl = optional_ttl(req.ttl_millis);
    let cache = holder.cache().clone();
    let prior = state
        .executor
        .spawn(async move { cache.invoke_entry(key, EntryProcessor::PutIfAbsent { value, ttl }).await })
        .await??;
    let prior = holder.convert_up_optional(prior.into_optional())?;
    Ok(to_optional_value(prior))
}

pub async fn put_all(
    state: &AppState,
    req: proto::PutAllRequest,
) -> Result<proto::PutAllResponse, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let mut entries = Vec::with_capacity(req.entries.len());
    for entry in req.entries {
        entries.push((holder.convert_down(&entry.key)?, holder.convert_down(&entry.value)?));
    }
    let cache = holder.cache().clone();
    let shards_written = state
        .executor
        .spawn(async move { cache.put_all_partitioned(entries).await })
        .await??;
    Ok(proto::PutAllResponse { shards_written })
}

pub async fn replace(
    state: &AppState,
    req: proto::ReplaceRequest,
) -> Result<proto::OptionalValue, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let key = holder.convert_down(&req.key)?;
    let value = holder.convert_down(&req.value)?;
    let cache = holder.cache().clone();
    let prior = state
        .executor
        .spawn(async move { cache.invoke_entry(key, EntryProcessor::Replace { value }).await })
        .await??;
    let prior = holder.convert_up_optional(prior.into_optional())?;
    Ok(to_optional_value(prior))
}

pub async fn replace_mapping(
    state: &AppState,
    req: proto::ReplaceMappingRequest,
) -> Result<proto::BoolResponse, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let key = holder.convert_down(&req.key)?;
    let expect = holder.convert_down(&req.previous_value)?;
    let new = holder.convert_down(&req.new_value)?;
    let cache = holder.cache().clone();
    let replaced = state
        .executor
        .spawn(async move { cache.invoke_entry(key, EntryProcessor::ReplaceMapping { expect, new }).await })
        .await??;
    Ok(proto::BoolResponse { value: replaced.into_bool() })
}

pub async fn remove(state: &AppState, req: proto::KeyRequest) -> Result<proto::OptionalValue, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let key = holder.convert_down(&req.key)?;
    let cache = holder.cache().clone();
    let prior = state
        .executor
        .spawn(async move { cache.invoke_entry(key, EntryProcessor::Remove).await })
        .await??;
    let prior = holder.convert_up_optional(prior.into_optional())?;
    Ok(to_optional_value(prior))
}

pub async fn remove_mapping(
    state: &AppState,
    req: proto::RemoveMappingRequest,
) -> Result<proto::BoolResponse, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let key = holder.convert_down(&req.key)?;
    let expect = holder.convert_down(&req.value)?;
    let cache = holder.cache().clone();
    let removed = state
        .executor
        .spawn(async move { cache.invoke_entry(key, EntryProcessor::RemoveMapping { expect }).await })
        .await??;
    Ok(proto::BoolResponse { value: removed.into_bool() })
}

/// `containsEntry` is a binary-level entry-processor invocation on a single
/// key (spec §4.6), not a separate RPC path, to preserve partition locality
/// and visibility under concurrent mutation.
pub async fn contains_entry(
    state: &AppState,
    req: proto::ContainsEntryRequest,
) -> Result<proto::BoolResponse, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let key = holder.convert_down(&req.key)?;
    let expect = holder.convert_down(&req.value)?;
    let cache = holder.cache().clone();
    let result = state
        .executor
        .spawn(async move { cache.invoke_entry(key, EntryProcessor::ContainsValue { expect }).await })
        .await??;
    Ok(proto::BoolResponse { value: result.into_bool() })
}
