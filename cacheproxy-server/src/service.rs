//! The tonic service implementation: every RPC validates its required
//! payload fields, delegates to a [`crate::dispatch`] handler, and maps
//! `ProxyError` onto a `tonic::Status` at the single boundary point (spec
//! §7). Streaming RPCs collect the dispatcher's `Vec<T>` into a
//! `tokio_stream::iter` — the backend is fully in-memory and produces
//! results fast enough that incremental callback-driven emission buys
//! nothing here; a backend with real per-entry latency would stream directly
//! from its callback instead.

use std::pin::Pin;
use std::sync::Arc;

use futures_core::Stream;
use tonic::{Request, Response, Status};

use cacheproxy_wire::proto;
use cacheproxy_wire::proto::cache_service_server::CacheService;

use crate::dispatch::{aggregate, get_put, index, lifecycle, query};
use crate::events;
use crate::state::AppState;

pub struct CacheProxyService {
    state: Arc<AppState>,
}

impl CacheProxyService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send + 'static>>;

fn stream_of<T: Send + 'static>(items: Vec<T>) -> ResponseStream<T> {
    Box::pin(tokio_stream::iter(items.into_iter().map(Ok)))
}

#[tonic::async_trait]
impl CacheService for CacheProxyService {
    async fn get(&self, request: Request<proto::GetRequest>) -> Result<Response<proto::OptionalValue>, Status> {
        Ok(Response::new(get_put::get(&self.state, request.into_inner()).await?))
    }

    type GetAllStream = ResponseStream<proto::Entry>;

    async fn get_all(&self, request: Request<proto::GetAllRequest>) -> Result<Response<Self::GetAllStream>, Status> {
        let entries = get_put::get_all(&self.state, request.into_inner()).await?;
        Ok(Response::new(stream_of(entries)))
    }

    async fn put(&self, request: Request<proto::PutRequest>) -> Result<Response<proto::OptionalValue>, Status> {
        Ok(Response::new(get_put::put(&self.state, request.into_inner()).await?))
    }

    async fn put_if_absent(
        &self,
        request: Request<proto::PutRequest>,
    ) -> Result<Response<proto::OptionalValue>, Status> {
        Ok(Response::new(get_put::put_if_absent(&self.state, request.into_inner()).await?))
    }

    async fn put_all(
        &self,
        request: Request<proto::PutAllRequest>,
    ) -> Result<Response<proto::PutAllResponse>, Status> {
        Ok(Response::new(get_put::put_all(&self.state, request.into_inner()).await?))
    }

    async fn replace(&self, request: Request<proto::ReplaceRequest>) -> Result<Response<proto::OptionalValue>, Status> {
        Ok(Response::new(get_put::replace(&self.state, request.into_inner()).await?))
    }

    async fn replace_mapping(
        &self,
        request: Request<proto::ReplaceMappingRequest>,
    ) -> Result<Response<proto::BoolResponse>, Status> {
        Ok(Response::new(get_put::replace_mapping(&self.state, request.into_inner()).await?))
    }

    async fn remove(&self, request: Request<proto::KeyRequest>) -> Result<Response<proto::OptionalValue>, Status> {
        Ok(Response::new(get_put::remove(&self.state, request.into_inner()).await?))
    }

    async fn remove_mapping(
        &self,
        request: Request<proto::RemoveMappingRequest>,
    ) -> Result<Response<proto::BoolResponse>, Status> {
        Ok(Response::new(get_put::remove_mapping(&self.state, request.into_inner()).await?))
    }

    async fn contains_entry(
        &self,
        request: Request<proto::ContainsEntryRequest>,
    ) -> Result<Response<proto::BoolResponse>, Status> {
        Ok(Response::new(get_put::contains_entry(&self.state, request.into_inner()).await?))
    }

    async fn contains_value(
        &self,
        request: Request<proto::ContainsValueRequest>,
    ) -> Result<Response<proto::BoolResponse>, Status> {
        Ok(Response::new(aggregate::contains_value(&self.state, request.into_inner()).await?))
    }

    async fn clear(&self, request: Request<proto::CacheRequest>) -> Result<Response<proto::Empty>, Status> {
        lifecycle::clear(&self.state, request.into_inner()).await?;
        Ok(Response::new(proto::Empty {}))
    }

    async fn truncate(&self, request: Request<proto::CacheRequest>) -> Result<Response<proto::Empty>, Status> {
        lifecycle::truncate(&self.state, request.into_inner()).await?;
        Ok(Response::new(proto::Empty {}))
    }

    async fn destroy(&self, request: Request<proto::CacheRequest>) -> Result<Response<proto::Empty>, Status> {
        lifecycle::destroy(&self.state, request.into_inner()).await?;
        Ok(Response::new(proto::Empty {}))
    }

    async fn is_empty(&self, request: Request<proto::CacheRequest>) -> Result<Response<proto::BoolResponse>, Status> {
        Ok(Response::new(lifecycle::is_empty(&self.state, request.into_inner()).await?))
    }

    async fn is_ready(&self, request: Request<proto::CacheRequest>) -> Result<Response<proto::BoolResponse>, Status> {
        Ok(Response::new(lifecycle::is_ready(&self.state, request.into_inner()).await?))
    }

    async fn size(&self, request: Request<proto::CacheRequest>) -> Result<Response<proto::SizeResponse>, Status> {
        Ok(Response::new(lifecycle::size(&self.state, request.into_inner()).await?))
    }

    async fn add_index(&self, request: Request<proto::IndexRequest>) -> Result<Response<proto::Empty>, Status> {
        index::add_index(&self.state, request.into_inner()).await?;
        Ok(Response::new(proto::Empty {}))
    }

    async fn remove_index(&self, request: Request<proto::IndexRequest>) -> Result<Response<proto::Empty>, Status> {
        index::remove_index(&self.state, request.into_inner()).await?;
        Ok(Response::new(proto::Empty {}))
    }

    async fn invoke(&self, request: Request<proto::InvokeRequest>) -> Result<Response<proto::BytesValue>, Status> {
        Ok(Response::new(aggregate::invoke(&self.state, request.into_inner()).await?))
    }

    type InvokeAllStream = ResponseStream<proto::Entry>;

    async fn invoke_all(
        &self,
        request: Request<proto::InvokeAllRequest>,
    ) -> Result<Response<Self::InvokeAllStream>, Status> {
        let entries = aggregate::invoke_all(&self.state, request.into_inner()).await?;
        Ok(Response::new(stream_of(entries)))
    }

    async fn aggregate(
        &self,
        request: Request<proto::AggregateRequest>,
    ) -> Result<Response<proto::BytesValue>, Status> {
        Ok(Response::new(aggregate::aggregate(&self.state, request.into_inner()).await?))
    }

    type EntrySetStream = ResponseStream<proto::Entry>;

    async fn entry_set(&self, request: Request<proto::QueryRequest>) -> Result<Response<Self::EntrySetStream>, Status> {
        let entries = query::entry_set(&self.state, request.into_inner()).await?;
        Ok(Response::new(stream_of(entries)))
    }

    type KeySetStream = ResponseStream<proto::BytesValue>;

    async fn key_set(&self, request: Request<proto::QueryRequest>) -> Result<Response<Self::KeySetStream>, Status> {
        let keys = query::key_set(&self.state, request.into_inner()).await?;
        Ok(Response::new(stream_of(keys)))
    }

    type ValuesStream = ResponseStream<proto::BytesValue>;

    async fn values(&self, request: Request<proto::QueryRequest>) -> Result<Response<Self::ValuesStream>, Status> {
        let values = query::values(&self.state, request.into_inner()).await?;
        Ok(Response::new(stream_of(values)))
    }

    async fn next_page(&self, request: Request<proto::PageRequest>) -> Result<Response<proto::PageResponse>, Status> {
        Ok(Response::new(query::next_page(&self.state, request.into_inner()).await?))
    }

    type EventsStream = ResponseStream<proto::EventResponse>;

    async fn events(
        &self,
        request: Request<tonic::Streaming<proto::EventRequest>>,
    ) -> Result<Response<Self::EventsStream>, Status> {
        let stream = events::spawn_session(self.state.clone(), request.into_inner());
        Ok(Response::new(Box::pin(stream)))
    }
}
