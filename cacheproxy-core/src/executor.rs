//! Executor pool (C5): a worker pool dedicated to handler continuations,
//! distinct from the transport runtime and the backend's own threads (spec
//! §4.5/§5) — a handler that hops between backend completions and payload
//! conversion must never do so on the thread the gRPC transport needs to
//! make progress.
//!
//! Modeled as a second Tokio multi-thread runtime the server spawns work
//! onto, the same separation-of-pools idea as `r2e_core::service::ServiceComponent`
//! background tasks, generalized from "one background task" to "a pool
//! dedicated to one concern".

use std::future::Future;

use crate::error::ProxyError;

pub struct ExecutorPool {
    runtime: tokio::runtime::Runtime,
}

impl ExecutorPool {
    pub fn new(worker_threads: usize) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("cacheproxy-executor")
            .enable_all()
            .build()?;
        Ok(Self { runtime })
    }

    pub fn handle(&self) -> tokio::runtime::Handle {
        self.runtime.handle().clone()
    }

    /// Runs `fut` on this pool and awaits its completion from the caller's
    /// own runtime. Any panic in `fut` is reported as `Internal` rather than
    /// propagated, matching the single-error-adapter rule (spec §7).
    pub async fn spawn<F, T>(&self, fut: F) -> Result<T, ProxyError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.runtime
            .handle()
            .spawn(fut)
            .await
            .map_err(|e| ProxyError::internal(format!("executor task failed: {e}")))
    }
}
