//! Console logging init (spec §6.1, ambient stack), grounded on
//! `r2e_observability::tracing_setup::init_tracing` — env-driven filter plus
//! a `fmt` layer. OpenTelemetry export is dropped: this proxy is a leaf
//! service, not the app-wide observability layer the teacher's full stack
//! serves.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).with_thread_ids(false);

    Registry::default().with(env_filter).with(fmt_layer).init();
}
