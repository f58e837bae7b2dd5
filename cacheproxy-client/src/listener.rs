//! Lifecycle listeners (spec.md §4.9 rules 2–4): a handle's subscribers are
//! told when it is released locally, destroyed (locally or remotely), or
//! truncated remotely.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Released,
    Destroyed,
    Truncated,
}

pub trait LifecycleListener: Send + Sync {
    fn on_event(&self, cache: &str, event: LifecycleEvent);
}

/// Adapter so a plain closure can be registered without a bespoke struct.
impl<F> LifecycleListener for F
where
    F: Fn(&str, LifecycleEvent) + Send + Sync,
{
    fn on_event(&self, cache: &str, event: LifecycleEvent) {
        self(cache, event)
    }
}
