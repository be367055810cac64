//! Metrics facade
//!
//! Instrumentation hooks for cipher operations and key resolution. A host
//! application installs a [`MetricsProvider`] once at startup; with none
//! installed every hook is a no-op.

use std::sync::RwLock;
use std::time::{Duration, Instant};

static METRICS_PROVIDER: RwLock<Option<Box<dyn MetricsProvider>>> = RwLock::new(None);

/// Sink for the measurements this crate emits
pub trait MetricsProvider: Send + Sync {
    /// Records the duration of one named operation
    fn record_timer(&self, name: &str, duration: Duration);

    /// Increments a named counter
    fn increment_counter(&self, name: &str);
}

/// Installs the process-wide metrics provider
///
/// The first installation wins; later calls are ignored so library
/// initialization stays idempotent.
pub fn set_metrics_provider(provider: Box<dyn MetricsProvider>) {
    let mut guard = METRICS_PROVIDER.write().unwrap();
    if guard.is_none() {
        *guard = Some(provider);
    }
}

pub(crate) fn record_timer(name: &str, duration: Duration) {
    if let Some(provider) = METRICS_PROVIDER.read().unwrap().as_ref() {
        provider.record_timer(name, duration);
    }
}

pub(crate) fn increment_counter(name: &str) {
    if let Some(provider) = METRICS_PROVIDER.read().unwrap().as_ref() {
        provider.increment_counter(name);
    }
}

/// Measures elapsed time from creation to drop
pub(crate) struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        record_timer(self.name, self.start.elapsed());
    }
}

/// Times the enclosing scope under the given metric name
macro_rules! timer {
    ($name:expr) => {
        let _timer = $crate::metrics::Timer::new($name);
    };
}

/// Increments the given counter metric
macro_rules! counter {
    ($name:expr) => {
        $crate::metrics::increment_counter($name);
    };
}

pub(crate) use {counter, timer};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingProvider {
        timers: Arc<AtomicUsize>,
        counters: Arc<AtomicUsize>,
    }

    impl MetricsProvider for CountingProvider {
        fn record_timer(&self, _name: &str, _duration: Duration) {
            self.timers.fetch_add(1, Ordering::SeqCst);
        }

        fn increment_counter(&self, _name: &str) {
            self.counters.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_provider_receives_measurements() {
        let timers = Arc::new(AtomicUsize::new(0));
        let counters = Arc::new(AtomicUsize::new(0));
        set_metrics_provider(Box::new(CountingProvider {
            timers: Arc::clone(&timers),
            counters: Arc::clone(&counters),
        }));

        {
            timer!("test.scope");
            counter!("test.count");
        }

        // Another install attempt must not displace the active provider.
        set_metrics_provider(Box::new(CountingProvider {
            timers: Arc::new(AtomicUsize::new(0)),
            counters: Arc::new(AtomicUsize::new(0)),
        }));

        counter!("test.count");
        assert!(timers.load(Ordering::SeqCst) >= 1);
        assert!(counters.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_no_provider_is_a_no_op() {
        // Must not panic when nothing is installed.
        timer!("test.unobserved");
        counter!("test.unobserved");
        record_timer("test.unobserved", Duration::from_millis(1));
    }
}
