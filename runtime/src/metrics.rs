//! Metrics for state containers.
//!
//! Containers record through the `metrics` facade. Nothing is exported unless
//! the host installs a recorder; call [`register_metrics`] once after
//! installing one to attach descriptions.
//!
//! Every metric carries a `container` label with the container's configured name.
//!
//! - `state_container.mutations.scheduled` - mutations enqueued on a lane
//! - `state_container.mutations.applied` - mutations committed
//! - `state_container.mutations.abandoned` - mutations dropped by teardown or a dead lane
//! - `state_container.mutations.panicked` - update functions that panicked
//! - `state_container.emissions.suppressed` - emissions skipped as duplicates
//! - `state_container.mutation.duration_seconds` - time spent in update functions
//! - `state_container.subscribers` - live subscriptions on the primary stream

use metrics::{describe_counter, describe_gauge, describe_histogram};
use std::time::Duration;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "state_container.mutations.scheduled",
        "Total number of mutations scheduled onto serial lanes"
    );
    describe_counter!(
        "state_container.mutations.applied",
        "Total number of mutations committed"
    );
    describe_counter!(
        "state_container.mutations.abandoned",
        "Total number of mutations abandoned before being applied"
    );
    describe_counter!(
        "state_container.mutations.panicked",
        "Total number of update functions that panicked"
    );
    describe_counter!(
        "state_container.emissions.suppressed",
        "Total number of emissions suppressed as consecutive duplicates"
    );
    describe_histogram!(
        "state_container.mutation.duration_seconds",
        "Time spent running update functions"
    );
    describe_gauge!(
        "state_container.subscribers",
        "Current number of subscriptions to a container's primary stream"
    );
}

/// Where a duplicate emission was suppressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// Full-state de-duplication on the primary stream
    State,
    /// Per-selector de-duplication
    Selector,
}

impl Suppression {
    const fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Selector => "selector",
        }
    }
}

/// State container metrics recorder.
pub struct ContainerMetrics;

impl ContainerMetrics {
    /// Record a mutation scheduled onto a lane.
    pub fn record_scheduled(container: &str) {
        counter!("state_container.mutations.scheduled", "container" => container.to_owned())
            .increment(1);
    }

    /// Record a committed mutation and the time its update function took.
    pub fn record_applied(container: &str, duration: Duration) {
        counter!("state_container.mutations.applied", "container" => container.to_owned())
            .increment(1);
        histogram!("state_container.mutation.duration_seconds", "container" => container.to_owned())
            .record(duration.as_secs_f64());
    }

    /// Record mutations abandoned without being applied.
    pub fn record_abandoned(container: &str, count: usize) {
        if count == 0 {
            return;
        }
        counter!("state_container.mutations.abandoned", "container" => container.to_owned())
            .increment(count as u64);
    }

    /// Record an update function that panicked.
    pub fn record_panicked(container: &str) {
        counter!("state_container.mutations.panicked", "container" => container.to_owned())
            .increment(1);
    }

    /// Record an emission suppressed as a duplicate.
    pub fn record_suppressed(kind: Suppression) {
        counter!("state_container.emissions.suppressed", "kind" => kind.as_str()).increment(1);
    }

    /// Record the current number of primary-stream subscribers.
    pub fn set_subscribers(container: &str, count: usize) {
        // Precision loss acceptable for a gauge (subscriber counts < 2^52)
        #[allow(clippy::cast_precision_loss)]
        gauge!("state_container.subscribers", "container" => container.to_owned())
            .set(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::atomics::AtomicU64;
    use metrics::{
        Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
        with_local_recorder,
    };
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex};

    /// Keeps every counter in memory, keyed by `name{label=value,...}`
    #[derive(Default)]
    struct CountingRecorder {
        counters: Mutex<HashMap<String, Arc<AtomicU64>>>,
    }

    impl CountingRecorder {
        fn count(&self, key: &str) -> u64 {
            self.counters
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .get(key)
                .map_or(0, |counter| counter.load(Ordering::Acquire))
        }
    }

    fn render(key: &Key) -> String {
        let labels: Vec<String> = key
            .labels()
            .map(|label| format!("{}={}", label.key(), label.value()))
            .collect();
        format!("{}{{{}}}", key.name(), labels.join(","))
    }

    impl Recorder for CountingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            let counter = Arc::clone(
                self.counters
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .entry(render(key))
                    .or_default(),
            );
            Counter::from_arc(counter)
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_counters_carry_container_label() {
        let recorder = CountingRecorder::default();

        with_local_recorder(&recorder, || {
            register_metrics();
            ContainerMetrics::record_scheduled("cart");
            ContainerMetrics::record_scheduled("cart");
            ContainerMetrics::record_scheduled("session");
            ContainerMetrics::record_applied("cart", Duration::from_micros(5));
            ContainerMetrics::record_panicked("cart");
            ContainerMetrics::set_subscribers("cart", 3);
        });

        assert_eq!(recorder.count("state_container.mutations.scheduled{container=cart}"), 2);
        assert_eq!(recorder.count("state_container.mutations.scheduled{container=session}"), 1);
        assert_eq!(recorder.count("state_container.mutations.applied{container=cart}"), 1);
        assert_eq!(recorder.count("state_container.mutations.panicked{container=cart}"), 1);
    }

    #[test]
    fn test_abandoned_skips_empty_batches() {
        let recorder = CountingRecorder::default();

        with_local_recorder(&recorder, || {
            ContainerMetrics::record_abandoned("cart", 0);
            ContainerMetrics::record_abandoned("cart", 2);
            ContainerMetrics::record_abandoned("cart", 3);
        });

        assert_eq!(recorder.count("state_container.mutations.abandoned{container=cart}"), 5);
    }

    #[test]
    fn test_suppressions_counted_by_kind() {
        let recorder = CountingRecorder::default();

        with_local_recorder(&recorder, || {
            ContainerMetrics::record_suppressed(Suppression::Selector);
            ContainerMetrics::record_suppressed(Suppression::Selector);
            ContainerMetrics::record_suppressed(Suppression::State);
        });

        assert_eq!(recorder.count("state_container.emissions.suppressed{kind=selector}"), 2);
        assert_eq!(recorder.count("state_container.emissions.suppressed{kind=state}"), 1);
    }

    #[test]
    fn test_suppression_labels() {
        assert_eq!(Suppression::State.as_str(), "state");
        assert_eq!(Suppression::Selector.as_str(), "selector");
    }
}
