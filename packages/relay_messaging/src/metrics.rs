use std::sync::atomic::{AtomicU64, Ordering};

use opentelemetry::{
    metrics::{Counter, Meter},
    KeyValue,
};
use relay_common_utils::otel::metric_constants::METRIC_KEY_QUEUE;

/// Messages handled successfully by one receive loop.
#[derive(Debug)]
pub struct BrokerMetrics {
    processed: AtomicU64,
    processed_counter: Counter<u64>,
    attributes: [KeyValue; 1],
}

impl BrokerMetrics {
    pub fn new(meter: &Meter, name: &'static str, queue: &str) -> Self {
        let processed_counter = meter.u64_counter(name).with_description("The total number of processed messages").build();
        let attributes = [KeyValue::new(METRIC_KEY_QUEUE, queue.to_owned())];
        processed_counter.add(0, &attributes);

        Self {
            processed: AtomicU64::new(0),
            processed_counter,
            attributes,
        }
    }

    pub fn increment_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.processed_counter.add(1, &self.attributes);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}
