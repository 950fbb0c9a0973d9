use std::{future::Future, sync::Arc, time::Duration};

use crate::{
    health::HealthStatus,
    metrics::BrokerMetrics,
    model::{BankingRequest, Envelope, ResponseEnvelope},
    ports::QueueTransport,
    queue::{InMemoryQueue, ReceiveSettings},
    services::BrokerConsumer,
};

pub(crate) const SETTINGS: ReceiveSettings = ReceiveSettings {
    wait: Duration::from_millis(20),
    visibility_timeout: Duration::from_secs(15),
};

pub(crate) fn banking_request(user_id: &str) -> BankingRequest {
    let mut request = BankingRequest::new(user_id, "bank-a");
    request.banking_credentials.insert("username".into(), user_id.into());
    request.banking_credentials.insert("password".into(), "secret".into());
    request
}

pub(crate) fn correlated_response(correlation_id: &str) -> ResponseEnvelope {
    let mut envelope = ResponseEnvelope::default();
    envelope.data.insert("userId".into(), "reus".into());
    envelope.data.insert("correlationId".into(), correlation_id.into());
    envelope
}

pub(crate) fn consumer<E: Envelope>(queue: &Arc<InMemoryQueue>) -> (BrokerConsumer<E>, Arc<HealthStatus>, Arc<BrokerMetrics>) {
    let health = Arc::new(HealthStatus::new());
    health.mark_initialized();
    let metrics = Arc::new(BrokerMetrics::new(
        &opentelemetry::global::meter("relay_messaging_tests"),
        "total_requests_processed",
        queue.queue_name(),
    ));

    let consumer = BrokerConsumer::new(queue.clone(), SETTINGS, health.clone()).with_metrics(metrics.clone());
    (consumer, health, metrics)
}

/// Polls `condition` until it holds, panicking after `timeout`.
pub(crate) async fn wait_until<F>(timeout: Duration, condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

pub(crate) async fn within<T>(timeout: Duration, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(timeout, future).await.expect("future did not complete in time")
}
