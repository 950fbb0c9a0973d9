use std::sync::Arc;

use crate::{
    errors::BrokerError,
    health::HealthStatus,
    metrics::BrokerMetrics,
    model::Envelope,
    ports::QueueTransport,
    queue::{QueueConfig, ReceiveSettings, SqsQueue},
};

use super::{BrokerConsumer, BrokerPublisher};

/// One side of a hop: reads `In` envelopes from the inbound queue and publishes on the outbound queue.
///
/// Both directions share one [`HealthStatus`].
pub struct BrokerClient<In> {
    consumer: BrokerConsumer<In>,
    publisher: BrokerPublisher,
    health: Arc<HealthStatus>,
}

impl<In: Envelope> BrokerClient<In> {
    /// Queues are expected to be resolved already, so the client starts out initialized.
    pub fn new(inbound: Arc<dyn QueueTransport>, outbound: Arc<dyn QueueTransport>, settings: ReceiveSettings) -> Self {
        let health = Arc::new(HealthStatus::new());
        health.mark_initialized();

        Self {
            consumer: BrokerConsumer::new(inbound, settings, health.clone()),
            publisher: BrokerPublisher::new(outbound),
            health,
        }
    }

    pub async fn connect_sqs(
        client: aws_sdk_sqs::Client,
        inbound_queue: &str,
        outbound_queue: &str,
        config: &QueueConfig,
    ) -> Result<Self, BrokerError> {
        let inbound = SqsQueue::connect(client.clone(), inbound_queue, config).await?;
        let outbound = SqsQueue::connect(client, outbound_queue, config).await?;

        Ok(Self::new(Arc::new(inbound), Arc::new(outbound), config.receive))
    }

    pub fn with_metrics(mut self, metrics: Arc<BrokerMetrics>) -> Self {
        self.consumer = self.consumer.with_metrics(metrics);
        self
    }

    pub fn consumer(&self) -> &BrokerConsumer<In> {
        &self.consumer
    }

    pub fn publisher(&self) -> BrokerPublisher {
        self.publisher.clone()
    }

    pub fn health(&self) -> Arc<HealthStatus> {
        self.health.clone()
    }
}
