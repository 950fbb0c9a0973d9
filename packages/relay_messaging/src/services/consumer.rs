use std::{marker::PhantomData, sync::Arc, time::Duration};

use tokio::time::Instant;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, warn, Instrument};

use crate::{
    errors::BrokerError,
    health::HealthStatus,
    metrics::BrokerMetrics,
    model::Envelope,
    ports::{Delivery, DeliveryHandle, MessageHandler, QueueTransport},
    queue::ReceiveSettings,
};

/// Pause before polling again after the queue itself failed.
pub const TRANSPORT_RETRY_BACKOFF: Duration = Duration::from_millis(250);
/// Pause after handing back a message that belongs to another waiter or loop.
pub const FOREIGN_RESPONSE_BACKOFF: Duration = Duration::from_millis(50);

/// Reads envelopes of type `E` from one queue.
pub struct BrokerConsumer<E> {
    transport: Arc<dyn QueueTransport>,
    settings: ReceiveSettings,
    health: Arc<HealthStatus>,
    metrics: Option<Arc<BrokerMetrics>>,
    in_flight: TaskTracker,
    _envelope: PhantomData<fn() -> E>,
}

impl<E: Envelope> BrokerConsumer<E> {
    pub fn new(transport: Arc<dyn QueueTransport>, settings: ReceiveSettings, health: Arc<HealthStatus>) -> Self {
        Self {
            transport,
            settings,
            health,
            metrics: None,
            in_flight: TaskTracker::new(),
            _envelope: PhantomData,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<BrokerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn queue_name(&self) -> &str {
        self.transport.queue_name()
    }

    pub fn health(&self) -> Arc<HealthStatus> {
        self.health.clone()
    }

    /// Handlers spawned by the receive loop that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// One long-poll. Bodies that do not parse into `E` are reported as [`crate::errors::BrokerErrorKind::Parse`].
    pub async fn receive(&self) -> Result<Option<Delivery<E>>, BrokerError> {
        let Some(message) = self
            .transport
            .receive_one(self.settings.wait, self.settings.visibility_timeout)
            .await?
        else {
            return Ok(None);
        };

        let envelope = E::from_body(&message.body)?;
        Ok(Some(Delivery {
            envelope,
            handle: message.handle,
        }))
    }

    /// Polls until `shutdown` is cancelled, handing every message to `handler` on its own task.
    ///
    /// Messages are deleted only when the handler succeeds. Failed or unparsable messages stay on the queue and come
    /// back after the visibility timeout. Messages the handler does not claim are released straight away. A transport
    /// failure marks the client unhealthy and ends the loop.
    pub async fn run<H>(&self, handler: Arc<H>, shutdown: CancellationToken) -> Result<(), BrokerError>
    where
        H: MessageHandler<E> + ?Sized + 'static,
    {
        info!("Listening queue: {}", self.queue_name());

        loop {
            if shutdown.is_cancelled() {
                info!("Stopping polling of {} because shutdown was requested", self.queue_name());
                return Ok(());
            }

            match self.receive().await {
                Ok(None) => self.health.mark_healthy(),
                Ok(Some(delivery)) if handler.claims(&delivery.envelope) => {
                    self.health.mark_healthy();
                    self.dispatch(delivery, handler.clone());
                }
                Ok(Some(delivery)) => {
                    self.health.mark_healthy();
                    debug!(
                        "Message {:?} on {} is not claimed by this loop, releasing it",
                        delivery.envelope.correlation_id(),
                        self.queue_name()
                    );
                    self.hand_back(&delivery.handle, FOREIGN_RESPONSE_BACKOFF).await;
                }
                Err(e) if e.is_transport() => {
                    self.health.mark_unhealthy();
                    error!("Couldn't receive message from {}: {e}", self.queue_name());
                    return Err(e);
                }
                Err(e) => {
                    self.health.mark_healthy();
                    warn!("Skipping message on {} that will be redelivered: {e}", self.queue_name());
                }
            }
        }
    }

    fn dispatch<H>(&self, delivery: Delivery<E>, handler: Arc<H>)
    where
        H: MessageHandler<E> + ?Sized + 'static,
    {
        let Delivery { envelope, handle } = delivery;

        let span = tracing::info_span!(
            "process_message",
            queue = %self.queue_name(),
            correlation_id = envelope.correlation_id().unwrap_or_default(),
        );
        envelope.trace_carrier().attach_parent(&span);

        let transport = self.transport.clone();
        let metrics = self.metrics.clone();

        self.in_flight.spawn(
            async move {
                debug!("Received message {handle}");

                match handler.handle(envelope).await {
                    Ok(()) => {
                        // Deleting is idempotent, a failure only risks a duplicate delivery.
                        if let Err(e) = transport.acknowledge(&handle).await {
                            warn!("Couldn't delete message {handle}: {e}");
                        }
                        if let Some(metrics) = metrics {
                            metrics.increment_processed();
                        }
                    }
                    Err(e) => {
                        error!("Couldn't process message {handle}, leaving it for redelivery: {e}");
                    }
                }
            }
            .instrument(span),
        );
    }

    /// Waits for the response carrying `correlation_id`, up to `timeout`.
    ///
    /// The matching response is deleted and returned. Responses for other waiters are made visible again. Transport
    /// failures are retried until the deadline.
    pub async fn await_response(&self, correlation_id: &str, timeout: Duration) -> Result<E, BrokerError> {
        let deadline = Instant::now() + timeout;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(BrokerError::timeout(
                    format!("No response on {} within {}ms", self.queue_name(), timeout.as_millis()),
                    Some(correlation_id.to_owned()),
                ));
            }
            let remaining = deadline - now;

            let message = match self
                .transport
                .receive_one(self.settings.wait.min(remaining), self.settings.visibility_timeout)
                .await
            {
                Ok(message) => {
                    self.health.mark_healthy();
                    message
                }
                Err(e) => {
                    self.health.mark_unhealthy();
                    warn!("Couldn't receive response from {}, retrying: {e}", self.queue_name());
                    tokio::time::sleep(TRANSPORT_RETRY_BACKOFF.min(remaining)).await;
                    continue;
                }
            };

            let Some(message) = message else {
                continue;
            };

            match E::from_body(&message.body) {
                Ok(envelope) if envelope.correlation_id() == Some(correlation_id) => {
                    self.acknowledge(&message.handle).await;
                    return Ok(envelope);
                }
                Ok(envelope) => {
                    debug!(
                        "Response {:?} on {} belongs to another request, releasing it",
                        envelope.correlation_id(),
                        self.queue_name()
                    );
                    self.hand_back(&message.handle, FOREIGN_RESPONSE_BACKOFF.min(remaining)).await;
                }
                Err(e) => {
                    warn!("Skipping response on {} that will be redelivered: {e}", self.queue_name());
                }
            }
        }
    }

    /// Makes a message visible again for its rightful consumer, then pauses so it is not picked straight back up.
    async fn hand_back(&self, handle: &DeliveryHandle, pause: Duration) {
        if let Err(e) = self.transport.release(handle).await {
            warn!("Couldn't release message {handle}: {e}");
        }
        tokio::time::sleep(pause).await;
    }

    async fn acknowledge(&self, handle: &DeliveryHandle) {
        if let Err(e) = self.transport.acknowledge(handle).await {
            warn!("Couldn't delete message {handle}: {e}");
        }
    }

    /// Stops tracking new handlers and waits up to `grace` for the running ones.
    ///
    /// Returns `false` when handlers were still running at the end of the grace period.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.in_flight.close();
        let drained = tokio::time::timeout(grace, self.in_flight.wait()).await.is_ok();
        if !drained {
            warn!("{} handlers still running on {} after {}ms", self.in_flight.len(), self.queue_name(), grace.as_millis());
        }
        drained
    }
}
