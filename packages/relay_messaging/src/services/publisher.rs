use std::sync::Arc;

use async_trait::async_trait;
use relay_common_utils::otel::propagated_context::PropagatedSpanContextData;
use tracing::{debug, Instrument};

use crate::{
    errors::BrokerError,
    model::Envelope,
    ports::{MessagePublisher, QueueTransport},
};

/// Sends envelopes to one queue, stamping them with the trace context of the caller.
#[derive(Clone)]
pub struct BrokerPublisher {
    transport: Arc<dyn QueueTransport>,
}

impl BrokerPublisher {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }

    pub fn queue_name(&self) -> &str {
        self.transport.queue_name()
    }
}

#[async_trait]
impl<E: Envelope> MessagePublisher<E> for BrokerPublisher {
    async fn publish(&self, mut envelope: E) -> Result<(), BrokerError> {
        let span = tracing::info_span!("send_message", queue = %self.transport.queue_name());

        async move {
            // Without an exported span keep whatever context the envelope already carries.
            let carrier = PropagatedSpanContextData::from_current_span();
            if carrier.get_trace_parent().is_some() {
                envelope.set_trace_carrier(carrier);
            }

            let body = envelope.to_body()?;
            self.transport.send(body).await?;

            debug!(correlation_id = ?envelope.correlation_id(), "Message sent to {}", self.transport.queue_name());
            Ok(())
        }
        .instrument(span)
        .await
    }
}
