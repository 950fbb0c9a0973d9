use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::{error::DisplayErrorContext, types::QueueAttributeName, Client};
use tracing::{debug, info};

use crate::{
    errors::{TransportError, TransportErrorKind},
    ports::{DeliveryHandle, QueueTransport, ReceivedMessage},
};

use super::config::QueueConfig;

/// Builds an SQS client from the default AWS credential chain, honouring `endpoint_url` when set.
pub async fn sqs_client(config: &QueueConfig) -> Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(endpoint_url) = &config.endpoint_url {
        info!("Using custom SQS endpoint {endpoint_url}");
        loader = loader.endpoint_url(endpoint_url);
    }

    Client::new(&loader.load().await)
}

// SQS queue adapter bound to a single queue url.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: Client,
    queue_name: String,
    queue_url: String,
    send_timeout: Duration,
    ack_timeout: Duration,
}

impl SqsQueue {
    /// Resolves the queue url by name. Failing to resolve is fatal to startup.
    pub async fn connect(client: Client, queue_name: &str, config: &QueueConfig) -> Result<Self, TransportError> {
        let output = client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|e| TransportError::new(TransportErrorKind::QueueResolution, queue_name, DisplayErrorContext(&e).to_string()))?;

        let queue_url = output
            .queue_url()
            .ok_or_else(|| TransportError::new(TransportErrorKind::QueueResolution, queue_name, "No url returned for queue"))?
            .to_owned();

        info!("Resolved queue {queue_name} to {queue_url}");

        Ok(Self {
            client,
            queue_name: queue_name.to_owned(),
            queue_url,
            send_timeout: config.send_timeout,
            ack_timeout: config.ack_timeout,
        })
    }

    fn error(&self, kind: TransportErrorKind, reason: impl Into<String>) -> TransportError {
        TransportError::new(kind, &self.queue_name, reason)
    }

    fn timeout_error(&self, operation: &str, timeout: Duration) -> TransportError {
        self.error(TransportErrorKind::Timeout, format!("{operation} did not complete within {}ms", timeout.as_millis()))
    }
}

/// SQS only takes whole seconds. Partial seconds round up so a short remaining wait never becomes a zero-second poll.
fn as_seconds(duration: Duration) -> i32 {
    let seconds = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    i32::try_from(seconds).unwrap_or(i32::MAX)
}

#[async_trait]
impl QueueTransport for SqsQueue {
    fn queue_name(&self) -> &str {
        &self.queue_name
    }

    async fn send(&self, body: String) -> Result<(), TransportError> {
        let request = self.client.send_message().queue_url(&self.queue_url).message_body(body).send();

        tokio::time::timeout(self.send_timeout, request)
            .await
            .map_err(|_| self.timeout_error("send_message", self.send_timeout))?
            .map_err(|e| self.error(TransportErrorKind::Send, format!("Cannot send sqs message: {}", DisplayErrorContext(&e))))?;

        Ok(())
    }

    async fn receive_one(&self, wait: Duration, visibility_timeout: Duration) -> Result<Option<ReceivedMessage>, TransportError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .message_attribute_names(QueueAttributeName::All.as_str())
            .max_number_of_messages(1)
            .wait_time_seconds(as_seconds(wait))
            .visibility_timeout(as_seconds(visibility_timeout))
            .send()
            .await
            .map_err(|e| self.error(TransportErrorKind::Receive, format!("Couldn't receive message: {}", DisplayErrorContext(&e))))?;

        let Some(message) = output.messages().first() else {
            return Ok(None);
        };

        let handle = message
            .receipt_handle()
            .ok_or_else(|| self.error(TransportErrorKind::InvalidHandle, "Message received without a receipt handle"))?;

        debug!("Received message {:?} from {}", message.message_id(), self.queue_name);

        Ok(Some(ReceivedMessage {
            body: message.body().unwrap_or_default().to_owned(),
            handle: DeliveryHandle::new(handle),
        }))
    }

    async fn acknowledge(&self, handle: &DeliveryHandle) -> Result<(), TransportError> {
        let request = self.client.delete_message().queue_url(&self.queue_url).receipt_handle(handle.as_str()).send();

        tokio::time::timeout(self.ack_timeout, request)
            .await
            .map_err(|_| self.timeout_error("delete_message", self.ack_timeout))?
            .map_err(|e| self.error(TransportErrorKind::Acknowledge, format!("Couldn't delete message: {}", DisplayErrorContext(&e))))?;

        Ok(())
    }

    async fn release(&self, handle: &DeliveryHandle) -> Result<(), TransportError> {
        let request = self
            .client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(handle.as_str())
            .visibility_timeout(0)
            .send();

        tokio::time::timeout(self.ack_timeout, request)
            .await
            .map_err(|_| self.timeout_error("change_message_visibility", self.ack_timeout))?
            .map_err(|e| self.error(TransportErrorKind::Release, format!("Couldn't release message: {}", DisplayErrorContext(&e))))?;

        Ok(())
    }
}
