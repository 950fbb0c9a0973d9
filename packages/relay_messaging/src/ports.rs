use std::{fmt, time::Duration};

use async_trait::async_trait;

use crate::errors::{BrokerError, HandlerError, TransportError};

/// Opaque token issued by the queue for one delivery of a message.
///
/// Deleting or releasing the message requires the handle of its latest delivery.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DeliveryHandle(String);

impl DeliveryHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ReceivedMessage {
    pub body: String,
    pub handle: DeliveryHandle,
}

/// A parsed envelope together with the handle needed to acknowledge it.
#[derive(Debug, Clone)]
pub struct Delivery<E> {
    pub envelope: E,
    pub handle: DeliveryHandle,
}

// The trait that should be implemented by any queue adapter. One instance is bound to one queue.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    fn queue_name(&self) -> &str;

    async fn send(&self, body: String) -> Result<(), TransportError>;

    /// Long-polls for at most one message. An empty queue after `wait` is `Ok(None)`.
    async fn receive_one(&self, wait: Duration, visibility_timeout: Duration) -> Result<Option<ReceivedMessage>, TransportError>;

    async fn acknowledge(&self, handle: &DeliveryHandle) -> Result<(), TransportError>;

    /// Makes an in-flight message visible again straight away.
    async fn release(&self, handle: &DeliveryHandle) -> Result<(), TransportError>;
}

// Business logic invoked by the receive loop for each delivered message.
// Returning an error leaves the message on the queue for redelivery.
#[async_trait]
pub trait MessageHandler<E>: Send + Sync {
    /// Messages this handler does not claim are made visible again for another consumer of the queue.
    fn claims(&self, _message: &E) -> bool {
        true
    }

    async fn handle(&self, message: E) -> Result<(), HandlerError>;
}

#[async_trait]
pub trait MessagePublisher<E>: Send + Sync {
    async fn publish(&self, envelope: E) -> Result<(), BrokerError>;
}
