use strum::Display;
use thiserror::Error as ThisError;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub enum TransportErrorKind {
    // Queue url lookup at startup
    QueueResolution,
    Send,
    Receive,
    Acknowledge,
    Release,
    // Receipt handle unknown, already deleted or past its visibility timeout
    InvalidHandle,
    Timeout,
}

#[derive(Debug, Clone, Eq, PartialEq, ThisError)]
#[error("Queue transport error on queue={queue} kind={kind} reason={reason}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub reason: String,
    pub queue: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, queue: &str, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            queue: queue.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BrokerErrorKind {
    Transport(TransportErrorKind),
    Parse,
    Serialise,
    Timeout,
}

#[derive(Debug, Clone, Eq, PartialEq, ThisError)]
#[error("Broker error kind={kind:?} reason={reason} data={data:?}")]
pub struct BrokerError {
    pub kind: BrokerErrorKind,
    pub reason: String,
    pub data: Option<String>,
}

impl BrokerError {
    pub fn parse(reason: impl Into<String>, data: Option<String>) -> Self {
        Self {
            kind: BrokerErrorKind::Parse,
            reason: reason.into(),
            data,
        }
    }

    pub fn timeout(reason: impl Into<String>, data: Option<String>) -> Self {
        Self {
            kind: BrokerErrorKind::Timeout,
            reason: reason.into(),
            data,
        }
    }

    /// Errors raised by the queue itself, as opposed to the content of a message.
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, BrokerErrorKind::Transport(_))
    }
}

impl From<TransportError> for BrokerError {
    fn from(error: TransportError) -> Self {
        Self {
            kind: BrokerErrorKind::Transport(error.kind),
            reason: error.reason,
            data: Some(error.queue),
        }
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(error: serde_json::Error) -> Self {
        Self {
            kind: BrokerErrorKind::Serialise,
            reason: error.to_string(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub enum HandlerErrorKind {
    Provider,
    // Envelope could not be built from, or read into, the expected view
    Envelope,
    Publish,
}

#[derive(Debug, Clone, Eq, PartialEq, ThisError)]
#[error("Handler error kind={kind} reason={reason} data={data:?}")]
pub struct HandlerError {
    pub kind: HandlerErrorKind,
    pub reason: String,
    pub data: Option<String>,
}

impl HandlerError {
    pub fn provider(reason: impl Into<String>, data: Option<String>) -> Self {
        Self {
            kind: HandlerErrorKind::Provider,
            reason: reason.into(),
            data,
        }
    }
}

impl From<BrokerError> for HandlerError {
    fn from(error: BrokerError) -> Self {
        let kind = match error.kind {
            BrokerErrorKind::Parse | BrokerErrorKind::Serialise => HandlerErrorKind::Envelope,
            BrokerErrorKind::Transport(_) | BrokerErrorKind::Timeout => HandlerErrorKind::Publish,
        };

        Self {
            kind,
            reason: error.reason,
            data: error.data,
        }
    }
}
