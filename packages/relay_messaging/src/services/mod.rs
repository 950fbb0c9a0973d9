mod client;
mod consumer;
mod publisher;

pub use client::BrokerClient;
pub use consumer::{BrokerConsumer, FOREIGN_RESPONSE_BACKOFF, TRANSPORT_RETRY_BACKOFF};
pub use publisher::BrokerPublisher;
