pub mod config;
pub mod in_memory;
pub mod sqs;

pub use config::{QueueConfig, ReceiveSettings};
pub use in_memory::InMemoryQueue;
pub use sqs::{sqs_client, SqsQueue};
