use relay_common_utils::{env::ConfigError, otel::initialiser::OtelInitError};
use relay_messaging::errors::BrokerError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CreditScoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] OtelInitError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error("Http server error: {0}")]
    Http(#[from] std::io::Error),
    #[error("Task failed: {0}")]
    Task(String),
}
