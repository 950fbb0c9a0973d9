use std::time::Duration;

use relay_common_utils::{env::ConfigError, env_var, env_var_with_defaults, otel::initialiser::TelemetryConfig};
use relay_messaging::queue::QueueConfig;

#[derive(Debug, Clone)]
pub struct CreditScoreConfig {
    pub http_port: u16,
    pub telemetry: TelemetryConfig,
    pub credit_score_requests_queue: String,
    pub credit_score_responses_queue: String,
    pub banking_requests_queue: String,
    pub banking_responses_queue: String,
    /// Upper bound on waiting for the banking gateway's answer.
    pub score_response_timeout: Duration,
    pub shutdown_grace: Duration,
    pub queue: QueueConfig,
}

impl CreditScoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            http_port: env_var_with_defaults!("HTTP_PORT", u16, 8080)?,
            telemetry: TelemetryConfig {
                name: env_var_with_defaults!("SERVICE_NAME", String, "credit-score-service".to_string())?,
                enable_tracing: env_var_with_defaults!("ENABLE_TRACING", bool, false)?,
                grpc_endpoint: env_var_with_defaults!("OTEL_GRPC_ENDPOINT", String)?,
                default_level: "info".to_string(),
            },
            credit_score_requests_queue: env_var!("CREDIT_SCORE_REQUESTS_QUEUE_NAME")?,
            credit_score_responses_queue: env_var!("CREDIT_SCORE_RESPONSES_QUEUE_NAME")?,
            banking_requests_queue: env_var!("BANKING_REQUESTS_QUEUE_NAME")?,
            banking_responses_queue: env_var!("BANKING_RESPONSES_QUEUE_NAME")?,
            score_response_timeout: Duration::from_millis(env_var_with_defaults!("SCORE_RESPONSE_TIMEOUT_MS", u64, 30_000)?),
            shutdown_grace: Duration::from_millis(env_var_with_defaults!("SHUTDOWN_GRACE_MS", u64, 5_000)?),
            queue: QueueConfig::from_env()?,
        })
    }
}
