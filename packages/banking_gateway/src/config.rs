use std::time::Duration;

use relay_common_utils::{env::ConfigError, env_var, env_var_with_defaults, otel::initialiser::TelemetryConfig};
use relay_messaging::queue::QueueConfig;

use crate::providers::bank_a::DEFAULT_START_FROM_YEAR;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub http_port: u16,
    pub telemetry: TelemetryConfig,
    pub requests_queue: String,
    pub responses_queue: String,
    pub start_from_year: i32,
    /// How long in-flight requests may take to finish at shutdown.
    pub shutdown_grace: Duration,
    pub queue: QueueConfig,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            http_port: env_var_with_defaults!("HTTP_PORT", u16, 8080)?,
            telemetry: TelemetryConfig {
                name: env_var_with_defaults!("SERVICE_NAME", String, "banking-gateway".to_string())?,
                enable_tracing: env_var_with_defaults!("ENABLE_TRACING", bool, false)?,
                grpc_endpoint: env_var_with_defaults!("OTEL_GRPC_ENDPOINT", String)?,
                default_level: "info".to_string(),
            },
            requests_queue: env_var!("BANKING_REQUESTS_QUEUE_NAME")?,
            responses_queue: env_var!("BANKING_RESPONSES_QUEUE_NAME")?,
            start_from_year: env_var_with_defaults!("BANKING_START_FROM_YEAR", i32, DEFAULT_START_FROM_YEAR)?,
            shutdown_grace: Duration::from_millis(env_var_with_defaults!("SHUTDOWN_GRACE_MS", u64, 5_000)?),
            queue: QueueConfig::from_env()?,
        })
    }
}
