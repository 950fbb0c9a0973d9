use std::time::Duration;

use relay_common_utils::{env::ConfigError, env_var_with_defaults};

pub const DEFAULT_WAIT_SECONDS: u64 = 1;
pub const DEFAULT_VISIBILITY_TIMEOUT_SECONDS: u64 = 15;
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 5_000;

/// Long-poll settings applied to every receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveSettings {
    pub wait: Duration,
    /// How long a received message stays hidden from other pollers.
    pub visibility_timeout: Duration,
}

impl Default for ReceiveSettings {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(DEFAULT_WAIT_SECONDS),
            visibility_timeout: Duration::from_secs(DEFAULT_VISIBILITY_TIMEOUT_SECONDS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Overrides the SQS endpoint, e.g. for localstack.
    pub endpoint_url: Option<String>,
    pub receive: ReceiveSettings,
    pub send_timeout: Duration,
    pub ack_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            receive: ReceiveSettings::default(),
            send_timeout: Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS),
            ack_timeout: Duration::from_millis(DEFAULT_ACK_TIMEOUT_MS),
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint_url: env_var_with_defaults!("ENDPOINT_URL", String)?,
            receive: ReceiveSettings {
                wait: Duration::from_secs(env_var_with_defaults!("QUEUE_WAIT_SECONDS", u64, DEFAULT_WAIT_SECONDS)?),
                visibility_timeout: Duration::from_secs(env_var_with_defaults!(
                    "QUEUE_VISIBILITY_TIMEOUT_SECONDS",
                    u64,
                    DEFAULT_VISIBILITY_TIMEOUT_SECONDS
                )?),
            },
            send_timeout: Duration::from_millis(env_var_with_defaults!("QUEUE_SEND_TIMEOUT_MS", u64, DEFAULT_SEND_TIMEOUT_MS)?),
            ack_timeout: Duration::from_millis(env_var_with_defaults!("QUEUE_ACK_TIMEOUT_MS", u64, DEFAULT_ACK_TIMEOUT_MS)?),
        })
    }
}
