use banking_gateway::{app, config::GatewayConfig, errors::GatewayError};
use relay_common_utils::otel::initialiser::init_telemetry;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    let config = GatewayConfig::from_env()?;
    let telemetry = init_telemetry(config.telemetry.clone())?;

    info!("Banking gateway starting...");
    let result = app::run(config, &telemetry).await;

    info!("Banking gateway shutdown complete");
    telemetry.shutdown();
    result
}
