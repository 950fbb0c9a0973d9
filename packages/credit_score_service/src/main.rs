use credit_score_service::{app, config::CreditScoreConfig, errors::CreditScoreError};
use relay_common_utils::otel::initialiser::init_telemetry;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), CreditScoreError> {
    let config = CreditScoreConfig::from_env()?;
    let telemetry = init_telemetry(config.telemetry.clone())?;

    info!("Credit score service starting...");
    let result = app::run(config, &telemetry).await;

    info!("Credit score service shutdown complete");
    telemetry.shutdown();
    result
}
