use std::sync::Arc;

use relay_common_utils::otel::{
    initialiser::TelemetryGuard,
    metric_constants::{METRIC_METER_NAME_GATEWAY, METRIC_NAME_GATEWAY_REQUESTS_PROCESSED},
};
use relay_messaging::{
    metrics::BrokerMetrics,
    model::BankingRequest,
    ports::MessageHandler,
    probes::{probe_routes, ProbeState},
    queue::sqs_client,
    services::BrokerClient,
};
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{config::GatewayConfig, errors::GatewayError, providers::BankA, usecases::QueryBankingInstitution};

/// Connects to the queues, then runs the request loop and the probe server until ctrl-c or a fatal queue error.
pub async fn run(config: GatewayConfig, telemetry: &TelemetryGuard) -> Result<(), GatewayError> {
    let metrics = Arc::new(BrokerMetrics::new(
        &telemetry.meter(METRIC_METER_NAME_GATEWAY),
        METRIC_NAME_GATEWAY_REQUESTS_PROCESSED,
        &config.requests_queue,
    ));

    let sqs = sqs_client(&config.queue).await;
    let client = Arc::new(
        BrokerClient::<BankingRequest>::connect_sqs(sqs, &config.requests_queue, &config.responses_queue, &config.queue)
            .await?
            .with_metrics(metrics),
    );

    let handler: Arc<dyn MessageHandler<BankingRequest>> =
        Arc::new(QueryBankingInstitution::new(Arc::new(BankA::new(config.start_from_year)), client.publisher()));

    let router = probe_routes(ProbeState::new(vec![client.health()], telemetry.registry())).layer(TraceLayer::new_for_http());
    let listener = TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    info!("Banking gateway listening on port {}", config.http_port);

    let shutdown = CancellationToken::new();

    let server = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await })
    };

    let mut receive_loop = {
        let client = client.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { client.consumer().run(handler, shutdown).await })
    };

    let finished = tokio::select! {
        res = &mut receive_loop => Some(res),
        _ = signal::ctrl_c() => {
            info!("CTRL + C received, shutting down");
            None
        }
    };

    shutdown.cancel();
    let loop_result = match finished {
        Some(res) => res,
        None => receive_loop.await,
    }
    .map_err(|e| GatewayError::Task(e.to_string()))?;

    if !client.consumer().drain(config.shutdown_grace).await {
        warn!("Shutting down with banking requests still in flight");
    }

    server.await.map_err(|e| GatewayError::Task(e.to_string()))??;

    loop_result.map_err(|e| {
        error!("Banking request loop stopped: {e}");
        e.into()
    })
}
