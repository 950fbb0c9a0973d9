use std::sync::Arc;

use relay_common_utils::otel::{
    initialiser::TelemetryGuard,
    metric_constants::{METRIC_METER_NAME_CREDIT_SCORE, METRIC_NAME_BANKING_REQUESTS_PROCESSED, METRIC_NAME_CREDIT_SCORE_REQUESTS_PROCESSED},
};
use relay_messaging::{
    errors::BrokerError,
    metrics::BrokerMetrics,
    model::{BankingRequest, ResponseEnvelope},
    ports::MessageHandler,
    probes::{probe_routes, ProbeState},
    queue::sqs_client,
    services::BrokerClient,
};
use tokio::{net::TcpListener, signal, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{
    config::CreditScoreConfig,
    errors::CreditScoreError,
    http::score_routes,
    usecases::{ForwardBankingRequest, PublishForwardedScore, ScoreCalculator, UserBankingScore},
};

/// Runs both receive loops and the HTTP server until ctrl-c or a fatal queue error.
///
/// Two clients are connected: one for the credit score hop (requests in, scores out) and one for the banking hop
/// (banking requests out, banking responses in). The banking responses loop turns answers to forwarded requests into
/// credit scores, while `/score` waits for its own answers on the same queue.
pub async fn run(config: CreditScoreConfig, telemetry: &TelemetryGuard) -> Result<(), CreditScoreError> {
    let meter = telemetry.meter(METRIC_METER_NAME_CREDIT_SCORE);
    let credit_score_metrics = Arc::new(BrokerMetrics::new(
        &meter,
        METRIC_NAME_CREDIT_SCORE_REQUESTS_PROCESSED,
        &config.credit_score_requests_queue,
    ));
    let banking_metrics = Arc::new(BrokerMetrics::new(&meter, METRIC_NAME_BANKING_REQUESTS_PROCESSED, &config.banking_responses_queue));

    let sqs = sqs_client(&config.queue).await;
    let credit_score_client = Arc::new(
        BrokerClient::<BankingRequest>::connect_sqs(
            sqs.clone(),
            &config.credit_score_requests_queue,
            &config.credit_score_responses_queue,
            &config.queue,
        )
        .await?
        .with_metrics(credit_score_metrics),
    );
    let banking_client = Arc::new(
        BrokerClient::<ResponseEnvelope>::connect_sqs(sqs, &config.banking_responses_queue, &config.banking_requests_queue, &config.queue)
            .await?
            .with_metrics(banking_metrics.clone()),
    );

    let forward: Arc<dyn MessageHandler<BankingRequest>> = Arc::new(ForwardBankingRequest::new(banking_client.publisher()));
    let publish_scores: Arc<dyn MessageHandler<ResponseEnvelope>> = Arc::new(PublishForwardedScore::new(credit_score_client.publisher()));
    let calculator: Arc<dyn ScoreCalculator> = Arc::new(UserBankingScore::new(
        banking_client.clone(),
        credit_score_client.publisher(),
        banking_metrics,
        config.score_response_timeout,
    ));

    let probes = ProbeState::new(vec![credit_score_client.health(), banking_client.health()], telemetry.registry());
    let router = probe_routes(probes).merge(score_routes(calculator)).layer(TraceLayer::new_for_http());
    let listener = TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    info!("Credit score service listening on port {}", config.http_port);

    let shutdown = CancellationToken::new();

    let server = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await })
    };

    let forward_loop = {
        let client = credit_score_client.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { client.consumer().run(forward, shutdown).await })
    };
    let score_loop = {
        let client = banking_client.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { client.consumer().run(publish_scores, shutdown).await })
    };

    // Ends at the first loop failure, or once both loops stopped after shutdown.
    let loops = async { tokio::try_join!(supervise(forward_loop), supervise(score_loop)).map(|_| ()) };
    tokio::pin!(loops);

    let finished = tokio::select! {
        res = &mut loops => Some(res),
        _ = signal::ctrl_c() => {
            info!("CTRL + C received, shutting down");
            None
        }
    };

    shutdown.cancel();
    let loop_result = match finished {
        Some(res) => res,
        None => loops.await,
    };

    if !credit_score_client.consumer().drain(config.shutdown_grace).await {
        warn!("Shutting down with credit score requests still in flight");
    }
    if !banking_client.consumer().drain(config.shutdown_grace).await {
        warn!("Shutting down with banking responses still in flight");
    }

    server.await.map_err(|e| CreditScoreError::Task(e.to_string()))??;

    loop_result.inspect_err(|e| error!("Receive loop stopped: {e}"))
}

async fn supervise(receive_loop: JoinHandle<Result<(), BrokerError>>) -> Result<(), CreditScoreError> {
    receive_loop.await.map_err(|e| CreditScoreError::Task(e.to_string()))??;
    Ok(())
}
