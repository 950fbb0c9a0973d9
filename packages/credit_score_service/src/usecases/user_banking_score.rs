use std::{sync::Arc, time::Duration};

use relay_messaging::{
    errors::BrokerError,
    metrics::BrokerMetrics,
    model::{BankingRequest, BankingScores, ResponseEnvelope},
    ports::MessagePublisher,
    services::{BrokerClient, BrokerPublisher},
};
use tracing::{info, instrument, warn};

use super::{aggregate_scores, credit_score_envelope};

/// Asks the banking gateway for a user's scores and waits for the answer.
pub struct UserBankingScore {
    banking: Arc<BrokerClient<ResponseEnvelope>>,
    score_publisher: BrokerPublisher,
    metrics: Arc<BrokerMetrics>,
    timeout: Duration,
}

impl UserBankingScore {
    pub fn new(
        banking: Arc<BrokerClient<ResponseEnvelope>>,
        score_publisher: BrokerPublisher,
        metrics: Arc<BrokerMetrics>,
        timeout: Duration,
    ) -> Self {
        Self {
            banking,
            score_publisher,
            metrics,
            timeout,
        }
    }

    #[instrument(name = "calculate_score", skip(self))]
    pub async fn calculate(&self, user_id: &str, banking_institution_id: &str) -> Result<f64, BrokerError> {
        let mut request = BankingRequest::new(user_id, banking_institution_id).awaited();
        request.span = "calculateScore".into();
        let correlation_id = request.correlation_id.clone().unwrap_or_default();

        self.banking.publisher().publish(request).await?;
        info!("Banking request {correlation_id} sent, waiting for the scores");

        let response = self.banking.consumer().await_response(&correlation_id, self.timeout).await?;
        self.metrics.increment_processed();

        let scores: BankingScores = response.view()?;
        let score = aggregate_scores(&scores.scores);
        info!("Score for user {user_id} is {score}");

        self.publish_score(&scores, score).await;
        Ok(score)
    }

    /// The caller already has its answer, so a failure here is only logged.
    async fn publish_score(&self, scores: &BankingScores, score: f64) {
        let published = match credit_score_envelope(scores, score) {
            Ok(envelope) => self.score_publisher.publish(envelope).await,
            Err(e) => Err(e),
        };
        if let Err(e) = published {
            warn!("Couldn't publish credit score on {}: {e}", self.score_publisher.queue_name());
        }
    }
}
