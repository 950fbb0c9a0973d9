use async_trait::async_trait;
use relay_messaging::{
    errors::HandlerError,
    model::{is_awaited, BankingScores, Envelope, ResponseEnvelope},
    ports::{MessageHandler, MessagePublisher},
};
use tracing::{info, instrument};

use super::{aggregate_scores, credit_score_envelope};

/// Turns banking responses to forwarded requests into credit scores on the score responses queue.
///
/// Responses awaited by `/score` are not claimed, so the receive loop hands them back to their waiter.
pub struct PublishForwardedScore<Pub> {
    score_publisher: Pub,
}

impl<Pub: MessagePublisher<ResponseEnvelope>> PublishForwardedScore<Pub> {
    pub fn new(score_publisher: Pub) -> Self {
        Self { score_publisher }
    }
}

#[async_trait]
impl<Pub: MessagePublisher<ResponseEnvelope>> MessageHandler<ResponseEnvelope> for PublishForwardedScore<Pub> {
    fn claims(&self, response: &ResponseEnvelope) -> bool {
        !is_awaited(response.correlation_id())
    }

    #[instrument(name = "publish_credit_score", skip_all, fields(correlation_id = ?response.correlation_id()))]
    async fn handle(&self, response: ResponseEnvelope) -> Result<(), HandlerError> {
        // A response without scores is left on the queue like any other unprocessable message.
        let scores: BankingScores = response.view()?;
        let score = aggregate_scores(&scores.scores);

        self.score_publisher.publish(credit_score_envelope(&scores, score)?).await?;

        info!("Score for user {} is {score}", scores.user_id);
        Ok(())
    }
}
