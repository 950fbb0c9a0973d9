use async_trait::async_trait;
use relay_messaging::errors::BrokerError;

mod aggregate;
mod forward_banking_request;
mod publish_forwarded_score;
mod user_banking_score;

pub use aggregate::{aggregate_scores, credit_score_envelope};
pub use forward_banking_request::ForwardBankingRequest;
pub use publish_forwarded_score::PublishForwardedScore;
pub use user_banking_score::UserBankingScore;

/// Produces the credit score of one user at one banking institution.
#[async_trait]
pub trait ScoreCalculator: Send + Sync {
    async fn calculate(&self, user_id: &str, banking_institution_id: &str) -> Result<f64, BrokerError>;
}

#[async_trait]
impl ScoreCalculator for UserBankingScore {
    async fn calculate(&self, user_id: &str, banking_institution_id: &str) -> Result<f64, BrokerError> {
        UserBankingScore::calculate(self, user_id, banking_institution_id).await
    }
}
