pub mod bank_a;

use async_trait::async_trait;
use relay_messaging::model::{BankingRequest, YearlyScores};
use thiserror::Error as ThisError;

pub use bank_a::BankA;

#[derive(Debug, Clone, Eq, PartialEq, ThisError)]
#[error("Banking provider error institution={institution} reason={reason}")]
pub struct ProviderError {
    pub institution: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankingCredentials {
    pub username: String,
    pub password: String,
}

impl From<&BankingRequest> for BankingCredentials {
    fn from(request: &BankingRequest) -> Self {
        Self {
            username: request.credential("username").unwrap_or_default().to_owned(),
            password: request.credential("password").unwrap_or_default().to_owned(),
        }
    }
}

// Integration with a banking institution returning monthly transaction scores per year.
#[async_trait]
pub trait BankingInfoProvider: Send + Sync {
    async fn query(&self, credentials: &BankingCredentials) -> Result<YearlyScores, ProviderError>;
}
