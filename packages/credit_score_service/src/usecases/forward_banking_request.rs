use async_trait::async_trait;
use relay_messaging::{
    errors::HandlerError,
    model::{is_awaited, BankingRequest},
    ports::{MessageHandler, MessagePublisher},
};
use tracing::{info, instrument};

/// Relays credit score requests to the banking gateway.
///
/// Every forwarded request carries a correlation id so its response is picked up by [`super::PublishForwardedScore`].
/// An upstream id is kept unless it would be mistaken for one of the ids awaited by `/score`.
pub struct ForwardBankingRequest<Pub> {
    banking_publisher: Pub,
}

impl<Pub: MessagePublisher<BankingRequest>> ForwardBankingRequest<Pub> {
    pub fn new(banking_publisher: Pub) -> Self {
        Self { banking_publisher }
    }
}

#[async_trait]
impl<Pub: MessagePublisher<BankingRequest>> MessageHandler<BankingRequest> for ForwardBankingRequest<Pub> {
    #[instrument(
        name = "calculate_score",
        skip_all,
        fields(user_id = %request.user_id, banking_institution_id = %request.banking_institution_id)
    )]
    async fn handle(&self, mut request: BankingRequest) -> Result<(), HandlerError> {
        info!("Calculate score request received");

        if request.correlation_id.is_none() || is_awaited(request.correlation_id.as_deref()) {
            request = request.correlated();
        }

        self.banking_publisher.publish(request).await?;
        Ok(())
    }
}
