use std::sync::Arc;

use async_trait::async_trait;
use relay_messaging::{
    errors::HandlerError,
    model::{BankingRequest, BankingScores, ResponseEnvelope},
    ports::{MessageHandler, MessagePublisher},
};
use tracing::{info, instrument};

use crate::providers::{BankingCredentials, BankingInfoProvider};

/// Answers a banking request with the scores reported by the provider.
pub struct QueryBankingInstitution<P: ?Sized, Pub> {
    provider: Arc<P>,
    publisher: Pub,
}

impl<P, Pub> QueryBankingInstitution<P, Pub>
where
    P: BankingInfoProvider + ?Sized,
    Pub: MessagePublisher<ResponseEnvelope>,
{
    pub fn new(provider: Arc<P>, publisher: Pub) -> Self {
        Self { provider, publisher }
    }
}

#[async_trait]
impl<P, Pub> MessageHandler<BankingRequest> for QueryBankingInstitution<P, Pub>
where
    P: BankingInfoProvider + ?Sized,
    Pub: MessagePublisher<ResponseEnvelope>,
{
    #[instrument(
        name = "query_banking_institution",
        skip_all,
        fields(user_id = %request.user_id, banking_institution_id = %request.banking_institution_id)
    )]
    async fn handle(&self, request: BankingRequest) -> Result<(), HandlerError> {
        info!("Received banking data request");

        let scores = self
            .provider
            .query(&BankingCredentials::from(&request))
            .await
            .map_err(|e| {
                HandlerError::provider(
                    format!("Error querying bank {}: {}", request.banking_institution_id, e.reason),
                    Some(request.user_id.clone()),
                )
            })?;

        let response = ResponseEnvelope::from_view(&BankingScores {
            user_id: request.user_id,
            banking_institution_id: request.banking_institution_id,
            tracing_information: request.tracing_information,
            scores,
            correlation_id: request.correlation_id,
        })?;

        // A failed send leaves the request on the queue so it is retried.
        self.publisher.publish(response).await?;

        info!("Sent banking data response");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use mockall::mock;
    use relay_messaging::{
        errors::{BrokerError, BrokerErrorKind, HandlerErrorKind, TransportErrorKind},
        model::{Envelope, YearlyScores},
    };

    use super::*;
    use crate::providers::ProviderError;

    mock! {
        Provider {}

        #[async_trait]
        impl BankingInfoProvider for Provider {
            async fn query(&self, credentials: &BankingCredentials) -> Result<YearlyScores, ProviderError>;
        }
    }

    mock! {
        Publisher {}

        #[async_trait]
        impl MessagePublisher<ResponseEnvelope> for Publisher {
            async fn publish(&self, envelope: ResponseEnvelope) -> Result<(), BrokerError>;
        }
    }

    fn scores() -> YearlyScores {
        BTreeMap::from([("2015".to_string(), BTreeMap::from([("January".to_string(), 100)]))])
    }

    fn request() -> BankingRequest {
        let mut request = BankingRequest::new("reus", "bank-a").correlated();
        request.banking_credentials.insert("username".into(), "reus".into());
        request.banking_credentials.insert("password".into(), "secret".into());
        request
            .tracing_information
            .insert("traceparent".into(), "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01".into());
        request
    }

    #[tokio::test]
    async fn test_publishes_scores_with_request_identity() {
        let request = request();
        let correlation_id = request.correlation_id.clone();

        let mut provider = MockProvider::new();
        provider
            .expect_query()
            .withf(|credentials| credentials.username == "reus" && credentials.password == "secret")
            .once()
            .returning(|_| Ok(scores()));

        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .withf(move |envelope| {
                let view: BankingScores = envelope.view().unwrap();
                view.user_id == "reus"
                    && view.banking_institution_id == "bank-a"
                    && view.scores == scores()
                    && envelope.correlation_id() == correlation_id.as_deref()
                    && envelope.trace_carrier().get_trace_parent().is_some()
            })
            .once()
            .returning(|_| Ok(()));

        let usecase = QueryBankingInstitution::new(Arc::new(provider), publisher);
        usecase.handle(request).await.unwrap();
    }

    #[tokio::test]
    async fn test_provider_failure_is_a_handler_error() {
        let mut provider = MockProvider::new();
        provider.expect_query().once().returning(|_| {
            Err(ProviderError {
                institution: "bank-a".into(),
                reason: "maintenance".into(),
            })
        });

        let mut publisher = MockPublisher::new();
        publisher.expect_publish().never();

        let error = QueryBankingInstitution::new(Arc::new(provider), publisher).handle(request()).await.unwrap_err();

        assert_eq!(error.kind, HandlerErrorKind::Provider);
        assert!(error.reason.contains("maintenance"));
    }

    #[tokio::test]
    async fn test_send_failure_is_a_handler_error() {
        let mut provider = MockProvider::new();
        provider.expect_query().once().returning(|_| Ok(scores()));

        let mut publisher = MockPublisher::new();
        publisher.expect_publish().once().returning(|_| {
            Err(BrokerError {
                kind: BrokerErrorKind::Transport(TransportErrorKind::Send),
                reason: "Cannot send sqs message".into(),
                data: None,
            })
        });

        let error = QueryBankingInstitution::new(Arc::new(provider), publisher).handle(request()).await.unwrap_err();

        assert_eq!(error.kind, HandlerErrorKind::Publish);
    }
}
