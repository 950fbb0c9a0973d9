use std::collections::HashMap;

use relay_common_utils::otel::propagated_context::PropagatedSpanContextData;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::BrokerError;

use super::envelope::{carrier_from_json, merge_carrier, Envelope};

/// Prefix of correlation ids whose response is claimed by an in-process waiter rather than a receive loop.
pub const AWAITED_CORRELATION_PREFIX: &str = "awaited-";

/// Whether a response with this correlation id belongs to a synchronous waiter.
pub fn is_awaited(correlation_id: Option<&str>) -> bool {
    correlation_id.is_some_and(|id| id.starts_with(AWAITED_CORRELATION_PREFIX))
}

/// Request for the monthly scores of one user at one banking institution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankingRequest {
    pub user_id: String,
    pub banking_institution_id: String,
    #[serde(default)]
    pub banking_credentials: HashMap<String, String>,
    /// Legacy span name, informational only.
    #[serde(default)]
    pub span: String,
    #[serde(default)]
    pub tracing_information: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl BankingRequest {
    pub fn new(user_id: impl Into<String>, banking_institution_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            banking_institution_id: banking_institution_id.into(),
            ..Default::default()
        }
    }

    /// Tags the request with a fresh correlation id so its response can be claimed.
    pub fn correlated(mut self) -> Self {
        self.correlation_id = Some(uuid::Uuid::new_v4().to_string());
        self
    }

    /// Like [`BankingRequest::correlated`], tagged so receive loops leave the response to the waiter.
    pub fn awaited(mut self) -> Self {
        self.correlation_id = Some(format!("{AWAITED_CORRELATION_PREFIX}{}", uuid::Uuid::new_v4()));
        self
    }

    pub fn credential(&self, key: &str) -> Option<&str> {
        self.banking_credentials.get(key).map(|v| v.as_str())
    }
}

impl Envelope for BankingRequest {
    fn validate(&self) -> Result<(), BrokerError> {
        if *self == BankingRequest::default() {
            return Err(BrokerError::parse("Banking request carries no data", None));
        }
        Ok(())
    }

    fn trace_carrier(&self) -> PropagatedSpanContextData {
        carrier_from_json(&self.tracing_information)
    }

    fn set_trace_carrier(&mut self, carrier: PropagatedSpanContextData) {
        merge_carrier(&mut self.tracing_information, carrier);
    }

    fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }
}
