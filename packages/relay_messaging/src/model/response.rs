use std::collections::BTreeMap;

use relay_common_utils::otel::propagated_context::PropagatedSpanContextData;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::BrokerError;

use super::envelope::{carrier_from_json, merge_carrier, Envelope};

const TRACING_INFORMATION_KEY: &str = "tracingInformation";
const CORRELATION_ID_KEY: &str = "correlationId";

/// month name -> score
pub type MonthlyScores = BTreeMap<String, i64>;
/// year -> scores for each month of that year
pub type YearlyScores = BTreeMap<String, MonthlyScores>;

/// Free-form response body. Read it through one of the typed views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl ResponseEnvelope {
    pub fn from_view<T: Serialize>(view: &T) -> Result<Self, BrokerError> {
        match serde_json::to_value(view)? {
            Value::Object(data) => Ok(Self { data }),
            other => Err(BrokerError::parse("Response data must be a JSON object", Some(other.to_string()))),
        }
    }

    /// Typed read of `data`. Missing keys or wrong types are a parse error.
    pub fn view<T: DeserializeOwned>(&self) -> Result<T, BrokerError> {
        serde_json::from_value(Value::Object(self.data.clone()))
            .map_err(|e| BrokerError::parse(format!("Unexpected response data: {e}"), Some(Value::Object(self.data.clone()).to_string())))
    }
}

impl Envelope for ResponseEnvelope {
    fn validate(&self) -> Result<(), BrokerError> {
        if self.data.is_empty() {
            return Err(BrokerError::parse("Response carries no data", None));
        }
        Ok(())
    }

    fn trace_carrier(&self) -> PropagatedSpanContextData {
        match self.data.get(TRACING_INFORMATION_KEY) {
            Some(Value::Object(tracing_information)) => carrier_from_json(tracing_information),
            _ => PropagatedSpanContextData::default(),
        }
    }

    fn set_trace_carrier(&mut self, carrier: PropagatedSpanContextData) {
        let entry = self.data.entry(TRACING_INFORMATION_KEY).or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(tracing_information) = entry {
            merge_carrier(tracing_information, carrier);
        }
    }

    fn correlation_id(&self) -> Option<&str> {
        self.data.get(CORRELATION_ID_KEY).and_then(|v| v.as_str())
    }
}

/// Gateway -> credit score service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankingScores {
    pub user_id: String,
    pub banking_institution_id: String,
    #[serde(default)]
    pub tracing_information: Map<String, Value>,
    pub scores: YearlyScores,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Credit score service -> caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditScore {
    pub score: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub tracing_information: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}
