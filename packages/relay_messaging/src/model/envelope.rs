use relay_common_utils::otel::propagated_context::PropagatedSpanContextData;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::errors::BrokerError;

/// A JSON message body exchanged through a queue.
pub trait Envelope: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Rejects bodies that deserialised but carry nothing usable.
    fn validate(&self) -> Result<(), BrokerError>;

    fn trace_carrier(&self) -> PropagatedSpanContextData;

    fn set_trace_carrier(&mut self, carrier: PropagatedSpanContextData);

    fn correlation_id(&self) -> Option<&str>;

    fn from_body(body: &str) -> Result<Self, BrokerError> {
        let envelope: Self = serde_json::from_str(body)
            .map_err(|e| BrokerError::parse(format!("Unknown message format, cannot parse json: {e}"), Some(body.to_owned())))?;

        envelope.validate().map_err(|e| BrokerError {
            data: Some(body.to_owned()),
            ..e
        })?;

        Ok(envelope)
    }

    fn to_body(&self) -> Result<String, BrokerError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Only string entries can be part of a W3C carrier. Anything else is ignored.
pub(crate) fn carrier_from_json(tracing_information: &Map<String, Value>) -> PropagatedSpanContextData {
    let data = tracing_information
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|v| (k.to_owned(), v.to_owned())))
        .collect();

    PropagatedSpanContextData::new_with_data(data)
}

pub(crate) fn merge_carrier(tracing_information: &mut Map<String, Value>, carrier: PropagatedSpanContextData) {
    for (k, v) in carrier.get_data() {
        tracing_information.insert(k, Value::String(v));
    }
}
