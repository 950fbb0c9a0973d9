use std::collections::HashMap;

use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const TRACE_PARENT_KEY: &str = "traceparent";

/// Flat string carrier for a W3C trace context, embeddable into a JSON payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagatedSpanContextData {
    data: HashMap<String, String>,
}

impl PropagatedSpanContextData {
    pub fn new_with_trace_parent(trace_parent: String) -> Self {
        Self::new_with_data(HashMap::from([(String::from(TRACE_PARENT_KEY), trace_parent)]))
    }

    pub fn new_with_data(data: HashMap<String, String>) -> Self {
        Self { data }
    }

    pub fn get_data(self) -> HashMap<String, String> {
        self.data
    }

    pub fn get_trace_parent(&self) -> Option<&str> {
        self.data.get(TRACE_PARENT_KEY).map(|v| v.as_str())
    }

    pub fn new_with_otel_context(otel_context: &Context) -> Self {
        let mut ctx_data = PropagatedSpanContextData::default();
        TraceContextPropagator::new().inject_context(otel_context, &mut ctx_data);
        ctx_data
    }

    /// Carrier for the context of the span the caller is currently in.
    ///
    /// Empty when the current span is not exported to OTEL (no tracing layer, or disabled span).
    pub fn from_current_span() -> Self {
        Self::new_with_otel_context(&tracing::Span::current().context())
    }

    /// Rebuilds the remote context. `None` when the carrier holds no usable `traceparent`.
    pub fn extract_context(&self) -> Option<Context> {
        self.get_trace_parent()?;

        let context = TraceContextPropagator::new().extract_with_context(&Context::new(), self);
        if context.span().span_context().is_valid() {
            Some(context)
        } else {
            None
        }
    }

    /// Parents `span` on the carried context.
    ///
    /// Falls back to leaving the span unparented when the carrier is missing or malformed. Returns whether a parent was attached.
    pub fn attach_parent(&self, span: &tracing::Span) -> bool {
        match self.extract_context() {
            Some(context) => {
                span.set_parent(context);
                true
            }
            None => {
                tracing::warn!(
                    trace_parent = self.get_trace_parent().unwrap_or("<missing>"),
                    "No valid trace context in message, continuing with an unparented span"
                );
                false
            }
        }
    }
}

impl Injector for PropagatedSpanContextData {
    fn set(&mut self, key: &str, value: String) {
        self.data.insert(key.to_owned(), value);
    }
}

impl Extractor for PropagatedSpanContextData {
    fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(|v| v.as_ref())
    }

    fn keys(&self) -> Vec<&str> {
        self.data.keys().map(|k| k.as_ref()).collect()
    }
}

/// Encode `context` into a flat carrier map.
pub fn inject(context: &Context) -> HashMap<String, String> {
    PropagatedSpanContextData::new_with_otel_context(context).get_data()
}

/// Decode a carrier map. Malformed or missing input gives an empty (unparented) context.
pub fn extract(carrier: &HashMap<String, String>) -> Context {
    PropagatedSpanContextData::new_with_data(carrier.clone())
        .extract_context()
        .unwrap_or_else(Context::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};

    const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
    const SPAN_ID: &str = "00f067aa0ba902b7";

    fn remote_context() -> Context {
        let span_context = SpanContext::new(
            TraceId::from_hex(TRACE_ID).unwrap(),
            SpanId::from_hex(SPAN_ID).unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        Context::new().with_remote_span_context(span_context)
    }

    #[test]
    fn test_inject_writes_traceparent() {
        let carrier = inject(&remote_context());

        assert_eq!(
            carrier.get(TRACE_PARENT_KEY).map(|v| v.as_str()),
            Some(format!("00-{TRACE_ID}-{SPAN_ID}-01").as_str())
        );
    }

    #[test]
    fn test_inject_then_extract_keeps_trace_id() {
        let carrier = inject(&remote_context());
        let context = extract(&carrier);

        let span_context = context.span().span_context().clone();
        assert!(span_context.is_valid());
        assert!(span_context.is_remote());
        assert_eq!(span_context.trace_id(), TraceId::from_hex(TRACE_ID).unwrap());
        assert_eq!(span_context.span_id(), SpanId::from_hex(SPAN_ID).unwrap());
    }

    #[test]
    fn test_inject_without_active_span_is_empty() {
        let carrier = inject(&Context::new());
        assert!(carrier.get(TRACE_PARENT_KEY).is_none());
    }

    #[test]
    fn test_extract_missing_traceparent_is_unparented() {
        let context = extract(&HashMap::new());
        assert!(!context.span().span_context().is_valid());

        assert!(PropagatedSpanContextData::default().extract_context().is_none());
    }

    #[test]
    fn test_extract_malformed_traceparent_is_unparented() {
        let data = PropagatedSpanContextData::new_with_trace_parent("not-a-trace-parent".to_string());
        assert!(data.extract_context().is_none());

        let context = extract(&data.get_data());
        assert!(!context.span().span_context().is_valid());
    }

    #[test]
    fn test_attach_parent_falls_back_without_panicking() {
        let span = tracing::info_span!("test_span");
        let attached = PropagatedSpanContextData::new_with_trace_parent("garbage".to_string()).attach_parent(&span);
        assert!(!attached);
    }
}
