use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use strum::Display;
use thiserror::Error as ThisError;
use tracing::subscriber::{set_global_default, SetGlobalDefaultError};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Debug, Default)]
pub struct TelemetryConfig {
    /// Service name reported on spans and log lines.
    pub name: String,
    pub enable_tracing: bool,
    /// The endpoint to OTEL collector
    pub grpc_endpoint: Option<String>,
    /// Log filter used when `RUST_LOG` is not set.
    pub default_level: String,
}

/// Owns the tracer and meter providers for the lifetime of the process.
///
/// Built once in `main` and handed to whoever needs a meter or the metrics registry.
/// Call [`TelemetryGuard::shutdown`] before exiting so batched spans are flushed.
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: SdkMeterProvider,
    registry: Registry,
}

impl TelemetryGuard {
    pub fn meter(&self, name: &'static str) -> Meter {
        self.meter_provider.meter(name)
    }

    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    pub fn shutdown(self) {
        if let Some(tracer_provider) = self.tracer_provider {
            if let Err(error) = tracer_provider.shutdown() {
                tracing::error!("Error shutting down tracer provider: {error:?}");
            }
        }
        if let Err(error) = self.meter_provider.shutdown() {
            tracing::error!("Error shutting down meter provider: {error:?}");
        }
    }
}

/// Render everything registered in `registry` in the Prometheus text exposition format.
pub fn encode_metrics(registry: &Registry) -> Result<String, OtelInitError> {
    let mut buffer = vec![];
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .map_err(|error| OtelInitError {
            kind: InitErrorType::MetricError,
            reason: "Unable to encode metrics".into(),
            cause: Some(error.to_string()),
        })?;

    String::from_utf8(buffer).map_err(|error| OtelInitError {
        kind: InitErrorType::MetricError,
        reason: "Encoded metrics are not UTF8".into(),
        cause: Some(error.to_string()),
    })
}

pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, OtelInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.default_level.as_str()));
    let registry = Registry::new();

    let layer_fmt = fmt::Layer::new().json();

    if !config.enable_tracing {
        // setup only logging
        let subscriber = tracing_subscriber::registry().with(layer_fmt).with(env_filter);
        set_global_default(subscriber).map_err(OtelInitError::from_global_subscriber_error)?;

        let meter_provider = build_meter_provider(&registry, None)?;
        tracing::info!("Logging initialised, tracing disabled");

        return Ok(TelemetryGuard {
            tracer_provider: None,
            meter_provider,
            registry,
        });
    }

    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let tracer_provider = if let Some(grpc_endpoint) = config.grpc_endpoint.clone() {
        let otel_exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(grpc_endpoint)
            .with_protocol(opentelemetry_otlp::Protocol::Grpc)
            .build()
            .map_err(|error| OtelInitError::from_exporter_error(error.to_string()))?;

        let otlp_trace_provider = SdkTracerProvider::builder().with_batch_exporter(otel_exporter).build();

        let otlp_layer = tracing_opentelemetry::layer().with_tracer(otlp_trace_provider.tracer(config.name.clone()));
        let subscriber = tracing_subscriber::registry().with(layer_fmt).with(env_filter).with(otlp_layer);

        set_global_default(subscriber).map_err(OtelInitError::from_global_subscriber_error)?;
        Some(otlp_trace_provider)
    } else {
        // No collector: spans still get ids so the trace context keeps flowing through the queues.
        let local_trace_provider = SdkTracerProvider::builder().build();
        let otel_layer = tracing_opentelemetry::layer().with_tracer(local_trace_provider.tracer(config.name.clone()));

        let layer_fmt = BunyanFormattingLayer::new(config.name.clone(), std::io::stdout);
        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(otel_layer)
            .with(JsonStorageLayer)
            .with(layer_fmt);

        set_global_default(subscriber).map_err(OtelInitError::from_global_subscriber_error)?;
        Some(local_trace_provider)
    };

    let meter_provider = build_meter_provider(&registry, config.grpc_endpoint)?;

    tracing::info!("OTEL logging, tracing and metrics initialised");

    Ok(TelemetryGuard {
        tracer_provider,
        meter_provider,
        registry,
    })
}

fn build_meter_provider(registry: &Registry, grpc_endpoint: Option<String>) -> Result<SdkMeterProvider, OtelInitError> {
    let prometheus_exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()
        .map_err(|metric_error| OtelInitError {
            kind: InitErrorType::MetricError,
            reason: "Unable to initialise prometheus exporter".into(),
            cause: Some(format!("{:?}", metric_error)),
        })?;

    let mut builder = SdkMeterProvider::builder().with_reader(prometheus_exporter);

    if let Some(grpc_endpoint) = grpc_endpoint {
        let otel_exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(grpc_endpoint)
            .with_protocol(opentelemetry_otlp::Protocol::Grpc)
            .build()
            .map_err(|metric_error| OtelInitError {
                kind: InitErrorType::MetricError,
                reason: "Unable to initialise metrics exporter".into(),
                cause: Some(format!("{:?}", metric_error)),
            })?;

        builder = builder.with_periodic_exporter(otel_exporter);
        tracing::info!("OTEL metrics exporter initialised");
    }

    Ok(builder.build())
}

#[derive(Debug, ThisError)]
#[error("Error initialising OTEL telemetry: '{kind}'.\nReason: {reason}\nCause: {cause:?}")]
pub struct OtelInitError {
    pub kind: InitErrorType,
    pub reason: String,
    pub cause: Option<String>,
}

impl OtelInitError {
    pub fn from_global_subscriber_error(cause: SetGlobalDefaultError) -> Self {
        OtelInitError {
            kind: InitErrorType::GlobalSubscriberError,
            reason: "Unable to set subscriber into global OTEL registry".into(),
            cause: Some(cause.to_string()),
        }
    }

    pub fn from_exporter_error(cause: String) -> Self {
        OtelInitError {
            kind: InitErrorType::SpanExporter,
            reason: "Unable to initialise OTEL exporter".into(),
            cause: Some(cause),
        }
    }
}

#[derive(Debug, Display, PartialEq, Clone)]
pub enum InitErrorType {
    GlobalSubscriberError,
    MetricError,
    SpanExporter,
}
