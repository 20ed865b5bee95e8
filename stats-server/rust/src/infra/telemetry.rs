use std::env;

use anyhow::Result;
use axum::extract::MatchedPath;
use axum::http::Request;
use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Sets up the fmt subscriber, plus an OTLP exporter when an endpoint is configured.
pub(crate) fn init() -> Result<()> {
    let telemetry_layer = match env::var(OTLP_ENDPOINT_VAR) {
        Ok(_) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_env())
                .install_batch(opentelemetry_sdk::runtime::Tokio)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        Err(_) => None,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer();
    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(fmt_layer)
        .with(filter)
        .try_init()?;

    info!(otlp = env::var(OTLP_ENDPOINT_VAR).is_ok(), "telemetry initialized");
    Ok(())
}

pub(crate) fn shutdown() {
    global::shutdown_tracer_provider();
}

type TraceMiddleware<B> = TraceLayer<SharedClassifier<ServerErrorsAsFailures>, fn(&Request<B>) -> Span>;

pub(crate) fn tracing_middleware<B>() -> TraceMiddleware<B> {
    TraceLayer::new_for_http().make_span_with(make_span)
}

fn make_span<B>(request: &Request<B>) -> Span {
    // Static files are served by the router fallback and carry no matched path, so log the raw path too
    let matched_path = request.extensions().get::<MatchedPath>().map(MatchedPath::as_str);

    info_span!(
        "http_request",
        method = ?request.method(),
        matched_path,
        path = request.uri().path(),
    )
}
