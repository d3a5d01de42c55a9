//! Log subscriber and optional OTLP trace export.
//!
//! Spans are exported only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set. Auth
//! diagnostics use the `bn88::auth::debug` target, so they can be isolated
//! with `RUST_LOG=bn88::auth::debug=info`.

use anyhow::{Context, Result, anyhow};
use base64ct::{Base64, Encoding};
use once_cell::sync::OnceCell;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{SdkTracerProvider, Tracer},
};
use std::{env::var, time::Duration};
use tonic::{
    metadata::{Ascii, Binary, MetadataKey, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};
use ulid::Ulid;

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";
const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// `k1=v1,k2=v2` as found in `OTEL_EXPORTER_OTLP_HEADERS`. Pairs without `=` are skipped.
fn parse_header_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Build gRPC metadata. Keys ending in `-bin` carry base64 values.
fn metadata_from_pairs(pairs: &[(String, String)]) -> Result<MetadataMap> {
    let mut metadata = MetadataMap::with_capacity(pairs.len());

    for (key, value) in pairs {
        let key = key.to_ascii_lowercase();

        if key.ends_with("-bin") {
            let bytes = Base64::decode_vec(value)
                .map_err(|e| anyhow!("failed to base64-decode value for key {key}: {e}"))?;
            let name = MetadataKey::<Binary>::from_bytes(key.as_bytes())
                .map_err(|e| anyhow!("invalid binary metadata key {key}: {e}"))?;
            metadata.insert_bin(name, MetadataValue::from_bytes(&bytes));
        } else {
            let name = MetadataKey::<Ascii>::from_bytes(key.as_bytes())
                .map_err(|e| anyhow!("invalid ASCII metadata key {key}: {e}"))?;
            let value: MetadataValue<Ascii> = value
                .parse()
                .map_err(|e| anyhow!("invalid ASCII metadata value for key {key}: {e}"))?;
            metadata.insert(name, value);
        }
    }

    Ok(metadata)
}

/// gRPC endpoints without a scheme default to https.
fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint.trim_end_matches('/'))
    }
}

fn tls_domain(endpoint: &str) -> Option<&str> {
    endpoint
        .strip_prefix("https://")
        .and_then(|rest| rest.split('/').next())
        .and_then(|authority| authority.split(':').next())
        .filter(|host| !host.is_empty())
}

fn init_tracer() -> Result<Tracer> {
    if let Ok(protocol) = var("OTEL_EXPORTER_OTLP_PROTOCOL")
        && protocol != "grpc"
    {
        debug!("OTEL_EXPORTER_OTLP_PROTOCOL='{protocol}' ignored: only 'grpc' is supported");
    }

    let endpoint = normalize_endpoint(
        &var("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or_else(|_| DEFAULT_OTLP_ENDPOINT.to_string()),
    );

    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoint)
        .with_compression(Compression::Gzip)
        .with_timeout(EXPORT_TIMEOUT);

    if let Some(domain) = tls_domain(&endpoint) {
        builder = builder.with_tls_config(
            ClientTlsConfig::new()
                .domain_name(domain.to_string())
                .with_native_roots(),
        );
    }

    if let Ok(raw) = var("OTEL_EXPORTER_OTLP_HEADERS") {
        let pairs = parse_header_pairs(&raw);
        if !pairs.is_empty() {
            builder = builder.with_metadata(metadata_from_pairs(&pairs)?);
        }
    }

    let exporter = builder.build().context("failed to build OTLP span exporter")?;

    let instance_id = var("OTEL_SERVICE_INSTANCE_ID").unwrap_or_else(|_| Ulid::new().to_string());

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder_empty()
                .with_attributes(vec![
                    KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    KeyValue::new("service.instance.id", instance_id),
                ])
                .build(),
        )
        .build();

    let _ = TRACER_PROVIDER.set(provider.clone());

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    Ok(provider.tracer(env!("CARGO_PKG_NAME")))
}

/// Install the global subscriber.
///
/// `RUST_LOG` directives are added on top of `verbosity_level` (default `ERROR`).
///
/// # Errors
///
/// Returns an error if the exporter or the subscriber cannot be installed.
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let verbosity_level = verbosity_level.unwrap_or(Level::ERROR);

    let fmt_layer = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(true)
        .pretty();

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?);

    if var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let otel_layer = tracing_opentelemetry::layer().with_tracer(init_tracer()?);
        let subscriber = Registry::default()
            .with(fmt_layer)
            .with(otel_layer)
            .with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(fmt_layer).with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

/// Flush pending spans; noop when export was never enabled.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        debug!("shutting down tracer provider");
        if let Err(err) = provider.shutdown() {
            debug!("tracer provider shutdown failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_pairs_skip_malformed_entries() {
        assert!(parse_header_pairs("").is_empty());
        let pairs = parse_header_pairs("k1 = v1 ,broken, k2=v=2");
        assert_eq!(
            pairs,
            vec![
                ("k1".to_string(), "v1".to_string()),
                ("k2".to_string(), "v=2".to_string())
            ]
        );
    }

    #[test]
    fn metadata_accepts_ascii_and_binary() -> Result<()> {
        let pairs = vec![
            ("Authorization".to_string(), "Bearer abc".to_string()),
            ("trace-bin".to_string(), "YmluYXJ5IGRhdGE=".to_string()),
        ];
        let metadata = metadata_from_pairs(&pairs)?;
        assert_eq!(metadata.len(), 2);
        assert!(metadata.get("authorization").is_some());
        Ok(())
    }

    #[test]
    fn metadata_rejects_bad_base64() {
        let pairs = vec![("trace-bin".to_string(), "not base64!!".to_string())];
        let result = metadata_from_pairs(&pairs);
        assert!(
            result
                .err()
                .is_some_and(|err| err.to_string().contains("failed to base64-decode"))
        );
    }

    #[test]
    fn endpoints_default_to_https() {
        assert_eq!(normalize_endpoint("http://collector:4317"), "http://collector:4317");
        assert_eq!(normalize_endpoint("collector:4317/"), "https://collector:4317");
        assert_eq!(
            normalize_endpoint("https://otel.bn88.dev/v1/traces"),
            "https://otel.bn88.dev/v1/traces"
        );
    }

    #[test]
    fn tls_domain_only_for_https() {
        assert_eq!(tls_domain("https://otel.bn88.dev:4317/x"), Some("otel.bn88.dev"));
        assert_eq!(tls_domain("http://localhost:4317"), None);
    }

    #[test]
    fn shutdown_without_provider_is_noop() {
        shutdown_tracer();
    }
}
