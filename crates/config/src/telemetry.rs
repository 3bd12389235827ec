use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use clap::Parser;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use opentelemetry::KeyValue;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::{Resource, logs::SdkLoggerProvider};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// Export timeout of the remote log exporter.
const OTLP_EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Logging and metrics options.
#[derive(Debug, Clone, Parser)]
pub struct TelemetryOpts {
    /// Use ANSI colors in stdout logs. Turn off when logs are collected by a file or an
    /// aggregator.
    #[clap(long = "telemetry.use-ansi", env = "SURGE_TELEMETRY_USE_ANSI", default_value_t = true)]
    pub use_ansi: bool,
    /// The log filter directives used when `RUST_LOG` is not set.
    #[clap(long = "telemetry.log-filter", env = "SURGE_LOG_FILTER", default_value = "info")]
    pub log_filter: String,
    /// The OTLP/HTTP logs endpoint remote logs are exported to.
    #[clap(
        long = "telemetry.otlp-endpoint",
        env = "SURGE_OTLP_LOGS_ENDPOINT",
        default_value = "https://api.axiom.co/v1/logs"
    )]
    pub otlp_endpoint: Url,
    /// Bearer token of the remote logs endpoint. Remote logs are off without it.
    #[clap(long = "telemetry.otlp-token", env = "AXIOM_TOKEN")]
    pub otlp_token: Option<String>,
    /// Dataset the remote logs are written to.
    #[clap(long = "telemetry.otlp-dataset", env = "AXIOM_DATASET")]
    pub otlp_dataset: Option<String>,
    /// The address the Prometheus exporter binds to.
    #[clap(long = "metrics.addr", env = "SURGE_METRICS_ADDR", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub metrics_addr: IpAddr,
    /// The port of the Prometheus exporter.
    #[clap(long = "metrics.port", env = "SURGE_METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,
    /// Turn off metrics collection.
    #[clap(long = "metrics.disable", env = "SURGE_DISABLE_METRICS", default_value_t = false)]
    pub disable_metrics: bool,
}

/// Keeps the remote log exporter alive until the node stops.
#[derive(Debug, Default)]
pub struct LogProvider(Option<SdkLoggerProvider>);

impl LogProvider {
    /// Flushes pending remote logs and stops the exporter. No-op without remote logs.
    pub fn shutdown(&self) {
        let Some(provider) = &self.0 else { return };
        if let Err(e) = provider.shutdown() {
            eprintln!("Failed to flush remote logs: {e}");
        }
    }
}

impl TelemetryOpts {
    /// Installs the global tracing subscriber and the Prometheus exporter.
    ///
    /// Logs always go to stdout. They are also exported over OTLP if a token is configured.
    pub fn setup(&self, instance_name: &str) -> Result<LogProvider, BuildError> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_filter));
        let registry = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_ansi(self.use_ansi));

        let remote = self.remote_log_provider(instance_name);
        match &remote {
            Some(provider) => {
                registry.with(OpenTelemetryTracingBridge::new(provider)).init();
                info!(endpoint = %self.otlp_endpoint, "📡 Remote logging enabled");
            }
            None => registry.init(),
        }

        if self.disable_metrics {
            warn!("Metrics collection disabled");
        } else {
            let addr = self.metrics_socket();
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .add_global_label("instance", instance_name)
                .install()?;
            info!(%addr, "📊 Metrics exporter listening");
        }

        Ok(LogProvider(remote))
    }

    /// The socket the Prometheus exporter listens on.
    pub const fn metrics_socket(&self) -> SocketAddr {
        SocketAddr::new(self.metrics_addr, self.metrics_port)
    }

    /// The headers sent with every remote log export, or `None` if remote logs are off.
    fn otlp_headers(&self) -> Option<HashMap<String, String>> {
        let token = self.otlp_token.as_ref()?;

        let mut headers = HashMap::from([("Authorization".to_owned(), format!("Bearer {token}"))]);
        if let Some(dataset) = &self.otlp_dataset {
            headers.insert("X-Axiom-Dataset".to_owned(), dataset.clone());
        }

        Some(headers)
    }

    fn remote_log_provider(&self, instance_name: &str) -> Option<SdkLoggerProvider> {
        let headers = self.otlp_headers()?;

        let exporter = LogExporter::builder()
            .with_http()
            .with_headers(headers)
            .with_endpoint(self.otlp_endpoint.as_str())
            .with_timeout(OTLP_EXPORT_TIMEOUT)
            .build()
            // Tracing is not installed yet.
            .inspect_err(|e| eprintln!("Remote logging disabled, exporter build failed: {e}"))
            .ok()?;

        let resource =
            Resource::builder().with_attribute(KeyValue::new("service.name", instance_name.to_owned())).build();

        Some(SdkLoggerProvider::builder().with_batch_exporter(exporter).with_resource(resource).build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> TelemetryOpts {
        TelemetryOpts::try_parse_from(std::iter::once("surge").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn remote_logs_need_a_token() {
        let opts = parse(&["--telemetry.otlp-dataset", "surge"]);
        assert!(opts.otlp_headers().is_none());

        let opts = parse(&["--telemetry.otlp-token", "secret", "--telemetry.otlp-dataset", "surge"]);
        let headers = opts.otlp_headers().unwrap();
        assert_eq!(headers["Authorization"], "Bearer secret");
        assert_eq!(headers["X-Axiom-Dataset"], "surge");

        let opts = parse(&["--telemetry.otlp-token", "secret"]);
        assert_eq!(opts.otlp_headers().unwrap().len(), 1);
    }

    #[test]
    fn metrics_socket() {
        let opts = parse(&["--metrics.addr", "127.0.0.1", "--metrics.port", "9100"]);
        assert_eq!(opts.metrics_socket(), "127.0.0.1:9100".parse::<SocketAddr>().unwrap());
    }
}
