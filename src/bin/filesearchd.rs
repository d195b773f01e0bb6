//! filesearchd: file search HTTP daemon.
//!
//! Serves [`FileSearchService`](filesearch::FileSearchService) over HTTP with
//! validation, rate limiting and Prometheus metrics.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use filesearch::metrics::{self as fs_metrics, HostSampler, SysinfoSampler};
use filesearch::server::config::{Config, Secrets};
use filesearch::server::{AppState, router};
use filesearch::{FileSearchError, FileSearchService, GeminiClient, MemoryProvider, SearchProvider};

/// filesearchd: validated, instrumented document search service.
#[derive(Parser)]
#[command(name = "filesearchd")]
#[command(version = filesearch::PKG_VERSION)]
#[command(about = "File search HTTP daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Host to bind, overriding the configured address.
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to bind, overriding the configured address.
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .init();

    let Some(provider) = build_provider(&config, &secrets)? else {
        eprintln!("Error: GEMINI_API_KEY or GOOGLE_API_KEY must be set");
        std::process::exit(1);
    };

    let service = FileSearchService::builder(provider)
        .upload_policy(config.uploads.policy())
        .retry(config.retry.clone())
        .cache(config.cache.clone())
        .build();

    let exporter = fs_metrics::install()?;
    let sampler: Arc<dyn HostSampler> = Arc::new(SysinfoSampler::new());
    spawn_metrics_upkeep(
        exporter,
        sampler.clone(),
        config.metrics.sample_interval(),
        config.metrics.sample_timeout(),
    );

    let address = config.bind_address(args.host.as_deref(), args.port);
    let addr: SocketAddr = address
        .parse()
        .map_err(|e| FileSearchError::Configuration(format!("Invalid address {address}: {e}")))?;

    let state = AppState::new(Arc::new(service), config).with_sampler(sampler);
    let provider_name = state.service.provider_name().to_string();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        version = filesearch::version_string(),
        %addr,
        provider = %provider_name,
        "filesearchd starting"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("filesearchd stopped");
    Ok(())
}

/// Gemini when a key is available, the in-memory provider when offline mode
/// is allowed, otherwise `None`.
fn build_provider(
    config: &Config,
    secrets: &Secrets,
) -> Result<Option<Arc<dyn SearchProvider>>, FileSearchError> {
    let provider = &config.provider;
    if let Some(key) = secrets.api_key() {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(provider.timeout_secs.max(1)))
            .build()
            .map_err(|e| FileSearchError::Configuration(format!("failed to build HTTP client: {e}")))?;
        let client = GeminiClient::with_base_url(key, &provider.base_url)?
            .with_http_client(http)
            .with_default_model(&provider.default_model)
            .with_polling(Duration::from_millis(provider.poll_interval_ms), provider.max_polls);
        return Ok(Some(Arc::new(client)));
    }

    if provider.allow_offline {
        warn!("no API key configured, serving from the in-memory provider");
        return Ok(Some(Arc::new(MemoryProvider::new())));
    }

    Ok(None)
}

/// Periodic exporter upkeep and host gauge refresh.
fn spawn_metrics_upkeep(
    exporter: &'static fs_metrics::MetricsExporter,
    sampler: Arc<dyn HostSampler>,
    interval: Duration,
    timeout: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            exporter.run_upkeep();
            fs_metrics::refresh_system_metrics(sampler.clone(), timeout).await;
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
