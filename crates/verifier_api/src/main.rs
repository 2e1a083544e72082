//! Bulk Email Verification API Server
//!
//! Deliverability verification over HTTP: syntax, disposable and blacklist
//! classification, cached MX resolution, a non-destructive SMTP probe and
//! risk scoring, batched under per-key daily quotas.

use anyhow::Context;
use axum::Router;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use verifier_core::classifier::{self, DomainClassifier};
use verifier_core::mx::{HickoryMxResolver, MxCache};
use verifier_core::score::ScoreWeights;
use verifier_core::smtp::{LettreProbe, ProbeConfig};
use verifier_core::{BatchLimits, BatchVerifier, Pipeline};

mod api_handler;
mod config;
mod quota_store;
mod routes;

use config::AppConfig;
use quota_store::InMemoryQuotaStore;

/// Shared application state
pub struct AppState {
    pub verifier: Arc<BatchVerifier>,
    pub quota_store: Arc<InMemoryQuotaStore>,
    pub config: Arc<AppConfig>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    init_tracing(&config);

    info!(
        "starting bulk email verification API v{}",
        env!("CARGO_PKG_VERSION")
    );

    let state = build_state(&config)?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host / server.port")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("server listening on {addr}");
    info!("verification API: http://{addr}/api/verify");
    info!("key issuance: http://{addr}/generate-api-key");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shut down gracefully");
    Ok(())
}

/// Assemble the pipeline, quota store and batch verifier from configuration.
fn build_state(config: &AppConfig) -> anyhow::Result<Arc<AppState>> {
    let verification = &config.verification;

    let classifier = match (
        &verification.disposable_list_path,
        &verification.blacklist_path,
    ) {
        (None, None) => DomainClassifier::bundled(),
        (disposable, blacklist) => {
            let disposable = match disposable {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read disposable list {path}"))?,
                None => classifier::BUNDLED_DISPOSABLE_LIST.to_owned(),
            };
            let blacklist = match blacklist {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read blacklist {path}"))?,
                None => classifier::BUNDLED_BLACKLIST.to_owned(),
            };
            DomainClassifier::from_lists(&disposable, &blacklist)
        }
    };

    let resolver = Arc::new(HickoryMxResolver::new(
        verification.dns_timeout_ms,
        verification.dns_attempts,
    ));
    let mx_cache = MxCache::new(resolver, Duration::from_secs(verification.mx_cache_ttl_secs));

    let probe = Arc::new(LettreProbe::new(ProbeConfig {
        transport: verification.smtp_transport,
        timeout: Duration::from_secs(verification.smtp_timeout_secs),
        helo_domain: verification.helo_domain.clone(),
        sender: verification.probe_sender.clone(),
    }));

    let pipeline = Arc::new(Pipeline::new(
        classifier,
        mx_cache,
        probe,
        ScoreWeights {
            smtp_verified: verification.smtp_verified_weight,
            not_blacklisted: verification.not_blacklisted_weight,
        },
        verification.policy,
    ));

    let quota_store = Arc::new(InMemoryQuotaStore::new(
        config.limits.daily_limit,
        config.limits.key_ttl_days,
    ));

    let verifier = Arc::new(BatchVerifier::new(
        pipeline,
        quota_store.clone(),
        BatchLimits {
            max_batch_size: config.limits.max_batch_size,
            chunk_size: config.limits.chunk_size,
            max_concurrency: config.limits.max_concurrency,
            deadline: Duration::from_secs(config.limits.batch_deadline_secs),
        },
    ));

    Ok(Arc::new(AppState {
        verifier,
        quota_store,
        config: Arc::new(config.clone()),
    }))
}

/// Create the main application router with middleware layers.
fn create_router(state: Arc<AppState>) -> Router {
    routes::build_routes(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers(tower_http::cors::Any),
        )
        .layer(CompressionLayer::new())
}

/// Load configuration: defaults, then `Config.toml` if present, then
/// `VERIFIER_`-prefixed environment variables (`__` as section separator,
/// e.g. `VERIFIER_SERVER__PORT=8080`).
fn load_config() -> anyhow::Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if std::path::Path::new("Config.toml").exists() {
        figment = figment.merge(Toml::file("Config.toml"));
    }

    figment = figment.merge(Env::prefixed("VERIFIER_").split("__"));

    figment.extract().context("invalid configuration")
}

/// Initialize tracing and logging.
fn init_tracing(config: &AppConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.observability.log_level.clone().into());

    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Graceful shutdown on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("received SIGTERM, starting graceful shutdown");
        },
    }
}
