use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jobfit::analysis::JobFitAnalyzer;
use jobfit::config::{Config, EngineSettings, GatewaySettings, Mode};
use jobfit::gateway::cache::{CacheStore, MemoryCacheStore, RedisCacheStore};
use jobfit::gateway::gemini::GeminiBackend;
use jobfit::gateway::{CancellationToken, CapabilityBackend, GatewayClient, ModelCatalog};

/// Cached gateway responses expire after a week.
const CACHE_TTL_SECS: u64 = 7 * 24 * 3600;

/// Scores a candidate profile against a job description.
#[derive(Debug, Parser)]
#[command(name = "jobfit", version, about)]
struct Args {
    /// Plain-text job description.
    job: PathBuf,

    /// Plain-text candidate profile (CV).
    cv: PathBuf,

    /// Analysis mode; overrides ANALYSIS_MODE.
    #[arg(long)]
    mode: Option<Mode>,

    /// Print compact JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting jobfit v{}", env!("CARGO_PKG_VERSION"));

    let job_text = tokio::fs::read_to_string(&args.job)
        .await
        .with_context(|| format!("failed to read job description {}", args.job.display()))?;
    let cv_text = tokio::fs::read_to_string(&args.cv)
        .await
        .with_context(|| format!("failed to read candidate profile {}", args.cv.display()))?;

    let backend: Option<Arc<dyn CapabilityBackend>> = match &config.gemini_api_key {
        Some(key) => {
            let gemini = GeminiBackend::new(key.clone(), config.gemini_base_url.clone())
                .context("failed to build Gemini HTTP client")?;
            info!("Gemini backend initialized ({})", config.gemini_base_url);
            Some(Arc::new(gemini))
        }
        None => {
            warn!("GEMINI_API_KEY not set; analysis will run degraded");
            None
        }
    };

    let cache = build_cache(&config).await;

    let gateway = GatewayClient::new(
        backend,
        ModelCatalog::default(),
        cache,
        GatewaySettings {
            min_interval: config.rate_limit_min_interval,
            ..GatewaySettings::default()
        },
    );

    let analyzer = JobFitAnalyzer::new(Arc::new(gateway), EngineSettings::default())?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing with what has been fetched");
            on_interrupt.cancel();
        }
    });

    let mode = args.mode.unwrap_or(config.mode);
    let result = analyzer.analyze(&job_text, &cv_text, mode, cancel).await;
    info!(
        "Analysis {} finished: {:.1}% ({:?}){}",
        result.run_id,
        result.overall_score,
        result.fit_level,
        if result.degraded { " [degraded]" } else { "" }
    );

    let output = if args.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{output}");

    Ok(())
}

/// Redis when configured and reachable, else an in-process cache.
async fn build_cache(config: &Config) -> Arc<dyn CacheStore> {
    if let Some(url) = &config.redis_url {
        match RedisCacheStore::connect(url, Some(CACHE_TTL_SECS)).await {
            Ok(store) => {
                info!("Redis cache initialized");
                return Arc::new(store);
            }
            Err(e) => warn!(error = %e, "Redis unavailable; using in-memory cache"),
        }
    }
    Arc::new(MemoryCacheStore::new())
}
