//! # Aksharad
//!
//! Transliteration daemon. Run with:
//! `aksharad --config config.toml` or plain `aksharad` for defaults.
//! Scheme definitions are loaded from `{config_dir}/schemes/*.toml`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn, Level};

use akshara_core::config::DaemonConfig;
use akshara_engine::MemoryEngine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let args: Vec<String> = std::env::args().collect();

    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let mut config = match &config_path {
        Some(path) => DaemonConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => DaemonConfig::default(),
    };

    if let Some(address) = args
        .iter()
        .position(|a| a == "--address")
        .and_then(|i| args.get(i + 1))
    {
        config.address = address.clone();
    }
    config.normalize();

    std::fs::create_dir_all(&config.config_dir)
        .with_context(|| format!("cannot create {}", config.config_dir.display()))?;
    let schemes_dir = config.schemes_dir();
    std::fs::create_dir_all(&schemes_dir)?;

    let engine = MemoryEngine::load(&schemes_dir)
        .with_context(|| format!("failed to load schemes from {}", schemes_dir.display()))?;
    if engine.is_empty() {
        warn!(
            "no scheme definitions found under {}; the daemon will serve an empty scheme list",
            schemes_dir.display()
        );
    }

    let app = akshara_api::build(config.clone(), Arc::new(engine))
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    if app.sync.has_enabled_schemes() {
        app.sync.start();
    }

    info!("starting aksharad {} on {}", akshara_core::VERSION, config.address);
    info!("state directory: {}", config.config_dir.display());

    let router = akshara_api::router(app);

    if config.enable_ssl {
        let (cert, key) = match (&config.cert_file_path, &config.key_file_path) {
            (Some(cert), Some(key)) => (cert.clone(), key.clone()),
            _ => anyhow::bail!("SSL enabled but certificate paths are missing"),
        };

        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
            .await
            .context("failed to load TLS key material")?;
        let addr = config.address.parse().context("invalid listen address")?;

        axum_server::bind_rustls(addr, tls)
            .serve(router.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(&config.address)
            .await
            .with_context(|| format!("cannot bind {}", config.address))?;
        axum::serve(listener, router).await?;
    }

    Ok(())
}
