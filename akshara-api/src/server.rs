//! # Server Assembly
//!
//! Builds the shared application state and the axum router. The state is
//! one `App` value threaded through every handler; there are no globals.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use akshara_core::config::DaemonConfig;
use akshara_core::error::{Error, Result};
use akshara_core::metrics::Metrics;
use akshara_core::traits::Engine;
use akshara_core::types::SchemeDetails;
use akshara_engine::{CorpusPageCache, HandlePool, Mutations, ResponseCache};
use akshara_sync::{PackManager, SyncDispatcher, SyncPaths, UpstreamClient};

use crate::auth;
use crate::handlers;

/// Response cache capacity, in entries. Transliteration answers are tiny,
/// so this is generous.
const RESPONSE_CACHE_ENTRIES: usize = 100_000;

/// Corpus page cache capacity, in pages.
const CORPUS_CACHE_ENTRIES: usize = 4096;

/// Shared application state.
pub struct App {
    pub config: DaemonConfig,
    pub schemes: Vec<SchemeDetails>,
    pub pool: Arc<HandlePool>,
    pub mutations: Mutations,
    pub cache: ResponseCache,
    pub corpus: CorpusPageCache,
    pub packs: PackManager,
    pub sync: SyncDispatcher,
    pub metrics: Metrics,
    pub started_at: Instant,
}

pub type SharedApp = Arc<App>;

impl App {
    pub fn scheme_details(&self, scheme: &str) -> Result<&SchemeDetails> {
        self.schemes
            .iter()
            .find(|s| s.identifier == scheme)
            .ok_or_else(|| Error::bad_request("invalid scheme id"))
    }
}

/// Wire the engine into pools, workers, caches, sync and packs.
/// Must run inside a tokio runtime: the workers spawn here.
pub fn build(config: DaemonConfig, engine: Arc<dyn Engine>) -> Result<SharedApp> {
    let metrics = Metrics::new();

    let schemes = engine.scheme_details();
    let pool = Arc::new(HandlePool::new(engine.clone(), &config, metrics.clone())?);
    let mutations = Mutations::start(&engine, metrics.clone())?;

    let cache = ResponseCache::new(RESPONSE_CACHE_ENTRIES);
    let corpus = CorpusPageCache::new(CORPUS_CACHE_ENTRIES, metrics.clone());

    let upstream = UpstreamClient::new(config.upstream.clone())?;
    let packs = PackManager::new(config.packs_dir(), upstream.clone());

    let mut enabled = HashSet::new();
    for scheme in config.download_schemes() {
        if !pool.is_valid_scheme(&scheme) {
            return Err(Error::Configuration {
                message: format!("{} is not a supported scheme", scheme),
            });
        }
        enabled.insert(scheme);
    }

    let sync = SyncDispatcher::new(
        pool.clone(),
        upstream,
        SyncPaths::new(&config.config_dir),
        config.sync_interval(),
        enabled,
        metrics.clone(),
    );

    Ok(Arc::new(App {
        config,
        schemes,
        pool,
        mutations,
        cache,
        corpus,
        packs,
        sync,
        metrics,
        started_at: Instant::now(),
    }))
}

/// Build the full route table. Admin routes are only mounted when the
/// internal API is enabled, and the learn/train/delete family sits behind
/// basic auth.
pub fn router(app: SharedApp) -> Router {
    let mut router = Router::new()
        .route("/tl/:scheme/:word", get(handlers::transliterate))
        .route("/rtl/:scheme/:word", get(handlers::reverse_transliterate))
        .route("/atl/:scheme/:word", get(handlers::transliterate_advanced))
        .route("/languages", get(handlers::languages))
        .route("/languages/:scheme/download", get(handlers::language_download))
        .route("/meta/:scheme", get(handlers::corpus_meta))
        .route("/download/:scheme/:offset", get(handlers::corpus_download))
        .route("/schemes/:scheme", get(handlers::scheme_info))
        .route("/schemes/:scheme/definitions", get(handlers::scheme_definitions))
        .route("/schemes/:scheme/definitions/:letter", get(handlers::scheme_letter_definitions))
        .route("/packs", get(handlers::packs))
        .route("/packs/:lang", get(handlers::packs_for_lang))
        .route("/packs/:lang/:pack", get(handlers::pack_info))
        .route("/packs/:lang/:pack/:page", get(handlers::pack_page_info))
        .route("/packs/:lang/:pack/:page/download", get(handlers::pack_page_download))
        .route("/status", get(handlers::status));

    if app.config.enable_internal_api {
        let admin = Router::new()
            .route("/learn", post(handlers::learn))
            .route("/learn/upload/:scheme", post(handlers::learn_upload))
            .route("/train/:scheme", post(handlers::train))
            .route("/train/bulk/:scheme", post(handlers::train_bulk))
            .route("/delete", post(handlers::delete_word))
            .route_layer(middleware::from_fn_with_state(app.clone(), auth::basic_auth));

        let internal = Router::new()
            .route("/sync/download/:scheme/enable", post(handlers::enable_download))
            .route("/sync/download/:scheme/disable", post(handlers::disable_download))
            .route("/packs/download", post(handlers::pack_download_request));

        router = router.merge(admin).merge(internal);
    }

    router
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app)
}
