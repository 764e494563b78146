use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, put},
};
use storefront_db_memory::{StorageBackend, StorageOptions, create_storage};
use storefront_storage::{DynStorage, EventedStorage};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::cache::{DynCacheStore, EntityCaches};
use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::invalidation::InvalidationCoordinator;
use crate::{create_cache_store, handlers, middleware as app_middleware};

/// Shared handler state. The cache store is constructed once at startup,
/// injected here, and closed on shutdown.
#[derive(Clone)]
pub struct AppState {
    /// Entity store; writes report to the invalidation coordinator
    pub storage: DynStorage,
    /// Cache-first reads
    pub catalog: Arc<Catalog>,
    pub cache: DynCacheStore,
    pub config: Arc<AppConfig>,
}

/// Builds the application state over the configured cache store.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    let cache = create_cache_store(&cfg.redis, &cfg.cache).await;
    build_state_with_cache(cfg, cache).await
}

/// Builds the application state over an explicit cache store.
pub async fn build_state_with_cache(
    cfg: &AppConfig,
    cache: DynCacheStore,
) -> anyhow::Result<AppState> {
    let storage_config = storefront_db_memory::StorageConfig {
        backend: StorageBackend::InMemory,
        options: StorageOptions {
            seed_demo_data: cfg.storage.seed_demo_data,
        },
    };
    let inner = create_storage(&storage_config).await?;

    let caches = EntityCaches::new(cache.clone(), &cfg.cache);
    let coordinator = Arc::new(InvalidationCoordinator::new(caches.clone()));
    let storage: DynStorage = Arc::new(EventedStorage::new(inner, coordinator));
    let catalog = Arc::new(Catalog::new(storage.clone(), caches));

    tracing::info!(
        storage = storage.backend_name(),
        cache = cache.backend_name(),
        "Application state initialized"
    );

    Ok(AppState {
        storage,
        catalog,
        cache,
        config: Arc::new(cfg.clone()),
    })
}

/// Builds the router over a fresh state for `cfg`.
pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    Ok(router(build_state(cfg).await?))
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let api = Router::new()
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/categories/{slug}",
            get(handlers::get_category)
                .put(handlers::update_category)
                .delete(handlers::delete_category),
        )
        .route(
            "/subcategories",
            get(handlers::list_subcategories).post(handlers::create_subcategory),
        )
        .route(
            "/subcategories/{slug}",
            get(handlers::get_subcategory).delete(handlers::delete_subcategory),
        )
        .route(
            "/product-types",
            get(handlers::list_product_types).post(handlers::create_product_type),
        )
        .route(
            "/product-types/{slug}",
            get(handlers::get_product_type).delete(handlers::delete_product_type),
        )
        .route(
            "/media",
            get(handlers::list_media).post(handlers::create_media),
        )
        .route("/media/{id}", delete(handlers::delete_media))
        .route("/users", axum::routing::post(handlers::create_user))
        .route(
            "/users/{auth_id}",
            get(handlers::get_user).delete(handlers::delete_user),
        )
        .route("/users/{auth_id}/role", put(handlers::update_user_role))
        .route(
            "/users/{auth_id}/addresses",
            get(handlers::list_addresses).post(handlers::create_address),
        )
        .route("/addresses/{id}", delete(handlers::delete_address))
        .route(
            "/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/products/{slug}",
            get(handlers::get_product).delete(handlers::delete_product),
        );

    Router::new()
        // Health and metrics endpoints
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics))
        .nest("/api", api)
        .route_layer(middleware::from_fn(app_middleware::http_metrics))
        // Middleware stack (order: request id -> compression/cors/trace -> body limit)
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub struct StorefrontServer {
    addr: SocketAddr,
    app: Router,
    cache: DynCacheStore,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<StorefrontServer> {
        crate::metrics::init_metrics();
        let state = build_state(&self.config).await?;
        let cache = state.cache.clone();
        Ok(StorefrontServer {
            addr: self.addr,
            app: router(state),
            cache,
        })
    }
}

impl StorefrontServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        self.cache.close().await;
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
