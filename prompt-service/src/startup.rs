//! Application startup and lifecycle management.
//!
//! Wires the configured record stores and text provider into one
//! [`RequestHandler`] per variant and serves them over HTTP.

use crate::config::{PromptConfig, ProviderKind, StorageBackend};
use crate::handlers;
use crate::models::Variant;
use crate::services::metrics::http_metrics_middleware;
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::mock::MockTextProvider;
use crate::services::providers::{GenerationParams, TextProvider};
use crate::services::{Database, InMemoryRecordStore, RecordStore, RequestHandler};
use axum::{
    http::{header, HeaderValue, Method, Request},
    middleware::from_fn,
    routing::get,
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub generate: RequestHandler,
    pub explain: RequestHandler,
}

impl AppState {
    /// Build both handlers from per-variant stores and one shared provider.
    pub fn new(
        generate_store: Arc<dyn RecordStore>,
        explain_store: Arc<dyn RecordStore>,
        provider: Arc<dyn TextProvider>,
        params: GenerationParams,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            generate: RequestHandler::new(
                Variant::Generate,
                generate_store,
                provider.clone(),
                params.clone(),
                timeout,
            ),
            explain: RequestHandler::new(Variant::Explain, explain_store, provider, params, timeout),
        }
    }
}

/// Build the HTTP router with all routes and middleware.
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route(
            "/generate",
            get(handlers::list_generations).post(handlers::generate),
        )
        .route("/generate/:id", get(handlers::get_generation))
        .route(
            "/explain",
            get(handlers::list_explanations).post(handlers::explain),
        )
        .route("/explain/:id", get(handlers::get_explanation))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .with_state(state)
        .layer(from_fn(http_metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(allowed_origins))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins = allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                    None
                }
            })
            .collect::<Vec<_>>();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static(REQUEST_ID_HEADER)])
        .expose_headers([header::HeaderName::from_static(
            handlers::generation::RECORD_ID_HEADER,
        )])
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: PromptConfig) -> Result<Self, AppError> {
        let (generate_store, explain_store) = build_stores(&config).await?;
        let provider = build_provider(&config)?;

        tracing::info!(
            provider = provider.name(),
            model = provider.model(),
            "Initialized text provider"
        );

        let params = GenerationParams {
            temperature: config.genai.temperature,
            max_tokens: config.genai.max_output_tokens,
        };
        let state = AppState::new(
            generate_store,
            explain_store,
            provider,
            params,
            config.genai.request_timeout,
        );
        let router = build_router(state, &config.security.allowed_origins);

        // Port 0 picks a random port, used by tests
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port, environment = %config.environment, "Prompt service listening");

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until SIGINT or SIGTERM, then drain in-flight requests.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Service shutdown complete");
        Ok(())
    }
}

async fn build_stores(
    config: &PromptConfig,
) -> Result<(Arc<dyn RecordStore>, Arc<dyn RecordStore>), AppError> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            let database_url = config.storage.database_url.as_ref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required for postgres"))
            })?;

            let db = Database::new(
                database_url,
                config.storage.max_connections,
                config.storage.min_connections,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to PostgreSQL: {}", e);
                e
            })?;

            db.run_migrations().await.map_err(|e| {
                tracing::error!("Failed to run database migrations: {}", e);
                e
            })?;

            Ok((
                Arc::new(db.record_store(Variant::Generate)),
                Arc::new(db.record_store(Variant::Explain)),
            ))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory record storage; records are lost on restart");
            Ok((
                Arc::new(InMemoryRecordStore::new()),
                Arc::new(InMemoryRecordStore::new()),
            ))
        }
    }
}

fn build_provider(config: &PromptConfig) -> Result<Arc<dyn TextProvider>, AppError> {
    match config.genai.provider {
        ProviderKind::Gemini => {
            let api_key = config.genai.api_key.clone().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("GOOGLE_API_KEY is required for gemini"))
            })?;

            let provider = GeminiTextProvider::new(GeminiConfig {
                api_key,
                model: config.genai.text_model.clone(),
                api_base: config.genai.api_base.clone(),
                timeout: config.genai.request_timeout,
            })
            .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;

            Ok(Arc::new(provider))
        }
        ProviderKind::Mock => Ok(Arc::new(MockTextProvider::echo())),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
