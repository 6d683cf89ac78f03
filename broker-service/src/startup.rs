//! Application startup and lifecycle management.

use crate::config::{FeatureToggles, Settings};
use crate::handlers::{self, broker};
use crate::services::{
    Broker, CourseAuthenticator, CourseCatalogClient, EnrollmentProxy, ServiceRegistry,
};
use crate::AppState;
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

pub fn build_router(state: AppState, settings: &Settings) -> Router {
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(settings.server.secure_cookie)
        // The catalog submits the broker form from another site
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(
            settings.server.session_inactivity_minutes,
        )));

    let api = Router::new()
        .route("/broker", post(broker::broker_request))
        .route("/features", get(broker::features))
        .route("/offering", get(broker::offering))
        .route("/start", post(broker::start))
        .route("/service-registry", get(broker::service_registry));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
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
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Load the service registry named in `settings` and build the application.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let registry = ServiceRegistry::load(&settings.broker.service_registry_path)?;
        Self::build_with_registry(settings, registry).await
    }

    pub async fn build_with_registry(
        settings: Settings,
        registry: ServiceRegistry,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.http.timeout())
            .build()?;

        let registry = Arc::new(registry);
        let authenticator = CourseAuthenticator::new(client.clone(), settings.oauth2.clone());
        let broker = Broker::new(
            registry.clone(),
            CourseCatalogClient::new(client.clone(), authenticator),
            EnrollmentProxy::new(client),
            settings.broker.allow_playground,
        );

        if settings.broker.allow_playground {
            tracing::warn!("Playground mode enabled: /api/start echoes requests carrying a code");
        }

        let state = AppState {
            broker: Arc::new(broker),
            registry,
            features: Arc::new(FeatureToggles::from(&settings.broker)),
            client_url: settings.broker.client_url.clone(),
        };

        let address = format!("{}:{}", settings.server.host, settings.server.port);
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
        })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router: build_router(state, &settings),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!("Starting broker-service on port {}", self.port);
        axum::serve(self.listener, self.router).await.map_err(|e| {
            tracing::error!("Server error: {}", e);
            anyhow::anyhow!("Server error: {}", e)
        })
    }
}
