//! HTTP server: shared state, router, and serve loop.

use axum::extract::State;
use axum::response::Json;
use axum::routing::{delete, get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::domain::ports::{
    GroupRepository, IntegrationRepository, MembershipRepository, ServiceRepository,
    TokenVerifier, UserRepository,
};
use crate::infrastructure::identity::IdentityStore;
use crate::services::{
    AccessControl, EscalationService, IncidentService, IngestPipeline, RoutingService,
    ScheduleService,
};

use super::error::ApiError;
use super::{groups, incidents, integrations, policies, schedules, services, webhooks};

/// Everything the handlers need.
pub struct AppState {
    pub incidents: Arc<IncidentService>,
    pub schedules: Arc<ScheduleService>,
    pub escalations: Arc<EscalationService>,
    pub routing: Arc<RoutingService>,
    pub ingest: Arc<IngestPipeline>,
    pub access: Arc<AccessControl>,
    pub groups: Arc<dyn GroupRepository>,
    pub services: Arc<dyn ServiceRepository>,
    pub integrations: Arc<dyn IntegrationRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub users: Arc<dyn UserRepository>,
    pub identity: Arc<IdentityStore>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080, enable_cors: true }
    }
}

pub struct HttpServer {
    config: HttpServerConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    pub fn new(state: Arc<AppState>, config: HttpServerConfig) -> Self {
        Self { config, state }
    }

    pub fn build_router(state: Arc<AppState>, enable_cors: bool) -> Router {
        let app = Router::new()
            // Ingestion
            .route("/webhook/{integration_type}/{integration_id}", post(webhooks::ingest))
            // Incidents
            .route("/incidents", get(incidents::list).post(incidents::create))
            .route("/incidents/stats", get(incidents::stats))
            .route("/incidents/{id}", get(incidents::get_one))
            .route("/incidents/{id}/acknowledge", post(incidents::acknowledge))
            .route("/incidents/{id}/resolve", post(incidents::resolve))
            .route("/incidents/{id}/assign", post(incidents::assign))
            .route("/incidents/{id}/escalate", post(incidents::escalate))
            .route("/incidents/{id}/note", post(incidents::note))
            .route("/incidents/{id}/events", get(incidents::events))
            // Groups + membership
            .route("/groups", get(groups::list).post(groups::create))
            .route(
                "/groups/{id}",
                get(groups::get_one).put(groups::update).delete(groups::remove),
            )
            .route("/groups/{id}/members", post(groups::add_member))
            .route("/groups/{id}/members/{user_id}", delete(groups::remove_member))
            // Services + integration links
            .route("/services", get(services::list).post(services::create))
            .route(
                "/services/{id}",
                get(services::get_one).put(services::update).delete(services::remove),
            )
            .route("/services/{id}/integrations", post(services::link_integration))
            .route(
                "/services/{id}/integrations/{integration_id}",
                delete(services::unlink_integration),
            )
            // Scheduling
            .route("/schedulers", get(schedules::list).post(schedules::create))
            .route("/schedulers/{id}", get(schedules::get_one).delete(schedules::remove))
            .route(
                "/schedulers/{id}/shifts",
                get(schedules::list_shifts).put(schedules::replace_shifts),
            )
            .route("/shifts/{id}/override", post(schedules::create_override))
            .route("/overrides/{id}", delete(schedules::remove_override))
            .route("/on-call", get(schedules::on_call))
            // Escalation policies
            .route("/escalation-policies", get(policies::list).post(policies::create))
            .route(
                "/escalation-policies/{id}",
                get(policies::get_one).delete(policies::remove),
            )
            .route("/escalation-policies/{id}/levels", put(policies::replace_levels))
            // Integrations
            .route("/integrations", get(integrations::list).post(integrations::create))
            .route(
                "/integrations/{id}",
                get(integrations::get_one).put(integrations::update).delete(integrations::remove),
            )
            .route("/integrations/{id}/health", get(integrations::health))
            .route("/integrations/{id}/heartbeat", post(integrations::heartbeat))
            // Identity + liveness
            .route("/identity/public-key", get(public_key))
            .route("/identity/sign", post(sign))
            .route("/health", get(health_check))
            .with_state(state);

        if enable_cors {
            app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(TraceLayer::new_for_http())
        } else {
            app.layer(TraceLayer::new_for_http())
        }
    }

    /// Start the server with a shutdown signal.
    pub async fn serve_with_shutdown<F>(
        self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let router = Self::build_router(self.state, self.config.enable_cors);

        tracing::info!("HTTP server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

// Handler functions

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
struct PublicKeyResponse {
    public_key_pem: String,
    algorithm: &'static str,
}

async fn public_key(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let pem = state
        .identity
        .public_key_pem()
        .await
        .map_err(|e| ApiError::from(crate::domain::errors::CoreError::DependencyFailed(e.to_string())))?;
    Ok(Json(PublicKeyResponse { public_key_pem: pem, algorithm: "ECDSA_P256_SHA256" }))
}

#[derive(Debug, Deserialize)]
struct SignRequest {
    payload: String,
}

#[derive(Debug, Serialize)]
struct SignResponse {
    /// Hex-encoded raw R||S signature.
    signature: String,
}

async fn sign(
    State(state): State<Arc<AppState>>,
    _auth: super::auth::AuthContext,
    Json(request): Json<SignRequest>,
) -> Result<Json<SignResponse>, ApiError> {
    let signature = state
        .identity
        .sign(request.payload.as_bytes())
        .await
        .map_err(|e| ApiError::from(crate::domain::errors::CoreError::DependencyFailed(e.to_string())))?;
    Ok(Json(SignResponse { signature }))
}
