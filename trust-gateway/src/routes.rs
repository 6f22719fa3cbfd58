//! Axum route handlers for the trust gateway API.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use trust_core::{AgentId, Registration, TrustTier};
use trust_engine::{ActionRecord, MemoryStore, TrustEngine};

use crate::{auth::require_api_key, error::GatewayError};

// ── Shared state ─────────────────────────────────────────────────────────────

/// The engine type served by the gateway.
pub type Engine = TrustEngine<MemoryStore>;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub api_key: Arc<str>,
}

impl AppState {
    #[must_use]
    pub fn new(engine: Arc<Engine>, api_key: &str) -> Self {
        Self { engine, api_key: Arc::from(api_key) }
    }
}

// ── Request / response types ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ConfigReport {
    pub config_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeBody {
    pub agent_id: AgentId,
    pub action: String,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct BatchAuthorizeBody {
    pub agent_id: AgentId,
    pub actions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenBody {
    pub agent_id: AgentId,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyTokenBody {
    pub token: String,
}

/// Liveness payload.
#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the application router. Every route but `/health` requires the API key.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/agents/register", post(register_agent))
        .route("/agents/{id}", get(get_agent))
        .route("/agents/{id}/trust", get(trust_breakdown))
        .route("/agents/{id}/card", get(agent_card))
        .route("/agents/{id}/history", get(trust_history))
        .route("/agents/{id}/config", put(report_config))
        .route("/actions/record", post(record_action))
        .route("/authorize", post(authorize))
        .route("/authorize/batch", post(authorize_batch))
        .route("/tokens", post(issue_token))
        .route("/tokens/verify", post(verify_token))
        .route("/tiers", get(list_tiers))
        .route("/tiers/{tier}", put(update_tier))
        .route("/receipts/{agent_id}", get(list_receipts))
        .route("/receipts/{agent_id}/verify", get(verify_chain))
        .route("/stats", get(stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// `GET /health`: liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(Health { status: "ok", service: "trust-gateway", version: env!("CARGO_PKG_VERSION") })
}

/// `POST /agents/register`: register an agent and return it with initial scores.
///
/// # Errors
/// Returns 400 for malformed identity facts.
pub async fn register_agent(
    State(state): State<AppState>,
    Json(body): Json<Registration>,
) -> Result<impl IntoResponse, GatewayError> {
    let agent = state.engine.register(body).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

/// `GET /agents/{id}`
///
/// # Errors
/// Returns 404 for an unknown agent.
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.engine.agent(id).await?))
}

/// `GET /agents/{id}/trust`: sub-scores, factors and weights.
///
/// # Errors
/// Returns 404 for an unknown agent.
pub async fn trust_breakdown(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.engine.trust_breakdown(id).await?))
}

/// `GET /agents/{id}/card`
///
/// # Errors
/// Returns 404 for an unknown agent.
pub async fn agent_card(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.engine.agent_card(id).await?))
}

/// `GET /agents/{id}/history?limit=N`
///
/// # Errors
/// Returns 404 for an unknown agent.
pub async fn trust_history(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.engine.trust_history(id, query.limit).await?))
}

/// `PUT /agents/{id}/config`: report the agent's current config fingerprint.
///
/// # Errors
/// Returns 404 for an unknown agent or 400 for an empty fingerprint.
pub async fn report_config(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
    Json(body): Json<ConfigReport>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.engine.report_config(id, &body.config_hash).await?))
}

/// `POST /actions/record`: append a signed receipt.
///
/// # Errors
/// Returns 404 for an unknown agent or 400 for a rejected action or timestamp.
pub async fn record_action(
    State(state): State<AppState>,
    Json(body): Json<ActionRecord>,
) -> Result<impl IntoResponse, GatewayError> {
    let receipt = state.engine.record_action(body).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// `POST /authorize`
///
/// # Errors
/// Returns 404 for an unknown agent. A denial is a 200 with `allowed: false`.
pub async fn authorize(
    State(state): State<AppState>,
    Json(body): Json<AuthorizeBody>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.engine.authorize(body.agent_id, &body.action, body.context).await?))
}

/// `POST /authorize/batch`
///
/// # Errors
/// Returns 404 for an unknown agent.
pub async fn authorize_batch(
    State(state): State<AppState>,
    Json(body): Json<BatchAuthorizeBody>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.engine.authorize_batch(body.agent_id, &body.actions).await?))
}

/// `POST /tokens`: issue a capability token.
///
/// # Errors
/// Returns 404 for an unknown agent or 400 for a zero lifetime.
pub async fn issue_token(
    State(state): State<AppState>,
    Json(body): Json<TokenBody>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.engine.issue_token(body.agent_id, body.expires_in).await?))
}

/// `POST /tokens/verify`: decode a capability token.
///
/// # Errors
/// Returns 401 for an expired, forged or malformed token.
pub async fn verify_token(
    State(state): State<AppState>,
    Json(body): Json<VerifyTokenBody>,
) -> Result<impl IntoResponse, GatewayError> {
    match state.engine.verify_token(&body.token) {
        Ok(claims) => Ok(Json(claims)),
        Err(e) => {
            tracing::warn!(error = %e, "capability token rejected");
            Err(e.into())
        }
    }
}

/// `GET /tiers`
///
/// # Errors
/// Returns 500 if the store fails.
pub async fn list_tiers(State(state): State<AppState>) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.engine.tiers().await?))
}

/// `PUT /tiers/{tier}`: replace one tier definition.
///
/// # Errors
/// Returns 404 for an unknown tier or 400 if the resulting table is malformed.
pub async fn update_tier(
    State(state): State<AppState>,
    Path(tier): Path<u32>,
    Json(body): Json<TrustTier>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.engine.update_tier(tier, body).await?))
}

/// `GET /receipts/{agent_id}`: receipts, newest first.
///
/// # Errors
/// Returns 404 for an unknown agent.
pub async fn list_receipts(
    State(state): State<AppState>,
    Path(agent_id): Path<AgentId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.engine.receipts(agent_id).await?))
}

/// `GET /receipts/{agent_id}/verify`: walk the receipt chain.
///
/// # Errors
/// Returns 404 for an unknown agent, 409 for a broken link and 401 for a
/// forged signature.
pub async fn verify_chain(
    State(state): State<AppState>,
    Path(agent_id): Path<AgentId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.engine.verify_chain(agent_id).await?))
}

/// `GET /stats`
///
/// # Errors
/// Returns 500 if the store fails.
pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.engine.stats().await?))
}
