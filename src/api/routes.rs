//! JSON-over-HTTP binding of the matchmaking operations
//!
//! The caller is identified by `Authorization: Bearer <session token>`.
//! Every response carries a top-level `success` flag.

use crate::api::error::ApiError;
use crate::identity::IdentityProvider;
use crate::lifecycle::MatchLifecycle;
use crate::matchmaking::Matchmaker;
use crate::types::{ClubId, MatchRequest, MemberId, RoomId};
use anyhow::{Context, Result};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Everything the handlers need
#[derive(Clone)]
pub struct ApiState {
    pub matchmaker: Arc<Matchmaker>,
    pub lifecycle: Arc<MatchLifecycle>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// Success body: the payload's fields next to `"success": true`
#[derive(Debug, Serialize)]
pub struct Success<T> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

impl<T> Success<T> {
    fn new(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBody {
    pub room_id: RoomId,
    pub when: DateTime<Utc>,
    pub location: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeBody {
    pub room_id: RoomId,
    pub my_score: i64,
    pub op_score: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBody {
    pub room_id: RoomId,
    pub accept: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailQuery {
    pub room_id: RoomId,
}

#[derive(Debug, Deserialize)]
pub struct RankingParams {
    pub sport: String,
    pub primary: Option<String>,
    pub secondary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// Resolve the bearer token on a request to a member
async fn authenticate(identity: &dyn IdentityProvider, headers: &HeaderMap) -> std::result::Result<MemberId, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthenticated("No authorization header".to_string()))?
        .to_str()
        .map_err(|_| ApiError::Unauthenticated("Invalid authorization header".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated("Invalid authorization header format".to_string()))?;

    identity
        .authenticate(token)
        .await
        .map_err(|e| ApiError::Unauthenticated(e.public_message()))
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> std::result::Result<T, ApiError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn query<T>(params: std::result::Result<Query<T>, QueryRejection>) -> std::result::Result<T, ApiError> {
    params
        .map(|Query(inner)| inner)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/match/request", post(request_match_handler))
        .route("/api/match/schedule", post(schedule_handler))
        .route("/api/match/result/propose", post(propose_handler))
        .route("/api/match/result/confirm", post(confirm_handler))
        .route("/api/match/detail", get(detail_handler))
        .route("/api/my-matches", get(my_matches_handler))
        .route("/api/ranking", get(ranking_handler))
        .route("/api/clubs/{club_id}/matches/finished", get(finished_handler))
        .with_state(state)
}

async fn request_match_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<MatchRequest>, JsonRejection>,
) -> ApiResult<Success<crate::types::MatchOutcome>> {
    let caller = authenticate(state.identity.as_ref(), &headers).await?;
    let request = body(payload)?;
    debug!("Member {} requests a match for club {}", caller, request.club_id);

    let outcome = state.matchmaker.request_match(&caller, request).await?;
    Ok(Success::new(outcome))
}

async fn schedule_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ScheduleBody>, JsonRejection>,
) -> ApiResult<Success<serde_json::Value>> {
    let caller = authenticate(state.identity.as_ref(), &headers).await?;
    let ScheduleBody {
        room_id,
        when,
        location,
    } = body(payload)?;

    let detail = state
        .lifecycle
        .update_schedule(&caller, &room_id, when, &location)
        .await?;
    Ok(Success::new(json!({ "match": detail })))
}

async fn propose_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ProposeBody>, JsonRejection>,
) -> ApiResult<Success<serde_json::Value>> {
    let caller = authenticate(state.identity.as_ref(), &headers).await?;
    let ProposeBody {
        room_id,
        my_score,
        op_score,
    } = body(payload)?;

    let detail = state
        .lifecycle
        .propose_result(&caller, &room_id, my_score, op_score)
        .await?;
    Ok(Success::new(json!({ "match": detail })))
}

async fn confirm_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ConfirmBody>, JsonRejection>,
) -> ApiResult<Success<crate::lifecycle::ConfirmationOutcome>> {
    let caller = authenticate(state.identity.as_ref(), &headers).await?;
    let ConfirmBody { room_id, accept } = body(payload)?;

    let outcome = state.lifecycle.confirm_result(&caller, &room_id, accept).await?;
    Ok(Success::new(outcome))
}

async fn detail_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    params: std::result::Result<Query<DetailQuery>, QueryRejection>,
) -> ApiResult<Success<serde_json::Value>> {
    let caller = authenticate(state.identity.as_ref(), &headers).await?;
    let DetailQuery { room_id } = query(params)?;

    let detail = state.lifecycle.match_detail(&caller, &room_id).await?;
    Ok(Success::new(json!({ "match": detail })))
}

async fn my_matches_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Success<serde_json::Value>> {
    let caller = authenticate(state.identity.as_ref(), &headers).await?;
    let matches = state.lifecycle.my_matches(&caller).await?;
    Ok(Success::new(json!({ "matches": matches })))
}

async fn ranking_handler(
    State(state): State<ApiState>,
    params: std::result::Result<Query<RankingParams>, QueryRejection>,
) -> ApiResult<Success<serde_json::Value>> {
    let params = query(params)?;
    let ranking = state
        .lifecycle
        .ranking(
            &params.sport,
            params.primary.as_deref(),
            params.secondary.as_deref(),
        )
        .await?;
    Ok(Success::new(json!({ "ranking": ranking })))
}

async fn finished_handler(
    State(state): State<ApiState>,
    Path(club_id): Path<ClubId>,
    params: std::result::Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult<Success<serde_json::Value>> {
    let HistoryParams { limit } = query(params)?;
    let matches = state.lifecycle.finished_matches(club_id, limit).await?;
    Ok(Success::new(json!({ "clubId": club_id, "matches": matches })))
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Match API server with broadcast-driven graceful shutdown
pub struct ApiServer {
    config: ApiServerConfig,
    state: ApiState,
    shutdown_tx: broadcast::Sender<()>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: ApiState) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            state,
            shutdown_tx,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid API server address")?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind API server to {}", addr))?;
        info!("Match API listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API server shutdown signal received");
            })
            .await?;

        info!("API server stopped");
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to API server: {}", e);
        }
        Ok(())
    }
}
