//! HTTP routes: challenge issuance, star submission, lookups and audits.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::block::Block;
use crate::chain::Chain;
use crate::error::ChainError;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<Chain>,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: msg.into() }))
}

fn reject(err: ChainError) -> ApiError {
    let status = match &err {
        ChainError::MalformedChallenge(_) | ChainError::Payload(_) => StatusCode::BAD_REQUEST,
        ChainError::ChallengeExpired { .. } | ChainError::SignatureInvalid => {
            StatusCode::UNAUTHORIZED
        }
        ChainError::ChainCorrupted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        // No handler decodes payloads; reaching this is a server bug.
        ChainError::GenesisData => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, err.to_string())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/requestValidation", post(request_validation))
        .route("/submitStar", post(submit_star))
        .route("/block/height/:height", get(block_by_height))
        .route("/block/hash/:hash", get(block_by_hash))
        .route("/block/:address", get(stars_by_owner))
        .route("/validateChain", get(validate_chain))
        .route("/health", get(health))
        .route("/version", get(version))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Deserialize)]
pub struct ValidationRequest {
    #[serde(default)]
    pub address: String,
}

/// POST /requestValidation — message the wallet must sign
pub async fn request_validation(
    State(state): State<AppState>,
    Json(req): Json<ValidationRequest>,
) -> Result<Json<String>, ApiError> {
    if req.address.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "must provide address"));
    }
    Ok(Json(state.chain.request_ownership_challenge(&req.address)))
}

#[derive(Deserialize)]
pub struct StarSubmission {
    pub address: String,
    pub message: String,
    pub signature: String,
    pub star: serde_json::Value,
}

/// POST /submitStar
pub async fn submit_star(
    State(state): State<AppState>,
    Json(sub): Json<StarSubmission>,
) -> Result<Json<Block>, ApiError> {
    state
        .chain
        .submit_entry(&sub.address, &sub.message, &sub.signature, sub.star)
        .map(Json)
        .map_err(reject)
}

/// GET /block/height/:height
pub async fn block_by_height(
    State(state): State<AppState>,
    Path(height): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    state
        .chain
        .block_by_height(height)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "block not found"))
}

/// GET /block/hash/:hash
pub async fn block_by_hash(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<Block>, ApiError> {
    state
        .chain
        .block_by_hash(&hash)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "block not found"))
}

/// GET /block/:address — stars owned by a wallet, oldest first
pub async fn stars_by_owner(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Json<Vec<serde_json::Value>> {
    Json(state.chain.stars_by_owner(&address))
}

/// GET /validateChain — verify all hashes and linkages; returns { ok, errors[] }
#[derive(Serialize)]
pub struct ValidateResp {
    pub ok: bool,
    pub errors: Vec<String>,
}
pub async fn validate_chain(State(state): State<AppState>) -> Json<ValidateResp> {
    let errors: Vec<String> = state
        .chain
        .validate_chain()
        .iter()
        .map(ToString::to_string)
        .collect();

    Json(ValidateResp {
        ok: errors.is_empty(),
        errors,
    })
}

/// GET /health
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub height: i64,
}
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        height: state.chain.height(),
    })
}

/// GET /version
#[derive(Serialize)]
pub struct Version {
    pub version: &'static str,
    pub git_sha: Option<&'static str>,
}
pub async fn version() -> Json<Version> {
    Json(Version {
        version: env!("CARGO_PKG_VERSION"),
        git_sha: option_env!("GIT_SHA"),
    })
}
