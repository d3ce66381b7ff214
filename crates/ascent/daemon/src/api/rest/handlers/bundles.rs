//! Bundle registration and approval handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use ascent_gates::ApprovalDecision;
use ascent_registry::ArtifactStoreError;
use ascent_types::{Bundle, BundleId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Register bundle request
#[derive(Debug, Deserialize)]
pub struct RegisterBundleRequest {
    pub source_revision: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// Register bundle response
#[derive(Debug, Serialize)]
pub struct RegisterBundleResponse {
    pub bundle_id: String,
    pub checksum: String,
}

/// Register a new immutable bundle
pub async fn register_bundle(
    State(state): State<AppState>,
    Json(request): Json<RegisterBundleRequest>,
) -> ApiResult<(StatusCode, Json<RegisterBundleResponse>)> {
    if request.source_revision.is_empty() {
        return Err(ApiError::Validation(
            "source_revision must not be empty".to_string(),
        ));
    }

    let bundle = Bundle::new(request.source_revision, request.parameters);
    let bundle_id = bundle.id.clone();
    let checksum = bundle.checksum.clone();

    state
        .artifacts
        .put(bundle)
        .await
        .map_err(|e| match e {
            ArtifactStoreError::AlreadyExists(id) => {
                ApiError::Conflict(format!("Bundle {} already exists", id))
            }
            other => ApiError::Internal(other.to_string()),
        })?;

    tracing::info!(bundle_id = %bundle_id, "Registered bundle");

    Ok((
        StatusCode::CREATED,
        Json(RegisterBundleResponse {
            bundle_id: bundle_id.to_string(),
            checksum,
        }),
    ))
}

/// Get a bundle by id
pub async fn get_bundle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Bundle>> {
    let bundle_id = parse_bundle_id(&id)?;
    let bundle = state.artifacts.get(&bundle_id).await.map_err(|e| match e {
        ArtifactStoreError::NotFound(id) => ApiError::NotFound(format!("Bundle {} not found", id)),
        other => ApiError::Internal(other.to_string()),
    })?;
    Ok(Json(bundle))
}

/// Record approval request
#[derive(Debug, Deserialize)]
pub struct RecordApprovalRequest {
    pub gate_name: String,
    pub approver: String,
    pub approved: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Record approval response
#[derive(Debug, Serialize)]
pub struct RecordApprovalResponse {
    pub recorded: bool,
}

/// Record a manual-approval decision for a bundle's gate. The pending
/// gate picks it up on its next poll.
pub async fn record_approval(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RecordApprovalRequest>,
) -> ApiResult<Json<RecordApprovalResponse>> {
    let bundle_id = parse_bundle_id(&id)?;

    let exists = state
        .artifacts
        .contains(&bundle_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !exists {
        return Err(ApiError::NotFound(format!("Bundle {} not found", id)));
    }

    let decision = if request.approved {
        ApprovalDecision::Approved {
            approver: request.approver,
        }
    } else {
        ApprovalDecision::Rejected {
            approver: request.approver,
            reason: request.reason.unwrap_or_else(|| "not given".to_string()),
        }
    };

    state
        .approvals
        .record(bundle_id.clone(), request.gate_name.clone(), decision);

    tracing::info!(
        bundle_id = %bundle_id,
        gate = %request.gate_name,
        approved = request.approved,
        "Recorded approval decision"
    );

    Ok(Json(RecordApprovalResponse { recorded: true }))
}

/// Helper to parse a bundle ID from its string form (UUID-based)
pub(crate) fn parse_bundle_id(id: &str) -> ApiResult<BundleId> {
    let uuid_str = id.strip_prefix("bundle:").unwrap_or(id);
    BundleId::parse(uuid_str).ok_or_else(|| ApiError::BadRequest(format!("Invalid bundle ID: {}", id)))
}
