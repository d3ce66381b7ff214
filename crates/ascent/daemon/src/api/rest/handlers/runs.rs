//! Promotion run handlers

use super::bundles::parse_bundle_id;
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use ascent_core::StageOutcome;
use ascent_history::RecordedEvent;
use ascent_types::{PromotionRun, RunId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

/// Create run request
#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    pub bundle_id: String,
}

/// Create run response
#[derive(Debug, Serialize)]
pub struct CreateRunResponse {
    pub run_id: String,
}

/// Submit a bundle for promotion
pub async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<CreateRunRequest>,
) -> ApiResult<(StatusCode, Json<CreateRunResponse>)> {
    let bundle_id = parse_bundle_id(&request.bundle_id)?;

    let run_id = state
        .orchestrator
        .submit(bundle_id, &state.registry)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateRunResponse {
            run_id: run_id.to_string(),
        }),
    ))
}

/// Advance run response: what the attempt concluded plus the updated
/// run snapshot.
#[derive(Debug, Serialize)]
pub struct AdvanceRunResponse {
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_secs: Option<u64>,
    pub run: PromotionRun,
}

/// Execute one stage attempt for a run
pub async fn advance_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AdvanceRunResponse>> {
    let run_id = parse_run_id(&id)?;

    let outcome = state.orchestrator.advance(&run_id).await?;
    let run = state.orchestrator.get_status(&run_id).await?;

    let response = match outcome {
        StageOutcome::Advanced { next_stage } => AdvanceRunResponse {
            outcome: "advanced".to_string(),
            next_stage: Some(next_stage),
            retry_in_secs: None,
            run,
        },
        StageOutcome::Completed => AdvanceRunResponse {
            outcome: "completed".to_string(),
            next_stage: None,
            retry_in_secs: None,
            run,
        },
        StageOutcome::Blocked { retry_in, .. } => AdvanceRunResponse {
            outcome: "blocked".to_string(),
            next_stage: None,
            retry_in_secs: Some(retry_in.as_secs()),
            run,
        },
        StageOutcome::Failed { .. } => AdvanceRunResponse {
            outcome: "failed".to_string(),
            next_stage: None,
            retry_in_secs: None,
            run,
        },
        StageOutcome::AlreadyTerminal => AdvanceRunResponse {
            outcome: "terminal".to_string(),
            next_stage: None,
            retry_in_secs: None,
            run,
        },
    };

    Ok(Json(response))
}

/// Get a run with its full attempt history
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PromotionRun>> {
    let run_id = parse_run_id(&id)?;
    let run = state.orchestrator.get_status(&run_id).await?;
    Ok(Json(run))
}

/// List all runs, newest first
pub async fn list_runs(State(state): State<AppState>) -> ApiResult<Json<Vec<PromotionRun>>> {
    let runs = state.orchestrator.list_runs().await?;
    Ok(Json(runs))
}

/// Abort run request
#[derive(Debug, Deserialize)]
pub struct AbortRunRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Abort a run. Idempotent when the run is already terminal.
pub async fn abort_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AbortRunRequest>,
) -> ApiResult<Json<PromotionRun>> {
    let run_id = parse_run_id(&id)?;
    let reason = request.reason.unwrap_or_else(|| "operator abort".to_string());
    let run = state.orchestrator.abort(&run_id, reason).await?;
    Ok(Json(run))
}

/// Get the recorded history events for a run
pub async fn get_run_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<RecordedEvent>>> {
    let run_id = parse_run_id(&id)?;
    let events = state.orchestrator.events(&run_id).await?;
    Ok(Json(events))
}

/// Helper to parse a run ID from its string form (UUID-based)
fn parse_run_id(id: &str) -> ApiResult<RunId> {
    let uuid_str = id.strip_prefix("run:").unwrap_or(id);
    RunId::parse(uuid_str).ok_or_else(|| ApiError::BadRequest(format!("Invalid run ID: {}", id)))
}
