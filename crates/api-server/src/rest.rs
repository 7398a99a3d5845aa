//! REST handlers for the player-groups surface and operational endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};
use uuid::Uuid;

use playerforge_core::types::{Group, GroupRule, RuleMode};
use playerforge_core::ForgeError;
use playerforge_segmentation::{CompiledRuleSet, PreviewService, SyncEngine};
use playerforge_store::GroupStore;

/// Maximum number of rules accepted in one group or preview.
const MAX_RULES: usize = 50;

/// Maximum group name/description length.
const MAX_FIELD_LEN: usize = 256;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn GroupStore>,
    pub preview: Arc<PreviewService>,
    pub sync: Arc<SyncEngine>,
    pub node_id: String,
    pub start_time: Instant,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewParams {
    pub rule_mode: RuleMode,
    /// JSON-encoded rules array, passed as a query parameter.
    pub rules: String,
}

#[derive(Serialize)]
pub struct PreviewCountResponse {
    pub count: u64,
}

/// GET /v1/games/:game_id/player-groups/preview-count
pub async fn preview_count(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Query(params): Query<PreviewParams>,
) -> Result<Json<PreviewCountResponse>, (StatusCode, Json<ErrorResponse>)> {
    let rules: Vec<GroupRule> = match serde_json::from_str(&params.rules) {
        Ok(rules) => rules,
        Err(e) => {
            warn!(game_id = %game_id, error = %e, "Malformed rules in preview request");
            metrics::counter!("api.validation_errors").increment(1);
            return Err(bad_request(format!("malformed 'rules' parameter: {e}")));
        }
    };
    if rules.len() > MAX_RULES {
        return Err(bad_request(format!(
            "rule set exceeds maximum of {MAX_RULES} rules"
        )));
    }

    match state.preview.preview_count(game_id, params.rule_mode, &rules) {
        Ok(count) => Ok(Json(PreviewCountResponse { count })),
        Err(e) => Err(error_response(e)),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rule_mode: RuleMode,
    #[serde(default)]
    pub rules: Vec<GroupRule>,
}

/// POST /v1/games/:game_id/player-groups
///
/// Validates every rule by compiling the set before anything is persisted,
/// then refreshes membership for the game's players in the background.
pub async fn create_group(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<SaveGroupRequest>,
) -> Result<(StatusCode, Json<Group>), (StatusCode, Json<ErrorResponse>)> {
    if request.name.is_empty() {
        return Err(bad_request("group 'name' must not be empty".to_string()));
    }
    if request.name.len() > MAX_FIELD_LEN || request.description.len() > MAX_FIELD_LEN {
        return Err(bad_request(
            "group 'name'/'description' exceeds maximum length".to_string(),
        ));
    }
    if request.rules.len() > MAX_RULES {
        return Err(bad_request(format!(
            "rule set exceeds maximum of {MAX_RULES} rules"
        )));
    }

    if let Err(e) = state.store.game(game_id) {
        return Err(error_response(e));
    }
    if let Err(e) = CompiledRuleSet::compile(request.rule_mode, &request.rules) {
        metrics::counter!("api.validation_errors").increment(1);
        return Err(error_response(e));
    }

    let group = Group::new(
        game_id,
        request.name,
        request.description,
        request.rule_mode,
        request.rules,
    );
    if let Err(e) = state.store.save_group(group.clone()) {
        return Err(error_response(e));
    }

    // existing players must be re-evaluated against the new definition
    let sync = state.sync.clone();
    tokio::spawn(async move {
        if let Err(e) = sync.sync_game(game_id).await {
            warn!(game_id = %game_id, error = %e, "post-save membership refresh failed");
        }
    });

    Ok((StatusCode::CREATED, Json(group)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub rule_mode: RuleMode,
    pub rule_count: usize,
    pub member_count: usize,
}

/// GET /v1/games/:game_id/player-groups
pub async fn list_groups(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
) -> Result<Json<Vec<GroupSummary>>, (StatusCode, Json<ErrorResponse>)> {
    if let Err(e) = state.store.game(game_id) {
        return Err(error_response(e));
    }
    let groups = state.store.groups_by_game(game_id).map_err(error_response)?;

    let mut summaries = Vec::with_capacity(groups.len());
    for group in groups {
        let member_count = state
            .store
            .member_count(group.id)
            .map_err(error_response)?;
        summaries.push(GroupSummary {
            id: group.id,
            name: group.name,
            description: group.description,
            rule_mode: group.rule_mode,
            rule_count: group.rules.len(),
            member_count,
        });
    }
    Ok(Json(summaries))
}

#[derive(Serialize)]
pub struct MembersResponse {
    pub members: Vec<Uuid>,
    pub count: usize,
}

/// GET /v1/games/:game_id/player-groups/:group_id/members
///
/// Reads the derived membership relation only; nothing is recomputed here.
pub async fn list_members(
    State(state): State<AppState>,
    Path((game_id, group_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MembersResponse>, (StatusCode, Json<ErrorResponse>)> {
    let group = state.store.group(group_id).map_err(error_response)?;
    if group.game_id != game_id {
        return Err(error_response(ForgeError::NotFound("group")));
    }

    let mut members = state
        .store
        .members_of_group(group_id)
        .map_err(error_response)?;
    members.sort_unstable();
    let count = members.len();
    Ok(Json(MembersResponse { members, count }))
}

/// GET /health — Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness probe.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.start_time.elapsed().as_secs() > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live — Liveness probe.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

fn bad_request(message: String) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "invalid_request".to_string(),
            message,
        }),
    )
}

/// Map a core error to an HTTP response: missing entities are 404, rule
/// validation failures are 400, everything else is an opaque 500.
fn error_response(e: ForgeError) -> (StatusCode, Json<ErrorResponse>) {
    match e {
        ForgeError::NotFound(entity) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "not_found".to_string(),
                message: format!("{entity} not found"),
            }),
        ),
        e if e.is_validation() => {
            metrics::counter!("api.validation_errors").increment(1);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "invalid_rules".to_string(),
                    message: e.to_string(),
                }),
            )
        }
        e => {
            error!(error = %e, "Request failed");
            metrics::counter!("api.errors").increment(1);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal_error".to_string(),
                    message: "Internal processing error".to_string(),
                }),
            )
        }
    }
}
