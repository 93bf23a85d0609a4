/// Rider endpoints
///
/// # Endpoints
///
/// - `POST /riders` - Apply to deliver (identity)
/// - `GET /riders/pending` - Applications awaiting review (public)
/// - `GET /riders/active` - Approved riders (public)
/// - `PATCH /riders/:id/status` - Move a rider through the lifecycle (admin)
/// - `PATCH /riders/deactivate/:id` - Shorthand for `active -> inactive` (admin)
///
/// Approving a rider (`pending -> active`) also grants the matching user the
/// `rider` role, in the same transaction.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::parse_id,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use parcelhub_shared::auth::identity::VerifiedIdentity;
use parcelhub_shared::db::{retry_read, with_timeout};
use parcelhub_shared::lifecycle::{transition_rider, LifecycleError, TransitionOutcome};
use parcelhub_shared::models::rider::{CreateRider, Rider, RiderStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

/// Rider application
///
/// The rider's email is always the verified caller's. Extra fields are kept
/// in `details`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    pub phone: Option<String>,

    pub region: Option<String>,
    pub district: Option<String>,
    pub bike_brand: Option<String>,
    pub bike_registration: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApplyRequest {
    fn into_new_rider(mut self, email: &str) -> CreateRider {
        for key in ["email", "status"] {
            self.extra.remove(key);
        }

        CreateRider {
            email: email.to_string(),
            name: self.name.trim().to_string(),
            phone: self.phone,
            region: self.region,
            district: self.district,
            bike_brand: self.bike_brand,
            bike_registration: self.bike_registration,
            details: Value::Object(self.extra),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,

    /// Must match the rider's email when present
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
    pub rider_modified_count: u64,
}

impl StatusResponse {
    fn new(message: String, outcome: &TransitionOutcome) -> Self {
        Self {
            success: true,
            message,
            rider_modified_count: outcome.modified,
        }
    }
}

pub async fn apply(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    payload: Result<Json<ApplyRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Rider>)> {
    let Json(req) = payload?;
    req.validate()?;

    let application = req.into_new_rider(&identity.email);
    let rider = with_timeout(state.config.collaborator_timeout(), async {
        Rider::create(&state.db, application).await.map_err(ApiError::from)
    })
    .await?;

    tracing::info!(rider_id = %rider.id, email = %rider.email, "Rider application received");

    Ok((StatusCode::CREATED, Json(rider)))
}

pub async fn list_pending(State(state): State<AppState>) -> ApiResult<Json<Vec<Rider>>> {
    list_by_status(&state, RiderStatus::Pending).await
}

pub async fn list_active(State(state): State<AppState>) -> ApiResult<Json<Vec<Rider>>> {
    list_by_status(&state, RiderStatus::Active).await
}

async fn list_by_status(state: &AppState, status: RiderStatus) -> ApiResult<Json<Vec<Rider>>> {
    let db = &state.db;
    let riders = retry_read(&state.config.retry_policy(), || Rider::list_by_status(db, status)).await?;

    Ok(Json(riders))
}

/// Moves a rider to the requested status
///
/// # Request
///
/// ```json
/// { "status": "active", "email": "r@x.com" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: unknown status, or `email` is not the rider's
/// - `404 Not Found`: no such rider
/// - `409 Conflict`: the move is not allowed from the current status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let rider_id = parse_id(&id, "rider")?;
    let Json(req) = payload?;

    let target = req
        .status
        .parse::<RiderStatus>()
        .map_err(|_| ApiError::invalid_field("status", "Invalid status value"))?;

    let email = req.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
    let outcome = transition(&state, rider_id, target, email).await?;

    Ok(Json(StatusResponse::new(
        format!("Rider {} successfully", outcome.status),
        &outcome,
    )))
}

/// Deactivates an approved rider
pub async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let rider_id = parse_id(&id, "rider")?;
    let outcome = transition(&state, rider_id, RiderStatus::Inactive, None).await?;

    Ok(Json(StatusResponse::new(
        "Rider deactivated successfully".to_string(),
        &outcome,
    )))
}

/// Runs a transition within the collaborator timeout; never retried
async fn transition(
    state: &AppState,
    rider_id: Uuid,
    target: RiderStatus,
    email: Option<&str>,
) -> ApiResult<TransitionOutcome> {
    let outcome = with_timeout::<_, LifecycleError, _>(
        state.config.collaborator_timeout(),
        transition_rider(&state.db, rider_id, target, email),
    )
    .await
    .map_err(|e| {
        tracing::debug!(rider_id = %rider_id, target = %target, error = %e, "Rider transition refused");
        ApiError::from(e)
    })?;

    Ok(outcome)
}
