/// User endpoints
///
/// # Endpoints
///
/// - `POST /users` - Create the user on first sign-in (public)
/// - `GET /users/search?email=` - Partial, case-insensitive email search (public)
/// - `PATCH /users/:id/role` - Change a user's role (admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::parse_id,
};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    Json,
};
use parcelhub_shared::db::{retry_read, with_timeout};
use parcelhub_shared::models::user::{UpsertOutcome, UpsertUser, User, UserRole};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

/// Most users returned by a search
pub const SEARCH_LIMIT: i64 = 10;

/// Sign-in upsert request
///
/// Other profile fields the client sends are ignored.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleResponse {
    pub message: String,
    pub modified_count: u64,
}

/// Creates the user on first sign-in
///
/// # Response
///
/// New user: `{"insertedId": "<uuid>"}`. Known email:
/// `{"message": "user already exist", "insertedId": false}`, with the last
/// login time refreshed.
pub async fn upsert_user(
    State(state): State<AppState>,
    payload: Result<Json<UpsertUserRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    req.validate()?;

    let outcome = with_timeout(state.config.collaborator_timeout(), async {
        User::upsert_by_email(
            &state.db,
            UpsertUser {
                email: req.email,
                name: req.name,
                photo_url: req.photo_url,
            },
        )
        .await
        .map_err(ApiError::from)
    })
    .await?;

    match outcome {
        UpsertOutcome::Inserted(user) => {
            tracing::info!(user_id = %user.id, email = %user.email, "User created");
            Ok(Json(json!({ "insertedId": user.id })))
        }
        UpsertOutcome::Existing(user) => {
            tracing::debug!(user_id = %user.id, "Existing user signed in");
            Ok(Json(json!({ "message": "user already exist", "insertedId": false })))
        }
    }
}

/// Searches users by partial email
///
/// Returns at most ten users, newest first. A missing or blank query is a
/// 400; no match is a 404.
pub async fn search_users(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<User>>> {
    let Query(query) = query?;
    let needle = query
        .email
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email query is required".to_string()))?;

    let db = &state.db;
    let users = retry_read(&state.config.retry_policy(), || {
        User::search_by_email(db, needle, SEARCH_LIMIT)
    })
    .await?;

    if users.is_empty() {
        return Err(ApiError::NotFound("No users found".to_string()));
    }

    Ok(Json(users))
}

/// Changes a user's role
///
/// Only `admin` and `user` may be assigned here; `rider` is granted by rider
/// approval.
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateRoleRequest>, JsonRejection>,
) -> ApiResult<Json<UpdateRoleResponse>> {
    let user_id = parse_id(&id, "user")?;
    let Json(req) = payload?;

    let role = req
        .role
        .parse::<UserRole>()
        .ok()
        .filter(UserRole::is_admin_assignable)
        .ok_or_else(|| ApiError::invalid_field("role", "Invalid role"))?;

    let updated = with_timeout(state.config.collaborator_timeout(), async {
        User::update_role(&state.db, user_id, role)
            .await
            .map_err(ApiError::from)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %updated.id, role = %role, "User role updated");

    Ok(Json(UpdateRoleResponse {
        message: format!("User role updated to {}", role),
        modified_count: 1,
    }))
}
