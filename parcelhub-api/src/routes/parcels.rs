/// Parcel endpoints
///
/// # Endpoints
///
/// - `GET /parcels?email=` - List parcels, newest first (identity)
/// - `POST /parcels` - Book a parcel (identity)
/// - `GET /parcels/:id` - Fetch one parcel (public)
/// - `DELETE /parcels/:id` - Delete an unpaid parcel (owner)
///
/// Parcels start `unpaid`. Only settlement marks them paid, and a paid
/// parcel can no longer be deleted.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::parse_id,
};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use parcelhub_shared::auth::authorization::{require_owner, require_role};
use parcelhub_shared::auth::identity::VerifiedIdentity;
use parcelhub_shared::db::{retry_read, with_timeout};
use parcelhub_shared::models::parcel::{CreateParcel, Parcel};
use parcelhub_shared::models::user::UserRole;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Parcel booking request
///
/// Known fields are stored in their own columns; anything else the client
/// sends is kept in `details`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateParcelRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,

    #[serde(alias = "type")]
    pub parcel_type: Option<String>,

    pub sender_name: Option<String>,
    pub sender_region: Option<String>,
    pub receiver_name: Option<String>,
    pub receiver_region: Option<String>,

    #[validate(range(min = 0.0, message = "Weight cannot be negative"))]
    pub weight: Option<f64>,

    #[validate(range(min = 0.0, message = "Cost cannot be negative"))]
    pub cost: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CreateParcelRequest {
    /// Builds the insert, owned by `owner` regardless of what the body says
    fn into_new_parcel(mut self, owner: &str) -> CreateParcel {
        // Columns the server owns never come from the body
        for key in ["created_by", "createdBy", "payment_status", "paymentStatus", "transactionId"] {
            self.extra.remove(key);
        }

        CreateParcel {
            created_by: owner.to_string(),
            title: self.title.trim().to_string(),
            parcel_type: self.parcel_type,
            sender_name: self.sender_name,
            sender_region: self.sender_region,
            receiver_name: self.receiver_name,
            receiver_region: self.receiver_region,
            weight: self.weight,
            cost: self.cost,
            details: Value::Object(self.extra),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParcelsQuery {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParcelResponse {
    pub deleted_count: u64,
}

/// Lists parcels newest first
///
/// With `email`, the caller must be that user. Without it, the whole table
/// is returned and the caller must be an admin.
pub async fn list_parcels(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    query: Result<Query<ListParcelsQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Parcel>>> {
    let Query(query) = query?;
    let owner = query.email.as_deref().map(str::trim).filter(|e| !e.is_empty());

    match owner {
        Some(email) => require_owner(&identity, email)?,
        None => {
            with_timeout(state.config.collaborator_timeout(), async {
                require_role(&state.db, &identity, UserRole::Admin)
                    .await
                    .map_err(ApiError::from)
            })
            .await?;
        }
    }

    let db = &state.db;
    let parcels = retry_read(&state.config.retry_policy(), || Parcel::list(db, owner)).await?;

    Ok(Json(parcels))
}

/// Books a parcel owned by the verified caller
pub async fn create_parcel(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    payload: Result<Json<CreateParcelRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Parcel>)> {
    let Json(req) = payload?;
    req.validate()?;

    let new_parcel = req.into_new_parcel(&identity.email);
    let parcel = with_timeout(state.config.collaborator_timeout(), async {
        Parcel::create(&state.db, new_parcel).await.map_err(ApiError::from)
    })
    .await?;

    tracing::info!(parcel_id = %parcel.id, email = %parcel.created_by, "Parcel booked");

    Ok((StatusCode::CREATED, Json(parcel)))
}

pub async fn get_parcel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Parcel>> {
    let parcel_id = parse_id(&id, "parcel")?;

    let db = &state.db;
    let parcel = retry_read(&state.config.retry_policy(), || Parcel::find_by_id(db, parcel_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Parcel not found".to_string()))?;

    Ok(Json(parcel))
}

/// Deletes an unpaid parcel owned by the caller
///
/// # Errors
///
/// - `403 Forbidden`: the parcel belongs to someone else
/// - `404 Not Found`: no such parcel
/// - `409 Conflict`: the parcel is paid
pub async fn delete_parcel(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteParcelResponse>> {
    let parcel_id = parse_id(&id, "parcel")?;
    let limit = state.config.collaborator_timeout();

    let parcel = with_timeout(limit, async {
        Parcel::find_by_id(&state.db, parcel_id).await.map_err(ApiError::from)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Parcel not found".to_string()))?;

    require_owner(&identity, &parcel.created_by)?;

    if parcel.is_paid() {
        return Err(ApiError::Conflict("Paid parcels cannot be deleted".to_string()));
    }

    let deleted = with_timeout(limit, async {
        Parcel::delete_unpaid(&state.db, parcel_id, &identity.email)
            .await
            .map_err(ApiError::from)
    })
    .await?;

    // Settled between the read and the delete
    if !deleted {
        return Err(ApiError::Conflict("Paid parcels cannot be deleted".to_string()));
    }

    tracing::info!(parcel_id = %parcel_id, email = %identity.email, "Parcel deleted");

    Ok(Json(DeleteParcelResponse { deleted_count: 1 }))
}
