/// Payment endpoints
///
/// # Endpoints
///
/// - `GET /payments?email=` - The caller's payments, newest first
/// - `POST /payments` - Settle a parcel
///
/// Both require the verified caller to be the user named by `email`.
///
/// Settlement is not retried: a failed or timed-out attempt is reported to
/// the client, which may resubmit. A resubmission for a parcel that did get
/// settled is answered with 409.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Extension, Json,
};
use parcelhub_shared::auth::authorization::require_owner;
use parcelhub_shared::auth::identity::VerifiedIdentity;
use parcelhub_shared::db::{retry_read, with_timeout};
use parcelhub_shared::models::payment::Payment;
use parcelhub_shared::settlement::{record_payment as settle, PaymentSubmission, SettlementError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentResponse {
    pub message: String,
    pub inserted_id: Uuid,
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    query: Result<Query<ListPaymentsQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Payment>>> {
    let Query(query) = query?;
    let email = query
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email query is required".to_string()))?;

    require_owner(&identity, email)?;

    let db = &state.db;
    let payments = retry_read(&state.config.retry_policy(), || Payment::list_by_email(db, email)).await?;

    Ok(Json(payments))
}

/// Settles a parcel
///
/// # Request
///
/// ```json
/// {
///   "parcelId": "uuid",
///   "transactionId": "pi_3Nx...",
///   "amount": 500,
///   "email": "a@x.com",
///   "paymentMethod": "card"
/// }
/// ```
///
/// # Response
///
/// ```json
/// { "message": "Payment recorded successfully", "insertedId": "uuid" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: a field is missing or invalid; nothing was written
/// - `403 Forbidden`: `email` is not the caller's
/// - `404 Not Found`: no such parcel
/// - `409 Conflict`: the parcel is already paid
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    payload: Result<Json<PaymentSubmission>, JsonRejection>,
) -> ApiResult<Json<RecordPaymentResponse>> {
    let Json(submission) = payload?;
    let payment = submission.validate()?;

    require_owner(&identity, &payment.email)?;

    let receipt = with_timeout::<_, SettlementError, _>(
        state.config.collaborator_timeout(),
        settle(&state.db, payment),
    )
    .await?;

    Ok(Json(RecordPaymentResponse {
        message: "Payment recorded successfully".to_string(),
        inserted_id: receipt.inserted_id,
    }))
}
