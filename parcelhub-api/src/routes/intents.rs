/// Charge intent endpoint
///
/// ```text
/// POST /create-payment-intent
/// { "amountInCents": 50000 }
///
/// 200 { "clientSecret": "pi_..._secret_..." }
/// ```
///
/// The client completes the charge with the gateway using `clientSecret` and
/// then reports it through `POST /payments`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use parcelhub_shared::auth::identity::VerifiedIdentity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    /// Amount in the currency's smallest unit
    pub amount_in_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    pub client_secret: String,
}

pub async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    payload: Result<Json<CreateIntentRequest>, JsonRejection>,
) -> ApiResult<Json<CreateIntentResponse>> {
    let Json(req) = payload?;
    if req.amount_in_cents <= 0 {
        return Err(ApiError::invalid_field(
            "amountInCents",
            "amountInCents must be a positive integer",
        ));
    }

    let limit = state.config.collaborator_timeout();
    let currency = &state.config.gateway.currency;
    let intent = tokio::time::timeout(
        limit,
        state.gateway.create_charge_intent(req.amount_in_cents, currency),
    )
    .await
    .map_err(|_| ApiError::Timeout(format!("Payment gateway did not answer within {}ms", limit.as_millis())))??;

    tracing::info!(
        intent_id = %intent.id,
        email = %identity.email,
        amount = req.amount_in_cents,
        "Charge intent created"
    );

    Ok(Json(CreateIntentResponse {
        client_secret: intent.client_secret,
    }))
}
