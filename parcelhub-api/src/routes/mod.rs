/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Banner and health check endpoints
/// - `users`: Sign-in upsert, search and role changes
/// - `parcels`: Parcel booking and lookup
/// - `riders`: Rider applications and the approval lifecycle
/// - `payments`: Payment settlement and ledger listing
/// - `intents`: Charge intents with the payment gateway

pub mod health;
pub mod intents;
pub mod parcels;
pub mod payments;
pub mod riders;
pub mod users;

use crate::error::{ApiError, ApiResult};
use uuid::Uuid;

/// Parses an ID taken from the request path
pub(crate) fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest(format!("Invalid {} id", what)))
}
