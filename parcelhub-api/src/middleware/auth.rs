/// Authorization gate middleware
///
/// Two gates run in front of protected routes:
///
/// - `identity_gate`: requires `Authorization: Bearer <token>` and asks the
///   identity verifier about the token. On success the `VerifiedIdentity` is
///   added to the request extensions.
/// - `admin_gate`: runs after `identity_gate` and requires the caller's user
///   record to hold the `admin` role. The `User` is added to the extensions.
///
/// # Status Codes
///
/// | Failure                                   | Status |
/// |-------------------------------------------|--------|
/// | Missing header, not `Bearer`, empty token | 401    |
/// | Token rejected by the verifier            | 403    |
/// | Verifier did not answer in time           | 504    |
/// | Verifier unavailable                      | 500    |
/// | Caller is not an admin                    | 403    |
///
/// # Example
///
/// ```no_run
/// use axum::Extension;
/// use parcelhub_shared::auth::identity::VerifiedIdentity;
///
/// async fn handler(Extension(identity): Extension<VerifiedIdentity>) -> String {
///     format!("Hello, {}!", identity.email)
/// }
/// ```

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use parcelhub_shared::auth::authorization::require_role;
use parcelhub_shared::auth::identity::VerifiedIdentity;
use parcelhub_shared::db::with_timeout;
use parcelhub_shared::models::user::UserRole;

/// Extracts the token from an `Authorization` header value
///
/// Returns `None` unless the value is `Bearer ` followed by a non-empty token.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let token = header_value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Requires a verified identity
pub async fn identity_gate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized access".to_string()))?;

    let limit = state.config.collaborator_timeout();
    let identity = match tokio::time::timeout(limit, state.identity.verify(&token)).await {
        Ok(result) => result.map_err(|e| {
            tracing::debug!(error = %e, "Token verification failed");
            ApiError::from(e)
        })?,
        Err(_) => {
            return Err(ApiError::Timeout(format!(
                "Identity verifier did not answer within {}ms",
                limit.as_millis()
            )))
        }
    };

    tracing::debug!(subject = %identity.subject, email = %identity.email, "Request authenticated");

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Requires the verified caller to be an admin
pub async fn admin_gate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = req
        .extensions()
        .get::<VerifiedIdentity>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized access".to_string()))?;

    let user = with_timeout(state.config.collaborator_timeout(), async {
        require_role(&state.db, &identity, UserRole::Admin)
            .await
            .map_err(ApiError::from)
    })
    .await
    .map_err(|e| {
        tracing::warn!(email = %identity.email, error = %e, "Admin check failed");
        e
    })?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
