/// Rider lifecycle
///
/// Moves a rider between approval states and keeps the rider's user account in
/// step with it. The status change and the role promotion are one transaction:
/// either both are visible afterwards or neither is.
///
/// The allowed moves live in `RiderStatus::transition`. Approving a rider
/// (`pending → active`) also sets the role of the user with the rider's email
/// to `rider`, provided that user is a plain `user`; admins and existing
/// riders keep their role. A rider with no promotable user account is still
/// approved; the outcome reports `role_promoted: false` and a warning is
/// logged.
///
/// # Example
///
/// ```no_run
/// use parcelhub_shared::lifecycle::transition_rider;
/// use parcelhub_shared::models::rider::RiderStatus;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, rider_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let outcome = transition_rider(&pool, rider_id, RiderStatus::Active, None).await?;
/// assert_eq!(outcome.status, RiderStatus::Active);
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::StoreTimeout;
use crate::models::rider::{IllegalTransition, Rider, RiderStatus};
use crate::models::user::User;

/// Error type for rider status changes
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// No rider has this ID
    #[error("Rider {0} not found")]
    RiderNotFound(Uuid),

    /// The requested move is not in the state machine
    #[error(transparent)]
    Illegal(#[from] IllegalTransition),

    /// The caller named an email other than the rider's own
    #[error("Email {supplied} does not belong to rider {rider_id}")]
    EmailMismatch { rider_id: Uuid, supplied: String },

    #[error(transparent)]
    Timeout(#[from] StoreTimeout),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of a committed status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    /// Rider rows matched by the update
    pub matched: u64,

    /// Rider rows changed by the update
    pub modified: u64,

    /// Status after the change
    pub status: RiderStatus,

    /// Whether a user account was promoted to `rider`
    pub role_promoted: bool,
}

/// Changes a rider's status, promoting the user on approval
///
/// `email` is optional. When given it must equal the rider's stored email; the
/// promotion always uses the stored email.
///
/// # Errors
///
/// - `RiderNotFound`: nothing was written
/// - `Illegal`: the move is not allowed from the current status; nothing was written
/// - `EmailMismatch`: nothing was written
/// - `Database`: the transaction was rolled back
pub async fn transition_rider(
    pool: &PgPool,
    rider_id: Uuid,
    target: RiderStatus,
    email: Option<&str>,
) -> Result<TransitionOutcome, LifecycleError> {
    let mut tx = pool.begin().await?;

    let rider = Rider::lock_by_id(&mut *tx, rider_id)
        .await?
        .ok_or(LifecycleError::RiderNotFound(rider_id))?;

    if let Some(supplied) = email {
        if supplied != rider.email {
            return Err(LifecycleError::EmailMismatch {
                rider_id,
                supplied: supplied.to_string(),
            });
        }
    }

    let status = rider.status.transition(target)?;

    // The row is locked, so this only misses if the status moved under us.
    let modified = Rider::set_status(&mut *tx, rider_id, rider.status, status).await?;
    if modified == 0 {
        return Err(IllegalTransition {
            from: rider.status,
            to: target,
        }
        .into());
    }

    let role_promoted = if status.promotes_user() {
        let promoted = User::promote_to_rider(&mut *tx, &rider.email).await?;
        if promoted == 0 {
            tracing::warn!(
                rider_id = %rider_id,
                email = %rider.email,
                "Approved rider has no plain user account to promote"
            );
        }
        promoted > 0
    } else {
        false
    };

    tx.commit().await?;

    tracing::info!(
        rider_id = %rider_id,
        from = %rider.status,
        to = %status,
        role_promoted,
        "Rider status changed"
    );

    Ok(TransitionOutcome {
        matched: 1,
        modified,
        status,
        role_promoted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_wire_names() {
        let outcome = TransitionOutcome {
            matched: 1,
            modified: 1,
            status: RiderStatus::Active,
            role_promoted: true,
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["matched"], 1);
        assert_eq!(json["modified"], 1);
        assert_eq!(json["status"], "active");
        assert_eq!(json["rolePromoted"], true);
    }

    #[test]
    fn test_illegal_transition_converts() {
        let err: LifecycleError = RiderStatus::Inactive
            .transition(RiderStatus::Active)
            .unwrap_err()
            .into();

        assert!(matches!(err, LifecycleError::Illegal(_)));
        assert_eq!(err.to_string(), "illegal rider transition from inactive to active");
    }
}
