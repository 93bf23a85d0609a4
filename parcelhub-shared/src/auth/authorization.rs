/// Authorization checks
///
/// Two rules cover every protected operation in ParcelHub:
///
/// 1. **Ownership**: the verified email must equal the email a request acts
///    for (a parcel owner, a payer). Comparison is exact and case-sensitive.
/// 2. **Role**: the user registered under the verified email must hold the
///    required role. Roles are looked up on every request, so a demotion
///    takes effect immediately.
///
/// # Example
///
/// ```no_run
/// use parcelhub_shared::auth::authorization::{require_owner, require_role};
/// use parcelhub_shared::auth::identity::VerifiedIdentity;
/// use parcelhub_shared::models::user::UserRole;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, identity: VerifiedIdentity) -> Result<(), Box<dyn std::error::Error>> {
/// require_owner(&identity, "a@x.com")?;
/// let admin = require_role(&pool, &identity, UserRole::Admin).await?;
/// println!("admin {}", admin.email);
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;

use super::identity::VerifiedIdentity;
use crate::models::user::{User, UserRole};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The verified email differs from the email acted for
    #[error("Not authorized to act for this account")]
    NotOwner,

    /// The caller's role does not allow the operation
    #[error("Insufficient permissions: requires {required}, has {actual}")]
    InsufficientRole { required: UserRole, actual: UserRole },

    /// No user is registered under the verified email
    #[error("No user registered for {0}")]
    UnknownUser(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Requires the caller to be the account `email` belongs to
pub fn require_owner(identity: &VerifiedIdentity, email: &str) -> Result<(), AuthzError> {
    if identity.email != email {
        return Err(AuthzError::NotOwner);
    }

    Ok(())
}

/// Requires the caller's user record to hold `required`
///
/// Returns the caller's user record on success.
pub async fn require_role(
    pool: &PgPool,
    identity: &VerifiedIdentity,
    required: UserRole,
) -> Result<User, AuthzError> {
    let user = User::find_by_email(pool, &identity.email)
        .await?
        .ok_or_else(|| AuthzError::UnknownUser(identity.email.clone()))?;

    if user.role != required {
        return Err(AuthzError::InsufficientRole {
            required,
            actual: user.role,
        });
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(email: &str) -> VerifiedIdentity {
        VerifiedIdentity {
            subject: "uid-1".to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn test_owner_matches_exactly() {
        assert!(require_owner(&identity("a@x.com"), "a@x.com").is_ok());
        assert!(matches!(require_owner(&identity("a@x.com"), "b@x.com"), Err(AuthzError::NotOwner)));
    }

    #[test]
    fn test_owner_is_case_sensitive() {
        assert!(matches!(require_owner(&identity("a@x.com"), "A@x.com"), Err(AuthzError::NotOwner)));
    }

    #[test]
    fn test_insufficient_role_message() {
        let err = AuthzError::InsufficientRole {
            required: UserRole::Admin,
            actual: UserRole::Rider,
        };
        assert_eq!(err.to_string(), "Insufficient permissions: requires admin, has rider");
    }
}
