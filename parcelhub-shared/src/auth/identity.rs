/// Verified caller identity
///
/// Every protected request carries a bearer ID token issued by the external
/// identity provider. An `IdentityVerifier` checks the token and yields the
/// identity it vouches for. Callers see only `VerifiedIdentity`; how the
/// token is checked is up to the implementation (see
/// [`super::jwt::JwtIdentityVerifier`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity vouched for by a verified ID token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    /// Provider's stable user identifier
    pub subject: String,

    /// Email address the provider verified
    pub email: String,
}

/// Why a token was not accepted
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Bad signature, wrong issuer or audience, or not a token at all
    #[error("Invalid ID token: {0}")]
    Invalid(String),

    #[error("ID token has expired")]
    Expired,

    /// The token is genuine but names no email address
    #[error("ID token carries no email")]
    MissingEmail,

    /// The provider could not be consulted
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

impl IdentityError {
    /// Whether the token itself was at fault, as opposed to the provider
    pub fn is_rejection(&self) -> bool {
        !matches!(self, IdentityError::Unavailable(_))
    }
}

/// Checks bearer ID tokens
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError>;
}
