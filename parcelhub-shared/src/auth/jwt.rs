/// ID token signing and verification
///
/// ParcelHub trusts ID tokens signed by its identity provider with a shared
/// HS256 secret. A token is accepted only if its signature, issuer, audience,
/// expiry and not-before all check out and it carries an `email` claim.
///
/// # Claims
///
/// - `sub`: provider user ID
/// - `email`: verified email address (required by the verifier)
/// - `iss` / `aud`: must match the configured issuer and audience
/// - `iat` / `exp` / `nbf`: Unix timestamps
///
/// # Example
///
/// ```
/// use parcelhub_shared::auth::jwt::{create_token, IdClaims, JwtIdentityVerifier};
/// use parcelhub_shared::auth::identity::IdentityVerifier;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "test-secret-key-at-least-32-bytes-long";
/// let claims = IdClaims::new("uid-1", Some("a@x.com"), "parcelhub", "parcelhub-client");
/// let token = create_token(&claims, secret)?;
///
/// let verifier = JwtIdentityVerifier::new(secret, "parcelhub", "parcelhub-client");
/// let identity = verifier.verify(&token).await?;
/// assert_eq!(identity.email, "a@x.com");
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::identity::{IdentityError, IdentityVerifier, VerifiedIdentity};

/// Default lifetime of tokens minted by `IdClaims::new`, in seconds
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Error type for token creation
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),
}

/// Claims of a ParcelHub ID token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdClaims {
    /// Subject - provider user ID
    pub sub: String,

    /// Verified email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Issuer
    pub iss: String,

    /// Audience
    pub aud: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,
}

impl IdClaims {
    /// Claims valid from now for `DEFAULT_TOKEN_LIFETIME_SECS`
    pub fn new(subject: &str, email: Option<&str>, issuer: &str, audience: &str) -> Self {
        let lifetime = Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS);
        Self::with_expiration(subject, email, issuer, audience, lifetime)
    }

    /// Claims valid from now for `expires_in`
    ///
    /// A negative duration yields an already expired token, which tests use.
    pub fn with_expiration(
        subject: &str,
        email: Option<&str>,
        issuer: &str,
        audience: &str,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: subject.to_string(),
            email: email.map(str::to_string),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims with HS256
///
/// The identity provider mints real tokens; this exists for tooling and tests.
pub fn create_token(claims: &IdClaims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key).map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies HS256 ID tokens against a shared secret
#[derive(Clone)]
pub struct JwtIdentityVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityVerifier {
    pub fn new(secret: &str, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Decodes and checks a token without the async wrapper
    pub fn verify_sync(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let data = decode::<IdClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => IdentityError::Expired,
            ErrorKind::InvalidIssuer => IdentityError::Invalid("unexpected issuer".to_string()),
            ErrorKind::InvalidAudience => IdentityError::Invalid("unexpected audience".to_string()),
            _ => IdentityError::Invalid(e.to_string()),
        })?;

        let email = data
            .claims
            .email
            .filter(|email| !email.trim().is_empty())
            .ok_or(IdentityError::MissingEmail)?;

        Ok(VerifiedIdentity {
            subject: data.claims.sub,
            email,
        })
    }
}

#[async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        self.verify_sync(token)
    }
}
