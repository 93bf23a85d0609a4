/// Identity and authorization
///
/// # Modules
///
/// - [`identity`]: the `IdentityVerifier` seam and the identity it yields
/// - [`jwt`]: HS256 ID token verification with `jsonwebtoken`
/// - [`authorization`]: ownership and role checks on a verified identity
///
/// # Example
///
/// ```
/// use parcelhub_shared::auth::authorization::require_owner;
/// use parcelhub_shared::auth::identity::VerifiedIdentity;
///
/// let identity = VerifiedIdentity {
///     subject: "uid-1".to_string(),
///     email: "a@x.com".to_string(),
/// };
/// assert!(require_owner(&identity, "a@x.com").is_ok());
/// assert!(require_owner(&identity, "b@x.com").is_err());
/// ```

pub mod authorization;
pub mod identity;
pub mod jwt;
