//! Authentication hook for validating player identity.
//!
//! The queue doesn't implement authentication itself. The upgrade request
//! carries an opaque token; an [`Authenticator`] turns it into the
//! [`SteamId`] of the caller, or rejects it.

use playerqueue_protocol::SteamId;

use crate::ClientError;

/// Validates a client's auth token and returns their identity.
///
/// # Example
///
/// ```rust
/// use playerqueue_client::{Authenticator, ClientError};
/// use playerqueue_protocol::SteamId;
///
/// /// Accepts any numeric token as the caller's Steam ID.
/// /// Only for development.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(
///         &self,
///         token: &str,
///     ) -> Result<SteamId, ClientError> {
///         let sid: SteamId = token.parse().map_err(|_| {
///             ClientError::AuthFailed("token must be a steam id".into())
///         })?;
///         Ok(sid)
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the player's identity.
    ///
    /// # Returns
    /// - `Ok(SteamId)` if the token is accepted
    /// - `Err(ClientError::AuthFailed)` if it is invalid or expired
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<SteamId, ClientError>> + Send;
}
