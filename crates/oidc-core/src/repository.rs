//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Lookups that find nothing
//! return [`OidcError::NotFound`](crate::error::OidcError::NotFound).
//! Services depend only on these traits, never on a concrete store.

use uuid::Uuid;

use crate::error::OidcResult;
use crate::models::{
    authorization_code::{AuthorizationCode, CreateAuthorizationCode},
    client::{Client, CreateClient, UpdateClient},
    session::{CreateSession, Session},
    token::{CreateToken, Token},
    user::{CreateUser, UpdateUser, User},
};

// ---------------------------------------------------------------------------
// Clients
// ---------------------------------------------------------------------------

pub trait ClientRepository: Send + Sync {
    fn create(&self, input: CreateClient) -> impl Future<Output = OidcResult<Client>> + Send;
    fn get_by_client_id(
        &self,
        client_id: &str,
    ) -> impl Future<Output = OidcResult<Client>> + Send;
    /// Administrative update. Never called by the protocol flow.
    fn update(
        &self,
        client_id: &str,
        input: UpdateClient,
    ) -> impl Future<Output = OidcResult<Client>> + Send;
}

// ---------------------------------------------------------------------------
// Users & sessions
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Fails with `AlreadyExists` if the email is taken.
    fn create(&self, input: CreateUser) -> impl Future<Output = OidcResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = OidcResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = OidcResult<User>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = OidcResult<User>> + Send;
}

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession) -> impl Future<Output = OidcResult<Session>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = OidcResult<Session>> + Send;
    /// Delete a single session. Deleting a missing session is not an error.
    fn delete(&self, id: Uuid) -> impl Future<Output = OidcResult<()>> + Send;
    /// Delete all sessions for a user (e.g., on password change).
    fn delete_user_sessions(&self, user_id: Uuid)
    -> impl Future<Output = OidcResult<()>> + Send;
    /// Remove all expired sessions, returning how many were removed.
    fn cleanup_expired(&self) -> impl Future<Output = OidcResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Authorization codes
// ---------------------------------------------------------------------------

pub trait AuthorizationCodeRepository: Send + Sync {
    fn create(
        &self,
        input: CreateAuthorizationCode,
    ) -> impl Future<Output = OidcResult<AuthorizationCode>> + Send;
    fn get_by_code(&self, code: &str)
    -> impl Future<Output = OidcResult<AuthorizationCode>> + Send;
    /// Flip `used` from false to true in one conditional write.
    ///
    /// Returns `true` only for the single caller that performed the
    /// transition; every concurrent or later caller gets `false`.
    fn mark_as_used(&self, code: &str) -> impl Future<Output = OidcResult<bool>> + Send;
    fn delete(&self, code: &str) -> impl Future<Output = OidcResult<()>> + Send;
    /// Remove all expired codes, returning how many were removed.
    fn cleanup_expired(&self) -> impl Future<Output = OidcResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Revocation methods are idempotent: revoking an already-revoked
/// token succeeds and leaves the original `revoked_at`/reason intact.
pub trait TokenRepository: Send + Sync {
    fn create(&self, input: CreateToken) -> impl Future<Output = OidcResult<Token>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = OidcResult<Token>> + Send;
    fn get_by_access_token_hash(
        &self,
        access_token_hash: &str,
    ) -> impl Future<Output = OidcResult<Token>> + Send;
    fn get_by_refresh_token_hash(
        &self,
        refresh_token_hash: &str,
    ) -> impl Future<Output = OidcResult<Token>> + Send;
    /// Returns `true` if this call transitioned the token to revoked.
    fn revoke(&self, id: Uuid, reason: &str) -> impl Future<Output = OidcResult<bool>> + Send;
    /// Returns `true` if this call transitioned the token to revoked.
    fn revoke_by_access_token_hash(
        &self,
        access_token_hash: &str,
        reason: &str,
    ) -> impl Future<Output = OidcResult<bool>> + Send;
    /// Revoke every token redeemed from `code`, returning how many
    /// were newly revoked.
    fn revoke_by_authorization_code(
        &self,
        code: &str,
        reason: &str,
    ) -> impl Future<Output = OidcResult<u64>> + Send;
    fn update_last_used(&self, id: Uuid) -> impl Future<Output = OidcResult<()>> + Send;
}
