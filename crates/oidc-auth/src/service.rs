//! Authentication service: registration, login and session
//! orchestration (the UserAuthenticator).

use chrono::{Duration, Utc};
use oidc_core::error::OidcError;
use oidc_core::models::session::{CreateSession, Session};
use oidc_core::models::user::{CreateUser, UpdateUser, User};
use oidc_core::repository::{SessionRepository, UserRepository};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::cookie::SessionSigner;
use crate::error::{AuthError, AuthResult};
use crate::password::{CredentialVault, PasswordError};
use crate::validation::Validator;

/// Input for user registration.
#[derive(Debug)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Input for the login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    /// Session lifetime; `None` uses the configured default.
    pub ttl: Option<Duration>,
}

/// Successful login result.
#[derive(Debug)]
pub struct LoginOutput {
    pub session: Session,
    pub user: User,
    /// Signed session id, ready to be set as the cookie value.
    pub session_cookie: String,
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct AuthService<U: UserRepository, S: SessionRepository> {
    user_repo: U,
    session_repo: S,
    vault: CredentialVault,
    signer: SessionSigner,
    validator: Validator,
    default_session_ttl: Duration,
}

impl<U: UserRepository, S: SessionRepository> AuthService<U, S> {
    /// Fails if the session secret is too short, the session lifetime
    /// is out of range, or the hash parameters are unusable.
    pub fn new(user_repo: U, session_repo: S, config: &AuthConfig) -> AuthResult<Self> {
        let vault = CredentialVault::new(config.password_hash);
        vault.prepare_decoy()?;
        Ok(Self {
            user_repo,
            session_repo,
            vault,
            signer: SessionSigner::new(&config.session_secret)?,
            validator: Validator::from_config(config),
            default_session_ttl: config.session_lifetime()?,
        })
    }

    pub fn signer(&self) -> &SessionSigner {
        &self.signer
    }

    /// Create an unverified account.
    pub async fn register(&self, input: RegisterInput) -> AuthResult<User> {
        self.validator
            .validate_registration(&input.name, &input.email, &input.password)?;

        match self.user_repo.get_by_email(&input.email).await {
            Ok(_) => return Err(AuthError::UserAlreadyExists),
            Err(OidcError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let password_hash = self.vault.hash(&input.password)?;

        // The unique index still guards against a concurrent registration.
        let user = self
            .user_repo
            .create(CreateUser {
                name: input.name.trim().to_string(),
                email: input.email,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                OidcError::AlreadyExists { .. } => AuthError::UserAlreadyExists,
                other => AuthError::Storage(other),
            })?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Check credentials. Unverified accounts are rejected outright.
    pub async fn authenticate(&self, email: &str, password: &str) -> AuthResult<User> {
        // 1. Look up user. A miss still pays for one hash comparison.
        let user = match self.user_repo.get_by_email(email).await {
            Ok(user) => user,
            Err(OidcError::NotFound { .. }) => {
                return match self.vault.compare_decoy(password) {
                    Ok(()) | Err(PasswordError::Mismatch) => Err(AuthError::UserNotFound),
                    Err(e) => Err(e.into()),
                };
            }
            Err(e) => return Err(e.into()),
        };

        // 2. Verify password.
        match self.vault.compare(password, &user.password_hash) {
            Ok(()) => {}
            Err(PasswordError::Mismatch) => {
                warn!(user_id = %user.id, "Password mismatch");
                return Err(AuthError::PasswordMismatch);
            }
            Err(e) => return Err(e.into()),
        }

        // 3. Check verification status.
        if !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        Ok(user)
    }

    /// Authenticate and open a session.
    pub async fn login(&self, input: LoginInput) -> AuthResult<LoginOutput> {
        let user = self.authenticate(&input.email, &input.password).await?;

        let ttl = input.ttl.unwrap_or(self.default_session_ttl);
        let session = self
            .session_repo
            .create(CreateSession {
                user_id: user.id,
                expires_at: Utc::now() + ttl,
            })
            .await?;

        let session_cookie = self.signer.sign(&session.id.to_string());

        info!(user_id = %user.id, session_id = %session.id, "User logged in");
        Ok(LoginOutput {
            session,
            user,
            session_cookie,
        })
    }

    /// Resolve a session id to its owning user.
    ///
    /// Expired sessions are deleted on sight.
    pub async fn resolve_session(&self, session_id: Uuid) -> AuthResult<User> {
        let session = self
            .session_repo
            .get_by_id(session_id)
            .await
            .map_err(|e| match e {
                OidcError::NotFound { .. } => AuthError::SessionNotFound,
                other => AuthError::Storage(other),
            })?;

        if session.is_expired() {
            self.session_repo.delete(session.id).await?;
            debug!(session_id = %session.id, "Deleted expired session");
            return Err(AuthError::SessionExpired);
        }

        self.user_repo
            .get_by_id(session.user_id)
            .await
            .map_err(|e| match e {
                OidcError::NotFound { .. } => AuthError::UserNotFound,
                other => AuthError::Storage(other),
            })
    }

    /// Verify a signed cookie value and resolve its session.
    pub async fn resolve_session_cookie(&self, cookie: &str) -> AuthResult<User> {
        let value = self.signer.verify(cookie)?;
        let session_id =
            Uuid::parse_str(&value).map_err(|_| AuthError::InvalidSessionSignature)?;
        self.resolve_session(session_id).await
    }

    /// Invalidate a single session. Unknown ids are ignored.
    pub async fn logout(&self, session_id: Uuid) -> AuthResult<()> {
        self.session_repo.delete(session_id).await?;
        info!(session_id = %session_id, "Session closed");
        Ok(())
    }

    pub async fn verify_email(&self, user_id: Uuid) -> AuthResult<User> {
        let user = self
            .user_repo
            .update(
                user_id,
                UpdateUser {
                    email_verified: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| match e {
                OidcError::NotFound { .. } => AuthError::UserNotFound,
                other => AuthError::Storage(other),
            })?;

        info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    /// Rotate a user's password and close all of their sessions.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        let user = self.user_repo.get_by_id(user_id).await.map_err(|e| match e {
            OidcError::NotFound { .. } => AuthError::UserNotFound,
            other => AuthError::Storage(other),
        })?;

        self.vault.compare(current_password, &user.password_hash)?;
        self.validator.validate_password(new_password)?;

        let password_hash = self.vault.hash(new_password)?;
        self.user_repo
            .update(
                user_id,
                UpdateUser {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await?;

        self.session_repo.delete_user_sessions(user_id).await?;

        info!(user_id = %user_id, "Password changed, sessions revoked");
        Ok(())
    }

    pub async fn purge_expired_sessions(&self) -> AuthResult<u64> {
        let removed = self.session_repo.cleanup_expired().await?;
        debug!(removed, "Purged expired sessions");
        Ok(removed)
    }
}
