//! SurrealDB implementation of [`AuthorizationCodeRepository`].
//!
//! The code string is the record id. Redemption relies on
//! [`mark_as_used`](AuthorizationCodeRepository::mark_as_used) being a
//! single `UPDATE ... WHERE used = false` on that record.

use chrono::{DateTime, Utc};
use oidc_core::error::OidcResult;
use oidc_core::models::authorization_code::{AuthorizationCode, CreateAuthorizationCode};
use oidc_core::repository::AuthorizationCodeRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuthorizationCodeRow {
    client_id: String,
    user_id: String,
    redirect_uri: String,
    scopes: Vec<String>,
    nonce: Option<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<String>,
    used: bool,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl AuthorizationCodeRow {
    fn into_code(self, code: String) -> Result<AuthorizationCode, DbError> {
        Ok(AuthorizationCode {
            code,
            client_id: self.client_id,
            user_id: parse_uuid(&self.user_id, "user")?,
            redirect_uri: self.redirect_uri,
            scopes: self.scopes,
            nonce: self.nonce,
            code_challenge: self.code_challenge,
            code_challenge_method: self.code_challenge_method,
            used: self.used,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct UsedRow {
    used: bool,
}

/// SurrealDB implementation of the AuthorizationCode repository.
#[derive(Clone)]
pub struct SurrealAuthorizationCodeRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuthorizationCodeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuthorizationCodeRepository for SurrealAuthorizationCodeRepository<C> {
    async fn create(&self, input: CreateAuthorizationCode) -> OidcResult<AuthorizationCode> {
        let result = self
            .db
            .query(
                "CREATE type::record('authorization_code', $code) SET \
                 client_id = $client_id, \
                 user_id = $user_id, \
                 redirect_uri = $redirect_uri, \
                 scopes = $scopes, \
                 nonce = $nonce, \
                 code_challenge = $code_challenge, \
                 code_challenge_method = $code_challenge_method, \
                 used = false, \
                 expires_at = $expires_at",
            )
            .bind(("code", input.code.clone()))
            .bind(("client_id", input.client_id))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("redirect_uri", input.redirect_uri))
            .bind(("scopes", input.scopes))
            .bind(("nonce", input.nonce))
            .bind(("code_challenge", input.code_challenge))
            .bind(("code_challenge_method", input.code_challenge_method))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "authorization_code"))?;

        let rows: Vec<AuthorizationCodeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "authorization_code".into(),
            id: "<redacted>".into(),
        })?;

        Ok(row.into_code(input.code)?)
    }

    async fn get_by_code(&self, code: &str) -> OidcResult<AuthorizationCode> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('authorization_code', $code)")
            .bind(("code", code.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AuthorizationCodeRow> = result.take(0).map_err(DbError::from)?;
        // The code itself is a secret; keep it out of error messages.
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "authorization_code".into(),
            id: "<redacted>".into(),
        })?;

        Ok(row.into_code(code.to_string())?)
    }

    async fn mark_as_used(&self, code: &str) -> OidcResult<bool> {
        let result = self
            .db
            .query(
                "UPDATE type::record('authorization_code', $code) \
                 SET used = true WHERE used = false",
            )
            .bind(("code", code.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "authorization_code"))?;

        // Only the caller that flipped the flag gets a row back.
        let rows: Vec<UsedRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.iter().any(|r| r.used))
    }

    async fn delete(&self, code: &str) -> OidcResult<()> {
        self.db
            .query("DELETE type::record('authorization_code', $code)")
            .bind(("code", code.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "authorization_code"))?;

        Ok(())
    }

    async fn cleanup_expired(&self) -> OidcResult<u64> {
        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM authorization_code \
                 WHERE expires_at < time::now() GROUP ALL",
            )
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        self.db
            .query("DELETE authorization_code WHERE expires_at < time::now()")
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "authorization_code"))?;

        Ok(total)
    }
}
