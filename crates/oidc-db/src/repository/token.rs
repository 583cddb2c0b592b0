//! SurrealDB implementation of [`TokenRepository`].
//!
//! Revocations are conditional on `revoked = false`, so repeating one
//! is a no-op that keeps the first timestamp and reason.

use chrono::{DateTime, Utc};
use oidc_core::error::OidcResult;
use oidc_core::models::token::{CreateToken, TOKEN_TYPE_BEARER, Token};
use oidc_core::repository::TokenRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TokenRow {
    record_id: String,
    access_token_hash: String,
    refresh_token_hash: String,
    authorization_code: Option<String>,
    client_id: String,
    user_id: String,
    scopes: Vec<String>,
    token_type: String,
    access_token_expires_at: DateTime<Utc>,
    refresh_token_expires_at: DateTime<Utc>,
    revoked: bool,
    revoked_at: Option<DateTime<Utc>>,
    revoked_reason: Option<String>,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl TokenRow {
    fn try_into_token(self) -> Result<Token, DbError> {
        Ok(Token {
            id: parse_uuid(&self.record_id, "token")?,
            access_token_hash: self.access_token_hash,
            refresh_token_hash: self.refresh_token_hash,
            authorization_code: self.authorization_code,
            client_id: self.client_id,
            user_id: parse_uuid(&self.user_id, "user")?,
            scopes: self.scopes,
            token_type: self.token_type,
            access_token_expires_at: self.access_token_expires_at,
            refresh_token_expires_at: self.refresh_token_expires_at,
            revoked: self.revoked,
            revoked_at: self.revoked_at,
            revoked_reason: self.revoked_reason,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct RevokedRow {
    revoked: bool,
}

/// SurrealDB implementation of the Token repository.
#[derive(Clone)]
pub struct SurrealTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_one(&self, field: &'static str, value: &str) -> OidcResult<Token> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM token \
             WHERE {field} = $value"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("value", value.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "token".into(),
            id: format!("{field}=<hash>"),
        })?;

        Ok(row.try_into_token()?)
    }

    /// Revoke the live tokens selected by `target` and `filter`,
    /// returning how many changed.
    async fn revoke_where(
        &self,
        target: &'static str,
        filter: &'static str,
        value: String,
        reason: &str,
    ) -> OidcResult<u64> {
        let query = format!(
            "UPDATE {target} SET \
             revoked = true, \
             revoked_at = time::now(), \
             revoked_reason = $reason \
             WHERE {filter}revoked = false"
        );
        let result = self
            .db
            .query(&query)
            .bind(("value", value))
            .bind(("reason", reason.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "token"))?;

        let rows: Vec<RevokedRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.iter().filter(|r| r.revoked).count() as u64)
    }
}

impl<C: Connection> TokenRepository for SurrealTokenRepository<C> {
    async fn create(&self, input: CreateToken) -> OidcResult<Token> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('token', $id) SET \
                 access_token_hash = $access_token_hash, \
                 refresh_token_hash = $refresh_token_hash, \
                 authorization_code = $authorization_code, \
                 client_id = $client_id, \
                 user_id = $user_id, \
                 scopes = $scopes, \
                 token_type = $token_type, \
                 access_token_expires_at = $access_token_expires_at, \
                 refresh_token_expires_at = $refresh_token_expires_at, \
                 revoked = false; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('token', $id)",
            )
            .bind(("id", id_str.clone()))
            .bind(("access_token_hash", input.access_token_hash))
            .bind(("refresh_token_hash", input.refresh_token_hash))
            .bind(("authorization_code", input.authorization_code))
            .bind(("client_id", input.client_id))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("scopes", input.scopes))
            .bind(("token_type", TOKEN_TYPE_BEARER.to_string()))
            .bind(("access_token_expires_at", input.access_token_expires_at))
            .bind(("refresh_token_expires_at", input.refresh_token_expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "token"))?;

        let rows: Vec<TokenRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "token".into(),
            id: id_str,
        })?;

        Ok(row.try_into_token()?)
    }

    async fn get_by_id(&self, id: Uuid) -> OidcResult<Token> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('token', $id)",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "token".into(),
            id: id_str,
        })?;

        Ok(row.try_into_token()?)
    }

    async fn get_by_access_token_hash(&self, access_token_hash: &str) -> OidcResult<Token> {
        self.find_one("access_token_hash", access_token_hash).await
    }

    async fn get_by_refresh_token_hash(&self, refresh_token_hash: &str) -> OidcResult<Token> {
        self.find_one("refresh_token_hash", refresh_token_hash).await
    }

    async fn revoke(&self, id: Uuid, reason: &str) -> OidcResult<bool> {
        let changed = self
            .revoke_where("type::record('token', $value)", "", id.to_string(), reason)
            .await?;
        Ok(changed > 0)
    }

    async fn revoke_by_access_token_hash(
        &self,
        access_token_hash: &str,
        reason: &str,
    ) -> OidcResult<bool> {
        let changed = self
            .revoke_where(
                "token",
                "access_token_hash = $value AND ",
                access_token_hash.to_string(),
                reason,
            )
            .await?;
        Ok(changed > 0)
    }

    async fn revoke_by_authorization_code(&self, code: &str, reason: &str) -> OidcResult<u64> {
        self.revoke_where(
            "token",
            "authorization_code = $value AND ",
            code.to_string(),
            reason,
        )
        .await
    }

    async fn update_last_used(&self, id: Uuid) -> OidcResult<()> {
        self.db
            .query("UPDATE type::record('token', $id) SET last_used_at = time::now()")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "token"))?;

        Ok(())
    }
}
