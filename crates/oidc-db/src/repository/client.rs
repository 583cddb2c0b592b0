//! SurrealDB implementation of [`ClientRepository`].

use chrono::{DateTime, Utc};
use oidc_core::error::OidcResult;
use oidc_core::models::client::{Client, CreateClient, UpdateClient};
use oidc_core::repository::ClientRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ClientRow {
    record_id: String,
    client_id: String,
    client_secret_hash: String,
    name: String,
    redirect_uris: Vec<String>,
    grant_types: Vec<String>,
    response_types: Vec<String>,
    scopes: Vec<String>,
    logo_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ClientRow {
    fn try_into_client(self) -> Result<Client, DbError> {
        Ok(Client {
            id: parse_uuid(&self.record_id, "client")?,
            client_id: self.client_id,
            client_secret_hash: self.client_secret_hash,
            name: self.name,
            redirect_uris: self.redirect_uris,
            grant_types: self.grant_types,
            response_types: self.response_types,
            scopes: self.scopes,
            logo_url: self.logo_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Client repository.
#[derive(Clone)]
pub struct SurrealClientRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealClientRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ClientRepository for SurrealClientRepository<C> {
    async fn create(&self, input: CreateClient) -> OidcResult<Client> {
        let id = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('client', $id) SET \
                 client_id = $client_id, \
                 client_secret_hash = $client_secret_hash, \
                 name = $name, \
                 redirect_uris = $redirect_uris, \
                 grant_types = $grant_types, \
                 response_types = $response_types, \
                 scopes = $scopes, \
                 logo_url = $logo_url; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('client', $id)",
            )
            .bind(("id", id.clone()))
            .bind(("client_id", input.client_id))
            .bind(("client_secret_hash", input.client_secret_hash))
            .bind(("name", input.name))
            .bind(("redirect_uris", input.redirect_uris))
            .bind(("grant_types", input.grant_types))
            .bind(("response_types", input.response_types))
            .bind(("scopes", input.scopes))
            .bind(("logo_url", input.logo_url))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "client"))?;

        let rows: Vec<ClientRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "client".into(),
                id,
            })?;

        Ok(row.try_into_client()?)
    }

    async fn get_by_client_id(&self, client_id: &str) -> OidcResult<Client> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM client \
                 WHERE client_id = $client_id",
            )
            .bind(("client_id", client_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClientRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "client".into(),
                id: format!("client_id={client_id}"),
            })?;

        Ok(row.try_into_client()?)
    }

    async fn update(&self, client_id: &str, input: UpdateClient) -> OidcResult<Client> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.redirect_uris.is_some() {
            sets.push("redirect_uris = $redirect_uris");
        }
        if input.grant_types.is_some() {
            sets.push("grant_types = $grant_types");
        }
        if input.response_types.is_some() {
            sets.push("response_types = $response_types");
        }
        if input.scopes.is_some() {
            sets.push("scopes = $scopes");
        }
        if input.logo_url.is_some() {
            sets.push("logo_url = $logo_url");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE client SET {} WHERE client_id = $client_id; \
             SELECT meta::id(id) AS record_id, * FROM client \
             WHERE client_id = $client_id",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("client_id", client_id.to_string()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(redirect_uris) = input.redirect_uris {
            builder = builder.bind(("redirect_uris", redirect_uris));
        }
        if let Some(grant_types) = input.grant_types {
            builder = builder.bind(("grant_types", grant_types));
        }
        if let Some(response_types) = input.response_types {
            builder = builder.bind(("response_types", response_types));
        }
        if let Some(scopes) = input.scopes {
            builder = builder.bind(("scopes", scopes));
        }
        if let Some(logo_url) = input.logo_url {
            // Some(None) clears the logo.
            builder = builder.bind(("logo_url", logo_url));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "client"))?;

        let rows: Vec<ClientRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "client".into(),
                id: format!("client_id={client_id}"),
            })?;

        Ok(row.try_into_client()?)
    }
}
