//! Storage endpoint selection and session setup.
//!
//! The endpoint scheme picks the engine: `ws://host:port` or
//! `wss://host:port` for a SurrealDB server, `mem://` for an
//! in-process store that lives as long as the [`DbManager`].

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::{debug, info};

use crate::error::DbError;
use crate::schema::{run_migrations, schema_version};

/// Root credentials for a server endpoint.
#[derive(Debug, Clone)]
pub struct DbCredentials {
    pub username: String,
    pub password: String,
}

/// Where the identity store lives and which namespace it uses.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Engine endpoint, e.g. `ws://127.0.0.1:8000` or `mem://`.
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    /// `None` skips sign-in, which in-process endpoints require.
    pub credentials: Option<DbCredentials>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8000".into(),
            namespace: "oidc".into(),
            database: "main".into(),
            credentials: Some(DbCredentials {
                username: "root".into(),
                password: "root".into(),
            }),
        }
    }
}

impl DbConfig {
    /// Throwaway in-process store.
    pub fn in_memory() -> Self {
        Self {
            endpoint: "mem://".into(),
            credentials: None,
            ..Self::default()
        }
    }

    fn is_remote(&self) -> bool {
        self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")
    }
}

/// Handle to the identity store shared by every repository.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
}

impl DbManager {
    /// Open the configured endpoint and select its namespace and
    /// database. Remote endpoints must carry credentials.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        if config.is_remote() && config.credentials.is_none() {
            return Err(DbError::InvalidData(format!(
                "endpoint {} needs credentials",
                config.endpoint
            )));
        }

        info!(
            endpoint = %config.endpoint,
            namespace = %config.namespace,
            database = %config.database,
            "Opening identity store"
        );
        let db = any::connect(config.endpoint.as_str()).await?;

        if let Some(credentials) = &config.credentials {
            debug!(username = %credentials.username, "Signing in as root");
            db.signin(Root {
                username: credentials.username.clone(),
                password: credentials.password.clone(),
            })
            .await?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        Ok(Self { db })
    }

    /// Apply pending migrations and return the resulting schema version.
    pub async fn migrate(&self) -> Result<u32, DbError> {
        run_migrations(&self.db).await?;
        let version = schema_version(&self.db).await?;
        info!(version, "Identity store schema up to date");
        Ok(version)
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }
}
