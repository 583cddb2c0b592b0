//! OIDC Server: bootstrap and maintenance entry point.
//!
//! HTTP transport lives elsewhere; this binary owns logging setup,
//! configuration from flags and `OIDC_*` environment variables, and
//! the administrative subcommands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use oidc_auth::{
    AuthConfig, AuthService, AuthorizationEngine, ClientService, CreateClientParams,
    CredentialVault, HashParams,
};
use oidc_db::repository::{
    SurrealAuthorizationCodeRepository, SurrealClientRepository, SurrealSessionRepository,
    SurrealUserRepository,
};
use oidc_db::{DbConfig, DbCredentials, DbManager};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oidc-server", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    #[command(flatten)]
    auth: AuthArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending schema migrations
    Migrate,

    /// Delete expired sessions and authorization codes
    Cleanup,

    /// Register an OAuth client and print its credentials once
    RegisterClient(RegisterClientArgs),
}

#[derive(Args)]
struct DbArgs {
    /// Storage endpoint: `ws://host:port`, `wss://host:port` or `mem://`
    #[arg(long, env = "OIDC_DB_ENDPOINT", default_value = "ws://127.0.0.1:8000")]
    db_endpoint: String,

    #[arg(long, env = "OIDC_DB_NAMESPACE", default_value = "oidc")]
    db_namespace: String,

    #[arg(long, env = "OIDC_DB_DATABASE", default_value = "main")]
    db_database: String,

    /// Root user; omit for `mem://`
    #[arg(long, env = "OIDC_DB_USERNAME", requires = "db_password")]
    db_username: Option<String>,

    #[arg(long, env = "OIDC_DB_PASSWORD", hide_env_values = true)]
    db_password: Option<String>,
}

impl DbArgs {
    fn to_config(&self) -> DbConfig {
        DbConfig {
            endpoint: self.db_endpoint.clone(),
            namespace: self.db_namespace.clone(),
            database: self.db_database.clone(),
            credentials: self
                .db_username
                .clone()
                .zip(self.db_password.clone())
                .map(|(username, password)| DbCredentials { username, password }),
        }
    }
}

#[derive(Args)]
struct AuthArgs {
    /// PEM file with the Ed25519 JWT signing key
    #[arg(long, env = "OIDC_JWT_PRIVATE_KEY_FILE")]
    jwt_private_key_file: Option<PathBuf>,

    /// PEM file with the Ed25519 JWT verification key
    #[arg(long, env = "OIDC_JWT_PUBLIC_KEY_FILE")]
    jwt_public_key_file: Option<PathBuf>,

    #[arg(long, env = "OIDC_JWT_ISSUER", default_value = "oidc")]
    jwt_issuer: String,

    /// HMAC key for session cookies (at least 32 bytes)
    #[arg(long, env = "OIDC_SESSION_SECRET", hide_env_values = true)]
    session_secret: String,

    #[arg(long, env = "OIDC_ACCESS_TOKEN_TTL", default_value_t = 900)]
    access_token_ttl: u64,

    #[arg(long, env = "OIDC_REFRESH_TOKEN_TTL", default_value_t = 2_592_000)]
    refresh_token_ttl: u64,

    #[arg(long, env = "OIDC_AUTHORIZATION_CODE_TTL", default_value_t = 600)]
    authorization_code_ttl: u64,

    #[arg(long, env = "OIDC_SESSION_TTL", default_value_t = 86_400)]
    session_ttl: u64,

    /// Argon2id memory cost in KiB
    #[arg(long, env = "OIDC_HASH_MEMORY_KIB", default_value_t = 65_536)]
    hash_memory_kib: u32,

    #[arg(long, env = "OIDC_HASH_ITERATIONS", default_value_t = 3)]
    hash_iterations: u32,

    #[arg(long, env = "OIDC_HASH_PARALLELISM", default_value_t = 2)]
    hash_parallelism: u32,

    #[arg(long, env = "OIDC_MIN_PASSWORD_LENGTH", default_value_t = 8)]
    min_password_length: usize,
}

impl AuthArgs {
    fn to_config(&self) -> Result<AuthConfig> {
        let read_pem = |path: &Option<PathBuf>| -> Result<String> {
            match path {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read key file {}", path.display())),
                None => Ok(String::new()),
            }
        };

        let defaults = AuthConfig::default();
        Ok(AuthConfig {
            jwt_private_key_pem: read_pem(&self.jwt_private_key_file)?,
            jwt_public_key_pem: read_pem(&self.jwt_public_key_file)?,
            jwt_issuer: self.jwt_issuer.clone(),
            access_token_lifetime_secs: self.access_token_ttl,
            refresh_token_lifetime_secs: self.refresh_token_ttl,
            authorization_code_lifetime_secs: self.authorization_code_ttl,
            session_secret: self.session_secret.clone(),
            session_lifetime_secs: self.session_ttl,
            password_hash: HashParams {
                memory_kib: self.hash_memory_kib,
                iterations: self.hash_iterations,
                parallelism: self.hash_parallelism,
                ..defaults.password_hash
            },
            min_password_length: self.min_password_length,
            ..defaults
        })
    }
}

#[derive(Args)]
struct RegisterClientArgs {
    /// Display name
    #[arg(long)]
    name: String,

    /// Allowed redirect URI (repeatable)
    #[arg(long = "redirect-uri", required = true)]
    redirect_uris: Vec<String>,

    /// Allowed scope (repeatable)
    #[arg(long = "scope", default_value = "openid")]
    scopes: Vec<String>,

    /// Allowed grant type (repeatable; defaults to authorization_code and refresh_token)
    #[arg(long = "grant-type")]
    grant_types: Vec<String>,

    /// Allowed response type (repeatable; defaults to code)
    #[arg(long = "response-type")]
    response_types: Vec<String>,

    #[arg(long)]
    logo_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("oidc=info".parse()?))
        .json()
        .init();

    let cli = Cli::parse();
    let auth_config = cli.auth.to_config()?;
    auth_config.validate().context("invalid auth configuration")?;

    let manager = DbManager::connect(&cli.db.to_config())
        .await
        .context("failed to open the identity store")?;
    let db = manager.client().clone();

    match cli.command {
        Command::Migrate => {
            manager.migrate().await?;
        }
        Command::Cleanup => {
            let auth = AuthService::new(
                SurrealUserRepository::new(db.clone()),
                SurrealSessionRepository::new(db.clone()),
                &auth_config,
            )?;
            let engine = AuthorizationEngine::new(
                SurrealClientRepository::new(db.clone()),
                SurrealAuthorizationCodeRepository::new(db.clone()),
                &auth_config,
            )?;

            let sessions = auth.purge_expired_sessions().await?;
            let codes = engine.purge_expired_codes().await?;
            info!(sessions, codes, "Cleanup finished");
        }
        Command::RegisterClient(args) => {
            let clients = ClientService::new(
                SurrealClientRepository::new(db.clone()),
                CredentialVault::new(auth_config.password_hash),
            );
            let (client, secret) = clients
                .register_client(CreateClientParams {
                    name: args.name,
                    redirect_uris: args.redirect_uris,
                    grant_types: args.grant_types,
                    response_types: args.response_types,
                    scopes: args.scopes,
                    logo_url: args.logo_url,
                })
                .await?;

            // The secret is only recoverable here.
            println!("client_id:     {}", client.client_id);
            println!("client_secret: {secret}");
        }
    }

    Ok(())
}
