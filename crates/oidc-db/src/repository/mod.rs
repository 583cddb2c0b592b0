//! SurrealDB repository implementations.

mod authorization_code;
mod client;
mod session;
mod token;
mod user;

pub use authorization_code::SurrealAuthorizationCodeRepository;
pub use client::SurrealClientRepository;
pub use session::SurrealSessionRepository;
pub use token::SurrealTokenRepository;
pub use user::SurrealUserRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::InvalidData(format!("invalid {what} UUID: {e}")))
}
