//! Domain models for the OIDC provider.
//!
//! These are plain data types shared by the protocol layer
//! (`oidc-auth`) and the storage layer (`oidc-db`).

pub mod authorization_code;
pub mod client;
pub mod session;
pub mod token;
pub mod user;
