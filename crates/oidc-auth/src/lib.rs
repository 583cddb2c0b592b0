//! OIDC Auth: authorization-code flow, token issuance, browser
//! sessions, and credential hashing.

pub mod authorization;
pub mod client;
pub mod config;
pub mod cookie;
pub mod error;
pub mod issuer;
pub mod password;
pub mod pkce;
pub mod service;
pub mod token;
pub mod validation;

pub use authorization::{AuthorizationEngine, AuthorizeRequest, redirect_with_code};
pub use client::{ClientService, CreateClientParams};
pub use config::{AuthConfig, HashParams};
pub use cookie::SessionSigner;
pub use error::{AuthError, AuthResult};
pub use issuer::{TokenIssuer, TokenRequest, TokenResponse};
pub use password::CredentialVault;
pub use service::{AuthService, LoginInput, LoginOutput, RegisterInput};
pub use token::{AccessTokenClaims, IdTokenClaims};
pub use validation::Validator;
