//! Input validation for registration and credential changes.
//!
//! A [`Validator`] is built from configuration and handed to the
//! services that need it.

use crate::config::AuthConfig;
use crate::error::AuthError;

#[derive(Debug, Clone)]
pub struct Validator {
    min_password_length: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

impl Validator {
    pub fn new(min_password_length: usize) -> Self {
        Self {
            min_password_length,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.min_password_length)
    }

    pub fn validate_name(&self, name: &str) -> Result<(), AuthError> {
        if name.trim().is_empty() {
            return Err(AuthError::Validation("name must not be empty".into()));
        }
        Ok(())
    }

    /// Structural check only: `local@domain.tld`, no whitespace.
    pub fn validate_email(&self, email: &str) -> Result<(), AuthError> {
        let invalid = || AuthError::Validation(format!("invalid email address: {email}"));

        if email.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
        if local.is_empty() || domain.contains('@') {
            return Err(invalid());
        }
        let Some((host, tld)) = domain.rsplit_once('.') else {
            return Err(invalid());
        };
        if host.is_empty() || tld.is_empty() || host.starts_with('.') {
            return Err(invalid());
        }
        Ok(())
    }

    /// Minimum length plus at least one uppercase, lowercase and digit.
    pub fn validate_password(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.min_password_length {
            return Err(AuthError::Validation(format!(
                "password must be at least {} characters",
                self.min_password_length
            )));
        }
        let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        if !(has_upper && has_lower && has_digit) {
            return Err(AuthError::Validation(
                "password must contain upper and lower case letters and a digit".into(),
            ));
        }
        Ok(())
    }

    pub fn validate_registration(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        self.validate_name(name)?;
        self.validate_email(email)?;
        self.validate_password(password)
    }
}
