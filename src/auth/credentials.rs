//! Password hashing and session tokens.

use crate::config::AuthConfig;
use crate::types::Role;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("invalid or expired token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Hashes and verifies passwords, issues and validates session tokens.
pub struct Credentials {
    hasher: Argon2<'static>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_secs: i64,
}

impl Credentials {
    pub fn new(config: &AuthConfig) -> Result<Self, CredentialError> {
        let params = Params::new(config.hash_memory_kib, config.hash_iterations, 1, None)
            .map_err(|e| CredentialError::Hash(e.to_string()))?;

        Ok(Self {
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            token_ttl_secs: i64::from(config.token_ttl_days) * 24 * 60 * 60,
        })
    }

    /// Hash a password into a PHC string with a fresh salt.
    pub fn hash_password(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Check a password against a stored hash. Unparseable hashes never match.
    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .hasher
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Issue a token for `user_id` valid for the configured TTL.
    pub fn issue_token(&self, user_id: &str) -> Result<String, CredentialError> {
        self.issue_token_at(user_id, Utc::now().timestamp())
    }

    fn issue_token_at(&self, user_id: &str, issued_at: i64) -> Result<String, CredentialError> {
        let claims = Claims {
            user_id: user_id.to_string(),
            iat: issued_at,
            exp: issued_at + self.token_ttl_secs,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(CredentialError::Signing)
    }

    /// Validate signature and expiry, returning the claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, CredentialError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(CredentialError::InvalidToken)
    }
}

/// Role for a new account: admin only when an invite token is configured and
/// the supplied one matches it exactly.
pub fn resolve_role(supplied: Option<&str>, configured: Option<&str>) -> Role {
    match (supplied, configured) {
        (Some(supplied), Some(configured)) if !configured.is_empty() && supplied == configured => {
            Role::Admin
        }
        _ => Role::User,
    }
}
