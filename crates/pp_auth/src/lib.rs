//! `pp_auth` - credential hashing and session tokens
//!
//! Passwords are hashed with bcrypt. Sessions are stateless HS256 JWTs
//! carrying the account id, email, display name, and role. The signing
//! secret must be at least [`MIN_SECRET_LEN`] bytes; a shorter secret is
//! rejected at startup rather than silently weakening every token.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum length of the JWT signing secret, in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("JWT secret must be at least {MIN_SECRET_LEN} characters")]
    WeakSecret,

    #[error("Password hashing failed: {0}")]
    HashError(#[from] bcrypt::BcryptError),

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Token encoding failed: {0}")]
    TokenError(#[from] jsonwebtoken::errors::Error),
}

/// Claims embedded in a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub role: String,
    pub exp: usize,
}

/// Paired signing and verification keys derived from one shared secret
#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_ttl_secs: u64,
}

impl AuthKeys {
    /// Build keys from a shared secret
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::WeakSecret`] when the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn from_secret(secret: &str, token_ttl_secs: u64) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::WeakSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl_secs,
        })
    }

    /// Issue a session token for an authenticated account
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenError`] if encoding fails.
    pub fn sign_token(
        &self,
        user_id: i64,
        email: &str,
        name: &str,
        role: &str,
    ) -> Result<String, AuthError> {
        let exp = Utc::now().timestamp() as usize + self.token_ttl_secs as usize;
        let claims = Claims {
            user_id,
            email: email.to_string(),
            name: name.to_string(),
            role: role.to_string(),
            exp,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    /// Verify a token and return its claims
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] for any signature, structure, or
    /// expiry failure. Callers get no distinction; the response is 401 either
    /// way.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Session lifetime in seconds
    #[must_use]
    pub fn token_ttl_secs(&self) -> u64 {
        self.token_ttl_secs
    }
}

/// Hash a password with bcrypt at the default cost
///
/// # Errors
///
/// Returns [`AuthError::HashError`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// Check a candidate password against a stored hash
///
/// # Errors
///
/// Returns [`AuthError::HashError`] if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    Ok(bcrypt::verify(password, hash)?)
}
