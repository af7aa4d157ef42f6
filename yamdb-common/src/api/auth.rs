//! Access tokens and confirmation codes
//!
//! # Architecture
//!
//! - Signup issues a short confirmation code that is mailed to the user.
//!   Only its SHA-256 digest is stored.
//! - Exchanging a valid code yields an HS256 JWT access token carrying the
//!   user id (`sub`) and username.
//! - The signing secret comes from configuration; when none is configured a
//!   random secret is generated once and kept in the `settings` table.
//!
//! This module holds ONLY pure functions and database operations; the axum
//! middleware lives in the API crate.

use chrono::Duration;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::db::init::{get_setting, set_setting};
use crate::time::now;

/// Settings key holding the generated signing secret
pub const JWT_SECRET_SETTING: &str = "jwt_secret";

/// Confirmation code length
pub const CONFIRMATION_CODE_LENGTH: usize = 6;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// ========================================
// Error Types
// ========================================

/// Authentication error types
#[derive(Debug, Clone)]
pub enum ApiAuthError {
    /// Token is malformed or its signature does not verify
    InvalidToken(String),

    /// Token `exp` is in the past
    ExpiredToken,

    /// Token could not be signed
    Encoding(String),

    /// Database error loading or storing the secret
    DatabaseError(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::InvalidToken(reason) => write!(f, "Invalid token: {}", reason),
            ApiAuthError::ExpiredToken => write!(f, "Token has expired"),
            ApiAuthError::Encoding(err) => write!(f, "Token encoding failed: {}", err),
            ApiAuthError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Signing Secret Management
// ========================================

/// Load the token signing secret from the settings table
///
/// Generates and stores a new one on first use.
pub async fn load_jwt_secret(db: &SqlitePool) -> Result<String, ApiAuthError> {
    let existing = get_setting(db, JWT_SECRET_SETTING)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    match existing {
        Some(secret) if !secret.is_empty() => Ok(secret),
        _ => initialize_jwt_secret(db).await,
    }
}

/// Generate a random 256-bit secret, store it and return it
pub async fn initialize_jwt_secret(db: &SqlitePool) -> Result<String, ApiAuthError> {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    let secret: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();

    set_setting(db, JWT_SECRET_SETTING, &secret)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

// ========================================
// Confirmation Codes
// ========================================

/// Random code from `[A-Z0-9]`
pub fn generate_confirmation_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CONFIRMATION_CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// SHA-256 of the code, as 64 hex characters
pub fn hash_confirmation_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check a submitted code against the stored digest
pub fn verify_confirmation_code(code: &str, stored_hash: &str) -> bool {
    let calculated = hash_confirmation_code(code);
    if calculated.len() != stored_hash.len() {
        return false;
    }
    // Compare every byte so timing does not reveal the matching prefix
    calculated
        .bytes()
        .zip(stored_hash.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

// ========================================
// Access Tokens
// ========================================

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, ApiAuthError> {
        self.sub
            .parse()
            .map_err(|_| ApiAuthError::InvalidToken(format!("bad subject '{}'", self.sub)))
    }
}

/// Signs and verifies access tokens
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime: Duration::seconds(lifetime_secs),
        }
    }

    /// Issue a token for the user, valid from now
    pub fn issue(&self, user_id: i64, username: &str) -> Result<String, ApiAuthError> {
        let issued_at = now();
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.lifetime).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, ApiAuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| ApiAuthError::Encoding(e.to_string()))
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims, ApiAuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ApiAuthError::ExpiredToken,
                _ => ApiAuthError::InvalidToken(e.to_string()),
            })
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    #[test]
    fn test_confirmation_code_shape() {
        let code = generate_confirmation_code();
        assert_eq!(code.len(), CONFIRMATION_CODE_LENGTH);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_confirmation_codes_vary() {
        let codes: std::collections::HashSet<String> =
            (0..20).map(|_| generate_confirmation_code()).collect();
        assert!(codes.len() > 1);
    }

    #[test]
    fn test_code_verification() {
        let code = "AB12CD";
        let stored = hash_confirmation_code(code);

        assert_eq!(stored.len(), 64);
        assert!(verify_confirmation_code("AB12CD", &stored));
        assert!(verify_confirmation_code(" AB12CD ", &stored));
        assert!(!verify_confirmation_code("AB12CE", &stored));
        assert!(!verify_confirmation_code("AB12CD", "short"));
    }

    #[test]
    fn test_token_round_trip() {
        let keys = TokenKeys::new("test-secret", 3600);
        let token = keys.issue(42, "reader").unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.username, "reader");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_with_wrong_secret_rejected() {
        let token = TokenKeys::new("secret-a", 3600).issue(1, "a").unwrap();
        let result = TokenKeys::new("secret-b", 3600).verify(&token);
        assert!(matches!(result, Err(ApiAuthError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = TokenKeys::new("test-secret", 3600);
        let issued = now().timestamp() - 7200;
        let token = keys
            .sign(&Claims {
                sub: "1".to_string(),
                username: "a".to_string(),
                iat: issued,
                exp: issued + 3600,
            })
            .unwrap();

        assert!(matches!(keys.verify(&token), Err(ApiAuthError::ExpiredToken)));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let keys = TokenKeys::new("test-secret", 3600);
        assert!(keys.verify("not.a.token").is_err());
    }

    #[tokio::test]
    async fn test_jwt_secret_generated_once() {
        let pool = init_memory_database().await.unwrap();

        let first = load_jwt_secret(&pool).await.unwrap();
        let second = load_jwt_secret(&pool).await.unwrap();

        assert_eq!(first.len(), 64);
        assert_eq!(first, second);
    }
}
