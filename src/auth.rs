//! Admin login and bearer-token checks.
//!
//! Tokens are HS256 JWTs carrying `{sub, iat, exp}`. There is no revocation
//! list: a token stays valid until `exp`.

use std::collections::HashMap;
use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Default-cost argon2id hash that no password is expected to match.
const UNKNOWN_USER_PHC: &str = "$argon2id$v=19$m=19456,t=2,p=1$Y2hhaW5mb3JtZ3VhcmQhIQ$AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("authorization header missing")]
    MissingToken,
    #[error("authorization header is not a bearer token")]
    MalformedHeader,
    #[error("token expired")]
    Expired,
    #[error("token rejected: {0}")]
    InvalidToken(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Looks up stored password hashes by username.
pub trait CredentialStore: Send + Sync {
    /// Argon2 PHC string for `username`, if the account exists.
    fn password_hash(&self, username: &str) -> Option<String>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryCredentials {
    hashes: HashMap<String, String>,
}

impl InMemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account from an argon2 PHC string.
    pub fn with_hash(
        mut self,
        username: impl Into<String>,
        phc: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let phc = phc.into();
        PasswordHash::new(&phc).map_err(|e| AuthError::Hashing(e.to_string()))?;
        self.hashes.insert(username.into(), phc);
        Ok(self)
    }

    pub fn with_password(
        self,
        username: impl Into<String>,
        password: &str,
    ) -> Result<Self, AuthError> {
        let phc = hash_password(password)?;
        self.with_hash(username, phc)
    }
}

impl CredentialStore for InMemoryCredentials {
    fn password_hash(&self, username: &str) -> Option<String> {
        self.hashes.get(username).cloned()
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub username: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Authenticated admin attached to protected requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub username: String,
    pub expires_at: i64,
}

pub struct AdminAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    store: Arc<dyn CredentialStore>,
}

impl AdminAuth {
    pub fn new(secret: &str, ttl: Duration, store: Arc<dyn CredentialStore>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
            store,
        }
    }

    pub fn login(&self, username: &str, password: &str) -> Result<IssuedToken, AuthError> {
        // Unknown users still pay for one verification.
        let stored = self.store.password_hash(username);
        let known = stored.is_some();
        let phc = stored.unwrap_or_else(|| UNKNOWN_USER_PHC.to_string());
        let parsed = PasswordHash::new(&phc).map_err(|e| AuthError::Hashing(e.to_string()))?;
        let verified = Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
        if !(known && verified) {
            return Err(AuthError::InvalidCredentials);
        }

        self.issue(username)
    }

    fn issue(&self, username: &str) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        Ok(IssuedToken {
            token,
            username: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }

    pub fn authorize(&self, token: &str) -> Result<AdminSession, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;
        Ok(AdminSession {
            username: data.claims.sub,
            expires_at: data.claims.exp,
        })
    }

    /// Validates a raw `Authorization` header value.
    pub fn authorize_header(&self, header: Option<&str>) -> Result<AdminSession, AuthError> {
        let token = bearer_token(header.ok_or(AuthError::MissingToken)?)?;
        self.authorize(token)
    }
}

fn bearer_token(header: &str) -> Result<&str, AuthError> {
    match header.split_once(' ') {
        Some((scheme, token))
            if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() =>
        {
            Ok(token.trim())
        }
        _ => Err(AuthError::MalformedHeader),
    }
}
