//! Password hashing and signed access tokens.
//!
//! Passwords are stored as `pbkdf2$<iterations>$<salt hex>$<hash hex>`.
//! Access tokens are compact HS256 JWTs.

use crate::config::JwtConfig;
use crate::error::{CoreError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_SIZE: usize = 16;
const HASH_SIZE: usize = 32;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let hash = derive(password, &salt, PBKDF2_ITERATIONS);
    format!(
        "pbkdf2${}${}${}",
        PBKDF2_ITERATIONS,
        hex::encode(salt),
        hex::encode(hash)
    )
}

/// Check a password against an encoded hash. Malformed hashes never verify.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let parts: Vec<&str> = encoded.split('$').collect();
    let [scheme, iterations, salt, hash] = parts.as_slice() else {
        return false;
    };
    if *scheme != "pbkdf2" {
        return false;
    }

    let (Ok(iterations), Ok(salt), Ok(expected)) =
        (iterations.parse::<u32>(), hex::decode(salt), hex::decode(hash))
    else {
        return false;
    };

    let actual = derive(password, &salt, iterations);
    constant_time_eq(&actual, &expected)
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_SIZE] {
    use pbkdf2::pbkdf2_hmac;

    let mut out = [0u8; HASH_SIZE];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<i64>,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub perms: Vec<String>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> i64 {
        self.sub
    }

    pub fn has_permission(&self, code: &str) -> bool {
        self.admin || self.perms.iter().any(|p| p == code)
    }

    pub fn require(&self, code: &str) -> Result<()> {
        if self.has_permission(code) {
            Ok(())
        } else {
            Err(CoreError::forbidden(format!("missing permission {}", code)))
        }
    }
}

/// Identity a token is issued for.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: i64,
    pub username: String,
    pub betting_pool_id: Option<i64>,
    pub is_admin: bool,
    pub permissions: Vec<String>,
}

#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            secret: config.secret.as_bytes().to_vec(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::minutes(config.token_ttl_minutes),
        }
    }

    pub fn issue(&self, subject: &TokenSubject) -> Result<(String, DateTime<Utc>)> {
        self.issue_at(subject, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject: &TokenSubject,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>)> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: subject.user_id,
            name: subject.username.clone(),
            pool: subject.betting_pool_id,
            admin: subject.is_admin,
            perms: subject.permissions.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{}.{}", header, payload);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes())?);

        Ok((format!("{}.{}", signing_input, signature), expires_at))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CoreError::unauthorized("malformed token"));
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| CoreError::unauthorized("malformed token signature"))?;

        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| CoreError::unauthorized("invalid token signature"))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| CoreError::unauthorized("malformed token payload"))?;
        let claims: Claims = serde_json::from_slice(&payload)
            .map_err(|_| CoreError::unauthorized("malformed token claims"))?;

        if claims.iss != self.issuer || claims.aud != self.audience {
            return Err(CoreError::unauthorized("token issued for another audience"));
        }
        if claims.exp <= now.timestamp() {
            return Err(CoreError::unauthorized("token expired"));
        }

        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| CoreError::internal(format!("Invalid signing key: {}", e)))
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
