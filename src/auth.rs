//! Identity capability: registration, login, and token verification.
//!
//! The catalog core only consumes the resulting [`Caller`]; everything
//! here is thin glue over the account table. Tokens are
//! `base64url(payload).base64url(mac)` with an HMAC-SHA256 MAC over the
//! payload, carrying the account id and an expiry. Passwords are stored
//! as `salt$hex(sha256(salt:password))`.

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::catalog::CatalogError;
use crate::config::AuthConfig;
use crate::models::{Account, Caller, Role};
use crate::store::CatalogStore;

type HmacSha256 = Hmac<Sha256>;

/// Mints and verifies bearer tokens, and manages account credentials.
pub struct Authenticator {
    secret: String,
    token_ttl_secs: i64,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct TokenPayload {
    /// Account id.
    sub: String,
    /// Unix expiry timestamp in seconds.
    exp: i64,
}

fn digest(salt: &str, password: &str) -> String {
    hex::encode(Sha256::digest(format!("{salt}:{password}")))
}

/// Produce a fresh salted digest for storage.
fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{salt}${}", digest(&salt, password))
}

fn verify_password(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, expected)) => digest(salt, password) == expected,
        None => false,
    }
}

impl Authenticator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.token_secret.clone(),
            token_ttl_secs: config.token_ttl_secs,
        }
    }

    /// Create an account. Email is normalized (trimmed, lowercased) and
    /// must be unused.
    pub async fn register(
        &self,
        store: &dyn CatalogStore,
        display_name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Account, CatalogError> {
        let display_name = display_name.trim().to_string();
        let email = email.trim().to_lowercase();

        if display_name.is_empty() || email.is_empty() {
            return Err(CatalogError::InvalidInput(
                "display_name and email are required".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(CatalogError::InvalidInput(format!(
                "not a valid email address: {email}"
            )));
        }
        if password.len() < 8 {
            return Err(CatalogError::InvalidInput(
                "password must be at least 8 characters".to_string(),
            ));
        }

        if store
            .get_account_by_email(&email)
            .await
            .map_err(CatalogError::Store)?
            .is_some()
        {
            return Err(CatalogError::InvalidInput(format!(
                "email already registered: {email}"
            )));
        }

        let account = Account {
            id: Uuid::new_v4().to_string(),
            display_name,
            email,
            role,
            password_digest: hash_password(password),
            created_at: Utc::now().timestamp_millis(),
        };

        store
            .insert_account(&account)
            .await
            .map_err(CatalogError::Store)?;

        Ok(account)
    }

    /// Verify credentials and mint a token.
    pub async fn login(
        &self,
        store: &dyn CatalogStore,
        email: &str,
        password: &str,
    ) -> Result<(String, Account), CatalogError> {
        let email = email.trim().to_lowercase();
        let account = store
            .get_account_by_email(&email)
            .await
            .map_err(CatalogError::Store)?
            .ok_or_else(|| CatalogError::Unauthorized("invalid email or password".to_string()))?;

        if !verify_password(&account.password_digest, password) {
            return Err(CatalogError::Unauthorized(
                "invalid email or password".to_string(),
            ));
        }

        let token = self.mint_token(&account.id);
        Ok((token, account))
    }

    /// Sign a token for an account id.
    pub fn mint_token(&self, account_id: &str) -> String {
        let payload = TokenPayload {
            sub: account_id.to_string(),
            exp: Utc::now().timestamp() + self.token_ttl_secs,
        };
        // TokenPayload serialization cannot fail: two plain fields.
        let payload_json = serde_json::to_vec(&payload).expect("token payload serializes");
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload_json);
        let mac_b64 = URL_SAFE_NO_PAD.encode(self.mac(payload_b64.as_bytes()));
        format!("{payload_b64}.{mac_b64}")
    }

    /// Check a token's MAC and expiry, then resolve the caller from the
    /// store. The catalog trusts the result verbatim.
    pub async fn verify(
        &self,
        store: &dyn CatalogStore,
        token: &str,
    ) -> Result<Caller, CatalogError> {
        let payload = self
            .check_token(token)
            .map_err(|err| CatalogError::Unauthorized(err.to_string()))?;

        let account = store
            .get_account(&payload.sub)
            .await
            .map_err(CatalogError::Store)?
            .ok_or_else(|| CatalogError::Unauthorized("account no longer exists".to_string()))?;

        Ok(Caller::from(&account))
    }

    fn check_token(&self, token: &str) -> Result<TokenPayload> {
        let (payload_b64, mac_b64) = token
            .split_once('.')
            .ok_or_else(|| anyhow!("malformed token"))?;

        let claimed_mac = URL_SAFE_NO_PAD
            .decode(mac_b64)
            .map_err(|_| anyhow!("malformed token signature"))?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&claimed_mac)
            .map_err(|_| anyhow!("token signature mismatch"))?;

        let payload_json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| anyhow!("malformed token payload"))?;
        let payload: TokenPayload =
            serde_json::from_slice(&payload_json).map_err(|_| anyhow!("malformed token payload"))?;

        if payload.exp <= Utc::now().timestamp() {
            return Err(anyhow!("token expired"));
        }

        Ok(payload)
    }

    fn mac(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}
