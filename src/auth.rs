//! Session tokens
//!
//! Stateless bearer tokens of the form `v1.<user_id>.<issued_at>.<mac>`,
//! authenticated with HMAC-SHA256 over the leading three fields. Tokens
//! carry no expiry; rotation happens by changing the secret.

use crate::error::{CoachError, Result};
use crate::types::UserId;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION: &str = "v1";

#[cfg_attr(test, mockall::automock)]
pub trait SessionAuthenticator: Send + Sync {
    /// Mint a token for a user
    fn issue(&self, user_id: UserId) -> String;

    /// Validate a token and return the user it names
    fn verify(&self, token: &str) -> Result<UserId>;
}

/// HMAC-SHA256 token authenticator keyed by a shared secret
pub struct HmacTokenAuthenticator {
    key: Vec<u8>,
}

impl HmacTokenAuthenticator {
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(CoachError::Config(config::ConfigError::Message(
                "session token secret is not set".to_string(),
            )));
        }
        Ok(Self {
            key: secret.as_bytes().to_vec(),
        })
    }

    fn mac_for(&self, payload: &str) -> HmacSha256 {
        // HMAC accepts any key length
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC key");
        mac.update(payload.as_bytes());
        mac
    }
}

impl SessionAuthenticator for HmacTokenAuthenticator {
    fn issue(&self, user_id: UserId) -> String {
        let payload = format!("{TOKEN_VERSION}.{}.{}", user_id, Utc::now().timestamp());
        let tag = self.mac_for(&payload).finalize().into_bytes();
        format!("{payload}.{}", hex::encode(tag))
    }

    fn verify(&self, token: &str) -> Result<UserId> {
        let unauthorized = || CoachError::Unauthorized("invalid session token".to_string());

        let parts: Vec<&str> = token.split('.').collect();
        let [version, user_id, issued_at, tag] = parts.as_slice() else {
            return Err(unauthorized());
        };
        if *version != TOKEN_VERSION {
            return Err(unauthorized());
        }

        let id: i64 = user_id.parse().map_err(|_| unauthorized())?;
        let _: i64 = issued_at.parse().map_err(|_| unauthorized())?;

        let tag = hex::decode(tag).map_err(|_| unauthorized())?;
        let payload = format!("{version}.{user_id}.{issued_at}");
        self.mac_for(&payload)
            .verify_slice(&tag)
            .map_err(|_| unauthorized())?;

        Ok(UserId(id))
    }
}
