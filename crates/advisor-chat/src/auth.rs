//! Credential issuance and bearer token validation.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use advisor_core::config::AuthConfig;

/// Decides whether a bearer credential is acceptable.
pub trait Authenticator: Send + Sync {
    fn validate(&self, token: &str) -> bool;
}

/// A token handed out by a successful login.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Username/password login issuing expiring random tokens.
pub struct TokenAuthenticator {
    username: String,
    password: String,
    ttl: TimeDelta,
    tokens: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl TokenAuthenticator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            ttl: i64::try_from(config.token_ttl_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Check credentials and issue a fresh token.
    pub fn login(&self, username: &str, password: &str) -> Option<IssuedToken> {
        if username != self.username || password != self.password {
            warn!(username, "Rejected login attempt");
            return None;
        }

        let token = generate_token();
        let expires_at = Utc::now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), expires_at);
        info!(username, %expires_at, "Issued API token");

        Some(IssuedToken {
            token,
            username: username.to_string(),
            expires_at,
        })
    }

    /// Number of unexpired tokens.
    pub fn active_tokens(&self) -> usize {
        let now = Utc::now();
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|exp| **exp > now)
            .count()
    }
}

impl Authenticator for TokenAuthenticator {
    fn validate(&self, token: &str) -> bool {
        let now = Utc::now();
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens.retain(|_, exp| *exp > now);
        tokens.contains_key(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator(ttl_secs: u64) -> TokenAuthenticator {
        TokenAuthenticator::new(&AuthConfig {
            username: "operator".to_string(),
            password: "s3cret".to_string(),
            token_ttl_secs: ttl_secs,
        })
    }

    #[test]
    fn test_generate_token_format() {
        let token = generate_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_login_issues_valid_token() {
        let auth = authenticator(60);
        let issued = auth.login("operator", "s3cret").unwrap();
        assert_eq!(issued.username, "operator");
        assert!(issued.expires_at > Utc::now());
        assert!(auth.validate(&issued.token));
        assert_eq!(auth.active_tokens(), 1);
    }

    #[test]
    fn test_login_rejects_bad_credentials() {
        let auth = authenticator(60);
        assert!(auth.login("operator", "wrong").is_none());
        assert!(auth.login("intruder", "s3cret").is_none());
        assert_eq!(auth.active_tokens(), 0);
    }

    #[test]
    fn test_unknown_token_rejected() {
        let auth = authenticator(60);
        auth.login("operator", "s3cret").unwrap();
        assert!(!auth.validate("deadbeef"));
        assert!(!auth.validate(""));
    }

    #[test]
    fn test_expired_token_rejected_and_pruned() {
        let auth = authenticator(0);
        let issued = auth.login("operator", "s3cret").unwrap();
        assert!(!auth.validate(&issued.token));
        assert_eq!(auth.tokens.lock().unwrap().len(), 0);
    }

    #[test]
    fn test_oversized_ttl_saturates() {
        for ttl in [9_000_000_000_000, i64::MAX as u64, u64::MAX] {
            let auth = authenticator(ttl);
            let issued = auth.login("operator", "s3cret").unwrap();
            assert!(issued.expires_at > Utc::now());
            assert!(auth.validate(&issued.token));
        }
    }

    #[test]
    fn test_issued_token_json_shape() {
        let auth = authenticator(60);
        let json = serde_json::to_value(auth.login("operator", "s3cret").unwrap()).unwrap();
        assert!(json["token"].is_string());
        assert_eq!(json["username"], "operator");
        assert!(json.get("expiresAt").is_some());
    }
}
