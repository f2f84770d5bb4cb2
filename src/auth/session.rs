//! Stateless session tokens.
//!
//! A token is a compact HS256 JWS: `b64url(header).b64url(claims).b64url(mac)`.
//! Nothing is stored server side; validity is purely a function of the
//! signature under the process secret and the current time against `exp`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Default session lifetime: 5 minutes.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 300;

const TOKEN_ALG: &str = "HS256";
const TOKEN_TYP: &str = "JWT";

/// Signed claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

/// A freshly minted token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session secret must not be empty")]
    EmptySecret,
    #[error("malformed session token")]
    Malformed,
    #[error("session token signature mismatch")]
    InvalidSignature,
    #[error("session token expired")]
    Expired,
    #[error("failed to sign session token: {0}")]
    Signing(String),
}

/// Process-wide signing key and session lifetime.
pub struct SessionKeys {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::EmptySecret);
        }
        Ok(Self {
            secret: secret.to_vec(),
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a token for `username` valid for the configured TTL from now.
    pub fn issue(&self, username: &str) -> Result<IssuedToken, SessionError> {
        self.issue_at(username, Utc::now())
    }

    /// Mint a token as if the current time were `now`.
    pub fn issue_at(&self, username: &str, now: DateTime<Utc>) -> Result<IssuedToken, SessionError> {
        let iat = now.timestamp();
        let ttl_secs = i64::try_from(self.ttl.as_secs())
            .map_err(|_| SessionError::Signing("session TTL out of range".into()))?;
        let exp = iat
            .checked_add(ttl_secs)
            .ok_or_else(|| SessionError::Signing("session expiry overflows".into()))?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| SessionError::Signing("session expiry out of range".into()))?;

        let claims = Claims {
            username: username.to_string(),
            iat,
            exp,
        };
        let header = Header {
            alg: TOKEN_ALG.into(),
            typ: Some(TOKEN_TYP.into()),
        };

        let header_json =
            serde_json::to_vec(&header).map_err(|e| SessionError::Signing(e.to_string()))?;
        let claims_json =
            serde_json::to_vec(&claims).map_err(|e| SessionError::Signing(e.to_string()))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = self.sign(signing_input.as_bytes())?;

        Ok(IssuedToken {
            token: format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)),
            expires_at,
        })
    }

    /// Validate a token against the current time.
    pub fn verify(&self, token: &str) -> Result<Claims, SessionError> {
        self.verify_at(token, Utc::now())
    }

    /// Validate a token as if the current time were `now`.
    ///
    /// The signature is checked before any claim is trusted. A token is still
    /// valid at exactly `exp` and expired from the next second on.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, SessionError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(SessionError::Malformed);
        };

        let header_json = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| SessionError::Malformed)?;
        let header: Header =
            serde_json::from_slice(&header_json).map_err(|_| SessionError::Malformed)?;
        if header.alg != TOKEN_ALG {
            return Err(SessionError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| SessionError::Malformed)?;
        let signing_input_len = header_b64.len() + 1 + claims_b64.len();
        let signing_input = &token.as_bytes()[..signing_input_len];
        let mut mac = self.mac()?;
        mac.update(signing_input);
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::InvalidSignature)?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| SessionError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&claims_json).map_err(|_| SessionError::Malformed)?;

        if now.timestamp() > claims.exp {
            return Err(SessionError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, SessionError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| SessionError::Signing(e.to_string()))
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, SessionError> {
        let mut mac = self.mac()?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(secret: &[u8]) -> SessionKeys {
        SessionKeys::new(secret, Duration::from_secs(DEFAULT_SESSION_TTL_SECS)).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    const T0: i64 = 1_700_000_000;

    #[test]
    fn issued_token_verifies_before_expiry() {
        let keys = keys(b"test-secret");
        let issued = keys.issue_at("alice", at(T0)).unwrap();
        assert_eq!(issued.expires_at, at(T0 + 300));

        let claims = keys.verify_at(&issued.token, at(T0)).unwrap();
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.iat, T0);
        assert_eq!(claims.exp, T0 + 300);

        assert!(keys.verify_at(&issued.token, at(T0 + 299)).is_ok());
        assert!(keys.verify_at(&issued.token, at(T0 + 300)).is_ok());
    }

    #[test]
    fn token_expires_after_ttl() {
        let keys = keys(b"test-secret");
        let issued = keys.issue_at("alice", at(T0)).unwrap();
        assert_eq!(
            keys.verify_at(&issued.token, at(T0 + 301)),
            Err(SessionError::Expired)
        );
        assert_eq!(
            keys.verify_at(&issued.token, at(T0 + 86_400)),
            Err(SessionError::Expired)
        );
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let issuer = keys(b"secret-a");
        let verifier = keys(b"secret-b");
        let issued = issuer.issue_at("alice", at(T0)).unwrap();
        assert_eq!(
            verifier.verify_at(&issued.token, at(T0)),
            Err(SessionError::InvalidSignature)
        );
        // Still a signature failure once expired: forgery is reported first.
        assert_eq!(
            verifier.verify_at(&issued.token, at(T0 + 10_000)),
            Err(SessionError::InvalidSignature)
        );
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let keys = keys(b"test-secret");
        let issued = keys.issue_at("alice", at(T0)).unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();
        let forged_claims = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&Claims {
                username: "mallory".into(),
                iat: T0,
                exp: T0 + 1_000_000,
            })
            .unwrap(),
        );
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);
        assert_eq!(
            keys.verify_at(&forged, at(T0)),
            Err(SessionError::InvalidSignature)
        );
    }

    #[test]
    fn garbled_tokens_are_malformed() {
        let keys = keys(b"test-secret");
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert_eq!(
                keys.verify_at(token, at(T0)),
                Err(SessionError::Malformed),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn unsupported_algorithm_is_malformed() {
        let keys = keys(b"test-secret");
        let issued = keys.issue_at("alice", at(T0)).unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();
        let none_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let token = format!("{}.{}.{}", none_header, parts[1], parts[2]);
        assert_eq!(keys.verify_at(&token, at(T0)), Err(SessionError::Malformed));
    }

    #[test]
    fn token_has_three_url_safe_segments() {
        let keys = keys(b"test-secret");
        let issued = keys.issue("alice").unwrap();
        assert_eq!(issued.token.split('.').count(), 3);
        assert!(issued
            .token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
        assert_eq!(keys.verify(&issued.token).unwrap().username, "alice");
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert_eq!(
            SessionKeys::new(b"", Duration::from_secs(60)).unwrap_err(),
            SessionError::EmptySecret
        );
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", keys(b"super-secret-key"));
        assert!(!rendered.contains("super-secret-key"));
    }
}
