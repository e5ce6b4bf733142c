//! Signed bearer tokens.
//!
//! Tokens are compact HS256 JSON Web Tokens. An access token authorizes
//! API calls for a few minutes; a refresh token lives longer and can only
//! be exchanged for a new access token. Both carry the user ID, issue and
//! expiry times (Unix seconds), a unique `jti`, and their kind in
//! `token_type` so one can never be used in place of the other.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use rpi_core::config::AuthConfig;
use rpi_core::{Error, Result, UserId};

/// Message returned for every verification failure.
pub const INVALID_TOKEN: &str = "Token is invalid or expired";

/// Which of the two credentials a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims carried by both token kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: TokenKind,
    pub user_id: UserId,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// An access/refresh pair handed out at login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and verifies tokens with a single HMAC key.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenSigner {
    pub fn new(key: impl AsRef<[u8]>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            encoding: EncodingKey::from_secret(key.as_ref()),
            decoding: DecodingKey::from_secret(key.as_ref()),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Build a signer from the auth config.
    ///
    /// Without a configured secret a random one is generated, which means
    /// tokens stop verifying when the process restarts.
    pub fn from_config(auth: &AuthConfig) -> Self {
        let key = match &auth.jwt_secret {
            Some(secret) => secret.clone(),
            None => {
                tracing::warn!("No auth.jwt_secret configured; using an ephemeral signing key");
                generate_secret()
            }
        };
        Self::new(
            key,
            Duration::from_secs(auth.access_token_minutes.saturating_mul(60)),
            Duration::from_secs(auth.refresh_token_hours.saturating_mul(3600)),
        )
    }

    /// Issue a fresh access + refresh pair for `user_id`.
    pub fn issue_pair(&self, user_id: UserId) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenKind::Access)?,
            refresh: self.issue(user_id, TokenKind::Refresh)?,
        })
    }

    /// Issue a single token of the given kind.
    pub fn issue(&self, user_id: UserId, kind: TokenKind) -> Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let iat = Utc::now().timestamp();
        self.sign(&Claims {
            token_type: kind,
            user_id,
            iat,
            exp: iat.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
            jti: uuid::Uuid::new_v4().simple().to_string(),
        })
    }

    /// Exchange a valid refresh token for a new access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<(UserId, String)> {
        let claims = self.verify(refresh_token, TokenKind::Refresh)?;
        let access = self.issue(claims.user_id, TokenKind::Access)?;
        Ok((claims.user_id, access))
    }

    /// Check signature, algorithm, expiry and kind, returning the claims.
    ///
    /// Every failure maps to the same [`Error::Unauthorized`] message; the
    /// specific reason is only logged at debug level.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims> {
        let rejected = |reason: String| {
            tracing::debug!("Rejected token: {reason}");
            Error::Unauthorized(INVALID_TOKEN.into())
        };

        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| rejected(e.to_string()))?
            .claims;

        if claims.token_type != expected {
            return Err(rejected(format!(
                "expected {expected:?} token, got {:?}",
                claims.token_type
            )));
        }
        // A token is spent at its expiry second.
        if claims.exp <= Utc::now().timestamp() {
            return Err(rejected("token expired".into()));
        }

        Ok(claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("token signing failed: {e}")))
    }
}

/// Generate a random signing secret (64 hex characters).
pub fn generate_secret() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;

    fn signer() -> TokenSigner {
        TokenSigner::new(
            "test-secret-test-secret-test-secret",
            Duration::from_secs(300),
            Duration::from_secs(86_400),
        )
    }

    #[test]
    fn issued_access_token_verifies() {
        let s = signer();
        let user = UserId::new();
        let token = s.issue(user, TokenKind::Access).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = s.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.user_id, user);
        assert_eq!(claims.exp - claims.iat, 300);
    }

    #[test]
    fn pair_has_distinct_kinds() {
        let s = signer();
        let pair = s.issue_pair(UserId::new()).unwrap();

        assert!(s.verify(&pair.access, TokenKind::Access).is_ok());
        assert!(s.verify(&pair.refresh, TokenKind::Refresh).is_ok());
        assert!(s.verify(&pair.refresh, TokenKind::Access).is_err());
        assert!(s.verify(&pair.access, TokenKind::Refresh).is_err());
    }

    #[test]
    fn refresh_issues_new_access_token() {
        let s = signer();
        let user = UserId::new();
        let pair = s.issue_pair(user).unwrap();

        let (uid, access) = s.refresh(&pair.refresh).unwrap();
        assert_eq!(uid, user);
        assert_eq!(s.verify(&access, TokenKind::Access).unwrap().user_id, user);
        assert!(s.refresh(&pair.access).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let s = TokenSigner::new("k", Duration::ZERO, Duration::ZERO);
        let token = s.issue(UserId::new(), TokenKind::Access).unwrap();
        let err = s.verify(&token, TokenKind::Access).unwrap_err();
        assert_eq!(err.to_string(), format!("Unauthorized: {INVALID_TOKEN}"));
    }

    #[test]
    fn past_expiry_is_rejected() {
        let s = signer();
        let now = Utc::now().timestamp();
        let token = s
            .sign(&Claims {
                token_type: TokenKind::Access,
                user_id: UserId::new(),
                iat: now - 600,
                exp: now - 300,
                jti: "old".into(),
            })
            .unwrap();
        assert!(s.verify(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn other_hmac_algorithm_is_rejected() {
        let key = "test-secret-test-secret-test-secret";
        let now = Utc::now().timestamp();
        let claims = Claims {
            token_type: TokenKind::Access,
            user_id: UserId::new(),
            iat: now,
            exp: now + 300,
            jti: "hs512".into(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(key.as_bytes()),
        )
        .unwrap();
        assert!(signer().verify(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn other_key_is_rejected() {
        let token = signer().issue(UserId::new(), TokenKind::Access).unwrap();
        let other = TokenSigner::new("other", Duration::from_secs(60), Duration::from_secs(60));
        assert!(other.verify(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let s = signer();
        let token = s.issue(UserId::new(), TokenKind::Access).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged = Claims {
            token_type: TokenKind::Access,
            user_id: UserId::new(),
            iat: 0,
            exp: i64::MAX,
            jti: "x".into(),
        };
        let forged_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let tampered = format!("{}.{}.{}", parts[0], forged_b64, parts[2]);

        assert!(s.verify(&tampered, TokenKind::Access).is_err());
    }

    #[test]
    fn unsigned_algorithm_is_rejected() {
        let s = signer();
        let token = s.issue(UserId::new(), TokenKind::Access).unwrap();
        let claims_b64 = token.split('.').nth(1).unwrap();
        let header_b64 = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);

        let unsigned = format!("{header_b64}.{claims_b64}.");
        assert!(s.verify(&unsigned, TokenKind::Access).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let s = signer();
        for token in ["", "abc", "a.b", "a.b.c", "a.b.c.d"] {
            assert!(s.verify(token, TokenKind::Access).is_err(), "{token:?}");
        }
    }

    #[test]
    fn generated_secrets_are_random_hex() {
        let a = generate_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, generate_secret());
    }
}
