//! HS256 JSON Web Tokens.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jamoveo_core::{DEFAULT_INSTRUMENT, Identity, Role};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Authenticator;
use crate::errors::{AuthError, Result};

/// Token payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username.
    pub sub: String,
    /// `admin` or anything else (treated as member).
    #[serde(default)]
    pub role: String,
    /// Instrument; absent means [`DEFAULT_INSTRUMENT`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

impl Claims {
    fn into_identity(self) -> Result<Identity> {
        let username = self.sub.trim();
        if username.is_empty() {
            return Err(AuthError::InvalidClaims("empty subject".into()));
        }
        let instrument = self
            .instrument
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_INSTRUMENT);
        Ok(Identity::new(
            username,
            Role::from_claim(&self.role),
            instrument,
        ))
    }
}

/// Remove an optional `Bearer` scheme and surrounding whitespace.
///
/// The scheme matches case-insensitively when followed by whitespace or
/// nothing, so a bare `Bearer` yields an empty credential.
pub fn strip_bearer(credential: &str) -> &str {
    const SCHEME: &str = "bearer";
    let trimmed = credential.trim();
    match trimmed.get(..SCHEME.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(SCHEME) => {
            let rest = &trimmed[SCHEME.len()..];
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                rest.trim()
            } else {
                trimmed
            }
        }
        _ => trimmed,
    }
}

/// Verifies HS256 tokens signed with a shared secret.
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Build a verifier. An empty secret is refused.
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Synchronous verification, shared by the trait impl and HTTP handlers.
    pub fn verify(&self, credential: &str) -> Result<Identity> {
        let token = strip_bearer(credential);
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                    AuthError::InvalidClaims(e.to_string())
                }
                _ => AuthError::InvalidToken(e.to_string()),
            })?;
        let identity = data.claims.into_identity()?;
        debug!(username = %identity.username, role = %identity.role, "token verified");
        Ok(identity)
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, credential: &str) -> Result<Identity> {
        self.verify(credential)
    }
}

/// Mints tokens accepted by a [`JwtAuthenticator`] sharing the same secret.
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    /// Build an issuer. An empty secret is refused.
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }
        Ok(Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Issue a token valid for `ttl` from now.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String> {
        self.issue_until(identity, Utc::now() + ttl)
    }

    /// Issue a token expiring at `expires_at`.
    pub fn issue_until(&self, identity: &Identity, expires_at: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: identity.username.clone(),
            role: identity.role.as_str().to_string(),
            instrument: Some(identity.instrument.clone()),
            exp: expires_at.timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}
