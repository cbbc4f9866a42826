//! Auth error types.

/// Errors that can occur while verifying or minting credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential was presented.
    #[error("missing bearer token")]
    MissingToken,

    /// The token's `exp` is in the past.
    #[error("token expired")]
    Expired,

    /// Signature, algorithm, or encoding is wrong.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token verified but its claims are unusable.
    #[error("invalid token claims: {0}")]
    InvalidClaims(String),

    /// No signing secret is configured.
    #[error("no JWT secret configured (set auth.jwtSecret or JAMOVEO_JWT_SECRET)")]
    MissingSecret,
}

impl AuthError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::Expired => "expired",
            Self::InvalidToken(_) => "invalid_token",
            Self::InvalidClaims(_) => "invalid_claims",
            Self::MissingSecret => "missing_secret",
        }
    }
}

/// Result type for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;
