//! # jamoveo-auth
//!
//! Turns a bearer credential into a verified [`Identity`].
//!
//! The session core only sees the [`Authenticator`] trait; [`JwtAuthenticator`]
//! is the HS256 implementation used by the server, and [`TokenIssuer`] mints
//! matching tokens for the CLI and tests.

#![deny(unsafe_code)]

pub mod errors;
pub mod jwt;

use async_trait::async_trait;
use jamoveo_core::Identity;

pub use errors::{AuthError, Result};
pub use jwt::{Claims, JwtAuthenticator, TokenIssuer, strip_bearer};

/// Verifies credentials presented at connection time.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve a credential to an identity, or refuse it.
    async fn authenticate(&self, credential: &str) -> Result<Identity>;
}
