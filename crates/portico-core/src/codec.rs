//! Bearer credential codec.
//!
//! Credentials are compact JWS tokens signed with HMAC-SHA256 over a single
//! process-wide secret. Every service that verifies credentials must be
//! started with the same secret value; nothing in the protocol checks this.

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::claims::Claims;
use crate::time::{Clock, SystemClock};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("signing secret is empty")]
    EmptySecret,

    #[error("failed to sign credential")]
    Sign(#[source] jsonwebtoken::errors::Error),
}

/// The only failure callers ever see from [`CredentialCodec::verify`].
/// Which check failed is deliberately not exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid credential")]
pub struct VerifyError;

/// Internal reason a credential was refused, for logs only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Malformed,
    BadSignature,
    Expired,
}

#[derive(Clone)]
pub struct CredentialCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl CredentialCodec {
    pub fn new(secret: &[u8]) -> Result<Self, CodecError> {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: &[u8], clock: Arc<dyn Clock>) -> Result<Self, CodecError> {
        if secret.is_empty() {
            return Err(CodecError::EmptySecret);
        }

        // Expiry is checked by hand after the signature so that the order
        // is structure, signature, expiry, with no leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            clock,
        })
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn issue(&self, claims: &Claims) -> Result<String, CodecError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(CodecError::Sign)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        self.inspect(token).map_err(|reason| {
            tracing::debug!(?reason, "credential rejected");
            VerifyError
        })
    }

    fn inspect(&self, token: &str) -> Result<Claims, Rejection> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|err| {
            match err.kind() {
                ErrorKind::InvalidSignature => Rejection::BadSignature,
                ErrorKind::ExpiredSignature => Rejection::Expired,
                _ => Rejection::Malformed,
            }
        })?;

        if data.claims.is_expired_at(self.clock.now_secs()) {
            return Err(Rejection::Expired);
        }
        Ok(data.claims)
    }
}

impl std::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCodec").finish_non_exhaustive()
    }
}
