//! Channel access grant minting and validation.
//!
//! A grant is an HMAC-signed JWT whose claims map channel ids to per-channel
//! expiry timestamps. One token accumulates access to every channel its
//! bearer has authenticated into; expiry is the only invalidation mechanism.

use std::collections::HashMap;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::clock::now_unix;

/// Channel access expires 30 days after it was granted.
pub const GRANT_PERIOD_SECS: u64 = 30 * 24 * 60 * 60;

/// Claims carried by a signed grant token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelClaims {
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp), always >= every per-channel expiry
    /// at minting time
    pub exp: u64,
    /// Channel id -> per-channel access expiry (Unix timestamp)
    pub channels: HashMap<String, u64>,
}

/// Result of minting a grant token.
#[derive(Debug, Clone)]
pub struct GrantResult {
    /// The signed compact token string
    pub token: String,
    /// Expiration timestamp (Unix seconds), for the cookie attributes
    pub expires_at: u64,
}

/// Grant validation failures.
///
/// Every expected failure is a distinct kind with a fixed message so the
/// HTTP layer can map it 1:1 to a status code. `Internal` covers signing
/// library failures nobody anticipated; those are logged and surfaced as a
/// generic server error.
#[derive(Debug)]
pub enum GrantError {
    /// Token signed with something other than the HMAC family
    InvalidSigningMethod,
    /// Overall token validity window is expired or not yet begun
    ExpiredToken,
    /// Signature mismatch
    InvalidToken,
    /// Structurally malformed token or claims
    InvalidTokenFormat,
    /// Claims carry no entry for the requested channel
    NoChannelAccess,
    /// The requested channel's access window has passed
    ExpiredChannelAccess,
    /// Unexpected signing library failure
    Internal(jsonwebtoken::errors::Error),
}

impl std::fmt::Display for GrantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrantError::InvalidSigningMethod => write!(f, "Unsupported token signing method"),
            GrantError::ExpiredToken => write!(f, "Token is expired"),
            GrantError::InvalidToken => write!(f, "Invalid token"),
            GrantError::InvalidTokenFormat => write!(f, "Invalid token format"),
            GrantError::NoChannelAccess => write!(f, "No channel access"),
            GrantError::ExpiredChannelAccess => write!(f, "Channel access expired"),
            GrantError::Internal(e) => write!(f, "Token processing failed: {}", e),
        }
    }
}

impl std::error::Error for GrantError {}

/// Signing and verification keys for grant tokens.
#[derive(Clone)]
pub struct GrantKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl GrantKeys {
    /// Create grant keys from the given HMAC secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Mint a grant token for `channel`, merging with the claims of
    /// `existing` when it still verifies. An absent or invalid existing
    /// token means no prior grant, never an error, so a bearer's single
    /// cookie accumulates channels across authentications.
    pub fn grant(&self, existing: Option<&str>, channel: &str) -> Result<GrantResult, GrantError> {
        let mut channels = existing
            .and_then(|token| self.parse_claims(token).ok())
            .map(|claims| claims.channels)
            .unwrap_or_default();

        let now = now_unix();
        let expires_at = now + GRANT_PERIOD_SECS;
        channels.insert(channel.to_string(), expires_at);

        let claims = ChannelClaims {
            iat: now,
            exp: expires_at,
            channels,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(GrantError::Internal)?;

        Ok(GrantResult { token, expires_at })
    }

    /// Verify the token's signature and overall validity window, then check
    /// access to `channel`. The overall window is checked during decoding,
    /// before the channel map is inspected.
    pub fn verify(&self, token: &str, channel: &str) -> Result<ChannelClaims, GrantError> {
        let claims = self.parse_claims(token)?;

        match claims.channels.get(channel) {
            None => Err(GrantError::NoChannelAccess),
            Some(&expires_at) if now_unix() > expires_at => Err(GrantError::ExpiredChannelAccess),
            Some(_) => Ok(claims),
        }
    }

    fn parse_claims(&self, token: &str) -> Result<ChannelClaims, GrantError> {
        // HMAC family only; anything else is a downgrade attempt.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;

        jsonwebtoken::decode::<ChannelClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => {
                    GrantError::ExpiredToken
                }
                ErrorKind::InvalidSignature => GrantError::InvalidToken,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    GrantError::InvalidSigningMethod
                }
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_)
                | ErrorKind::MissingRequiredClaim(_) => GrantError::InvalidTokenFormat,
                _ => GrantError::Internal(e),
            })
    }
}
