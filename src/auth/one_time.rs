//! One-time bootstrap tokens.
//!
//! Each issued token is unique among currently outstanding tokens and can be
//! redeemed exactly once. Redemption of an unknown token is indistinguishable
//! from redemption of an already-used one, so callers learn nothing about
//! whether a token ever existed.

use std::collections::HashSet;
use std::sync::Mutex;

use super::generator::TokenGenerator;

/// Default length for issued bootstrap tokens.
pub const DEFAULT_TOKEN_LENGTH: usize = 16;

/// Retry budget for finding a token that is not already outstanding.
const MAX_ATTEMPTS: usize = 1 << 20;

/// Checks token authenticity. Implemented by [`OneTimeTokenIssuer`] for
/// one-shot bootstrap tokens and by [`StaticToken`] for fixed shared secrets.
pub trait TokenAuthenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> bool;
}

/// Issues tokens that can be used for authentication only once.
pub struct OneTimeTokenIssuer {
    generator: Box<dyn TokenGenerator>,
    tokens: Mutex<HashSet<String>>,
}

/// Error returned when the issuer failed to find an unused token within the
/// attempt budget.
#[derive(Debug, PartialEq, Eq)]
pub struct TokenExhaustedError;

impl std::fmt::Display for TokenExhaustedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to generate an unused token")
    }
}

impl std::error::Error for TokenExhaustedError {}

impl OneTimeTokenIssuer {
    pub fn new(generator: Box<dyn TokenGenerator>) -> Self {
        Self {
            generator,
            tokens: Mutex::new(HashSet::new()),
        }
    }

    /// Generate and record a new unredeemed token of `len` characters.
    ///
    /// Issuance and redemption share one lock: the token namespace is common
    /// to all callers and both operations are O(1) map lookups.
    pub fn issue_token(&self, len: usize) -> Result<String, TokenExhaustedError> {
        let mut tokens = self.tokens.lock().unwrap();

        let mut token = self.generator.generate(len);
        for _ in 0..MAX_ATTEMPTS {
            if !tokens.contains(&token) {
                tokens.insert(token.clone());
                return Ok(token);
            }
            token = self.generator.generate(len);
        }

        Err(TokenExhaustedError)
    }

    /// Check that `token` was issued by this instance and annul it.
    /// Returns `false` for unknown and already-redeemed tokens alike.
    pub fn authenticate(&self, token: &str) -> bool {
        self.tokens.lock().unwrap().remove(token)
    }
}

impl TokenAuthenticator for OneTimeTokenIssuer {
    fn authenticate(&self, token: &str) -> bool {
        OneTimeTokenIssuer::authenticate(self, token)
    }
}

/// Authenticates against a fixed shared secret, e.g. the chat platform's
/// webhook verification token.
pub struct StaticToken(pub String);

impl TokenAuthenticator for StaticToken {
    fn authenticate(&self, token: &str) -> bool {
        !self.0.is_empty() && self.0 == token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::generator::RandomTokenSource;

    fn issuer() -> OneTimeTokenIssuer {
        OneTimeTokenIssuer::new(Box::new(RandomTokenSource::from_seed(1)))
    }

    #[test]
    fn test_issued_tokens_are_unique() {
        let issuer = issuer();

        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let token = issuer.issue_token(DEFAULT_TOKEN_LENGTH).unwrap();
            assert_eq!(token.len(), DEFAULT_TOKEN_LENGTH);
            assert!(seen.insert(token), "token issued twice");
        }
    }

    #[test]
    fn test_authenticate_redeems_exactly_once() {
        let issuer = issuer();

        let token = issuer.issue_token(DEFAULT_TOKEN_LENGTH).unwrap();
        assert!(issuer.authenticate(&token));
        assert!(!issuer.authenticate(&token));
        assert!(!issuer.authenticate(&token));
    }

    #[test]
    fn test_authenticate_rejects_unknown_token() {
        let issuer = issuer();
        issuer.issue_token(DEFAULT_TOKEN_LENGTH).unwrap();

        assert!(!issuer.authenticate("never-issued"));
        assert!(!issuer.authenticate(""));
    }

    #[test]
    fn test_redeemed_token_can_be_reissued() {
        // A colliding candidate only counts while outstanding; once redeemed
        // the same string may be drawn again.
        struct Fixed;
        impl TokenGenerator for Fixed {
            fn generate(&self, len: usize) -> String {
                "x".repeat(len)
            }
        }

        let issuer = OneTimeTokenIssuer::new(Box::new(Fixed));
        let token = issuer.issue_token(4).unwrap();
        assert!(issuer.authenticate(&token));
        assert_eq!(issuer.issue_token(4).unwrap(), token);
    }

    #[test]
    fn test_issue_fails_when_namespace_exhausted() {
        struct Fixed;
        impl TokenGenerator for Fixed {
            fn generate(&self, len: usize) -> String {
                "x".repeat(len)
            }
        }

        let issuer = OneTimeTokenIssuer::new(Box::new(Fixed));
        issuer.issue_token(4).unwrap();
        assert_eq!(issuer.issue_token(4), Err(TokenExhaustedError));
    }

    #[test]
    fn test_static_token() {
        let auth = StaticToken("hunter2".into());
        assert!(auth.authenticate("hunter2"));
        assert!(!auth.authenticate("hunter"));
        assert!(!auth.authenticate(""));

        assert!(!StaticToken(String::new()).authenticate(""));
    }
}
