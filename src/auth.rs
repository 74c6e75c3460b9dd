//! Credentials and the caller-supplied token source.
//!
//! The client never caches a [`Token`]. A [`TokenProvider`] is asked for a
//! fresh one before every attempt, so short-lived or rotating credentials work
//! without any extra plumbing.

use crate::{Error, Result};
use std::fmt;

/// The authorization scheme a [`Token`] is sent with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `Authorization: Bearer <secret>`
    Bearer,
    /// `Authorization: Basic <secret>`
    Basic,
    /// Any other scheme. Calls made with such a token are rejected before
    /// anything is sent.
    Other(String),
}

impl TokenKind {
    /// Returns the scheme as it appears in the `Authorization` header.
    pub fn as_str(&self) -> &str {
        match self {
            TokenKind::Bearer => "Bearer",
            TokenKind::Basic => "Basic",
            TokenKind::Other(kind) => kind,
        }
    }

    /// Returns `true` for the schemes the Web API accepts.
    pub fn is_supported(&self) -> bool {
        matches!(self, TokenKind::Bearer | TokenKind::Basic)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential as seen by the Web API.
///
/// # Examples
///
/// ```
/// use livechat_webapi::auth::{Token, TokenKind};
///
/// let token = Token::bearer("secret", "dal").with_organization_id("org-1");
/// assert_eq!(token.authorization_header(), "Bearer secret");
/// assert_eq!(token.kind, TokenKind::Bearer);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    /// The access secret issued by the authorization server.
    pub access_token: String,
    /// Datacenter the license lives in, sent as `X-Region`.
    pub region: String,
    /// Scheme used in the `Authorization` header.
    pub kind: TokenKind,
    /// Organization owning the token. Some services embed it in the URL.
    pub organization_id: Option<String>,
}

impl Token {
    /// Creates a token with an explicit kind.
    pub fn new(access_token: impl Into<String>, region: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            access_token: access_token.into(),
            region: region.into(),
            kind,
            organization_id: None,
        }
    }

    /// Creates a `Bearer` token.
    pub fn bearer(access_token: impl Into<String>, region: impl Into<String>) -> Self {
        Self::new(access_token, region, TokenKind::Bearer)
    }

    /// Creates a `Basic` token.
    pub fn basic(access_token: impl Into<String>, region: impl Into<String>) -> Self {
        Self::new(access_token, region, TokenKind::Basic)
    }

    /// Attaches the owning organization.
    pub fn with_organization_id(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Renders the `Authorization` header value, `"<kind> <secret>"`.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.kind, self.access_token)
    }
}

// The secret stays out of logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("region", &self.region)
            .field("kind", &self.kind)
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

/// Source of credentials, consulted once per attempt.
///
/// Returning `None` means the caller declines to authenticate this call; the
/// call then fails with [`Error::MissingToken`] without touching the network.
///
/// Any `Fn() -> Option<Token>` closure is a provider:
///
/// ```
/// use livechat_webapi::auth::{Token, TokenProvider};
///
/// let provider = || Some(Token::bearer("secret", "fra"));
/// assert!(provider.token().is_some());
/// ```
pub trait TokenProvider: Send + Sync {
    /// Produces the token for the next attempt.
    fn token(&self) -> Option<Token>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<Token> + Send + Sync,
{
    fn token(&self) -> Option<Token> {
        self()
    }
}

/// Asks the provider for a token and checks that its kind is usable.
pub(crate) fn acquire(provider: &dyn TokenProvider) -> Result<Token> {
    let token = provider.token().ok_or(Error::MissingToken)?;
    if !token.kind.is_supported() {
        return Err(Error::UnsupportedTokenKind(token.kind.as_str().to_string()));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_header_per_kind() {
        assert_eq!(Token::bearer("abc", "dal").authorization_header(), "Bearer abc");
        assert_eq!(Token::basic("abc", "dal").authorization_header(), "Basic abc");
    }

    #[test]
    fn test_acquire_rejects_missing_token() {
        let provider = || -> Option<Token> { None };
        assert!(matches!(acquire(&provider), Err(Error::MissingToken)));
    }

    #[test]
    fn test_acquire_rejects_unsupported_kind() {
        let provider = || Some(Token::new("abc", "dal", TokenKind::Other("Digest".into())));
        match acquire(&provider) {
            Err(Error::UnsupportedTokenKind(kind)) => assert_eq!(kind, "Digest"),
            other => panic!("Expected UnsupportedTokenKind, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", Token::bearer("top-secret", "dal"));
        assert!(!rendered.contains("top-secret"));
    }
}
