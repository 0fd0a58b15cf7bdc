//! Session handles produced by credential plugins.
//!
//! A [`Session`] is a closed set of capability variants. Plugins that consume a
//! session match on it and report [`PluginError::SessionMismatch`] when they
//! receive a variant they cannot use.
//!
//! [`PluginError::SessionMismatch`]: super::PluginError::SessionMismatch

use std::sync::Arc;

use strum_macros::{AsRefStr, Display};

/// Discriminant of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum SessionKind {
    /// No credentials.
    Anonymous,
    /// Bearer token credentials.
    Token,
}

/// Opaque capability handed from credential plugins to sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    /// Unauthenticated access.
    Anonymous,
    /// Bearer token, optionally bound to an account.
    Token(Arc<TokenSession>),
}

impl Session {
    /// Discriminant of this session.
    pub fn kind(&self) -> SessionKind {
        match self {
            Self::Anonymous => SessionKind::Anonymous,
            Self::Token(_) => SessionKind::Token,
        }
    }

    /// Whether both values refer to the same underlying handle.
    pub fn same_handle(&self, other: &Session) -> bool {
        match (self, other) {
            (Self::Anonymous, Self::Anonymous) => true,
            (Self::Token(a), Self::Token(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Account label carried by the session, if any.
    pub fn account(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Token(t) => t.account.as_deref(),
        }
    }
}

/// Resolved bearer token credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSession {
    /// Secret token value.
    pub token: String,
    /// Account or tenant the token belongs to.
    pub account: Option<String>,
}

impl TokenSession {
    /// Create a token session.
    pub fn new(token: impl Into<String>, account: Option<String>) -> Self {
        Self {
            token: token.into(),
            account,
        }
    }
}

impl std::fmt::Debug for TokenSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSession")
            .field("token", &"<redacted>")
            .field("account", &self.account)
            .finish()
    }
}
