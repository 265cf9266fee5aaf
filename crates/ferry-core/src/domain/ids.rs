//! Domain identifiers.
//!
//! # 二種類の識別子
//! - **Token**: 推測不可能な主キー。Blob のファイル名にもなる。ユーザー入力からは決して導出しない。
//! - **PublicId**: 元のファイル名から導出した URL 安全な公開名。一意性は保証されない。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, unguessable key of a stored entry.
///
/// Produced only by a [`TokenGenerator`](crate::ports::TokenGenerator).
/// The alphabet is base64url without padding, so a token is safe to use as a
/// file name and inside a URL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Wrap an already-encoded token.
    ///
    /// Returns `None` for empty input or characters outside the base64url
    /// alphabet; such a value can never have been issued by the store.
    pub fn parse(s: &str) -> Option<Self> {
        let valid = !s.is_empty()
            && s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        valid.then(|| Self(s.to_string()))
    }

    pub(crate) fn from_encoded(encoded: String) -> Self {
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Human-readable, URL-safe name of an entry.
///
/// Always lowercase; see [`derive_public_id`](crate::domain::derive_public_id)
/// for the normalization rule. Two entries may share a `PublicId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicId(String);

impl PublicId {
    pub(crate) fn from_normalized(s: String) -> Self {
        Self(s)
    }

    /// Lookup key for an identifier taken from a request path.
    ///
    /// Matching is case-insensitive, so the raw value is only lowercased;
    /// it is not re-normalized.
    pub fn lookup_key(raw: &str) -> Self {
        Self(raw.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
