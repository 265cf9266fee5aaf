//! TokenGenerator port - トークン生成の抽象化
//!
//! トークンは Blob の主キーであり、URL に載らない限り推測できないことが前提。
//! テスト容易性のために trait として抽象化しています。
//!
//! # 実装
//! - **RandomTokenGenerator**: OS の CSPRNG（本番用）
//! - **ScriptedTokenGenerator**: 決められた順にトークンを返す（テスト用）

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::domain::Token;

/// Random bytes drawn per token, before encoding.
pub const TOKEN_BYTES: usize = 12;

/// TokenGenerator は推測不可能なトークンを生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数の upload から同時に呼ばれる）
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> Token;
}

/// 12 bytes from the operating system RNG, base64url without padding
/// (16 characters).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> Token {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Token::from_encoded(URL_SAFE_NO_PAD.encode(bytes))
    }
}

/// Hands out a fixed list of tokens, then falls back to random ones.
#[derive(Debug, Default)]
pub struct ScriptedTokenGenerator {
    script: Mutex<VecDeque<Token>>,
}

impl ScriptedTokenGenerator {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let script = tokens
            .into_iter()
            .filter_map(|t| Token::parse(t.as_ref()))
            .collect();
        Self {
            script: Mutex::new(script),
        }
    }
}

impl TokenGenerator for ScriptedTokenGenerator {
    fn generate(&self) -> Token {
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        next.unwrap_or_else(|| RandomTokenGenerator.generate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn random_tokens_are_fixed_length_and_url_safe() {
        let token = RandomTokenGenerator.generate();
        assert_eq!(token.as_str().len(), 16);
        assert!(Token::parse(token.as_str()).is_some());
    }

    #[test]
    fn random_tokens_do_not_repeat() {
        let tokens: HashSet<Token> = (0..1_000).map(|_| RandomTokenGenerator.generate()).collect();
        assert_eq!(tokens.len(), 1_000);
    }

    #[test]
    fn scripted_generator_replays_then_falls_back() {
        let tokens = ScriptedTokenGenerator::new(["aaaa", "bbbb"]);
        assert_eq!(tokens.generate().as_str(), "aaaa");
        assert_eq!(tokens.generate().as_str(), "bbbb");
        assert_eq!(tokens.generate().as_str().len(), 16);
    }
}
