//! Errors - エラー型と分類
//!
//! - `InvalidFormat` / `PayloadTooLarge`: 保存前に拒否（副作用なし）
//! - `NotFound` / `Expired`: 参照時のミス。`Expired` は発見と同時に回収される
//! - `Storage`: Blob I/O の失敗。呼び出し元へ返す（sweep だけはログに残して続行）

use std::io;

use thiserror::Error;

/// Blob operation that failed, for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    Write,
    Open,
    Remove,
    Scan,
}

impl std::fmt::Display for StorageOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            StorageOp::Write => "write",
            StorageOp::Open => "open",
            StorageOp::Remove => "remove",
            StorageOp::Scan => "scan",
        };
        f.write_str(op)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file name {name:?} does not end with {suffix}")]
    InvalidFormat { name: String, suffix: String },

    #[error("payload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    #[error("no entry matches")]
    NotFound,

    #[error("entry has expired")]
    Expired,

    #[error("token {0} is already in use")]
    TokenCollision(String),

    #[error("blob {op} failed: {source}")]
    Storage {
        op: StorageOp,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn storage(op: StorageOp, source: io::Error) -> Self {
        Self::Storage { op, source }
    }

    /// Miss signals (`NotFound`, `Expired`) as opposed to real failures.
    pub fn is_miss(&self) -> bool {
        matches!(self, StoreError::NotFound | StoreError::Expired)
    }
}

/// Rejected configuration values, reported once at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("suffix {0:?} must start with '.' and contain only [a-z0-9.]")]
    InvalidSuffix(String),

    #[error("content type {0:?} is empty")]
    InvalidContentType(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("public base url {0:?} must start with http:// or https://")]
    InvalidBaseUrl(String),
}
