//! BlobStore port - Blob ストレージ（Local / InMemory）
//!
//! 1 トークン = 1 Blob。フラットな名前空間、write-once / delete-once。
//!
//! # 設計原則
//! - `write` は完了するまで Blob を見せない（途中で失敗・キャンセルされたら何も残らない）
//! - `remove` は delete-if-exists（既に無ければ `Removal::Absent`、エラーではない）
//! - `open` で得たリーダーは、その後に `remove` されても読み切れること

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncReadExt, AsyncWriteExt};

use crate::domain::{StorageOp, StoreError, Token};

/// Reader over a stored blob.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Outcome of a delete-if-exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    Absent,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `payload` under `token`. At most `limit` bytes are accepted.
    ///
    /// Fails with `TokenCollision` if a blob already exists for `token`;
    /// the existing blob is left untouched.
    ///
    /// The blob must not become visible at an await point: if the returned
    /// future is dropped before completing, no blob is left for `token`.
    async fn write(
        &self,
        token: &Token,
        payload: &mut (dyn AsyncRead + Send + Unpin),
        limit: u64,
    ) -> Result<u64, StoreError>;

    async fn open(&self, token: &Token) -> Result<BlobReader, StoreError>;

    async fn remove(&self, token: &Token) -> Result<Removal, StoreError>;

    async fn contains(&self, token: &Token) -> Result<bool, StoreError>;
}

/// Copy at most `limit` bytes from `reader` to `writer`.
///
/// Reads one byte past the limit to tell "exactly at the limit" from
/// "too large" without buffering the whole payload.
pub(crate) async fn copy_limited<W>(
    reader: &mut (dyn AsyncRead + Send + Unpin),
    writer: &mut W,
    limit: u64,
) -> Result<u64, StoreError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut limited = reader.take(limit.saturating_add(1));
    let written = tokio::io::copy(&mut limited, writer)
        .await
        .map_err(|e| StoreError::storage(StorageOp::Write, e))?;
    if written > limit {
        return Err(StoreError::PayloadTooLarge { limit });
    }
    writer
        .flush()
        .await
        .map_err(|e| StoreError::storage(StorageOp::Write, e))?;
    Ok(written)
}
