//! InMemoryBlobStore - 開発用・テスト用の Blob ストア
//!
//! # 実装詳細
//! - `HashMap<Token, Arc<[u8]>>` を Mutex で保護
//! - `open` は `Arc` を共有するだけなので、削除後もリーダーは有効（参照カウント）
//! - `fail_removals` で削除失敗を注入できる（sweep の失敗カウントの検証用）

use std::collections::HashMap;
use std::io::{self, Cursor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::domain::{StorageOp, StoreError, Token};
use crate::ports::blob_store::copy_limited;
use crate::ports::{BlobReader, BlobStore, Removal};

#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<Token, Arc<[u8]>>>,
    fail_removals: AtomicBool,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Make every following `remove` fail with an I/O error.
    pub fn fail_removals(&self, fail: bool) {
        self.fail_removals.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Token, Arc<[u8]>>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn write(
        &self,
        token: &Token,
        payload: &mut (dyn AsyncRead + Send + Unpin),
        limit: u64,
    ) -> Result<u64, StoreError> {
        let mut buf = Vec::new();
        let written = copy_limited(payload, &mut buf, limit).await?;

        let mut blobs = self.lock();
        if blobs.contains_key(token) {
            return Err(StoreError::TokenCollision(token.to_string()));
        }
        blobs.insert(token.clone(), Arc::from(buf));
        Ok(written)
    }

    async fn open(&self, token: &Token) -> Result<BlobReader, StoreError> {
        let bytes = self.lock().get(token).cloned().ok_or_else(|| {
            StoreError::storage(
                StorageOp::Open,
                io::Error::new(io::ErrorKind::NotFound, format!("no blob for {token}")),
            )
        })?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    async fn remove(&self, token: &Token) -> Result<Removal, StoreError> {
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(StoreError::storage(
                StorageOp::Remove,
                io::Error::other("injected removal failure"),
            ));
        }
        Ok(match self.lock().remove(token) {
            Some(_) => Removal::Removed,
            None => Removal::Absent,
        })
    }

    async fn contains(&self, token: &Token) -> Result<bool, StoreError> {
        Ok(self.lock().contains_key(token))
    }
}
