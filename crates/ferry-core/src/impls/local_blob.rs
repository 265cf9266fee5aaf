//! LocalBlobStore - ローカルディレクトリ上の Blob
//!
//! # 実装詳細
//! - `<root>/<token><suffix>` の 1 ファイル = 1 Blob（サブディレクトリなし）
//! - 書き込みは `.staging-*` の一時ファイルに行い、完了後に no-clobber で rename
//! - 一時ファイルは drop 時に削除されるので、キャンセルされた upload は何も残さない
//! - rename は await をはさまずに実行する（公開された Blob は必ず呼び出し側に `Ok` で返る）
//! - Unix では open 済みのファイルは unlink 後も読める（ストア側の pin と二重の保証）

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::domain::{StorageOp, StoreError, Token};
use crate::ports::blob_store::copy_limited;
use crate::ports::{BlobReader, BlobStore, Removal};

const STAGING_PREFIX: &str = ".staging-";

pub struct LocalBlobStore {
    root: PathBuf,
    suffix: String,
}

impl LocalBlobStore {
    /// Create the directory if needed and drop whatever a previous process
    /// left in it. Nothing survives a restart.
    pub async fn create(root: impl Into<PathBuf>, suffix: &str) -> Result<Self, StoreError> {
        let store = Self {
            root: root.into(),
            suffix: suffix.to_lowercase(),
        };
        tokio::fs::create_dir_all(&store.root)
            .await
            .map_err(|e| StoreError::storage(StorageOp::Write, e))?;

        let purged = store.purge_stale().await?;
        tracing::info!(
            root = %store.root.display(),
            purged,
            "local blob store ready"
        );
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, token: &Token) -> PathBuf {
        self.root.join(format!("{}{}", token, self.suffix))
    }

    fn is_owned_file(&self, name: &str) -> bool {
        if name.starts_with(STAGING_PREFIX) {
            return true;
        }
        name.strip_suffix(self.suffix.as_str())
            .and_then(Token::parse)
            .is_some()
    }

    /// Delete stale blobs and staging files. Unrelated files are left alone.
    pub async fn purge_stale(&self) -> Result<usize, StoreError> {
        let scan = |e| StoreError::storage(StorageOp::Scan, e);
        let mut dir = tokio::fs::read_dir(&self.root).await.map_err(scan)?;
        let mut purged = 0;

        while let Some(dirent) = dir.next_entry().await.map_err(scan)? {
            let name = dirent.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !self.is_owned_file(name) {
                continue;
            }
            match tokio::fs::remove_file(dirent.path()).await {
                Ok(()) => purged += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(file = name, error = %e, "failed to purge stale blob");
                }
            }
        }
        Ok(purged)
    }
}

async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(io::Error::other)?
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn write(
        &self,
        token: &Token,
        payload: &mut (dyn AsyncRead + Send + Unpin),
        limit: u64,
    ) -> Result<u64, StoreError> {
        let write_err = |e| StoreError::storage(StorageOp::Write, e);

        let root = self.root.clone();
        let staged = blocking(move || {
            tempfile::Builder::new()
                .prefix(STAGING_PREFIX)
                .tempfile_in(root)
        })
        .await
        .map_err(write_err)?;

        let mut file = tokio::fs::File::from_std(staged.reopen().map_err(write_err)?);
        let written = copy_limited(payload, &mut file, limit).await?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        // Single rename, run inline. There is no await between the blob
        // becoming visible and this call returning, so a caller dropped at
        // any await point either sees no blob or gets `Ok`.
        staged
            .persist_noclobber(self.path_for(token))
            .map_err(|e| match e.error.kind() {
                io::ErrorKind::AlreadyExists => StoreError::TokenCollision(token.to_string()),
                _ => write_err(e.error),
            })?;

        Ok(written)
    }

    async fn open(&self, token: &Token) -> Result<BlobReader, StoreError> {
        let file = tokio::fs::File::open(self.path_for(token))
            .await
            .map_err(|e| StoreError::storage(StorageOp::Open, e))?;
        Ok(Box::new(file))
    }

    async fn remove(&self, token: &Token) -> Result<Removal, StoreError> {
        match tokio::fs::remove_file(self.path_for(token)).await {
            Ok(()) => Ok(Removal::Removed),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Removal::Absent),
            Err(e) => Err(StoreError::storage(StorageOp::Remove, e)),
        }
    }

    async fn contains(&self, token: &Token) -> Result<bool, StoreError> {
        tokio::fs::try_exists(self.path_for(token))
            .await
            .map_err(|e| StoreError::storage(StorageOp::Open, e))
    }
}
