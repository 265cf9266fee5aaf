//! EphemeralStore - TTL 付きの一時ファイルストア
//!
//! # 三つの経路
//! - **put**: 検証 → トークン予約 → Blob 書き込み（ロック外）→ 登録
//! - **resolve / get / open**: 検索 → 期限チェック（期限切れならその場で回収）
//! - **sweep_expired**: 期限切れを一括回収（SweepLoop から定期実行）
//!
//! # 設計原則
//! - インデックスのロックは bookkeeping の間だけ保持し、Blob I/O をまたがない
//! - 登録は Blob の書き込み完了後のみ（Blob とエントリは両方あるか、両方ないか）
//! - インデックスからエントリを外した者だけが Blob を削除する

mod index;
mod pins;

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, ReadBuf};

use crate::config::StoreConfig;
use crate::domain::{Entry, PublicId, PutReceipt, StoreError, Token, sanitize_file_name};
use crate::ports::{
    BlobReader, BlobStore, Clock, RandomTokenGenerator, Removal, SystemClock, TokenGenerator,
};

use self::index::Index;
pub use self::pins::BlobPin;
use self::pins::PinTable;

/// Result of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Entries removed from the index.
    pub evicted: usize,
    /// Blobs left for their last reader to delete.
    pub deferred: usize,
    /// Blobs that were already gone.
    pub missing: usize,
    /// Blobs whose deletion failed.
    pub failed: usize,
}

impl SweepReport {
    pub fn failures(&self) -> usize {
        self.missing + self.failed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub live: usize,
    /// Past expiry but not yet swept or looked up.
    pub expired: usize,
    /// Blobs with a download in progress.
    pub pinned: usize,
    /// Uploads whose blob is still being written.
    pub uploading: usize,
}

/// A live entry and a reader over its blob.
///
/// Reading does not touch the store. The blob stays readable until this
/// value is dropped, even if the entry expires or is swept meanwhile.
#[derive(Debug)]
pub struct Download {
    entry: Entry,
    content_type: String,
    reader: ReaderSlot,
    _pin: BlobPin,
}

struct ReaderSlot(BlobReader);

impl std::fmt::Debug for ReaderSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BlobReader")
    }
}

impl Download {
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn file_name(&self) -> &str {
        &self.entry.original_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> u64 {
        self.entry.stored_size
    }

    pub fn is_empty(&self) -> bool {
        self.entry.stored_size == 0
    }
}

impl AsyncRead for Download {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().reader.0).poll_read(cx, buf)
    }
}

#[derive(Clone, Copy)]
enum Lookup<'a> {
    Token(&'a Token),
    Public(&'a PublicId),
}

enum Checkout {
    Live(Entry, Option<BlobPin>),
    /// Evicted on discovery; these blobs are ours to delete.
    Expired(Vec<Token>),
}

/// Unregisters a reservation however `put` ends, including cancellation.
struct Reservation<'a> {
    store: &'a EphemeralStore,
    token: Token,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.store.lock_index().release(&self.token);
    }
}

pub struct EphemeralStore {
    index: Mutex<Index>,
    pins: Arc<PinTable>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenGenerator>,
    config: StoreConfig,
}

impl EphemeralStore {
    pub fn new(config: StoreConfig, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            index: Mutex::new(Index::default()),
            pins: Arc::new(PinTable::default()),
            blobs,
            clock: Arc::new(SystemClock),
            tokens: Arc::new(RandomTokenGenerator),
            config,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_token_generator(mut self, tokens: impl TokenGenerator + 'static) -> Self {
        self.tokens = Arc::new(tokens);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // Every mutation is a single step on the index, so a poisoned lock
    // cannot hold a half-applied change.
    fn lock_index(&self) -> MutexGuard<'_, Index> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `payload` as `claimed_name` and register it for one TTL.
    pub async fn put<R>(&self, mut payload: R, claimed_name: &str) -> Result<PutReceipt, StoreError>
    where
        R: AsyncRead + Send + Unpin,
    {
        let format = &self.config.format;
        let invalid = || StoreError::InvalidFormat {
            name: claimed_name.to_string(),
            suffix: format.suffix().to_string(),
        };
        if !format.accepts(claimed_name) {
            return Err(invalid());
        }
        let original_name = sanitize_file_name(claimed_name)
            .filter(|name| format.accepts(name))
            .ok_or_else(invalid)?;

        let token = self.tokens.generate();
        if !self.lock_index().reserve(&token) {
            tracing::error!(%token, "token generator repeated a live token");
            return Err(StoreError::TokenCollision(token.to_string()));
        }
        let reservation = Reservation {
            store: self,
            token: token.clone(),
        };

        let stored_size = self
            .blobs
            .write(&token, &mut payload, self.config.max_payload_bytes)
            .await?;

        // No await from here to `insert`: the blob and its entry appear
        // together or not at all.
        let public_id = format.derive_public_id(&original_name);
        let created_at = self.clock.now();
        let expires_at = created_at
            .checked_add_signed(self.config.ttl_delta())
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);

        let receipt = {
            let mut index = self.lock_index();
            let entry = Entry {
                token,
                original_name,
                public_id,
                created_at,
                expires_at,
                stored_size,
                seq: index.next_seq(),
            };
            let receipt = PutReceipt::from(&entry);
            index.insert(entry);
            receipt
        };
        drop(reservation);

        tracing::info!(
            token = %receipt.token,
            public_id = %receipt.public_id,
            size = receipt.stored_size,
            expires_at = %receipt.expires_at,
            "stored file"
        );
        Ok(receipt)
    }

    /// Live entry for a public id; the newest one when several share it.
    pub async fn resolve(&self, public_id: &str) -> Result<Entry, StoreError> {
        let key = PublicId::lookup_key(public_id);
        let checkout = self.check_out(Lookup::Public(&key), false)?;
        self.settle(checkout).await.map(|(entry, _)| entry)
    }

    /// Live entry for a token.
    pub async fn get(&self, token: &Token) -> Result<Entry, StoreError> {
        let checkout = self.check_out(Lookup::Token(token), false)?;
        self.settle(checkout).await.map(|(entry, _)| entry)
    }

    /// Resolve a public id and open its blob for streaming.
    pub async fn open_public(&self, public_id: &str) -> Result<Download, StoreError> {
        let key = PublicId::lookup_key(public_id);
        let checkout = self.check_out(Lookup::Public(&key), true)?;
        self.into_download(checkout).await
    }

    /// Open the blob of a live entry for streaming.
    pub async fn open(&self, token: &Token) -> Result<Download, StoreError> {
        let checkout = self.check_out(Lookup::Token(token), true)?;
        self.into_download(checkout).await
    }

    async fn into_download(&self, checkout: Checkout) -> Result<Download, StoreError> {
        let (entry, pin) = self.settle(checkout).await?;
        let Some(pin) = pin else {
            return Err(StoreError::NotFound);
        };
        let reader = self.blobs.open(&entry.token).await?;
        tracing::debug!(token = %entry.token, public_id = %entry.public_id, "serving file");
        Ok(Download {
            entry,
            content_type: self.config.format.content_type().to_string(),
            reader: ReaderSlot(reader),
            _pin: pin,
        })
    }

    /// Look up under the index lock. An expired match is evicted right here,
    /// so exactly one caller observes `Expired`.
    fn check_out(&self, lookup: Lookup<'_>, pin: bool) -> Result<Checkout, StoreError> {
        let now = self.clock.now();
        let mut index = self.lock_index();

        let entry = match lookup {
            Lookup::Token(token) => index.get(token),
            Lookup::Public(public_id) => index.newest_for(public_id),
        }
        .ok_or(StoreError::NotFound)?;

        if entry.is_live_at(now) {
            let entry = entry.clone();
            let pin = pin.then(|| {
                BlobPin::acquire(
                    entry.token.clone(),
                    Arc::clone(&self.pins),
                    Arc::clone(&self.blobs),
                )
            });
            return Ok(Checkout::Live(entry, pin));
        }

        let expired = match lookup {
            Lookup::Token(token) => vec![token.clone()],
            Lookup::Public(public_id) => index.expired_for(public_id, now),
        };
        Ok(Checkout::Expired(self.evict_locked(&mut index, expired)))
    }

    async fn settle(&self, checkout: Checkout) -> Result<(Entry, Option<BlobPin>), StoreError> {
        match checkout {
            Checkout::Live(entry, pin) => Ok((entry, pin)),
            Checkout::Expired(doomed) => {
                for token in doomed {
                    tracing::info!(%token, "evicted expired file on access");
                    if let Err(e) = self.blobs.remove(&token).await {
                        tracing::warn!(%token, error = %e, "failed to delete expired blob");
                    }
                }
                Err(StoreError::Expired)
            }
        }
    }

    /// Remove `tokens` from the index. Returns the blobs nobody is reading,
    /// which the caller must delete once the lock is released.
    fn evict_locked(&self, index: &mut Index, tokens: Vec<Token>) -> Vec<Token> {
        tokens
            .into_iter()
            .filter_map(|token| index.remove(&token))
            .map(|entry| entry.token)
            .filter(|token| !self.pins.defer_if_pinned(token))
            .collect()
    }

    /// Evict every entry past its expiry. Per-blob failures are counted
    /// and logged; they never stop the pass.
    pub async fn sweep_expired(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        let doomed = {
            let mut index = self.lock_index();
            let expired = index.expired(now);
            report.evicted = expired.len();
            self.evict_locked(&mut index, expired)
        };
        report.deferred = report.evicted - doomed.len();

        for token in doomed {
            match self.blobs.remove(&token).await {
                Ok(Removal::Removed) => {}
                Ok(Removal::Absent) => {
                    report.missing += 1;
                    tracing::warn!(%token, "expired blob was already gone");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(%token, error = %e, "failed to delete expired blob");
                }
            }
        }
        report
    }

    pub fn stats(&self) -> StoreStats {
        let now = self.clock.now();
        let index = self.lock_index();
        let expired = index.expired(now).len();
        StoreStats {
            live: index.len() - expired,
            expired,
            pinned: self.pins.pinned(),
            uploading: index.reserved_len(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock_index().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
