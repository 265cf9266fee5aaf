//! Read pins: keep a blob on disk while a download is streaming from it.
//!
//! Eviction removes the index entry immediately but asks the pin table
//! first; a pinned blob is only marked doomed, and the last [`BlobPin`] to
//! drop deletes it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::Token;
use crate::ports::{BlobStore, Removal};

#[derive(Debug, Default)]
struct PinState {
    readers: usize,
    doomed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct PinTable {
    pins: Mutex<HashMap<Token, PinState>>,
}

impl PinTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<Token, PinState>> {
        self.pins.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pin(&self, token: &Token) {
        self.lock().entry(token.clone()).or_default().readers += 1;
    }

    /// Mark the blob doomed if anyone is reading it. True means the caller
    /// must not delete it now.
    pub(crate) fn defer_if_pinned(&self, token: &Token) -> bool {
        match self.lock().get_mut(token) {
            Some(state) => {
                state.doomed = true;
                true
            }
            None => false,
        }
    }

    /// Drop one reader. True when this was the last reader of a doomed blob.
    fn release(&self, token: &Token) -> bool {
        let mut pins = self.lock();
        let Some(state) = pins.get_mut(token) else {
            return false;
        };
        state.readers = state.readers.saturating_sub(1);
        if state.readers > 0 {
            return false;
        }
        pins.remove(token).is_some_and(|state| state.doomed)
    }

    pub(crate) fn pinned(&self) -> usize {
        self.lock().len()
    }
}

/// Held by a download for as long as it streams.
pub struct BlobPin {
    token: Token,
    table: Arc<PinTable>,
    blobs: Arc<dyn BlobStore>,
}

impl BlobPin {
    /// Callers hold the index lock, so liveness and the pin are taken together.
    pub(crate) fn acquire(token: Token, table: Arc<PinTable>, blobs: Arc<dyn BlobStore>) -> Self {
        table.pin(&token);
        Self {
            token,
            table,
            blobs,
        }
    }
}

impl std::fmt::Debug for BlobPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobPin").field("token", &self.token).finish()
    }
}

impl Drop for BlobPin {
    fn drop(&mut self) {
        if !self.table.release(&self.token) {
            return;
        }

        let token = self.token.clone();
        let blobs = Arc::clone(&self.blobs);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(%token, "no runtime to delete doomed blob; left for startup purge");
            return;
        };
        runtime.spawn(async move {
            match blobs.remove(&token).await {
                Ok(Removal::Removed) => {
                    tracing::debug!(%token, "deleted blob after last reader finished");
                }
                Ok(Removal::Absent) => {}
                Err(e) => tracing::warn!(%token, error = %e, "failed to delete doomed blob"),
            }
        });
    }
}
