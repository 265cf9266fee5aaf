//! Entry: one stored file and its metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{PublicId, Token};

/// Immutable record of a stored blob.
///
/// Created once by `put`, then only read until it is evicted. The blob
/// behind `token` is owned by this entry alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub token: Token,
    pub original_name: String,
    pub public_id: PublicId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub stored_size: u64,

    /// Insertion order within this process. Breaks public-id ties.
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl Entry {
    /// Live strictly before `expires_at`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_live_at(now)
    }
}

/// What `put` hands back to the ingestion caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutReceipt {
    pub token: Token,
    pub public_id: PublicId,
    pub original_name: String,
    pub expires_at: DateTime<Utc>,
    pub stored_size: u64,
}

impl From<&Entry> for PutReceipt {
    fn from(entry: &Entry) -> Self {
        Self {
            token: entry.token.clone(),
            public_id: entry.public_id.clone(),
            original_name: entry.original_name.clone(),
            expires_at: entry.expires_at,
            stored_size: entry.stored_size,
        }
    }
}
