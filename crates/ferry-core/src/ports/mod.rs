//! Ports - 抽象化レイヤー
//!
//! 外部との境界（時刻・乱数・Blob ストレージ）を trait として定義します。
//! ストア本体はこれらの trait だけに依存し、実装の詳細を知りません。

pub mod blob_store;
pub mod clock;
pub mod token_generator;

// 主要な trait を再エクスポート
pub use self::blob_store::{BlobReader, BlobStore, Removal};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::token_generator::{RandomTokenGenerator, ScriptedTokenGenerator, TokenGenerator};
